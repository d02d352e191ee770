//! Scroll pagination with an explicit cursor token.

use std::collections::HashMap;
use std::time::Duration;

use serde_json::{json, Value as JsonValue};

use crate::error::FeedResult;
use crate::record::SourceDoc;

use super::client::{collect_hits, EsClient};

/// Server-side pagination token, threaded through the caller.
///
/// [`EsClient::scroll_start`] returns the first page's cursor; each
/// [`EsClient::scroll_next`] call takes a cursor and the returned page
/// carries the renewed one. A page without a cursor cannot be continued,
/// so "next page with no cursor held" is unrepresentable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrollCursor {
    token: String,
    ttl: Duration,
}

/// One page of scrolled documents.
#[derive(Debug, Clone)]
pub struct ScrollPage {
    /// id → document source for this page.
    pub docs: HashMap<String, SourceDoc>,
    /// Cursor for the next page, when the server returned one.
    pub cursor: Option<ScrollCursor>,
}

impl ScrollPage {
    /// True when the page carries no documents, which is the exhaustion
    /// signal that ends a scroll loop.
    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }
}

/// TTLs travel as whole seconds (`"300s"`).
fn ttl_param(ttl: Duration) -> String {
    format!("{}s", ttl.as_secs().max(1))
}

impl EsClient {
    /// Open a scroll over `query` and fetch the first page.
    ///
    /// The query body is submitted with `size` set to `page_size` and the
    /// cursor lifetime attached to the request.
    pub async fn scroll_start(
        &self,
        query: &JsonValue,
        ttl: Duration,
        page_size: usize,
    ) -> FeedResult<ScrollPage> {
        let url = self.url(&format!("_search?scroll={}", ttl_param(ttl)));
        let mut body = query.clone();
        if let Some(obj) = body.as_object_mut() {
            obj.insert("size".to_string(), json!(page_size));
        }
        let resp = self.http.post(&url).json(&body).send().await?;
        let body = self.read_search_response(&url, resp).await?;
        Ok(page_from_body(&body, ttl))
    }

    /// Fetch the page after `cursor`.
    ///
    /// The original query and page size are fixed on the server side; only
    /// the token travels.
    pub async fn scroll_next(&self, cursor: &ScrollCursor) -> FeedResult<ScrollPage> {
        let url = format!("{}/_search/scroll", self.base_url);
        let body = json!({
            "scroll": ttl_param(cursor.ttl),
            "scroll_id": cursor.token,
        });
        let resp = self.http.post(&url).json(&body).send().await?;
        let body = self.read_search_response(&url, resp).await?;
        Ok(page_from_body(&body, cursor.ttl))
    }
}

fn page_from_body(body: &JsonValue, ttl: Duration) -> ScrollPage {
    let cursor = body
        .get("_scroll_id")
        .and_then(JsonValue::as_str)
        .map(|token| ScrollCursor {
            token: token.to_string(),
            ttl,
        });
    ScrollPage {
        docs: collect_hits(body),
        cursor,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ttl_renders_as_whole_seconds() {
        assert_eq!(ttl_param(Duration::from_secs(300)), "300s");
        assert_eq!(ttl_param(Duration::from_millis(10)), "1s");
    }

    #[test]
    fn page_without_scroll_id_has_no_cursor() {
        let body = json!({ "hits": { "hits": [] } });
        let page = page_from_body(&body, Duration::from_secs(60));
        assert!(page.is_empty());
        assert!(page.cursor.is_none());
    }
}
