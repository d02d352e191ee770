//! HTTP client bound to one index.

use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use reqwest::StatusCode;
use serde_json::{json, Value as JsonValue};
use tracing::debug;

use crate::error::{FeedError, FeedResult};
use crate::record::SourceDoc;

use super::retry::RetryPolicy;

/// Options for [`EsClient::connect`].
#[derive(Debug, Clone)]
pub struct EsClientOptions {
    /// Retry policy for bulk submissions.
    pub retry: RetryPolicy,
    /// TCP connect timeout.
    pub connect_timeout: Duration,
    /// Whole-request timeout.
    pub request_timeout: Duration,
}

impl Default for EsClientOptions {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(60),
        }
    }
}

/// Client for one index on one cluster.
///
/// The field list is introspected once at [`EsClient::connect`] and cached
/// for the client's lifetime; a mapping changed on the server afterwards is
/// not observed until a new client is constructed. All methods take `&self`
/// and hold no request state, so a client can be shared freely; one scroll
/// sequence is driven by whoever holds its [`super::ScrollCursor`].
#[derive(Debug, Clone)]
pub struct EsClient {
    pub(crate) http: reqwest::Client,
    pub(crate) base_url: String,
    pub(crate) index: String,
    pub(crate) retry: RetryPolicy,
    pub(crate) known_fields: BTreeSet<String>,
}

impl EsClient {
    /// Connect to `base_url` (e.g. `http://127.0.0.1:9200`) and introspect
    /// the mapping of `index`.
    ///
    /// Fails when the cluster is unreachable or answers the mapping lookup
    /// with an unexpected status. A missing index or an index without a
    /// mapping yields an empty field list, not an error.
    pub async fn connect(
        base_url: &str,
        index: &str,
        options: EsClientOptions,
    ) -> FeedResult<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(options.connect_timeout)
            .timeout(options.request_timeout)
            .build()?;

        let mut client = Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            index: index.to_string(),
            retry: options.retry,
            known_fields: BTreeSet::new(),
        };
        client.known_fields = client.fetch_field_list().await?;
        debug!(
            index = %client.index,
            fields = client.known_fields.len(),
            "mapping introspected"
        );
        Ok(client)
    }

    /// The index this client is bound to.
    pub fn index(&self) -> &str {
        &self.index
    }

    /// Field names known to the index, as introspected at connect time.
    pub fn field_list(&self) -> &BTreeSet<String> {
        &self.known_fields
    }

    pub(crate) fn url(&self, suffix: &str) -> String {
        format!("{}/{}/{}", self.base_url, self.index, suffix)
    }

    async fn fetch_field_list(&self) -> FeedResult<BTreeSet<String>> {
        let url = self.url("_mapping");
        let resp = self.http.get(&url).send().await?;
        match resp.status() {
            StatusCode::NOT_FOUND => Ok(BTreeSet::new()),
            status if status.is_success() => {
                let body: JsonValue = resp.json().await?;
                Ok(parse_mapping_fields(&body, &self.index))
            }
            _ => Err(error_for_status(&url, resp).await),
        }
    }

    /// Exact-match (`match`) query on one field. Returns id → document
    /// source for every hit.
    pub async fn query_by_field(
        &self,
        field: &str,
        value: &JsonValue,
    ) -> FeedResult<HashMap<String, SourceDoc>> {
        let mut match_clause = SourceDoc::new();
        match_clause.insert(field.to_string(), value.clone());
        let body = json!({ "query": { "match": match_clause } });
        self.search(&body).await
    }

    /// Run a caller-supplied query DSL body against the index. Returns
    /// id → document source for every hit.
    pub async fn search(&self, query: &JsonValue) -> FeedResult<HashMap<String, SourceDoc>> {
        let url = self.url("_search");
        let resp = self.http.post(&url).json(query).send().await?;
        let body = self.read_search_response(&url, resp).await?;
        Ok(collect_hits(&body))
    }

    /// Total hits for a query body. `hits.total` parses from both the bare
    /// number and the `{value, relation}` object the newer engines return.
    pub async fn count(&self, query: &JsonValue) -> FeedResult<u64> {
        let url = self.url("_search");
        let mut body = query.clone();
        if let Some(obj) = body.as_object_mut() {
            obj.insert("size".to_string(), json!(0));
        }
        let resp = self.http.post(&url).json(&body).send().await?;
        let body = self.read_search_response(&url, resp).await?;
        parse_hits_total(&body).ok_or_else(|| FeedError::Parse {
            url,
            message: "hits.total missing from search response".to_string(),
        })
    }

    /// Delete one document by id. Returns `false` when the document was
    /// already absent, so the call is idempotent.
    pub async fn delete_by_id(&self, id: &str) -> FeedResult<bool> {
        let url = self.url(&format!("_doc/{id}"));
        let resp = self.http.delete(&url).send().await?;
        match resp.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            _ => Err(error_for_status(&url, resp).await),
        }
    }

    /// Delete every document matching a query body. Returns the engine's
    /// deleted count.
    pub async fn delete_by_query(&self, query: &JsonValue) -> FeedResult<u64> {
        let url = self.url("_delete_by_query");
        let resp = self.http.post(&url).json(query).send().await?;
        let body = self.read_search_response(&url, resp).await?;
        Ok(body.get("deleted").and_then(JsonValue::as_u64).unwrap_or(0))
    }

    /// Parse a search-shaped response: reject error bodies and unexpected
    /// statuses, hand back the JSON otherwise.
    pub(crate) async fn read_search_response(
        &self,
        url: &str,
        resp: reqwest::Response,
    ) -> FeedResult<JsonValue> {
        let status = resp.status();
        let body: JsonValue = match resp.json().await {
            Ok(v) => v,
            Err(e) if status.is_success() => return Err(FeedError::from(e)),
            Err(_) => {
                return Err(FeedError::UnexpectedStatus {
                    status: status.as_u16(),
                    url: url.to_string(),
                    body: String::new(),
                });
            }
        };
        if let Some(error) = body.get("error") {
            return Err(FeedError::Search {
                message: search_error_message(error),
            });
        }
        if !status.is_success() {
            return Err(FeedError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_string(),
                body: body.to_string(),
            });
        }
        Ok(body)
    }
}

async fn error_for_status(url: &str, resp: reqwest::Response) -> FeedError {
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    FeedError::UnexpectedStatus {
        status,
        url: url.to_string(),
        body,
    }
}

/// Pull field names out of a `_mapping` response. Handles both the typed
/// (`mappings._doc.properties`) and untyped (`mappings.properties`)
/// layouts.
fn parse_mapping_fields(body: &JsonValue, index: &str) -> BTreeSet<String> {
    // The response is keyed by the concrete index name, which differs from
    // `index` when it is an alias.
    let mappings = body
        .get(index)
        .and_then(|v| v.get("mappings"))
        .or_else(|| {
            body.as_object()
                .and_then(|o| o.values().next())
                .and_then(|v| v.get("mappings"))
        });
    let Some(mappings) = mappings else {
        return BTreeSet::new();
    };
    let properties = mappings
        .get("properties")
        .or_else(|| mappings.get("_doc").and_then(|d| d.get("properties")));
    match properties.and_then(JsonValue::as_object) {
        Some(props) => props.keys().cloned().collect(),
        None => BTreeSet::new(),
    }
}

fn search_error_message(error: &JsonValue) -> String {
    error
        .get("reason")
        .and_then(JsonValue::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| error.to_string())
}

/// Flatten `hits.hits` into id → `_source`.
pub(crate) fn collect_hits(body: &JsonValue) -> HashMap<String, SourceDoc> {
    let mut out = HashMap::new();
    let hits = body.pointer("/hits/hits").and_then(JsonValue::as_array);
    for hit in hits.into_iter().flatten() {
        let Some(id) = hit.get("_id").and_then(JsonValue::as_str) else {
            continue;
        };
        let source = hit
            .get("_source")
            .and_then(JsonValue::as_object)
            .cloned()
            .unwrap_or_default();
        out.insert(id.to_string(), source);
    }
    out
}

/// `hits.total` across engine generations.
pub(crate) fn parse_hits_total(body: &JsonValue) -> Option<u64> {
    match body.pointer("/hits/total")? {
        JsonValue::Number(n) => n.as_u64(),
        JsonValue::Object(o) => o.get("value").and_then(JsonValue::as_u64),
        _ => None,
    }
}
