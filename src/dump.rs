//! Index-to-index copy via scroll pagination.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tracing::warn;

use crate::error::{FeedError, FeedResult};
use crate::es::EsClient;
use crate::observe::FeedObserver;
use crate::record::SourceDoc;

/// Options controlling one copy run.
#[derive(Clone)]
pub struct DumpOptions {
    /// Scroll cursor lifetime requested per page.
    pub scroll_ttl: Duration,
    /// Documents per scroll page.
    pub page_size: usize,
    /// Optional observer for page progress.
    pub observer: Option<Arc<dyn FeedObserver>>,
}

impl Default for DumpOptions {
    fn default() -> Self {
        Self {
            scroll_ttl: Duration::from_secs(300),
            page_size: 10_000,
            observer: None,
        }
    }
}

impl fmt::Debug for DumpOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DumpOptions")
            .field("scroll_ttl", &self.scroll_ttl)
            .field("page_size", &self.page_size)
            .field("observer_set", &self.observer.is_some())
            .finish()
    }
}

/// Result of [`dump`].
#[derive(Debug, Clone, Default)]
pub struct DumpReport {
    /// Non-empty pages processed.
    pub pages: usize,
    /// Documents read from the source.
    pub copied: usize,
    /// Documents the destination acknowledged.
    pub inserted: usize,
    /// Why the loop stopped early, if it did.
    pub halted: Option<String>,
}

/// Copy every document from `source` to `dest`.
///
/// Issues a match-all scroll against the source and bulk-inserts each
/// non-empty page into the destination until a page comes back empty. Raw
/// append: no deduplication, no key checks, document ids are not
/// preserved.
///
/// A transport or parse failure mid-stream, or a non-empty page without a
/// continuation cursor, stops the loop and lands on the report's `halted`
/// field rather than being raised; pages already copied stay copied.
pub async fn dump(
    source: &EsClient,
    dest: &EsClient,
    options: &DumpOptions,
) -> FeedResult<DumpReport> {
    let mut report = DumpReport::default();
    let query = json!({ "query": { "match_all": {} } });

    let mut page = match source
        .scroll_start(&query, options.scroll_ttl, options.page_size)
        .await
    {
        Ok(page) => page,
        Err(err) => {
            warn!(source = %source.index(), error = %err, "scroll could not start");
            absorb(options, "dump.scroll_start", &err);
            report.halted = Some(err.to_string());
            notify_complete(source, dest, options, &report);
            return Ok(report);
        }
    };

    while !page.is_empty() {
        report.pages += 1;
        report.copied += page.docs.len();
        let docs: Vec<SourceDoc> = page.docs.into_values().collect();

        match dest.bulk_insert(&docs).await {
            Ok(bulk) => {
                report.inserted += bulk.inserted();
                if let Some(observer) = &options.observer {
                    if !bulk.dropped.is_empty() {
                        observer.on_docs_dropped(dest.index(), &bulk.dropped);
                    }
                    observer.on_page_copied(
                        source.index(),
                        dest.index(),
                        report.pages,
                        docs.len(),
                    );
                }
            }
            Err(err) => {
                warn!(dest = %dest.index(), error = %err, "page insert failed");
                absorb(options, "dump.insert", &err);
                report.halted = Some(err.to_string());
                break;
            }
        }

        let Some(cursor) = page.cursor else {
            warn!(source = %source.index(), "non-empty page came back without a cursor");
            report.halted = Some("server returned no scroll cursor".to_string());
            break;
        };
        page = match source.scroll_next(&cursor).await {
            Ok(next) => next,
            Err(err) => {
                warn!(source = %source.index(), error = %err, "scroll continuation failed");
                absorb(options, "dump.scroll_next", &err);
                report.halted = Some(err.to_string());
                break;
            }
        };
    }

    notify_complete(source, dest, options, &report);
    Ok(report)
}

fn absorb(options: &DumpOptions, stage: &str, err: &FeedError) {
    if let Some(observer) = &options.observer {
        observer.on_absorbed_error(stage, err);
    }
}

fn notify_complete(source: &EsClient, dest: &EsClient, options: &DumpOptions, report: &DumpReport) {
    if let Some(observer) = &options.observer {
        observer.on_dump_complete(source.index(), dest.index(), report);
    }
}
