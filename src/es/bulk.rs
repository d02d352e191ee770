//! Batched bulk insertion with retry.

use serde_json::{json, Value as JsonValue};
use tracing::{debug, warn};

use crate::error::{FeedError, FeedResult};
use crate::record::SourceDoc;

use super::client::EsClient;

/// Most documents submitted in one `_bulk` request.
pub const MAX_BATCH_LEN: usize = 1000;

/// Outcome of one submitted chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    /// Every item in the chunk was acknowledged.
    Success {
        /// Documents created.
        inserted: usize,
    },
    /// The bulk API took the request but rejected some items.
    PartialFailure {
        /// Documents created.
        inserted: usize,
        /// Items the engine refused.
        rejected: usize,
    },
    /// Every attempt failed; the chunk was dropped.
    Failure {
        /// Attempts spent before giving up.
        attempts: u32,
        /// Last error seen.
        reason: String,
    },
}

/// A document refused before submission because of unknown fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedDoc {
    /// Position in the slice handed to [`EsClient::bulk_insert`].
    pub position: usize,
    /// Field names absent from the index mapping.
    pub unknown_fields: Vec<String>,
}

/// Aggregated result of [`EsClient::bulk_insert`].
#[derive(Debug, Clone, Default)]
pub struct BulkReport {
    /// Per-chunk outcomes, in submission order.
    pub batches: Vec<BatchOutcome>,
    /// Documents never submitted.
    pub dropped: Vec<DroppedDoc>,
}

impl BulkReport {
    /// Documents the engine acknowledged as inserted.
    pub fn inserted(&self) -> usize {
        self.batches
            .iter()
            .map(|b| match b {
                BatchOutcome::Success { inserted } => *inserted,
                BatchOutcome::PartialFailure { inserted, .. } => *inserted,
                BatchOutcome::Failure { .. } => 0,
            })
            .sum()
    }

    /// Chunks that exhausted every attempt.
    pub fn failed_batches(&self) -> usize {
        self.batches
            .iter()
            .filter(|b| matches!(b, BatchOutcome::Failure { .. }))
            .count()
    }

    /// True when nothing was dropped and every chunk fully succeeded.
    pub fn clean(&self) -> bool {
        self.dropped.is_empty()
            && self
                .batches
                .iter()
                .all(|b| matches!(b, BatchOutcome::Success { .. }))
    }
}

impl EsClient {
    /// Insert documents in chunks of at most [`MAX_BATCH_LEN`].
    ///
    /// A document with a field the index mapping does not know is dropped
    /// whole before submission and recorded on the report. Each remaining
    /// chunk is submitted with the client's retry policy; a chunk that
    /// exhausts its attempts becomes a [`BatchOutcome::Failure`] in the
    /// report rather than an `Err`. Bulk insertion is best-effort and
    /// never rolls back chunks already submitted.
    pub async fn bulk_insert(&self, docs: &[SourceDoc]) -> FeedResult<BulkReport> {
        let mut report = BulkReport::default();

        let mut accepted: Vec<&SourceDoc> = Vec::with_capacity(docs.len());
        for (position, doc) in docs.iter().enumerate() {
            let unknown: Vec<String> = doc
                .keys()
                .filter(|k| !self.known_fields.contains(*k))
                .cloned()
                .collect();
            if unknown.is_empty() {
                accepted.push(doc);
            } else {
                warn!(
                    index = %self.index,
                    position,
                    fields = ?unknown,
                    "dropping document with fields unknown to the mapping"
                );
                report.dropped.push(DroppedDoc {
                    position,
                    unknown_fields: unknown,
                });
            }
        }

        for chunk in accepted.chunks(MAX_BATCH_LEN) {
            report.batches.push(self.submit_chunk(chunk).await);
        }
        Ok(report)
    }

    async fn submit_chunk(&self, chunk: &[&SourceDoc]) -> BatchOutcome {
        let url = format!("{}/_bulk", self.base_url);
        let body = render_ndjson(&self.index, chunk);
        let attempts = self.retry.attempts();
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match self.try_bulk_request(&url, body.clone()).await {
                Ok(outcome) => {
                    debug!(index = %self.index, attempt, outcome = ?outcome, "bulk chunk acknowledged");
                    return outcome;
                }
                Err(err) => {
                    warn!(index = %self.index, attempt, error = %err, "bulk chunk failed");
                    last_error = err.to_string();
                    if attempt < attempts {
                        let delay = self.retry.delay_for(attempt);
                        if !delay.is_zero() {
                            tokio::time::sleep(delay).await;
                        }
                    }
                }
            }
        }
        BatchOutcome::Failure {
            attempts,
            reason: last_error,
        }
    }

    async fn try_bulk_request(&self, url: &str, body: String) -> FeedResult<BatchOutcome> {
        let resp = self
            .http
            .post(url)
            .header("Content-Type", "application/x-ndjson")
            .body(body)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(FeedError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_string(),
                body: text,
            });
        }
        let body: JsonValue = resp.json().await?;
        Ok(tally_items(&body))
    }
}

/// One action line plus one source line per document.
fn render_ndjson(index: &str, docs: &[&SourceDoc]) -> String {
    let mut out = String::new();
    for doc in docs {
        let action = json!({ "index": { "_index": index, "_type": "_doc" } });
        out.push_str(&action.to_string());
        out.push('\n');
        out.push_str(&JsonValue::Object((*doc).clone()).to_string());
        out.push('\n');
    }
    out
}

/// Tally per-item statuses from a bulk response body.
fn tally_items(body: &JsonValue) -> BatchOutcome {
    let Some(items) = body.get("items").and_then(JsonValue::as_array) else {
        // No per-item detail; trust the errors flag.
        let errors = body
            .get("errors")
            .and_then(JsonValue::as_bool)
            .unwrap_or(false);
        return if errors {
            BatchOutcome::PartialFailure {
                inserted: 0,
                rejected: 0,
            }
        } else {
            BatchOutcome::Success { inserted: 0 }
        };
    };

    let mut inserted = 0usize;
    let mut rejected = 0usize;
    for item in items {
        // Each item is keyed by its action type ("index" here).
        let Some(entry) = item.as_object().and_then(|o| o.values().next()) else {
            rejected += 1;
            continue;
        };
        let ok = entry.get("error").is_none()
            && entry
                .get("status")
                .and_then(JsonValue::as_u64)
                .map(|s| s < 300)
                .unwrap_or(true);
        if ok {
            inserted += 1;
        } else {
            rejected += 1;
        }
    }
    if rejected == 0 {
        BatchOutcome::Success { inserted }
    } else {
        BatchOutcome::PartialFailure { inserted, rejected }
    }
}
