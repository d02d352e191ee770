//! Key-based upsert reconciliation.
//!
//! Given a loaded [`RecordSet`] and an optional key field, decide per
//! record whether to insert it, skip it, or replace the existing documents
//! it matches, then hand everything selected for insertion to the index in
//! one batched bulk call.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use serde_json::Value as JsonValue;
use tracing::warn;

use crate::error::{FeedError, FeedResult};
use crate::es::{BulkReport, EsClient};
use crate::observe::FeedObserver;
use crate::record::{RecordSet, SourceDoc};
use crate::synth;

/// Options controlling one reconciliation run.
///
/// Use [`Default`] for plain unconditional insertion. The synthetic-id
/// field sets are taken exactly as passed; there is no shared default
/// state between calls.
#[derive(Clone, Default)]
pub struct UpsertOptions {
    /// Field used to find existing documents. `None` inserts every record
    /// unconditionally.
    pub key_field: Option<String>,
    /// With a key match: `true` deletes the matches and inserts the
    /// incoming record, `false` skips it.
    pub replace_existing: bool,
    /// Columns overwritten with a fresh string id per record before any
    /// decision is made.
    pub unique_string_fields: BTreeSet<String>,
    /// Columns overwritten with a time-derived numeric id per record.
    pub unique_numeric_fields: BTreeSet<String>,
    /// Optional observer for progress events.
    pub observer: Option<Arc<dyn FeedObserver>>,
}

impl fmt::Debug for UpsertOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpsertOptions")
            .field("key_field", &self.key_field)
            .field("replace_existing", &self.replace_existing)
            .field("unique_string_fields", &self.unique_string_fields)
            .field("unique_numeric_fields", &self.unique_numeric_fields)
            .field("observer_set", &self.observer.is_some())
            .finish()
    }
}

/// What reconciliation decided for one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecordAction {
    Insert,
    Skip,
    Replace,
}

/// Decision table: the match count and the replace flag pick the action.
fn decide(existing_matches: usize, replace_existing: bool) -> RecordAction {
    match (existing_matches, replace_existing) {
        (0, _) => RecordAction::Insert,
        (_, false) => RecordAction::Skip,
        (_, true) => RecordAction::Replace,
    }
}

/// Result of [`upsert_records`].
#[derive(Debug, Clone, Default)]
pub struct UpsertReport {
    /// Records skipped because a match existed and replacement was off.
    pub skipped: usize,
    /// Records inserted in place of existing matches.
    pub replaced: usize,
    /// Existing documents deleted to make room for replacements.
    pub deleted: usize,
    /// Outcome of the single batched insert of everything selected.
    pub bulk: BulkReport,
}

impl UpsertReport {
    /// Documents the engine acknowledged as inserted.
    pub fn inserted(&self) -> usize {
        self.bulk.inserted()
    }
}

/// Reconcile `records` into the client's index.
///
/// The synthetic-id hooks run first, uniformly over the whole batch. With
/// a key field set, each record's key value is looked up and the decision
/// table picks insert, skip, or replace-then-insert; without one, every
/// record is selected. Everything selected goes to the index in one
/// batched [`EsClient::bulk_insert`] call at the end.
///
/// A key field that is not a column of `records` (after the hooks ran) is
/// a [`FeedError::MissingKeyField`] before any network traffic. A failed
/// key lookup is absorbed: the record takes the insert path with a WARN.
/// A failed delete propagates, since inserting after a failed delete
/// would duplicate the document.
pub async fn upsert_records(
    client: &EsClient,
    mut records: RecordSet,
    options: &UpsertOptions,
) -> FeedResult<UpsertReport> {
    synth::apply_unique_ids(
        &mut records,
        &options.unique_string_fields,
        &options.unique_numeric_fields,
    );

    let mut report = UpsertReport::default();
    let docs = records.json_records();

    let selected: Vec<SourceDoc> = match &options.key_field {
        None => docs,
        Some(key) => {
            if records.column_index(key).is_none() {
                return Err(FeedError::MissingKeyField { field: key.clone() });
            }

            let mut keep = Vec::with_capacity(docs.len());
            for (position, doc) in docs.into_iter().enumerate() {
                let key_value = doc.get(key.as_str()).cloned().unwrap_or(JsonValue::Null);
                let matches = lookup_matches(client, options, key, &key_value, position).await;

                match decide(matches.len(), options.replace_existing) {
                    RecordAction::Insert => keep.push(doc),
                    RecordAction::Skip => report.skipped += 1,
                    RecordAction::Replace => {
                        for id in matches.keys() {
                            if client.delete_by_id(id).await? {
                                report.deleted += 1;
                            }
                        }
                        report.replaced += 1;
                        keep.push(doc);
                    }
                }
            }
            keep
        }
    };

    report.bulk = client.bulk_insert(&selected).await?;

    if let Some(observer) = &options.observer {
        if !report.bulk.dropped.is_empty() {
            observer.on_docs_dropped(client.index(), &report.bulk.dropped);
        }
        for outcome in &report.bulk.batches {
            observer.on_batch(client.index(), outcome);
        }
        observer.on_upsert(client.index(), &report);
    }
    Ok(report)
}

async fn lookup_matches(
    client: &EsClient,
    options: &UpsertOptions,
    key: &str,
    key_value: &JsonValue,
    position: usize,
) -> HashMap<String, SourceDoc> {
    if key_value.is_null() {
        warn!(
            index = %client.index(),
            position,
            key,
            "record has no key value; inserting without reconciliation"
        );
        return HashMap::new();
    }
    match client.query_by_field(key, key_value).await {
        Ok(found) => found,
        Err(err) => {
            warn!(
                index = %client.index(),
                position,
                key,
                error = %err,
                "key lookup failed; treating as no match"
            );
            if let Some(observer) = &options.observer {
                observer.on_absorbed_error("reconcile.lookup", &err);
            }
            HashMap::new()
        }
    }
}
