//! File-path-level operations.
//!
//! [`Feeder`] wires spreadsheet files to index operations the way the tool
//! is driven in practice: the file stem names the target index, and each
//! operation connects the client(s) it needs on its own.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value as JsonValue;
use tracing::warn;
use walkdir::WalkDir;

use crate::dump::{dump, DumpOptions, DumpReport};
use crate::error::{FeedError, FeedResult};
use crate::es::{EsClient, EsClientOptions, RetryPolicy};
use crate::observe::FeedObserver;
use crate::reconcile::{upsert_records, UpsertOptions, UpsertReport};
use crate::sheets::{self, SheetFormat};
use crate::synth;
use crate::template;

/// Derive the index name for a spreadsheet path: the file stem.
pub fn index_name_for(path: &Path) -> FeedResult<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| FeedError::SchemaMismatch {
            message: format!("cannot derive an index name from path: {}", path.display()),
        })
}

/// Result of [`Feeder::delete_from_spreadsheet`].
#[derive(Debug, Clone, Default)]
pub struct DeleteReport {
    /// Records whose key matched at least one document.
    pub matched_records: usize,
    /// Documents deleted.
    pub deleted: usize,
}

/// Result of [`Feeder::multiply_insert`].
#[derive(Debug, Clone, Default)]
pub struct MultiplyReport {
    /// Insert rounds completed.
    pub rounds: usize,
    /// Documents acknowledged across all rounds.
    pub inserted: usize,
}

/// File-level entry point for one cluster.
#[derive(Clone)]
pub struct Feeder {
    base_url: String,
    retry: RetryPolicy,
    observer: Option<Arc<dyn FeedObserver>>,
}

impl fmt::Debug for Feeder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Feeder")
            .field("base_url", &self.base_url)
            .field("retry", &self.retry)
            .field("observer_set", &self.observer.is_some())
            .finish()
    }
}

impl Feeder {
    /// Feeder for the cluster at `base_url`, with the default retry
    /// policy and no observer.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            retry: RetryPolicy::default(),
            observer: None,
        }
    }

    /// Replace the retry policy handed to every client this feeder
    /// connects.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Attach an observer. Used directly by operations without an options
    /// struct, and as the fallback when an options struct carries none.
    pub fn with_observer(mut self, observer: Arc<dyn FeedObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    async fn client_for(&self, index: &str) -> FeedResult<EsClient> {
        EsClient::connect(
            &self.base_url,
            index,
            EsClientOptions {
                retry: self.retry.clone(),
                ..Default::default()
            },
        )
        .await
    }

    fn effective_observer(
        &self,
        per_call: &Option<Arc<dyn FeedObserver>>,
    ) -> Option<Arc<dyn FeedObserver>> {
        per_call.clone().or_else(|| self.observer.clone())
    }

    /// Load `path` and reconcile it into the index named after the file.
    pub async fn upsert_spreadsheet(
        &self,
        path: impl AsRef<Path>,
        options: &UpsertOptions,
    ) -> FeedResult<UpsertReport> {
        let path = path.as_ref();
        let index = index_name_for(path)?;
        let records = sheets::load_records(path)?;

        let observer = self.effective_observer(&options.observer);
        if let Some(obs) = &observer {
            obs.on_load(path, records.record_count());
        }
        let client = self.client_for(&index).await?;
        let options = UpsertOptions {
            observer,
            ..options.clone()
        };
        upsert_records(&client, records, &options).await
    }

    /// Load `path` and delete every document matching each record's key.
    ///
    /// Records with an empty key cell, and records whose key lookup fails,
    /// are skipped with a WARN. Delete failures propagate.
    pub async fn delete_from_spreadsheet(
        &self,
        path: impl AsRef<Path>,
        key_field: &str,
    ) -> FeedResult<DeleteReport> {
        let path = path.as_ref();
        let index = index_name_for(path)?;
        let records = sheets::load_records(path)?;
        if records.column_index(key_field).is_none() {
            return Err(FeedError::MissingKeyField {
                field: key_field.to_string(),
            });
        }
        if let Some(obs) = &self.observer {
            obs.on_load(path, records.record_count());
        }
        let client = self.client_for(&index).await?;

        let mut report = DeleteReport::default();
        for (position, doc) in records.json_records().into_iter().enumerate() {
            let key_value = doc.get(key_field).cloned().unwrap_or(JsonValue::Null);
            if key_value.is_null() {
                warn!(index = %index, position, key = key_field, "record has no key value; nothing to delete");
                continue;
            }
            let matches = match client.query_by_field(key_field, &key_value).await {
                Ok(found) => found,
                Err(err) => {
                    warn!(
                        index = %index,
                        position,
                        key = key_field,
                        error = %err,
                        "key lookup failed; skipping record"
                    );
                    if let Some(obs) = &self.observer {
                        obs.on_absorbed_error("delete.lookup", &err);
                    }
                    continue;
                }
            };
            if matches.is_empty() {
                continue;
            }
            report.matched_records += 1;
            for id in matches.keys() {
                if client.delete_by_id(id).await? {
                    report.deleted += 1;
                }
            }
        }
        if let Some(obs) = &self.observer {
            obs.on_delete(&index, report.deleted);
        }
        Ok(report)
    }

    /// Load `path` once and insert every record `times` times, with fresh
    /// synthetic ids each round.
    ///
    /// No key lookup happens: this generates load-test volume, it does not
    /// reconcile. Without synthetic fields the rounds insert identical
    /// copies.
    pub async fn multiply_insert(
        &self,
        path: impl AsRef<Path>,
        times: usize,
        unique_string_fields: &BTreeSet<String>,
        unique_numeric_fields: &BTreeSet<String>,
    ) -> FeedResult<MultiplyReport> {
        let path = path.as_ref();
        let index = index_name_for(path)?;
        let mut records = sheets::load_records(path)?;
        if let Some(obs) = &self.observer {
            obs.on_load(path, records.record_count());
        }
        let client = self.client_for(&index).await?;

        let mut report = MultiplyReport::default();
        for _ in 0..times {
            synth::apply_unique_ids(&mut records, unique_string_fields, unique_numeric_fields);
            let bulk = client.bulk_insert(&records.json_records()).await?;
            if let Some(obs) = &self.observer {
                if !bulk.dropped.is_empty() {
                    obs.on_docs_dropped(&index, &bulk.dropped);
                }
                for outcome in &bulk.batches {
                    obs.on_batch(&index, outcome);
                }
            }
            report.rounds += 1;
            report.inserted += bulk.inserted();
        }
        Ok(report)
    }

    /// Upsert every spreadsheet under `dir`, one report per file keyed by
    /// index name.
    ///
    /// Files with unrecognized extensions are ignored. A file that fails
    /// to load or upsert is absorbed with a WARN and does not stop the
    /// walk.
    pub async fn upsert_directory(
        &self,
        dir: impl AsRef<Path>,
        options: &UpsertOptions,
    ) -> FeedResult<Vec<(String, UpsertReport)>> {
        let mut reports = Vec::new();
        for entry in WalkDir::new(dir.as_ref()).sort_by_file_name() {
            let entry = entry.map_err(std::io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
            if SheetFormat::from_extension(ext).is_none() {
                continue;
            }

            match self.upsert_spreadsheet(path, options).await {
                Ok(report) => reports.push((index_name_for(path)?, report)),
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "spreadsheet skipped");
                    if let Some(obs) = &self.observer {
                        obs.on_absorbed_error("directory.upsert", &err);
                    }
                }
            }
        }
        Ok(reports)
    }

    /// Export a header template for `index` into `dir`.
    pub async fn export_template(&self, index: &str, dir: impl AsRef<Path>) -> FeedResult<PathBuf> {
        let client = self.client_for(index).await?;
        let path = template::write_template(&client, dir)?;
        if let Some(obs) = &self.observer {
            obs.on_template_written(index, &path);
        }
        Ok(path)
    }

    /// Copy every document from `source_index` to `dest_index` on this
    /// feeder's cluster.
    pub async fn copy_index(
        &self,
        source_index: &str,
        dest_index: &str,
        options: &DumpOptions,
    ) -> FeedResult<DumpReport> {
        let source = self.client_for(source_index).await?;
        let dest = self.client_for(dest_index).await?;
        let options = DumpOptions {
            observer: self.effective_observer(&options.observer),
            ..options.clone()
        };
        dump(&source, &dest, &options).await
    }
}
