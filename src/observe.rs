//! Progress and error reporting for feeder operations.
//!
//! Operations report what happened through a [`FeedObserver`] in addition
//! to returning typed reports, so long batch runs can surface progress
//! without callers polling. Observer callbacks are best-effort: a slow or
//! failing observer never changes an operation's outcome.

use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::dump::DumpReport;
use crate::error::FeedError;
use crate::es::{BatchOutcome, DroppedDoc};
use crate::reconcile::UpsertReport;

/// Observer interface for feeder operations.
///
/// All methods default to no-ops; implementors pick the events they care
/// about.
pub trait FeedObserver: Send + Sync {
    /// A spreadsheet finished loading.
    fn on_load(&self, _path: &Path, _records: usize) {}

    /// A bulk chunk came back with its outcome.
    fn on_batch(&self, _index: &str, _outcome: &BatchOutcome) {}

    /// Documents were refused before submission because of unknown fields.
    fn on_docs_dropped(&self, _index: &str, _dropped: &[DroppedDoc]) {}

    /// A reconciliation run finished.
    fn on_upsert(&self, _index: &str, _report: &UpsertReport) {}

    /// A key-driven delete run finished.
    fn on_delete(&self, _index: &str, _deleted: usize) {}

    /// One scroll page was copied during a dump.
    fn on_page_copied(&self, _source: &str, _dest: &str, _page: usize, _docs: usize) {}

    /// A dump finished, cleanly or halted.
    fn on_dump_complete(&self, _source: &str, _dest: &str, _report: &DumpReport) {}

    /// A template workbook was written.
    fn on_template_written(&self, _index: &str, _path: &Path) {}

    /// A failure was absorbed to keep a batch moving.
    fn on_absorbed_error(&self, _stage: &str, _error: &FeedError) {}
}

/// An observer that fans out callbacks to a list of observers.
#[derive(Default)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn FeedObserver>>,
}

impl CompositeObserver {
    /// Create a new composite observer from a list of observers.
    pub fn new(observers: Vec<Arc<dyn FeedObserver>>) -> Self {
        Self { observers }
    }
}

impl fmt::Debug for CompositeObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeObserver")
            .field("observers_len", &self.observers.len())
            .finish()
    }
}

impl FeedObserver for CompositeObserver {
    fn on_load(&self, path: &Path, records: usize) {
        for o in &self.observers {
            o.on_load(path, records);
        }
    }

    fn on_batch(&self, index: &str, outcome: &BatchOutcome) {
        for o in &self.observers {
            o.on_batch(index, outcome);
        }
    }

    fn on_docs_dropped(&self, index: &str, dropped: &[DroppedDoc]) {
        for o in &self.observers {
            o.on_docs_dropped(index, dropped);
        }
    }

    fn on_upsert(&self, index: &str, report: &UpsertReport) {
        for o in &self.observers {
            o.on_upsert(index, report);
        }
    }

    fn on_delete(&self, index: &str, deleted: usize) {
        for o in &self.observers {
            o.on_delete(index, deleted);
        }
    }

    fn on_page_copied(&self, source: &str, dest: &str, page: usize, docs: usize) {
        for o in &self.observers {
            o.on_page_copied(source, dest, page, docs);
        }
    }

    fn on_dump_complete(&self, source: &str, dest: &str, report: &DumpReport) {
        for o in &self.observers {
            o.on_dump_complete(source, dest, report);
        }
    }

    fn on_template_written(&self, index: &str, path: &Path) {
        for o in &self.observers {
            o.on_template_written(index, path);
        }
    }

    fn on_absorbed_error(&self, stage: &str, error: &FeedError) {
        for o in &self.observers {
            o.on_absorbed_error(stage, error);
        }
    }
}

/// Logs feed events to stderr.
#[derive(Debug, Default)]
pub struct StdErrObserver;

impl FeedObserver for StdErrObserver {
    fn on_load(&self, path: &Path, records: usize) {
        eprintln!("[feed][load] path={} records={}", path.display(), records);
    }

    fn on_batch(&self, index: &str, outcome: &BatchOutcome) {
        eprintln!("[feed][batch] index={index} outcome={outcome:?}");
    }

    fn on_docs_dropped(&self, index: &str, dropped: &[DroppedDoc]) {
        eprintln!("[feed][dropped] index={index} docs={}", dropped.len());
    }

    fn on_upsert(&self, index: &str, report: &UpsertReport) {
        eprintln!(
            "[feed][upsert] index={index} inserted={} skipped={} replaced={}",
            report.inserted(),
            report.skipped,
            report.replaced
        );
    }

    fn on_delete(&self, index: &str, deleted: usize) {
        eprintln!("[feed][delete] index={index} deleted={deleted}");
    }

    fn on_page_copied(&self, source: &str, dest: &str, page: usize, docs: usize) {
        eprintln!("[feed][page] source={source} dest={dest} page={page} docs={docs}");
    }

    fn on_dump_complete(&self, source: &str, dest: &str, report: &DumpReport) {
        eprintln!(
            "[feed][dump] source={source} dest={dest} pages={} copied={} halted={:?}",
            report.pages, report.copied, report.halted
        );
    }

    fn on_template_written(&self, index: &str, path: &Path) {
        eprintln!("[feed][template] index={index} path={}", path.display());
    }

    fn on_absorbed_error(&self, stage: &str, error: &FeedError) {
        eprintln!("[feed][absorbed] stage={stage} err={error}");
    }
}

/// Appends feed events to a local log file.
#[derive(Debug)]
pub struct FileObserver {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileObserver {
    /// Create a file observer that appends events to `path`.
    ///
    /// Writes are best-effort; failures to open/write the log file are
    /// ignored.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    fn append_line(&self, line: &str) {
        let _guard = self.lock.lock().ok();
        if let Ok(mut f) = OpenOptions::new().create(true).append(true).open(&self.path) {
            let _ = writeln!(f, "{line}");
        }
    }
}

impl FeedObserver for FileObserver {
    fn on_load(&self, path: &Path, records: usize) {
        self.append_line(&format!(
            "{} load path={} records={}",
            unix_ts(),
            path.display(),
            records
        ));
    }

    fn on_batch(&self, index: &str, outcome: &BatchOutcome) {
        self.append_line(&format!("{} batch index={index} outcome={outcome:?}", unix_ts()));
    }

    fn on_upsert(&self, index: &str, report: &UpsertReport) {
        self.append_line(&format!(
            "{} upsert index={index} inserted={} skipped={} replaced={}",
            unix_ts(),
            report.inserted(),
            report.skipped,
            report.replaced
        ));
    }

    fn on_delete(&self, index: &str, deleted: usize) {
        self.append_line(&format!("{} delete index={index} deleted={deleted}", unix_ts()));
    }

    fn on_dump_complete(&self, source: &str, dest: &str, report: &DumpReport) {
        self.append_line(&format!(
            "{} dump source={source} dest={dest} pages={} copied={} halted={:?}",
            unix_ts(),
            report.pages,
            report.copied,
            report.halted
        ));
    }

    fn on_absorbed_error(&self, stage: &str, error: &FeedError) {
        self.append_line(&format!("{} absorbed stage={stage} err={error}", unix_ts()));
    }
}

fn unix_ts() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
