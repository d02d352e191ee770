//! `esfeed` is a small library for feeding spreadsheet data into
//! Elasticsearch indices and copying documents between them.
//!
//! The primary entrypoint is [`feeder::Feeder`], which wires file paths to
//! index operations: the file stem names the target index, the header row
//! names the fields, and each operation connects the client(s) it needs.
//! The pieces underneath are usable on their own: [`sheets`] loads files,
//! [`es::EsClient`] talks to the engine, [`reconcile`] decides
//! insert/skip/replace, [`dump`] streams one index into another.
//!
//! ## What a load does
//!
//! - **Formats (auto-detected by extension):** `.xlsx`, `.xls`, `.xlsm`,
//!   `.xlsb`, `.ods`, `.csv`.
//! - The first row is the header and becomes the field set of every
//!   record; an empty header cell aborts the load.
//! - Date-typed cells normalize to `"YYYY-MM-DD HH:MM:SS"` text; rows with
//!   no values at all are dropped; every kept row keeps its empty cells as
//!   explicit nulls.
//!
//! ## Quick example: upsert a spreadsheet
//!
//! ```no_run
//! use esfeed::feeder::Feeder;
//! use esfeed::reconcile::UpsertOptions;
//!
//! # async fn run() -> Result<(), esfeed::FeedError> {
//! let feeder = Feeder::new("http://127.0.0.1:9200");
//! let options = UpsertOptions {
//!     key_field: Some("employee_id".to_string()),
//!     replace_existing: true,
//!     ..Default::default()
//! };
//! // Targets the "staff" index; creates, skips, or replaces per record.
//! let report = feeder.upsert_spreadsheet("uploads/staff.xlsx", &options).await?;
//! println!(
//!     "inserted={} skipped={} replaced={}",
//!     report.inserted(),
//!     report.skipped,
//!     report.replaced
//! );
//! # Ok(())
//! # }
//! ```
//!
//! ## Quick example: copy an index
//!
//! ```no_run
//! use esfeed::dump::{dump, DumpOptions};
//! use esfeed::es::{EsClient, EsClientOptions};
//!
//! # async fn run() -> Result<(), esfeed::FeedError> {
//! let source = EsClient::connect("http://10.0.0.5:9200", "staff", EsClientOptions::default()).await?;
//! let dest = EsClient::connect("http://10.0.0.9:9200", "staff", EsClientOptions::default()).await?;
//! let report = dump(&source, &dest, &DumpOptions::default()).await?;
//! println!("pages={} copied={}", report.pages, report.copied);
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`feeder`]: file-path-level operations (upsert, delete-by-key,
//!   multiplied inserts, directory walks, template export, index copy)
//! - [`sheets`]: spreadsheet loading into a [`record::RecordSet`]
//! - [`es`]: the index client (mapping introspection, bulk insert with
//!   retry, queries, deletes, scroll)
//! - [`reconcile`]: per-record insert/skip/replace decisions
//! - [`dump`]: scroll-driven index-to-index copy
//! - [`template`]: header-only workbook export from a mapping
//! - [`synth`]: synthetic unique-id hooks for load-test datasets
//! - [`observe`]: progress/error observer implementations
//! - [`record`]: the loaded-data model
//! - [`error`]: the crate-wide error type
//!
//! ## Error stance
//!
//! The client layer returns honest [`FeedResult`]s. The operations layer
//! is best-effort batch ETL: key-lookup failures, dropped documents, and
//! exhausted bulk retries are absorbed into typed reports
//! ([`es::BulkReport`], [`reconcile::UpsertReport`], [`dump::DumpReport`])
//! so callers assert on values, not on log output. What does propagate:
//! malformed headers, a missing key column, unreachable clusters at
//! connect, and delete failures during replacement.

pub mod dump;
pub mod error;
pub mod es;
pub mod feeder;
pub mod observe;
pub mod reconcile;
pub mod record;
pub mod sheets;
pub mod synth;
pub mod template;

pub use error::{FeedError, FeedResult};
