use std::path::PathBuf;

use thiserror::Error;

/// Convenience result type for feeder operations.
pub type FeedResult<T> = Result<T, FeedError>;

/// Error type returned by loading, index-client, and export functions.
///
/// This is a single error enum shared across the spreadsheet loaders, the
/// Elasticsearch client, and the template exporter. Best-effort operations
/// (bulk insert, copy/dump) absorb most of these into their reports; what
/// surfaces here is the subset that must stop an operation.
#[derive(Debug, Error)]
pub enum FeedError {
    /// Underlying I/O error (e.g. file not found, permission denied).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Excel workbook error.
    #[error("excel error: {0}")]
    Excel(#[from] calamine::Error),

    /// CSV reader error.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// HTTP transport error (connect, timeout, body read).
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Template workbook could not be written.
    #[error("template error: {0}")]
    Template(#[from] rust_xlsxwriter::XlsxError),

    /// The header row contains an empty cell; the file must not be
    /// partially loaded. `column` is 1-based.
    #[error("malformed header in '{path}': cell {column} of the header row is empty")]
    MalformedHeader { path: PathBuf, column: usize },

    /// The input does not fit what the operation needs (unrecognized file
    /// format, sheet with no rows, index without a mapping to export).
    #[error("schema mismatch: {message}")]
    SchemaMismatch { message: String },

    /// The search engine answered with an error object in the response body.
    #[error("search error: {message}")]
    Search { message: String },

    /// The search engine answered with an unexpected HTTP status.
    #[error("unexpected status {status} from {url}: {body}")]
    UnexpectedStatus {
        status: u16,
        url: String,
        body: String,
    },

    /// The configured key field is not a column of the loaded sheet.
    #[error("key field '{field}' is not a column of the loaded sheet")]
    MissingKeyField { field: String },

    /// A response body did not have the expected shape.
    #[error("failed to parse response from {url}: {message}")]
    Parse { url: String, message: String },
}
