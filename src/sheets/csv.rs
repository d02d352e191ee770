//! CSV loading implementation.

use std::path::Path;

use crate::error::{FeedError, FeedResult};
use crate::record::{CellValue, RecordSet};

/// Load a CSV file into a [`RecordSet`].
///
/// Rules:
///
/// - The first record is the header; any empty header cell aborts the load.
/// - Every value loads as text and empty values become `Null`. No type
///   sniffing: the index mapping decides how strings coerce.
/// - Rows whose cells are all empty are dropped.
pub fn load_csv_records(path: impl AsRef<Path>) -> FeedResult<RecordSet> {
    let path = path.as_ref();
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)?;
    let headers = rdr.headers()?.clone();

    let mut columns = Vec::with_capacity(headers.len());
    for (idx, name) in headers.iter().enumerate() {
        if name.trim().is_empty() {
            return Err(FeedError::MalformedHeader {
                path: path.to_path_buf(),
                column: idx + 1,
            });
        }
        columns.push(name.to_string());
    }
    if columns.is_empty() {
        return Err(FeedError::SchemaMismatch {
            message: format!("csv '{}' has no header row", path.display()),
        });
    }

    let mut rows: Vec<Vec<CellValue>> = Vec::new();
    for result in rdr.records() {
        let record = result?;
        let row: Vec<CellValue> = (0..columns.len())
            .map(|i| {
                let raw = record.get(i).unwrap_or("");
                if raw.trim().is_empty() {
                    CellValue::Null
                } else {
                    CellValue::Text(raw.to_string())
                }
            })
            .collect();
        if row.iter().all(CellValue::is_null) {
            continue;
        }
        rows.push(row);
    }

    Ok(RecordSet::new(columns, rows))
}
