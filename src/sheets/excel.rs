//! Excel loading implementation.

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use chrono::NaiveDateTime;

use crate::error::{FeedError, FeedResult};
use crate::record::{CellValue, RecordSet};

/// Layout date-typed cells are normalized to.
const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Load an Excel workbook (`.xlsx`, `.xls`, `.ods`, ...) into a
/// [`RecordSet`].
///
/// Behavior:
///
/// - Reads the first sheet in the workbook.
/// - The first row is the header; any empty header cell aborts the load.
/// - Date-typed cells are normalized to `"YYYY-MM-DD HH:MM:SS"` text; all
///   other cell types pass through as-is.
/// - Rows whose cells are all empty are dropped; every other row is kept
///   whole, empty cells included.
pub fn load_excel_records(path: impl AsRef<Path>) -> FeedResult<RecordSet> {
    let path = path.as_ref();
    let mut workbook = open_workbook_auto(path)?;

    let sheets = workbook.sheet_names().to_vec();
    let first = sheets.first().ok_or_else(|| FeedError::SchemaMismatch {
        message: format!("workbook '{}' has no sheets", path.display()),
    })?;
    let range = workbook.worksheet_range(first)?;

    // The used range trims leading empty rows/columns; a trimmed origin
    // means the sheet's first header cell is empty.
    match range.start() {
        None => {
            return Err(FeedError::SchemaMismatch {
                message: format!("sheet '{first}' has no rows (no header row found)"),
            });
        }
        Some((row0, col0)) if row0 > 0 || col0 > 0 => {
            return Err(FeedError::MalformedHeader {
                path: path.to_path_buf(),
                column: 1,
            });
        }
        Some(_) => {}
    }

    let mut rows_iter = range.rows();
    let header_row = rows_iter.next().ok_or_else(|| FeedError::SchemaMismatch {
        message: format!("sheet '{first}' has no rows (no header row found)"),
    })?;
    let columns = read_header(path, header_row)?;

    let mut rows: Vec<Vec<CellValue>> = Vec::new();
    for row in rows_iter {
        let out: Vec<CellValue> = row.iter().map(convert_cell).collect();
        if out.iter().all(CellValue::is_null) {
            continue;
        }
        rows.push(out);
    }

    Ok(RecordSet::new(columns, rows))
}

/// Turn the header row into column names. `column` in the error is 1-based.
fn read_header(path: &Path, row: &[Data]) -> FeedResult<Vec<String>> {
    let mut columns = Vec::with_capacity(row.len());
    for (idx, cell) in row.iter().enumerate() {
        let name = header_cell_string(cell);
        if name.trim().is_empty() {
            return Err(FeedError::MalformedHeader {
                path: path.to_path_buf(),
                column: idx + 1,
            });
        }
        columns.push(name);
    }
    Ok(columns)
}

fn header_cell_string(c: &Data) -> String {
    match c {
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => {
            if f.fract() == 0.0 {
                (*f as i64).to_string()
            } else {
                f.to_string()
            }
        }
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => dt.to_string(),
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
        Data::Error(e) => format!("{e:?}"),
        Data::Empty => String::new(),
    }
}

fn convert_cell(c: &Data) -> CellValue {
    match c {
        Data::Empty => CellValue::Null,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Int(i) => CellValue::Int(*i),
        Data::Float(f) => CellValue::Float(*f),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(naive) => CellValue::Text(naive.format(DATETIME_FORMAT).to_string()),
            // Out-of-range serial value; keep the raw number.
            None => CellValue::Float(dt.as_f64()),
        },
        Data::DateTimeIso(s) => CellValue::Text(normalize_iso_datetime(s)),
        Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(e) => CellValue::Text(e.to_string()),
    }
}

/// Re-render an ISO datetime string in the fixed layout; strings that do
/// not parse as a datetime pass through unchanged.
fn normalize_iso_datetime(s: &str) -> String {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
        .map(|dt| dt.format(DATETIME_FORMAT).to_string())
        .unwrap_or_else(|_| s.to_string())
}
