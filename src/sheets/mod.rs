//! Spreadsheet loading entrypoints and implementations.
//!
//! Most callers should use [`load_records`], which:
//!
//! - auto-detects the format from the file extension
//! - reads the header row as the record field set (an empty header cell
//!   aborts the load; the file is never partially loaded)
//! - materializes one record per non-empty data row into a
//!   [`crate::record::RecordSet`]
//!
//! Format-specific functions are available under [`csv`] and [`excel`].

pub mod csv;
pub mod excel;

use std::path::Path;

use crate::error::{FeedError, FeedResult};
use crate::record::RecordSet;

pub use csv::load_csv_records;
pub use excel::load_excel_records;

/// Supported spreadsheet formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetFormat {
    /// Workbook formats read by calamine.
    Excel,
    /// Comma-separated values.
    Csv,
}

impl SheetFormat {
    /// Parse a format from a file extension (case-insensitive).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "xlsx" | "xls" | "xlsm" | "xlsb" | "ods" => Some(Self::Excel),
            "csv" => Some(Self::Csv),
            _ => None,
        }
    }
}

/// Infer the spreadsheet format of `path` from its extension.
pub fn infer_format(path: &Path) -> FeedResult<SheetFormat> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    SheetFormat::from_extension(ext).ok_or_else(|| FeedError::SchemaMismatch {
        message: format!(
            "cannot infer spreadsheet format from path: {}",
            path.display()
        ),
    })
}

/// Load a spreadsheet file into a [`RecordSet`], dispatching on the file
/// extension.
pub fn load_records(path: impl AsRef<Path>) -> FeedResult<RecordSet> {
    let path = path.as_ref();
    match infer_format(path)? {
        SheetFormat::Excel => excel::load_excel_records(path),
        SheetFormat::Csv => csv::load_csv_records(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_from_extension_is_case_insensitive() {
        assert_eq!(SheetFormat::from_extension("XLSX"), Some(SheetFormat::Excel));
        assert_eq!(SheetFormat::from_extension("ods"), Some(SheetFormat::Excel));
        assert_eq!(SheetFormat::from_extension("Csv"), Some(SheetFormat::Csv));
        assert_eq!(SheetFormat::from_extension("parquet"), None);
    }

    #[test]
    fn unknown_extension_is_an_error() {
        let err = infer_format(Path::new("data/items.txt")).unwrap_err();
        assert!(matches!(err, FeedError::SchemaMismatch { .. }));
    }
}
