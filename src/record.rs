//! Core data model for loaded spreadsheets.
//!
//! A spreadsheet file loads into a [`RecordSet`]: the header row as column
//! names plus row-major cell values. One row viewed as a JSON object is a
//! *record*, the unit handed to the index client.

use serde_json::Value as JsonValue;

/// A JSON document body, as submitted to and returned by the index.
pub type SourceDoc = serde_json::Map<String, JsonValue>;

/// A single scalar cell in a [`RecordSet`].
///
/// Date-typed cells are normalized to [`CellValue::Text`] at load time, so
/// no date variant exists here.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    /// Missing/empty cell.
    Null,
    /// Boolean cell.
    Bool(bool),
    /// Integer cell.
    Int(i64),
    /// Floating point cell.
    Float(f64),
    /// Text cell (including normalized dates).
    Text(String),
}

impl CellValue {
    /// True for [`CellValue::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Convert to a JSON value. `Null` maps to JSON `null`, so empty cells
    /// stay visible in the serialized record instead of being omitted.
    pub fn to_json(&self) -> JsonValue {
        match self {
            CellValue::Null => JsonValue::Null,
            CellValue::Bool(b) => JsonValue::Bool(*b),
            CellValue::Int(i) => JsonValue::Number((*i).into()),
            CellValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            CellValue::Text(s) => JsonValue::String(s.clone()),
        }
    }
}

/// One loaded spreadsheet: header names plus row-major cells.
///
/// Every row has exactly one cell per column, so all records produced from
/// one file share the same field set by construction.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordSet {
    /// Column names from the header row, in sheet order.
    pub columns: Vec<String>,
    /// Row-major cell storage, one entry per column per row.
    pub rows: Vec<Vec<CellValue>>,
}

impl RecordSet {
    /// Create a record set from header names and rows.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<CellValue>>) -> Self {
        Self { columns, rows }
    }

    /// Number of records (rows).
    pub fn record_count(&self) -> usize {
        self.rows.len()
    }

    /// True when the set holds no records.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns the index of a column by name, if present.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Returns the index of `name`, appending it as a new all-`Null` column
    /// when absent.
    pub fn ensure_column(&mut self, name: &str) -> usize {
        match self.column_index(name) {
            Some(idx) => idx,
            None => {
                self.columns.push(name.to_string());
                for row in &mut self.rows {
                    row.push(CellValue::Null);
                }
                self.columns.len() - 1
            }
        }
    }

    /// Overwrite every cell of `name` with a freshly generated value,
    /// creating the column when absent. `fill` is called once per row.
    pub fn overwrite_column<F>(&mut self, name: &str, mut fill: F)
    where
        F: FnMut() -> CellValue,
    {
        let idx = self.ensure_column(name);
        for row in &mut self.rows {
            row[idx] = fill();
        }
    }

    /// View one row as a JSON object keyed by column name.
    ///
    /// # Panics
    ///
    /// Panics if `row` is out of range.
    pub fn json_record(&self, row: usize) -> SourceDoc {
        self.columns
            .iter()
            .zip(self.rows[row].iter())
            .map(|(name, cell)| (name.clone(), cell.to_json()))
            .collect()
    }

    /// Materialize every row as a JSON object, in row order.
    pub fn json_records(&self) -> Vec<SourceDoc> {
        (0..self.rows.len()).map(|i| self.json_record(i)).collect()
    }
}
