//! Synthetic unique-value generation for load-testing datasets.

use std::collections::BTreeSet;

use chrono::Local;
use uuid::Uuid;

use crate::record::{CellValue, RecordSet};

/// Freshly generated string id: a dashless UUID v4.
pub fn unique_string_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Time-derived numeric pseudo-unique id: month through second digits plus
/// microseconds (`MMDDHHMMSS` + 6 fraction digits) as an `i64`.
///
/// Pseudo-unique only: two calls inside the same microsecond collide, and
/// the value wraps around at year boundaries. Fine for synthetic datasets,
/// not for durable keys.
pub fn unique_numeric_id() -> i64 {
    let stamp = Local::now().format("%m%d%H%M%S%6f").to_string();
    stamp.parse().unwrap_or(0)
}

/// Overwrite the named columns of every record with fresh synthetic ids.
///
/// Columns in `string_fields` get a dashless UUID per record; columns in
/// `numeric_fields` get a time-derived numeric id. A named column absent
/// from the record set is created. Runs uniformly over the whole batch
/// before any reconciliation decision, so generated keys take part in
/// matching.
pub fn apply_unique_ids(
    records: &mut RecordSet,
    string_fields: &BTreeSet<String>,
    numeric_fields: &BTreeSet<String>,
) {
    for field in string_fields {
        records.overwrite_column(field, || CellValue::Text(unique_string_id()));
    }
    for field in numeric_fields {
        records.overwrite_column(field, || CellValue::Int(unique_numeric_id()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RecordSet {
        RecordSet::new(
            vec!["name".into()],
            vec![
                vec![CellValue::Text("a".into())],
                vec![CellValue::Text("b".into())],
            ],
        )
    }

    #[test]
    fn string_ids_are_dashless_and_distinct() {
        let id = unique_string_id();
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(id, unique_string_id());
    }

    #[test]
    fn numeric_ids_carry_microsecond_digits() {
        let id = unique_numeric_id();
        assert!(id > 0);
        // MMDDHHMMSS + 6 fraction digits, upper bound Dec 31 23:59:59.999999.
        assert!(id <= 1_231_235_959_999_999);
    }

    #[test]
    fn hooks_create_and_fill_the_named_columns() {
        let mut records = sample();
        let strings: BTreeSet<String> = ["uid".to_string()].into();
        let numerics: BTreeSet<String> = ["serial".to_string()].into();
        apply_unique_ids(&mut records, &strings, &numerics);

        let uid = records.column_index("uid").unwrap();
        let serial = records.column_index("serial").unwrap();
        assert_ne!(records.rows[0][uid], records.rows[1][uid]);
        for row in &records.rows {
            assert!(matches!(row[uid], CellValue::Text(_)));
            assert!(matches!(row[serial], CellValue::Int(_)));
        }
    }

    #[test]
    fn hooks_overwrite_existing_columns_in_place() {
        let mut records = sample();
        let strings: BTreeSet<String> = ["name".to_string()].into();
        apply_unique_ids(&mut records, &strings, &BTreeSet::new());
        assert_eq!(records.columns.len(), 1);
        assert_ne!(records.rows[0][0], CellValue::Text("a".into()));
    }
}
