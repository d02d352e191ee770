use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use esfeed::record::CellValue;
use esfeed::sheets::{load_csv_records, load_records};
use esfeed::FeedError;

fn tmp_csv(name: &str, content: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let path = std::env::temp_dir().join(format!("esfeed-{name}-{nanos}.csv"));
    std::fs::write(&path, content).unwrap();
    path
}

#[test]
fn load_csv_happy_path() {
    let path = tmp_csv("people", "employee_id,name,rating\nE1,Ada,4.5\nE2,Grace,3.9\n");

    let rs = load_csv_records(&path).unwrap();
    assert_eq!(rs.columns, vec!["employee_id", "name", "rating"]);
    assert_eq!(rs.record_count(), 2);
    // No type sniffing: every value loads as text.
    assert_eq!(rs.rows[0][2], CellValue::Text("4.5".to_string()));
    assert_eq!(rs.rows[1][0], CellValue::Text("E2".to_string()));

    let _ = std::fs::remove_file(&path);
}

#[test]
fn load_csv_turns_empty_values_into_nulls() {
    let path = tmp_csv("nulls", "id,name,note\n1,Ada,\n2,,  \n");

    let rs = load_csv_records(&path).unwrap();
    assert_eq!(rs.record_count(), 2);
    assert!(rs.rows[0][2].is_null());
    assert!(rs.rows[1][1].is_null());
    // Whitespace-only values count as empty.
    assert!(rs.rows[1][2].is_null());
    assert_eq!(rs.rows[1][0], CellValue::Text("2".to_string()));

    let _ = std::fs::remove_file(&path);
}

#[test]
fn load_csv_drops_rows_with_all_empty_values() {
    let path = tmp_csv("blanks", "id,name\n1,Ada\n,\n2,Grace\n");

    let rs = load_csv_records(&path).unwrap();
    assert_eq!(rs.record_count(), 2);
    assert_eq!(rs.rows[1][0], CellValue::Text("2".to_string()));

    let _ = std::fs::remove_file(&path);
}

#[test]
fn load_csv_rejects_an_empty_header_cell() {
    let path = tmp_csv("bad-header", "id,,name\n1,2,Ada\n");

    let err = load_csv_records(&path).unwrap_err();
    assert!(matches!(err, FeedError::MalformedHeader { column: 2, .. }));

    let _ = std::fs::remove_file(&path);
}

#[test]
fn load_records_dispatches_on_the_csv_extension() {
    let path = tmp_csv("dispatch", "id,name\n1,Ada\n");

    let rs = load_records(&path).unwrap();
    assert_eq!(rs.record_count(), 1);

    let _ = std::fs::remove_file(&path);
}

#[test]
fn load_records_rejects_unknown_extensions() {
    let err = load_records("data/items.parquet").unwrap_err();
    assert!(matches!(err, FeedError::SchemaMismatch { .. }));
}

#[test]
fn loaded_csv_records_serialize_as_string_fields() {
    let path = tmp_csv("serialize", "id,name\n1,Ada\n2,\n");

    let rs = load_csv_records(&path).unwrap();
    let docs = rs.json_records();
    assert_eq!(docs[0]["id"], "1");
    assert_eq!(docs[0]["name"], "Ada");
    assert!(docs[1]["name"].is_null());

    let _ = std::fs::remove_file(&path);
}
