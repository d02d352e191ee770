use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use esfeed::es::{EsClient, EsClientOptions, RetryPolicy};
use esfeed::observe::FeedObserver;
use esfeed::reconcile::{upsert_records, UpsertOptions, UpsertReport};
use esfeed::record::{CellValue, RecordSet};
use esfeed::FeedError;

fn mapping_body(index: &str, fields: &[&str]) -> serde_json::Value {
    let mut props = serde_json::Map::new();
    for field in fields {
        props.insert((*field).to_string(), json!({ "type": "text" }));
    }
    let mut body = serde_json::Map::new();
    body.insert(
        index.to_string(),
        json!({ "mappings": { "properties": props } }),
    );
    serde_json::Value::Object(body)
}

async fn mount_mapping(server: &MockServer, index: &str, fields: &[&str]) {
    Mock::given(method("GET"))
        .and(path(format!("/{index}/_mapping")))
        .respond_with(ResponseTemplate::new(200).set_body_json(mapping_body(index, fields)))
        .mount(server)
        .await;
}

async fn connect(server: &MockServer, index: &str) -> EsClient {
    EsClient::connect(
        &server.uri(),
        index,
        EsClientOptions {
            retry: RetryPolicy::no_delay(1),
            ..Default::default()
        },
    )
    .await
    .unwrap()
}

fn staff_records(people: &[(&str, &str)]) -> RecordSet {
    RecordSet::new(
        vec!["employee_id".to_string(), "name".to_string()],
        people
            .iter()
            .map(|(id, name)| {
                vec![
                    CellValue::Text((*id).to_string()),
                    CellValue::Text((*name).to_string()),
                ]
            })
            .collect(),
    )
}

fn hits_for(ids: &[&str]) -> serde_json::Value {
    let hits: Vec<serde_json::Value> = ids
        .iter()
        .map(|id| json!({ "_id": id, "_source": { "name": "existing" } }))
        .collect();
    json!({ "hits": { "total": { "value": hits.len(), "relation": "eq" }, "hits": hits } })
}

/// Acknowledges every submitted item, sized from the NDJSON request body.
struct AckAllItems;

impl Respond for AckAllItems {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body = String::from_utf8_lossy(&request.body);
        let submitted = body.lines().count() / 2;
        let items: Vec<serde_json::Value> = (0..submitted)
            .map(|_| json!({ "index": { "status": 201 } }))
            .collect();
        ResponseTemplate::new(200).set_body_json(json!({ "errors": false, "items": items }))
    }
}

#[derive(Default)]
struct RecordingObserver {
    events: Mutex<Vec<String>>,
}

impl FeedObserver for RecordingObserver {
    fn on_upsert(&self, index: &str, report: &UpsertReport) {
        self.events
            .lock()
            .unwrap()
            .push(format!("upsert:{index}:{}", report.inserted()));
    }

    fn on_absorbed_error(&self, stage: &str, _error: &FeedError) {
        self.events.lock().unwrap().push(format!("absorbed:{stage}"));
    }
}

#[tokio::test]
async fn upsert_without_a_key_inserts_every_record() {
    let server = MockServer::start().await;
    mount_mapping(&server, "staff", &["employee_id", "name"]).await;
    Mock::given(method("POST"))
        .and(path("/staff/_search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(hits_for(&[])))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/_bulk"))
        .respond_with(AckAllItems)
        .expect(1)
        .mount(&server)
        .await;

    let client = connect(&server, "staff").await;
    let records = staff_records(&[("E1", "Ada"), ("E2", "Grace"), ("E3", "Linus")]);
    let report = upsert_records(&client, records, &UpsertOptions::default())
        .await
        .unwrap();
    assert_eq!(report.inserted(), 3);
    assert_eq!(report.skipped, 0);
    assert_eq!(report.replaced, 0);
    assert!(report.bulk.clean());
}

#[tokio::test]
async fn upsert_skips_matched_records_when_replacement_is_off() {
    let server = MockServer::start().await;
    mount_mapping(&server, "staff", &["employee_id", "name"]).await;
    Mock::given(method("POST"))
        .and(path("/staff/_search"))
        .and(body_string_contains("\"employee_id\":\"E1\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(hits_for(&["old1"])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/staff/_search"))
        .and(body_string_contains("\"employee_id\":\"E2\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(hits_for(&[])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/_bulk"))
        .and(body_string_contains("E2"))
        .respond_with(AckAllItems)
        .expect(1)
        .mount(&server)
        .await;

    let client = connect(&server, "staff").await;
    let records = staff_records(&[("E1", "Ada"), ("E2", "Grace")]);
    let options = UpsertOptions {
        key_field: Some("employee_id".to_string()),
        replace_existing: false,
        ..Default::default()
    };
    let report = upsert_records(&client, records, &options).await.unwrap();
    assert_eq!(report.skipped, 1);
    assert_eq!(report.replaced, 0);
    assert_eq!(report.deleted, 0);
    assert_eq!(report.inserted(), 1);
}

#[tokio::test]
async fn upsert_replaces_matched_records_when_replacement_is_on() {
    let server = MockServer::start().await;
    mount_mapping(&server, "staff", &["employee_id", "name"]).await;
    Mock::given(method("POST"))
        .and(path("/staff/_search"))
        .and(body_string_contains("\"employee_id\":\"E1\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(hits_for(&["old1"])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/staff/_search"))
        .and(body_string_contains("\"employee_id\":\"E2\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(hits_for(&[])))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/staff/_doc/old1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": "deleted" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/_bulk"))
        .respond_with(AckAllItems)
        .expect(1)
        .mount(&server)
        .await;

    let client = connect(&server, "staff").await;
    let records = staff_records(&[("E1", "Ada"), ("E2", "Grace")]);
    let options = UpsertOptions {
        key_field: Some("employee_id".to_string()),
        replace_existing: true,
        ..Default::default()
    };
    let report = upsert_records(&client, records, &options).await.unwrap();
    assert_eq!(report.replaced, 1);
    assert_eq!(report.deleted, 1);
    assert_eq!(report.skipped, 0);
    // Both the replacement and the unmatched record land.
    assert_eq!(report.inserted(), 2);
}

#[tokio::test]
async fn upsert_rejects_a_key_field_that_is_not_a_column() {
    let server = MockServer::start().await;
    mount_mapping(&server, "staff", &["employee_id", "name"]).await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = connect(&server, "staff").await;
    let records = staff_records(&[("E1", "Ada")]);
    let options = UpsertOptions {
        key_field: Some("badge".to_string()),
        ..Default::default()
    };
    let err = upsert_records(&client, records, &options).await.unwrap_err();
    match err {
        FeedError::MissingKeyField { field } => assert_eq!(field, "badge"),
        other => panic!("expected a missing key field error, got {other:?}"),
    }
}

#[tokio::test]
async fn records_with_empty_keys_insert_without_a_lookup() {
    let server = MockServer::start().await;
    mount_mapping(&server, "staff", &["employee_id", "name"]).await;
    Mock::given(method("POST"))
        .and(path("/staff/_search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(hits_for(&[])))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/_bulk"))
        .respond_with(AckAllItems)
        .expect(1)
        .mount(&server)
        .await;

    let client = connect(&server, "staff").await;
    let records = RecordSet::new(
        vec!["employee_id".to_string(), "name".to_string()],
        vec![vec![CellValue::Null, CellValue::Text("Ada".to_string())]],
    );
    let options = UpsertOptions {
        key_field: Some("employee_id".to_string()),
        replace_existing: true,
        ..Default::default()
    };
    let report = upsert_records(&client, records, &options).await.unwrap();
    assert_eq!(report.inserted(), 1);
    assert_eq!(report.skipped, 0);
}

#[tokio::test]
async fn failed_lookups_fall_back_to_the_insert_path() {
    let server = MockServer::start().await;
    mount_mapping(&server, "staff", &["employee_id", "name"]).await;
    Mock::given(method("POST"))
        .and(path("/staff/_search"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/_bulk"))
        .respond_with(AckAllItems)
        .expect(1)
        .mount(&server)
        .await;

    let obs = Arc::new(RecordingObserver::default());
    let client = connect(&server, "staff").await;
    let records = staff_records(&[("E1", "Ada")]);
    let options = UpsertOptions {
        key_field: Some("employee_id".to_string()),
        replace_existing: true,
        observer: Some(obs.clone()),
        ..Default::default()
    };
    let report = upsert_records(&client, records, &options).await.unwrap();
    assert_eq!(report.inserted(), 1);
    assert_eq!(report.deleted, 0);

    let events = obs.events.lock().unwrap().clone();
    assert!(events.contains(&"absorbed:reconcile.lookup".to_string()));
    assert!(events.contains(&"upsert:staff:1".to_string()));
}

#[tokio::test]
async fn a_failed_delete_stops_the_run() {
    let server = MockServer::start().await;
    mount_mapping(&server, "staff", &["employee_id", "name"]).await;
    Mock::given(method("POST"))
        .and(path("/staff/_search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(hits_for(&["old1"])))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/staff/_doc/old1"))
        .respond_with(ResponseTemplate::new(500).set_body_string("shard failure"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/_bulk"))
        .respond_with(AckAllItems)
        .expect(0)
        .mount(&server)
        .await;

    let client = connect(&server, "staff").await;
    let records = staff_records(&[("E1", "Ada")]);
    let options = UpsertOptions {
        key_field: Some("employee_id".to_string()),
        replace_existing: true,
        ..Default::default()
    };
    let err = upsert_records(&client, records, &options).await.unwrap_err();
    assert!(matches!(err, FeedError::UnexpectedStatus { status: 500, .. }));
}

#[tokio::test]
async fn synthetic_ids_are_applied_before_submission() {
    let server = MockServer::start().await;
    mount_mapping(&server, "staff", &["employee_id", "name", "uid"]).await;
    Mock::given(method("POST"))
        .and(path("/_bulk"))
        .and(body_string_contains("\"uid\":\""))
        .respond_with(AckAllItems)
        .expect(1)
        .mount(&server)
        .await;

    let client = connect(&server, "staff").await;
    let records = staff_records(&[("E1", "Ada"), ("E2", "Grace")]);
    let options = UpsertOptions {
        unique_string_fields: BTreeSet::from(["uid".to_string()]),
        ..Default::default()
    };
    let report = upsert_records(&client, records, &options).await.unwrap();
    assert_eq!(report.inserted(), 2);
    assert!(report.bulk.clean());
}
