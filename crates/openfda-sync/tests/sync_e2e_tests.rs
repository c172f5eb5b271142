//! End-to-end tests for the sync loop
//!
//! These tests drive the full fetch / flatten / upsert / checkpoint loop
//! against a mock openFDA server, validating:
//! - pagination and termination conditions
//! - incremental date filtering and cursor advancement
//! - checkpoint contents after success and mid-run failure
//! - upsert idempotence at the cursor boundary
//! - per-record skip behavior

use std::collections::BTreeMap;
use std::time::Duration;

use openfda_sync::client::FdaClient;
use openfda_sync::config::ConnectorConfig;
use openfda_sync::cursor;
use openfda_sync::destination::MemoryDestination;
use openfda_sync::retry::RetryPolicy;
use openfda_sync::state::{JsonStateStore, StateStore, SyncState};
use openfda_sync::sync::SyncRunner;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Connector config pointed at the mock server, page size 2, no throttle
fn test_config(base_url: &str, extra: &[(&str, &str)]) -> ConnectorConfig {
    let mut map = BTreeMap::new();
    map.insert("api_key".to_string(), "test-key".to_string());
    map.insert("base_url".to_string(), base_url.to_string());
    map.insert("limit".to_string(), "2".to_string());
    map.insert("throttle_ms".to_string(), "0".to_string());
    for (k, v) in extra {
        map.insert(k.to_string(), v.to_string());
    }
    ConnectorConfig::from_map(&map).expect("valid test config")
}

/// Runner whose retries do not sleep
fn test_runner(config: ConnectorConfig) -> SyncRunner {
    let client = FdaClient::new(&config)
        .expect("client")
        .with_retry_policy(RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::ZERO,
        });
    SyncRunner::with_client(config, client)
}

fn enforcement_record(recall_number: &str, report_date: &str) -> serde_json::Value {
    json!({
        "recall_number": recall_number,
        "report_date": report_date,
        "recalling_firm": "Acme Foods",
        "classification": "Class I",
        "status": "Ongoing",
        "openfda": {"brand_name": ["Acme Soup"]},
        "product_codes": []
    })
}

fn results_body(records: &[serde_json::Value]) -> serde_json::Value {
    json!({ "results": records })
}

#[tokio::test]
async fn full_sync_paginates_until_short_page() {
    let server = MockServer::start().await;

    // Later offsets mounted first; the catch-all serves the first page.
    Mock::given(method("GET"))
        .and(query_param("skip", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(results_body(&[
            enforcement_record("F-0003-2024", "20240210"),
            enforcement_record("F-0004-2024", "20240301"),
        ])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(query_param("skip", "4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(results_body(&[
            enforcement_record("F-0005-2023", "20231215"),
        ])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(results_body(&[
            enforcement_record("F-0001-2024", "20240101"),
            enforcement_record("F-0002-2024", "20240315"),
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let store = JsonStateStore::new(dir.path().join("sync_state.json"));
    let destination = MemoryDestination::new();

    let runner = test_runner(test_config(&server.uri(), &[]));
    let report = runner.run(&store, &destination).await.unwrap();

    assert_eq!(report.records_synced, 5);
    assert_eq!(report.total_processed, 5);
    // Cursor holds the maximum date across the run even though the last
    // page carried older dates.
    assert_eq!(report.last_sync_date, "2024-03-15T00:00:00Z");

    assert_eq!(destination.len().await, 5);
    let row = destination.get("F-0002-2024").await.unwrap();
    assert_eq!(
        row.get("openfda_brand_name").unwrap().as_str(),
        Some(r#"["Acme Soup"]"#)
    );
    // Empty code array flattens to null, sync metadata is attached.
    assert!(row.contains_key("_synced_at"));
    assert!(row.contains_key("_deleted"));

    let state = store.load().await.unwrap().unwrap();
    assert_eq!(state.last_sync_date.as_deref(), Some("2024-03-15T00:00:00Z"));
    assert_eq!(state.total_processed, 5);
    assert_eq!(state.last_cursor, Some(5));

    // First request carries no skip, and no search filter on a first run.
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 3);
    let first_query = requests[0].url.query().unwrap_or("");
    assert!(!first_query.contains("skip"));
    assert!(!first_query.contains("search"));
}

#[tokio::test]
async fn incremental_run_filters_from_persisted_cursor() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(query_param(
            "search",
            "report_date:[2024-03-15T00:00:00Z+TO+*]",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(results_body(&[
            enforcement_record("F-0006-2024", "20240401"),
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let store = JsonStateStore::new(dir.path().join("sync_state.json"));
    store
        .save(&SyncState {
            last_sync_date: Some("2024-03-15T00:00:00Z".to_string()),
            total_processed: 5,
            last_cursor: Some(5),
        })
        .await
        .unwrap();

    let destination = MemoryDestination::new();
    let runner = test_runner(test_config(&server.uri(), &[]));
    let report = runner.run(&store, &destination).await.unwrap();

    assert_eq!(report.records_synced, 1);
    assert_eq!(report.total_processed, 6);
    assert_eq!(report.last_sync_date, "2024-04-01T00:00:00Z");
}

#[tokio::test]
async fn boundary_date_redelivery_is_idempotent() {
    // The inclusive lower bound re-delivers the record sitting exactly on
    // the cursor; the upsert must overwrite, not duplicate.
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(results_body(&[
            enforcement_record("F-0002-2024", "20240315"),
        ])))
        .mount(&server)
        .await;

    let destination = MemoryDestination::new();
    let dir = TempDir::new().unwrap();
    let store = JsonStateStore::new(dir.path().join("sync_state.json"));
    store
        .save(&SyncState {
            last_sync_date: Some("2024-03-15T00:00:00Z".to_string()),
            total_processed: 1,
            last_cursor: Some(1),
        })
        .await
        .unwrap();

    // First delivery.
    let runner = test_runner(test_config(&server.uri(), &[]));
    runner.run(&store, &destination).await.unwrap();
    assert_eq!(destination.len().await, 1);

    // Redelivery of the boundary record on the next run.
    let runner = test_runner(test_config(&server.uri(), &[]));
    let report = runner.run(&store, &destination).await.unwrap();
    assert_eq!(destination.len().await, 1);
    assert_eq!(report.last_sync_date, "2024-03-15T00:00:00Z");
}

#[tokio::test]
async fn full_page_continues_short_page_stops() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("skip", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(results_body(&[
            enforcement_record("F-0003-2024", "20240103"),
        ])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(results_body(&[
            enforcement_record("F-0001-2024", "20240101"),
            enforcement_record("F-0002-2024", "20240102"),
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let destination = MemoryDestination::new();
    let dir = TempDir::new().unwrap();
    let store = JsonStateStore::new(dir.path().join("sync_state.json"));

    let runner = test_runner(test_config(&server.uri(), &[]));
    runner.run(&store, &destination).await.unwrap();

    // A full page triggered a follow-up fetch; the short page did not.
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
    assert_eq!(destination.len().await, 3);
}

#[tokio::test]
async fn record_cap_stops_pagination() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(results_body(&[
            enforcement_record("F-0001-2024", "20240101"),
            enforcement_record("F-0002-2024", "20240102"),
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let destination = MemoryDestination::new();
    let dir = TempDir::new().unwrap();
    let store = JsonStateStore::new(dir.path().join("sync_state.json"));

    // Cap equals one page; the loop must not fetch a second page even
    // though the first came back full.
    let runner = test_runner(test_config(&server.uri(), &[("max_records", "2")]));
    let report = runner.run(&store, &destination).await.unwrap();

    assert_eq!(report.records_synced, 2);
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn empty_first_page_writes_fallback_checkpoint() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": []})))
        .expect(1)
        .mount(&server)
        .await;

    let destination = MemoryDestination::new();
    let dir = TempDir::new().unwrap();
    let store = JsonStateStore::new(dir.path().join("sync_state.json"));

    let before = cursor::now_rfc3339();
    let runner = test_runner(test_config(&server.uri(), &[]));
    let report = runner.run(&store, &destination).await.unwrap();

    assert_eq!(report.records_synced, 0);
    assert!(destination.is_empty().await);
    // No real date signal: the final checkpoint falls back to "now".
    assert!(report.last_sync_date.as_str() >= before.as_str());
    let state = store.load().await.unwrap().unwrap();
    assert_eq!(state.last_sync_date, Some(report.last_sync_date));
}

#[tokio::test]
async fn malformed_record_is_skipped_not_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                enforcement_record("F-0001-2024", "20240101"),
                "not an object",
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let destination = MemoryDestination::new();
    let dir = TempDir::new().unwrap();
    let store = JsonStateStore::new(dir.path().join("sync_state.json"));

    let runner = test_runner(test_config(&server.uri(), &[]));
    let report = runner.run(&store, &destination).await.unwrap();

    assert_eq!(report.records_synced, 1);
    assert_eq!(destination.len().await, 1);
    let state = store.load().await.unwrap().unwrap();
    assert_eq!(state.total_processed, 1);
}

#[tokio::test]
async fn exhausted_retries_abort_but_keep_prior_checkpoints() {
    let server = MockServer::start().await;
    // Second page fails every attempt.
    Mock::given(method("GET"))
        .and(query_param("skip", "2"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(results_body(&[
            enforcement_record("F-0001-2024", "20240101"),
            enforcement_record("F-0002-2024", "20240315"),
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let destination = MemoryDestination::new();
    let dir = TempDir::new().unwrap();
    let store = JsonStateStore::new(dir.path().join("sync_state.json"));

    let runner = test_runner(test_config(&server.uri(), &[]));
    let err = runner.run(&store, &destination).await.unwrap_err();
    assert!(matches!(
        err,
        openfda_sync::SyncError::RetriesExhausted { attempts: 3, .. }
    ));

    // The first page's checkpoint survived the failure, so the next run
    // resumes from it.
    let state = store.load().await.unwrap().unwrap();
    assert_eq!(state.last_sync_date.as_deref(), Some("2024-03-15T00:00:00Z"));
    assert_eq!(state.total_processed, 2);
    assert_eq!(state.last_cursor, Some(2));
    assert_eq!(destination.len().await, 2);
}

#[tokio::test]
async fn missing_api_key_fails_before_any_fetch() {
    let server = MockServer::start().await;
    // No mock expectations: a request here would panic on drop via
    // `expect(0)`.
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut map = BTreeMap::new();
    map.insert("base_url".to_string(), server.uri());
    let err = ConnectorConfig::from_map(&map).unwrap_err();
    assert!(err.to_string().contains("api_key"));
}
