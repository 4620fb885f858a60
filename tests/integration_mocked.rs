/// Integration tests with a mocked object store and feed
/// Tests the serving façade and pipeline stages against HTTP without real services
use chrono::{NaiveDate, TimeZone, Utc};
use loan_approval_api::classifier::{load_classifier, ModelSource};
use loan_approval_api::models::Decision;
use loan_approval_api::pipeline;
use loan_approval_api::services::PredictionService;
use loan_approval_api::store_client::{HttpObjectStore, ObjectStore, StoreError, MAX_OBJECT_BYTES};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Helper function to create a store client pointing at the mock server
fn create_test_store(base_url: String) -> HttpObjectStore {
    HttpObjectStore::new(
        base_url,
        Some("test_token".to_string()),
        Duration::from_secs(3),
        Duration::from_secs(5),
    )
    .unwrap()
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 5, 10).unwrap()
}

fn persisted_bundle(approved: usize, rejected: usize) -> serde_json::Value {
    let mut predictions = Vec::new();
    for i in 0..approved.max(rejected) {
        if i < rejected {
            predictions.push(serde_json::json!({
                "application_id": format!("r{}", i),
                "decision": "REJECTED",
                "confidence": 0.75,
                "loan_amount": 20000.0,
                "person_income": 30000.0
            }));
        }
        if i < approved {
            predictions.push(serde_json::json!({
                "application_id": format!("a{}", i),
                "decision": "APPROVED",
                "confidence": 0.8,
                "loan_amount": 5000.0,
                "person_income": 70000.0
            }));
        }
    }

    let total = approved + rejected;
    serde_json::json!({
        "stats": {
            "total_applications": total,
            "approved": approved,
            "rejected": rejected,
            "approval_rate": (approved as f64 / total as f64 * 10000.0).round() / 100.0
        },
        "predictions": predictions,
        "timestamp": "2026-05-10T06:00:00"
    })
}

#[tokio::test]
async fn test_latest_is_capped_and_cached() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/predictions/20260510/predictions_20260510.json"))
        .and(header("authorization", "Bearer test_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(persisted_bundle(30, 25)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = Arc::new(create_test_store(mock_server.uri()));
    let service = PredictionService::new(store, Duration::from_secs(300));

    let first = service.get_latest_as_of(today()).await;
    let second = service.get_latest_as_of(today()).await;

    assert_eq!(first, second);
    assert_eq!(first.predictions.len(), 40);
    assert!(first.predictions[..20]
        .iter()
        .all(|p| p.decision == Decision::Approved));
    assert!(first.predictions[20..]
        .iter()
        .all(|p| p.decision == Decision::Rejected));
    assert_eq!(first.predictions[0].application_id, "a0");
    assert_eq!(first.predictions[20].application_id, "r0");
    assert_eq!(first.predictions[0].loan_amnt, 5000.0);
    assert_eq!(first.stats.total_applications, 55);
    assert_eq!(first.stats.approved_count, 30);
    assert_eq!(first.source_partition.as_deref(), Some("20260510"));
}

#[tokio::test]
async fn test_yesterday_used_when_today_missing() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/predictions/20260510/predictions_20260510.json"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/predictions/20260509/predictions_20260509.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(persisted_bundle(1, 1)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let service = PredictionService::new(
        Arc::new(create_test_store(mock_server.uri())),
        Duration::from_secs(300),
    );

    let bundle = service.get_latest_as_of(today()).await;
    assert_eq!(bundle.source_partition.as_deref(), Some("20260509"));
    assert_eq!(bundle.predictions.len(), 2);
}

#[tokio::test]
async fn test_no_lookback_beyond_two_days() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/predictions/20260508/predictions_20260508.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(persisted_bundle(3, 3)))
        .expect(0)
        .mount(&mock_server)
        .await;

    let service = PredictionService::new(
        Arc::new(create_test_store(mock_server.uri())),
        Duration::from_secs(300),
    );

    let bundle = service.get_latest_as_of(today()).await;
    assert!(bundle.predictions.is_empty());
    assert_eq!(bundle.stats.total_applications, 0);
    assert_eq!(bundle.stats.approval_rate, 0.0);
    assert!(!service.cache_valid().await);
}

#[tokio::test]
async fn test_server_errors_and_oversized_bodies_count_as_missing() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/predictions/20260510/predictions_20260510.json"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/predictions/20260509/predictions_20260509.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(MAX_OBJECT_BYTES + 1)))
        .mount(&mock_server)
        .await;

    let store = create_test_store(mock_server.uri());
    let err = store
        .get("predictions/20260509/predictions_20260509.json")
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::BodyTooLarge { .. }));

    let service = PredictionService::new(Arc::new(store), Duration::from_secs(300));
    let bundle = service.get_latest_as_of(today()).await;
    assert!(bundle.predictions.is_empty());
}

#[tokio::test]
async fn test_not_found_maps_to_not_found_error() {
    let mock_server = MockServer::start().await;
    let store = create_test_store(mock_server.uri());

    let err = store.get("models/missing.json").await.unwrap_err();
    assert_eq!(err, StoreError::NotFound("models/missing.json".to_string()));
}

#[tokio::test]
async fn test_classifier_loaded_from_store() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/models/loan_approval_model.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "intercept": 1.0,
            "numeric": {"loan_percent_income": -8.0},
            "categorical": {"previous_loan_defaults_on_file": {"Yes": -4.0}}
        })))
        .mount(&mock_server)
        .await;

    let store = create_test_store(mock_server.uri());
    let classifier = load_classifier(
        &ModelSource::Store("models/loan_approval_model.json".to_string()),
        &store,
    )
    .await;
    assert!(classifier.is_some());

    let missing = load_classifier(&ModelSource::Store("models/other.json".to_string()), &store).await;
    assert!(missing.is_none());
}

#[tokio::test]
async fn test_corrupt_model_artifact_yields_rule_mode() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/models/loan_approval_model.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string("\u{0}\u{1}pickle"))
        .mount(&mock_server)
        .await;

    let store = create_test_store(mock_server.uri());
    let classifier = load_classifier(
        &ModelSource::Store("models/loan_approval_model.json".to_string()),
        &store,
    )
    .await;
    assert!(classifier.is_none());

    let local = load_classifier(
        &ModelSource::LocalFile("/nonexistent/model.json".to_string()),
        &store,
    )
    .await;
    assert!(local.is_none());
}

#[tokio::test]
async fn test_extract_stores_feed_under_raw_key() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/feed"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!([{"application_id": "f1", "loan_amnt": 1000}])),
        )
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/raw/20260510/data_20260510_073000.json"))
        .and(header("content-type", "application/json"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = create_test_store(mock_server.uri());
    let now = Utc.with_ymd_and_hms(2026, 5, 10, 7, 30, 0).unwrap();
    let key = pipeline::extract(
        &reqwest::Client::new(),
        &format!("{}/feed", mock_server.uri()),
        &store,
        now,
    )
    .await
    .unwrap();

    assert_eq!(key, "raw/20260510/data_20260510_073000.json");
}

#[tokio::test]
async fn test_extract_fails_on_feed_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/feed"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let store = create_test_store(mock_server.uri());
    let result = pipeline::extract(
        &reqwest::Client::new(),
        &format!("{}/feed", mock_server.uri()),
        &store,
        Utc::now(),
    )
    .await;

    assert!(matches!(result, Err(pipeline::PipelineError::Feed(_))));
}
