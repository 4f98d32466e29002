//! Contract tests for HttpRegistryClient against a mocked schema registry.
//!
//! ## Endpoints Tested
//!
//! | Method | Path | Test |
//! |--------|------|------|
//! | GET | `/subjects` | `list_subjects_*` |
//! | POST | `/compatibility/subjects/{subject}/versions/latest` | `compatibility_*` |
//!
//! The client is blocking, so each call runs on a blocking thread while the
//! mock server runs on the test runtime.

use schema_compat_gate::registry::{DEFAULT_CACHE_CAPACITY, SCHEMA_REGISTRY_CONTENT_TYPE};
use schema_compat_gate::{HttpRegistryClient, RegistryClient, RemoteError};
use wiremock::matchers::{body_json, header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SCHEMA: &str = r#"{"type":"record","name":"Foo","namespace":"com.example","fields":[]}"#;

/// Build a client for `urls` and run `call` with it off the async runtime
async fn with_client<T, F>(urls: Vec<String>, user_info: Option<&str>, call: F) -> T
where
    T: Send + 'static,
    F: FnOnce(&HttpRegistryClient) -> T + Send + 'static,
{
    let user_info = user_info.map(str::to_string);
    tokio::task::spawn_blocking(move || {
        let client =
            HttpRegistryClient::new(&urls, user_info.as_deref(), DEFAULT_CACHE_CAPACITY).unwrap();
        call(&client)
    })
    .await
    .unwrap()
}

// ── GET /subjects ────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn list_subjects_returns_all_subjects() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/subjects"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            "orders-com.example.Foo-value",
            "orders-com.example.Bar-value"
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let subjects = with_client(vec![server.uri()], None, |client| client.list_all_subjects())
        .await
        .unwrap();

    assert_eq!(
        subjects,
        vec!["orders-com.example.Foo-value", "orders-com.example.Bar-value"]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn list_subjects_sends_basic_auth() {
    let server = MockServer::start().await;
    // "svc:secret" base64-encoded
    Mock::given(method("GET"))
        .and(path("/subjects"))
        .and(header("authorization", "Basic c3ZjOnNlY3JldA=="))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let subjects = with_client(vec![server.uri()], Some("svc:secret"), |client| {
        client.list_all_subjects()
    })
    .await
    .unwrap();

    assert!(subjects.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn list_subjects_fails_over_to_next_url() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/subjects"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!(["a-com.example.A-value"])))
        .mount(&server)
        .await;

    // nothing listens on port 9 (discard) in the test environment
    let urls = vec!["http://127.0.0.1:9".to_string(), server.uri()];
    let subjects = with_client(urls, None, |client| client.list_all_subjects())
        .await
        .unwrap();

    assert_eq!(subjects, vec!["a-com.example.A-value"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn list_subjects_surfaces_registry_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/subjects"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "error_code": 40101,
            "message": "Unauthorized"
        })))
        .mount(&server)
        .await;

    let err = with_client(vec![server.uri()], None, |client| client.list_all_subjects())
        .await
        .unwrap_err();

    match err {
        RemoteError::Status {
            status,
            error_code,
            message,
        } => {
            assert_eq!(status, 401);
            assert_eq!(error_code, Some(40101));
            assert_eq!(message, "Unauthorized");
        }
        other => panic!("Expected Status, got {:?}", other),
    }
}

// ── POST /compatibility/subjects/{subject}/versions/latest ───────────

#[tokio::test(flavor = "multi_thread")]
async fn compatibility_posts_schema_and_reads_verdict() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/compatibility/subjects/orders-com.example.Foo-value/versions/latest"))
        .and(header("content-type", SCHEMA_REGISTRY_CONTENT_TYPE))
        .and(body_json(serde_json::json!({ "schema": SCHEMA })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "is_compatible": false
        })))
        .expect(1)
        .mount(&server)
        .await;

    let compatible = with_client(vec![server.uri()], None, |client| {
        client.test_compatibility("orders-com.example.Foo-value", SCHEMA)
    })
    .await
    .unwrap();

    assert!(!compatible);
}

#[tokio::test(flavor = "multi_thread")]
async fn compatibility_answers_are_cached() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/compatibility/subjects/orders-com.example.Foo-value/versions/latest"))
        .and(header_exists("accept"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "is_compatible": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let answers = with_client(vec![server.uri()], None, |client| {
        (0..3)
            .map(|_| client.test_compatibility("orders-com.example.Foo-value", SCHEMA))
            .collect::<Result<Vec<_>, _>>()
    })
    .await
    .unwrap();

    assert_eq!(answers, vec![true, true, true]);
}

#[tokio::test(flavor = "multi_thread")]
async fn compatibility_unknown_subject_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/compatibility/subjects/missing-com.example.Foo-value/versions/latest"))
        .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
            "error_code": 40401,
            "message": "Subject 'missing-com.example.Foo-value' not found."
        })))
        .mount(&server)
        .await;

    let err = with_client(vec![server.uri()], None, |client| {
        client.test_compatibility("missing-com.example.Foo-value", SCHEMA)
    })
    .await
    .unwrap_err();

    assert!(matches!(
        err,
        RemoteError::Status {
            status: 404,
            error_code: Some(40401),
            ..
        }
    ));
}
