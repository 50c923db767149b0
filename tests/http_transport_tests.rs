use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use logstore::config::Config;
use logstore::logstore::{fetch_historical, Criteria, HistoryOptions, LogStoreClient, Target, TimeWindow};
use logstore::transport::{AccessToken, Exchange, ExchangeRequest, HttpTransport, TransportError};
use serde_json::json;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct MockLogStore {
    /// Requests answered with 503 before the real response
    failures_before_success: usize,
    calls: AtomicUsize,
    seen_auth: Mutex<Vec<Option<String>>>,
    seen_queries: Mutex<Vec<HashMap<String, String>>>,
}

async fn get_record_list(
    State(store): State<Arc<MockLogStore>>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let call = store.calls.fetch_add(1, Ordering::SeqCst);
    store.seen_auth.lock().unwrap().push(
        headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    );
    store.seen_queries.lock().unwrap().push(query);

    if call < store.failures_before_success {
        return (StatusCode::SERVICE_UNAVAILABLE, "try later").into_response();
    }

    Json(json!({
        "totalSize": 1,
        "pageEntries": [{
            "id": "http-1",
            "recordType": "TRACE_LOG",
            "logger": "App.Service",
            "logLevel": "INFO",
            "message": "over the wire",
            "time": "2021-06-01T12:00:00Z"
        }]
    }))
    .into_response()
}

async fn start_mock(store: Arc<MockLogStore>) -> SocketAddr {
    let app = Router::new()
        .route("/uu-logstore-g01/Log/getRecordList/exec", get(get_record_list))
        .with_state(store);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

#[tokio::test]
async fn test_http_transport_sends_bearer_token() {
    let store = Arc::new(MockLogStore::default());
    let addr = start_mock(store.clone()).await;

    let transport = HttpTransport::new(
        Duration::from_secs(5),
        Some(AccessToken::new("abc123")),
    )
    .unwrap();
    let response = transport
        .exchange(ExchangeRequest::get(format!(
            "http://{}/uu-logstore-g01/Log/getRecordList/exec?uuUri=ues:T:A",
            addr
        )))
        .await
        .unwrap();

    assert!(response.body.contains("http-1"));
    assert_eq!(
        store.seen_auth.lock().unwrap()[0].as_deref(),
        Some("Bearer abc123")
    );
}

#[tokio::test]
async fn test_http_transport_maps_error_status() {
    let store = Arc::new(MockLogStore {
        failures_before_success: 1,
        ..MockLogStore::default()
    });
    let addr = start_mock(store).await;

    let transport = HttpTransport::new(Duration::from_secs(5), None).unwrap();
    let result = transport
        .exchange(ExchangeRequest::get(format!(
            "http://{}/uu-logstore-g01/Log/getRecordList/exec",
            addr
        )))
        .await;

    match result {
        Err(TransportError::Status { status, message }) => {
            assert_eq!(status, 503);
            assert_eq!(message, "try later");
        }
        other => panic!("expected status error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_client_from_config_retries_over_http() {
    let store = Arc::new(MockLogStore {
        failures_before_success: 2,
        ..MockLogStore::default()
    });
    let addr = start_mock(store.clone()).await;

    std::env::set_var("LOGSTORE_HTTP_TEST_TOKEN", "from-env");
    let mut config = Config::for_uri(format!("http://{}/uu-logstore-g01", addr));
    config.transport.token_env = Some("LOGSTORE_HTTP_TEST_TOKEN".to_string());
    config.transport.retry.initial_backoff = Duration::ZERO;
    config.transport.retry.max_attempts = 3;

    let client = LogStoreClient::from_config(&config).unwrap();
    let mut records = Vec::new();

    let stats = fetch_historical(
        &client,
        &Target::parse("ues:T:A:app"),
        TimeWindow::new(None, None),
        &Criteria::new().with("logLevel", "INFO"),
        &HistoryOptions::default(),
        &CancellationToken::new(),
        |page| records.extend(page),
    )
    .await
    .unwrap();

    assert_eq!(stats.pages, 1);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].message, "over the wire");
    assert_eq!(store.calls.load(Ordering::SeqCst), 3);

    let auth = store.seen_auth.lock().unwrap();
    assert!(auth.iter().all(|a| a.as_deref() == Some("Bearer from-env")));

    let queries = store.seen_queries.lock().unwrap();
    assert_eq!(queries[0]["uuUri"], "ues:T:A:app");
    assert_eq!(queries[0]["logLevel"], "INFO");
    assert!(!queries[0].contains_key("from"));
}
