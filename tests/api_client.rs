// REST client against a one-shot HTTP stub on loopback.

mod common;

use edgecheck::{
    api::ApiClient,
    error::ApiError,
    types::{CheckOutcome, CheckType, HistoryQuery, RunChecksRequest},
};
use serde_json::{Value, json};
use std::time::Duration;
use tokio::{net::TcpListener, sync::oneshot};
use url::Url;

/// Serves exactly one request with `status` and a JSON `body`, and hands back
/// what the client sent.
async fn stub(status: &'static str, body: Value) -> (ApiClient, oneshot::Receiver<common::Request>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let origin = Url::parse(&format!("http://{}", listener.local_addr().unwrap())).unwrap();
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let request = common::read_request(&mut socket).await;
        common::respond(&mut socket, status, &body).await;
        let _ = tx.send(request);
    });

    let api = ApiClient::new(&origin, Duration::from_secs(5)).unwrap();
    (api, rx)
}

#[tokio::test]
async fn run_checks_posts_selection() {
    let (api, captured) = stub(
        "200 OK",
        json!({"message": "checks started", "checks": ["ups", "nas"], "camera_count": 2}),
    )
    .await;

    let request = RunChecksRequest::new(vec![CheckType::Ups, CheckType::Nas], 2, true);
    let response = api.run_checks(&request).await.unwrap();
    assert_eq!(response.message, "checks started");
    assert_eq!(response.checks, vec!["ups", "nas"]);

    let captured = captured.await.unwrap();
    assert_eq!(captured.request_line, "POST /api/checks/run HTTP/1.1");
    let sent: Value = serde_json::from_str(&captured.body).unwrap();
    assert_eq!(sent["checks"], json!(["ups", "nas"]));
    assert_eq!(sent["camera_count"], 2);
    assert_eq!(sent["auto_mode"], true);
}

#[tokio::test]
async fn history_query_omits_unset_filters() {
    let (api, captured) = stub(
        "200 OK",
        json!({
            "total": 41,
            "page": 2,
            "page_size": 20,
            "items": [{
                "id": 7,
                "timestamp": "2024-05-01T08:30:00",
                "check_type": "camera",
                "status": "FAIL",
                "error_message": "camera 3 unreachable",
                "duration_seconds": 12
            }]
        }),
    )
    .await;

    let page = api.history(&HistoryQuery::new(2, 20)).await.unwrap();
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].id, 7);
    assert!(page.has_next());

    let captured = captured.await.unwrap();
    assert_eq!(captured.request_line, "GET /api/history?page=2&page_size=20 HTTP/1.1");
}

#[tokio::test]
async fn history_query_carries_filters() {
    let (api, captured) = stub(
        "200 OK",
        json!({"total": 0, "page": 1, "page_size": 10, "items": []}),
    )
    .await;

    let query = HistoryQuery {
        check_type: Some(CheckType::Camera),
        status: Some(CheckOutcome::Fail),
        ..HistoryQuery::new(1, 10)
    };
    let page = api.history(&query).await.unwrap();
    assert!(!page.has_next());

    let captured = captured.await.unwrap();
    assert_eq!(
        captured.request_line,
        "GET /api/history?page=1&page_size=10&check_type=camera&status=FAIL HTTP/1.1"
    );
}

#[tokio::test]
async fn error_detail_is_surfaced() {
    let (api, _captured) = stub(
        "400 Bad Request",
        json!({"detail": "a check run is already in progress"}),
    )
    .await;

    let error = api.run_checks(&RunChecksRequest::default()).await.unwrap_err();
    match error {
        ApiError::Status { status, detail } => {
            assert_eq!(status, 400);
            assert_eq!(detail, "a check run is already in progress");
        }
        other => panic!("expected status error, got {:?}", other),
    }
}

#[tokio::test]
async fn missing_entry_falls_back_to_generic_detail() {
    let (api, captured) = stub("404 Not Found", json!({"error": "nope"})).await;

    let error = api.history_detail(99).await.unwrap_err();
    assert!(matches!(error, ApiError::Status { status: 404, .. }));
    assert_eq!(
        captured.await.unwrap().request_line,
        "GET /api/history/99 HTTP/1.1"
    );
}
