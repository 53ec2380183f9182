use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use coordinate_dispatch::engine::coordinator::{CoordinatorOptions, DispatchCoordinator};
use coordinate_dispatch::engine::notifier::Notifier;
use coordinate_dispatch::engine::transport::{DispatchPayload, HttpTransport, Transport};
use coordinate_dispatch::error::DispatchError;
use coordinate_dispatch::models::request::DispatchStatus;
use coordinate_dispatch::models::settings::DispatchSettings;
use coordinate_dispatch::observability::metrics::Metrics;
use serde_json::{Value, json};

#[derive(Clone, Default)]
struct Seen {
    requests: Arc<Mutex<Vec<(HeaderMap, Value)>>>,
}

async fn accept(State(seen): State<Seen>, headers: HeaderMap, Json(body): Json<Value>) -> Json<Value> {
    seen.requests.lock().unwrap().push((headers, body));
    Json(json!({ "isSuccess": true }))
}

async fn reject(Json(_body): Json<Value>) -> Json<Value> {
    Json(json!({ "isSuccess": false, "errors": ["bad tracker"] }))
}

async fn broken() -> StatusCode {
    StatusCode::INTERNAL_SERVER_ERROR
}

async fn plain_text() -> &'static str {
    "ok"
}

async fn slow(Json(_body): Json<Value>) -> Json<Value> {
    tokio::time::sleep(Duration::from_secs(3)).await;
    Json(json!({ "isSuccess": true }))
}

async fn spawn_endpoint() -> (String, Seen) {
    let seen = Seen::default();
    let app = Router::new()
        .route("/accept", post(accept))
        .route("/reject", post(reject))
        .route("/broken", post(broken))
        .route("/plain", post(plain_text))
        .route("/slow", post(slow))
        .route("/status", get(plain_text))
        .with_state(seen.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}"), seen)
}

fn payload() -> DispatchPayload {
    DispatchPayload {
        bearer_id: None,
        tracker_id: "tracker-7".to_string(),
        latitude: 51.5,
        longitude: -0.09,
    }
}

fn transport() -> HttpTransport {
    let client = reqwest::Client::builder().no_proxy().build().unwrap();
    HttpTransport::with_client(client)
}

#[tokio::test]
async fn posts_json_with_expected_headers() {
    let (base, seen) = spawn_endpoint().await;

    let response = transport()
        .send(&format!("{base}/accept"), &payload())
        .await
        .unwrap();
    assert!(response.succeeded());

    let requests = seen.requests.lock().unwrap();
    let (headers, body) = &requests[0];
    assert_eq!(headers["content-type"], "application/json");
    assert_eq!(headers["accept"], "text/plain");
    assert_eq!(
        body,
        &json!({
            "bearerId": null,
            "trackerId": "tracker-7",
            "latitude": 51.5,
            "longitude": -0.09
        })
    );
}

#[tokio::test]
async fn application_failure_carries_errors() {
    let (base, _seen) = spawn_endpoint().await;

    let response = transport()
        .send(&format!("{base}/reject"), &payload())
        .await
        .unwrap();

    assert!(!response.succeeded());
    assert_eq!(response.error_message(), Some("bad tracker".to_string()));
}

#[tokio::test]
async fn server_error_status_is_a_transport_error() {
    let (base, _seen) = spawn_endpoint().await;

    let err = transport()
        .send(&format!("{base}/broken"), &payload())
        .await
        .unwrap_err();

    assert!(matches!(err, DispatchError::Transport(_)));
}

#[tokio::test]
async fn non_json_body_is_an_application_failure() {
    let (base, _seen) = spawn_endpoint().await;

    let response = transport()
        .send(&format!("{base}/plain"), &payload())
        .await
        .unwrap();

    assert!(!response.succeeded());
    assert_eq!(response.error_message(), Some("unreadable response".to_string()));
}

#[tokio::test]
async fn unreachable_endpoint_is_a_transport_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = transport()
        .send(&format!("http://{addr}/accept"), &payload())
        .await
        .unwrap_err();

    assert!(matches!(err, DispatchError::Transport(_)));
}

#[tokio::test]
async fn check_accepts_endpoint_answering_head() {
    let (base, seen) = spawn_endpoint().await;

    transport().check(&format!("{base}/status")).await.unwrap();
    assert!(seen.requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn check_rejects_error_status() {
    let (base, _seen) = spawn_endpoint().await;

    let err = transport()
        .check(&format!("{base}/missing"))
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::Transport(_)));
}

fn live_coordinator(options: CoordinatorOptions) -> DispatchCoordinator {
    DispatchCoordinator::new(
        Arc::new(transport()),
        Notifier::new(16),
        Metrics::new(),
        options,
    )
}

fn settings_for(endpoint_url: String) -> DispatchSettings {
    DispatchSettings {
        endpoint_url,
        tracker_id: "tracker-7".to_string(),
        bearer_id: None,
        send_bearer_id: false,
    }
}

#[tokio::test]
async fn coordinator_round_trip_against_live_endpoint() {
    let (base, seen) = spawn_endpoint().await;
    let coordinator = live_coordinator(CoordinatorOptions::default());
    coordinator.activate(settings_for(format!("{base}/accept")));

    let resolved = coordinator.dispatch(51.5, -0.09).unwrap().resolved().await;

    assert_eq!(resolved.status, DispatchStatus::Succeeded);
    assert_eq!(seen.requests.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn slow_endpoint_times_out() {
    let (base, _seen) = spawn_endpoint().await;
    let coordinator = live_coordinator(CoordinatorOptions {
        timeout: Duration::from_millis(300),
        ..CoordinatorOptions::default()
    });
    coordinator.activate(settings_for(format!("{base}/slow")));

    let resolved = coordinator.dispatch(51.5, -0.09).unwrap().resolved().await;

    assert_eq!(resolved.status, DispatchStatus::Failed);
    assert_eq!(resolved.failure, Some(DispatchError::Timeout { seconds: 1 }));
}
