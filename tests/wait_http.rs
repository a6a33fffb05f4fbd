//! Integration tests against a thin mock of the Lava API
//!
//! A single axum server plays both the keystone identity endpoint and the
//! Cloud Big Data API, so these tests exercise the real client end to
//! end: authentication, catalog endpoint discovery, cluster fetches, the
//! wait loop's terminal handling, and reauthentication on 401.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use lavaclient::{Lava, LavaError};

#[derive(Clone)]
struct MockState {
    port: u16,
    auth_count: Arc<AtomicUsize>,
    fetch_count: Arc<AtomicUsize>,
    statuses: Arc<Mutex<VecDeque<String>>>,
    valid_token: Arc<Mutex<String>>,
}

impl MockState {
    fn new(statuses: &[&str]) -> Self {
        Self {
            port: 0,
            auth_count: Arc::new(AtomicUsize::new(0)),
            fetch_count: Arc::new(AtomicUsize::new(0)),
            statuses: Arc::new(Mutex::new(
                statuses.iter().map(|s| s.to_string()).collect(),
            )),
            valid_token: Arc::new(Mutex::new(String::new())),
        }
    }

    /// Next scripted status; the last one repeats.
    fn next_status(&self) -> String {
        let mut statuses = self.statuses.lock().unwrap();
        if statuses.len() > 1 {
            statuses.pop_front().unwrap()
        } else {
            statuses.front().cloned().unwrap_or_else(|| "ACTIVE".to_string())
        }
    }
}

async fn tokens_handler(State(state): State<MockState>) -> Json<Value> {
    let n = state.auth_count.fetch_add(1, Ordering::SeqCst) + 1;
    let token = format!("token-{}", n);
    *state.valid_token.lock().unwrap() = token.clone();

    Json(json!({
        "access": {
            "token": {"id": token, "expires": "2099-01-01T00:00:00Z"},
            "serviceCatalog": [
                {
                    "type": "rax:bigdata",
                    "name": "cloudBigData",
                    "endpoints": [
                        {"region": "DFW", "versionId": "2",
                         "publicURL": format!("http://127.0.0.1:{}/v2/123456", state.port)}
                    ]
                }
            ]
        }
    }))
}

fn authorized(state: &MockState, headers: &HeaderMap) -> bool {
    let token = headers
        .get("x-auth-token")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    token == *state.valid_token.lock().unwrap()
}

fn cluster_detail(id: &str, status: &str) -> Value {
    json!({
        "id": id,
        "name": "test-cluster",
        "status": status,
        "stack_id": "HDP2_2",
        "created": "2015-01-01T12:00:00Z",
        "updated": null,
        "cbd_version": 2,
        "username": "hadoop",
        "progress": 0.5,
        "node_groups": [],
        "scripts": []
    })
}

async fn list_clusters_handler(
    State(state): State<MockState>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    if !authorized(&state, &headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({})));
    }

    (
        StatusCode::OK,
        Json(json!({
            "clusters": [{
                "id": "abc123",
                "name": "test-cluster",
                "status": "ACTIVE",
                "stack_id": "HDP2_2",
                "created": "2015-01-01T12:00:00Z",
                "updated": null,
                "cbd_version": 2
            }]
        })),
    )
}

async fn get_cluster_handler(
    State(state): State<MockState>,
    Path((_tenant, cluster_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    if !authorized(&state, &headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({})));
    }

    state.fetch_count.fetch_add(1, Ordering::SeqCst);
    let status = state.next_status();

    (
        StatusCode::OK,
        Json(json!({"cluster": cluster_detail(&cluster_id, &status)})),
    )
}

/// Start the mock server and return its state with the port filled in.
async fn start_server(statuses: &[&str]) -> MockState {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind mock server");
    let port = listener.local_addr().unwrap().port();

    let mut state = MockState::new(statuses);
    state.port = port;

    let app = Router::new()
        .route("/v2.0/tokens", post(tokens_handler))
        .route("/v2/{tenant}/clusters", get(list_clusters_handler))
        .route("/v2/{tenant}/clusters/{cluster_id}", get(get_cluster_handler))
        .with_state(state.clone());

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    state
}

async fn build_client(state: &MockState) -> Lava {
    Lava::builder()
        .username("alice")
        .api_key("secret")
        .region("DFW")
        .auth_url(format!("http://127.0.0.1:{}/", state.port))
        .build()
        .await
        .expect("Failed to build client")
}

#[tokio::test]
async fn test_authenticates_and_lists_clusters() {
    let state = start_server(&["ACTIVE"]).await;
    let client = build_client(&state).await;

    let clusters = client.clusters().list().await.unwrap();
    assert_eq!(clusters.len(), 1);
    assert_eq!(clusters[0].id, "abc123");
    assert_eq!(state.auth_count.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_wait_returns_active_cluster() {
    let state = start_server(&["ACTIVE"]).await;
    let client = build_client(&state).await;

    let cluster = client.clusters().wait("abc123", None, None).await.unwrap();
    assert_eq!(cluster.status, "ACTIVE");
    assert_eq!(state.fetch_count.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_wait_raises_failed_on_error_status() {
    let state = start_server(&["ERROR"]).await;
    let client = build_client(&state).await;

    let result = client.clusters().wait("abc123", None, None).await;
    match result {
        Err(LavaError::Failed { status }) => assert_eq!(status, "ERROR"),
        other => panic!("expected Failed, got {:?}", other.map(|c| c.status)),
    }
    assert_eq!(state.fetch_count.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_wait_zero_timeout_raises_timeout() {
    let state = start_server(&["BUILDING"]).await;
    let client = build_client(&state).await;

    let result = client
        .clusters()
        .wait("abc123", Some(Duration::ZERO), None)
        .await;
    assert!(matches!(result, Err(LavaError::Timeout(_))));
    assert_eq!(state.fetch_count.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_reauthenticates_once_on_401() {
    let state = start_server(&["ACTIVE"]).await;
    let client = build_client(&state).await;
    assert_eq!(state.auth_count.load(Ordering::SeqCst), 1);

    // Invalidate the token the client is holding; the next request gets a
    // 401, reauthenticates, and succeeds with the fresh token.
    *state.valid_token.lock().unwrap() = "rotated".to_string();

    let cluster = client.clusters().get("abc123").await.unwrap();
    assert_eq!(cluster.id, "abc123");
    assert_eq!(state.auth_count.load(Ordering::SeqCst), 2);
}
