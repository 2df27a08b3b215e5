use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use rig_sdk::client::{RigClient, RigClientOptions, RigError};
use rig_sdk::session::{JsonFileStore, KeyValueStore, KeyValueTokenStore, AUTH_TOKEN_KEY};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex};

const TEST_USER: &str = "alice";
const TEST_PASSWORD: &str = "secret1";
const TEST_TOKEN: &str = "tok123";
const UPSTREAM_DOWN_PAGE: &str = "<html><body>upstream down, retry later</body></html>";

#[derive(Clone, Default)]
struct RigState {
    observed: Arc<Mutex<Vec<Observed>>>,
}

#[derive(Clone, Debug)]
struct Observed {
    path: String,
    authorization: Option<String>,
    content_type: Option<String>,
    body: Option<Value>,
}

impl RigState {
    async fn record(&self, path: String, headers: &HeaderMap, body: Option<Value>) {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
        };
        self.observed.lock().await.push(Observed {
            path,
            authorization: header("authorization"),
            content_type: header("content-type"),
            body,
        });
    }

    fn authorized(headers: &HeaderMap) -> bool {
        headers
            .get("authorization")
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value == format!("Bearer {TEST_TOKEN}"))
    }
}

fn mock_rig(state: RigState) -> Router {
    Router::new()
        .route("/accounts/auth/local", post(login_handler))
        .route("/streams/", get(stream_list_handler))
        .route("/streams/:stream_id/destination", post(destination_handler))
        .route("/streams/:stream_id/changeKey", post(change_key_handler))
        .route("/broken", get(broken_handler))
        .with_state(state)
}

async fn login_handler(
    State(state): State<RigState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    state
        .record("/accounts/auth/local".to_string(), &headers, Some(body.clone()))
        .await;
    let matches = body.get("username").and_then(Value::as_str) == Some(TEST_USER)
        && body.get("password").and_then(Value::as_str) == Some(TEST_PASSWORD);
    if !matches {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"message": "bad creds"})),
        );
    }
    (
        StatusCode::OK,
        Json(json!({"payload": {"token": TEST_TOKEN, "username": TEST_USER}})),
    )
}

async fn stream_list_handler(
    State(state): State<RigState>,
    headers: HeaderMap,
) -> impl IntoResponse {
    state.record("/streams/".to_string(), &headers, None).await;
    if !RigState::authorized(&headers) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "unauthorized"})),
        );
    }
    (
        StatusCode::OK,
        Json(json!({"payload": [{"id": "s1", "destinations": []}]})),
    )
}

async fn destination_handler(
    State(state): State<RigState>,
    Path(stream_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    state
        .record(
            format!("/streams/{stream_id}/destination"),
            &headers,
            Some(body.clone()),
        )
        .await;
    (
        StatusCode::OK,
        Json(json!({"payload": {"id": stream_id, "destinations": [body]}})),
    )
}

async fn change_key_handler(
    State(state): State<RigState>,
    Path(stream_id): Path<String>,
    headers: HeaderMap,
) -> impl IntoResponse {
    state
        .record(format!("/streams/{stream_id}/changeKey"), &headers, None)
        .await;
    (StatusCode::OK, Json(json!({"status": "rotated"})))
}

async fn broken_handler() -> impl IntoResponse {
    (StatusCode::BAD_GATEWAY, UPSTREAM_DOWN_PAGE)
}

async fn spawn_server(
    app: Router,
) -> (SocketAddr, oneshot::Sender<()>, tokio::task::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock server listener");
    let addr = listener
        .local_addr()
        .expect("read mock server listener address");
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let task = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await
            .expect("mock server should run");
    });
    (addr, shutdown_tx, task)
}

fn client_for(addr: SocketAddr) -> RigClient {
    RigClient::with_options(RigClientOptions::default().with_base_url(format!("http://{addr}/")))
        .expect("build rig client")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn rig_client_smoke_login_then_manage_streams() {
    let state = RigState::default();
    let (addr, shutdown_tx, server_task) = spawn_server(mock_rig(state.clone())).await;
    let client = client_for(addr);

    let unauthenticated = client.stream_list().await.expect_err("logged out");
    assert!(matches!(unauthenticated, RigError::AuthenticationRequired));
    assert!(state.observed.lock().await.is_empty());

    let session = client
        .login(TEST_USER, TEST_PASSWORD)
        .await
        .expect("login against mock rig");
    assert_eq!(session, json!({"token": TEST_TOKEN, "username": TEST_USER}));

    let streams = client.stream_list().await.expect("stream list");
    assert_eq!(streams, json!([{"id": "s1", "destinations": []}]));

    let updated = client
        .stream_add_destination("s1", "YouTube", "key-xyz")
        .await
        .expect("add destination");
    assert_eq!(
        updated,
        json!({"id": "s1", "destinations": [{"service": "YouTube", "streamKey": "key-xyz"}]})
    );

    let rotated = client.stream_change_key("s1").await.expect("change key");
    assert_eq!(rotated, Value::Null);

    let observed = state.observed.lock().await.clone();
    let paths: Vec<&str> = observed.iter().map(|entry| entry.path.as_str()).collect();
    assert_eq!(
        paths,
        vec![
            "/accounts/auth/local",
            "/streams/",
            "/streams/s1/destination",
            "/streams/s1/changeKey",
        ]
    );
    assert_eq!(observed[0].authorization, None);
    for entry in &observed[1..] {
        assert_eq!(
            entry.authorization.as_deref(),
            Some("Bearer tok123"),
            "{} must carry the bearer token",
            entry.path
        );
    }
    for entry in &observed {
        assert_eq!(entry.content_type.as_deref(), Some("application/json"));
    }
    assert_eq!(
        observed[2].body,
        Some(json!({"service": "YouTube", "streamKey": "key-xyz"}))
    );

    let _ = shutdown_tx.send(());
    server_task.await.expect("mock rig server task should join");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn rig_client_smoke_error_bodies_pass_through() {
    let state = RigState::default();
    let (addr, shutdown_tx, server_task) = spawn_server(mock_rig(state)).await;
    let client = client_for(addr);

    let error = client
        .login(TEST_USER, "wrong")
        .await
        .expect_err("bad password should fail");
    assert_eq!(error.remote_body(), Some(&json!({"message": "bad creds"})));
    assert!(!client.is_authenticated().expect("auth state"));

    let error = client
        .request("/broken", rig_sdk::HttpMethod::Get, None, false)
        .await
        .expect_err("non-json error page should fail");
    match error {
        RigError::Remote { status, body } => {
            assert_eq!(status, StatusCode::BAD_GATEWAY);
            assert_eq!(body, Value::String(UPSTREAM_DOWN_PAGE.to_string()));
        }
        other => panic!("unexpected error variant: {other:?}"),
    }

    let _ = shutdown_tx.send(());
    server_task.await.expect("mock rig server task should join");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn rig_client_smoke_unreachable_server_reports_message() {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind throwaway listener");
    let addr = listener.local_addr().expect("listener address");
    drop(listener);

    let options = RigClientOptions::default()
        .with_base_url(format!("http://{addr}"))
        .with_timeout(Duration::from_millis(500));
    let client = RigClient::with_options(options).expect("build rig client");
    let error = client
        .register("bob", "pw", "bob@example.com")
        .await
        .expect_err("nothing is listening");
    assert!(matches!(error, RigError::Transport(_)), "got {error:?}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn rig_client_smoke_persisted_session_survives_new_client() {
    let state = RigState::default();
    let (addr, shutdown_tx, server_task) = spawn_server(mock_rig(state)).await;
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("rig-session.json");
    let options = RigClientOptions::default().with_base_url(format!("http://{addr}"));

    let first = RigClient::with_token_store(
        options.clone(),
        KeyValueTokenStore::new(JsonFileStore::new(&path)),
    )
    .expect("build first client");
    first
        .login(TEST_USER, TEST_PASSWORD)
        .await
        .expect("login persists session");

    let second = RigClient::with_token_store(
        options,
        KeyValueTokenStore::new(JsonFileStore::new(&path)),
    )
    .expect("build second client");
    assert_eq!(
        second.current_user().expect("user").as_deref(),
        Some(TEST_USER)
    );
    second
        .stream_list()
        .await
        .expect("persisted token authorizes second client");
    assert_eq!(
        second
            .token_store()
            .inner()
            .get(AUTH_TOKEN_KEY)
            .expect("read persisted token")
            .as_deref(),
        Some(TEST_TOKEN)
    );

    let _ = shutdown_tx.send(());
    server_task.await.expect("mock rig server task should join");
}
