//! In-process fake gateway for console integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde_json::{Value, json};
use tokio::sync::broadcast;

use vessa_core::config::AppConfig;
use vessa_sync::Console;

pub const PASSWORD: &str = "correct-horse";
pub const TOKEN: &str = "tok-live";
pub const API_KEY_SECRET: &str = "vsk_live_0001";

/// Mutable state behind the fake gateway.
#[derive(Debug)]
pub struct FakeState {
    pub notifications: Vec<Value>,
    pub incidents: Vec<Value>,
    /// The bulk read-all endpoint answers 404.
    pub bulk_missing: bool,
    /// Every bearer request answers 401.
    pub token_revoked: bool,
    pub mark_calls: Vec<String>,
    pub bulk_calls: usize,
    pub list_calls: usize,
    /// Authenticated push channel connections.
    pub push_connections: usize,
    push: broadcast::Sender<Value>,
}

impl Default for FakeState {
    fn default() -> Self {
        let (push, _) = broadcast::channel(16);
        Self {
            notifications: Vec::new(),
            incidents: Vec::new(),
            bulk_missing: false,
            token_revoked: false,
            mark_calls: Vec::new(),
            bulk_calls: 0,
            list_calls: 0,
            push_connections: 0,
            push,
        }
    }
}

#[derive(Clone)]
pub struct FakeGateway {
    pub base_url: String,
    state: Arc<Mutex<FakeState>>,
}

impl FakeGateway {
    pub async fn start() -> Self {
        let state = Arc::new(Mutex::new(FakeState::default()));
        let router = Router::new()
            .route("/api/v1/auth/token", post(login))
            .route("/api/v1/notifications/", get(list_notifications))
            .route("/api/v1/notifications/read-all", post(read_all))
            .route("/api/v1/notifications/ws", get(push_channel))
            .route("/api/v1/notifications/{id}/read", post(mark_read))
            .route("/api/v1/incidents/", get(list_incidents))
            .route("/api/v1/incidents/{id}/review", post(review_incident))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, router).await.expect("test server");
        });

        Self {
            base_url: format!("http://{addr}"),
            state,
        }
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Push `notification` to every open push channel.
    pub fn push(&self, notification: Value) {
        let frame = json!({ "type": "notification", "data": notification });
        let _ = self.state().push.send(frame);
    }

    pub fn console(&self) -> Console {
        let mut config = AppConfig::from_base_url(&self.base_url);
        config.gateway.request_timeout_seconds = 2;
        config.polling.retry_backoff_ms = 10;
        Console::new(config).expect("console")
    }
}

pub fn notification(id: &str, read: bool) -> Value {
    json!({
        "id": id,
        "title": format!("SQL injection blocked ({id})"),
        "message": "Request blocked by WAF rule 942100",
        "priority": "high",
        "created_at": "2024-05-01T10:00:00",
        "read_at": read.then_some("2024-05-01T11:00:00"),
        "findings": [{"message": "UNION SELECT in query", "type": "sqli", "severity": "high"}],
        "affected_assets": ["api.example.com"],
        "detection_source": "waf"
    })
}

pub fn incident(id: &str, status: &str) -> Value {
    json!({
        "id": id,
        "title": format!("Credential stuffing ({id})"),
        "severity": "critical",
        "status": status,
        "created_at": "2024-05-01T09:00:00Z"
    })
}

fn detail(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "detail": message }))).into_response()
}

fn authorized(headers: &HeaderMap, state: &FakeState) -> bool {
    let expected = format!("Bearer {TOKEN}");
    !state.token_revoked
        && headers.get("authorization").and_then(|v| v.to_str().ok()) == Some(expected.as_str())
}

async fn login(Form(form): Form<HashMap<String, String>>) -> Response {
    if form.get("password").map(String::as_str) == Some(PASSWORD) {
        Json(json!({ "access_token": TOKEN, "token_type": "bearer" })).into_response()
    } else {
        detail(StatusCode::UNAUTHORIZED, "Incorrect username or password")
    }
}

async fn list_notifications(
    State(state): State<Arc<Mutex<FakeState>>>,
    headers: HeaderMap,
) -> Response {
    let mut state = state.lock().unwrap_or_else(|e| e.into_inner());
    if !authorized(&headers, &state) {
        return detail(StatusCode::UNAUTHORIZED, "Could not validate credentials");
    }
    state.list_calls += 1;
    let unread = state
        .notifications
        .iter()
        .filter(|n| n["read_at"].is_null())
        .count();
    Json(json!({
        "items": state.notifications,
        "unread_count": unread,
        "total": state.notifications.len()
    }))
    .into_response()
}

async fn mark_read(
    State(state): State<Arc<Mutex<FakeState>>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    let mut state = state.lock().unwrap_or_else(|e| e.into_inner());
    if !authorized(&headers, &state) {
        return detail(StatusCode::UNAUTHORIZED, "Could not validate credentials");
    }
    state.mark_calls.push(id.clone());
    match state.notifications.iter_mut().find(|n| n["id"] == id.as_str()) {
        Some(record) => {
            record["read_at"] = json!("2024-05-02T08:00:00Z");
            Json(record.clone()).into_response()
        }
        None => detail(StatusCode::NOT_FOUND, "Notification not found"),
    }
}

async fn read_all(State(state): State<Arc<Mutex<FakeState>>>, headers: HeaderMap) -> Response {
    let mut state = state.lock().unwrap_or_else(|e| e.into_inner());
    if state.bulk_missing {
        return detail(StatusCode::NOT_FOUND, "Not Found");
    }
    if !authorized(&headers, &state) {
        return detail(StatusCode::UNAUTHORIZED, "Could not validate credentials");
    }
    state.bulk_calls += 1;
    let mut updated = 0;
    for record in state.notifications.iter_mut() {
        if record["read_at"].is_null() {
            record["read_at"] = json!("2024-05-02T08:00:00Z");
            updated += 1;
        }
    }
    Json(json!({ "updated_count": updated })).into_response()
}

async fn push_channel(
    State(state): State<Arc<Mutex<FakeState>>>,
    ws: WebSocketUpgrade,
) -> Response {
    let updates = state.lock().unwrap_or_else(|e| e.into_inner()).push.subscribe();
    ws.on_upgrade(move |socket| push_session(socket, updates, state))
}

async fn push_session(
    mut socket: WebSocket,
    mut updates: broadcast::Receiver<Value>,
    state: Arc<Mutex<FakeState>>,
) {
    let Some(Ok(Message::Text(text))) = socket.recv().await else {
        return;
    };
    let auth: Value = serde_json::from_str(text.as_str()).unwrap_or(Value::Null);
    let accepted = {
        let mut state = state.lock().unwrap_or_else(|e| e.into_inner());
        let accepted = auth["type"] == "auth" && auth["token"] == TOKEN && !state.token_revoked;
        if accepted {
            state.push_connections += 1;
        }
        accepted
    };
    if !accepted {
        let error = json!({ "type": "error", "message": "Invalid authentication token" });
        let _ = socket.send(Message::Text(error.to_string().into())).await;
        let _ = socket
            .send(Message::Close(Some(CloseFrame {
                code: 4001,
                reason: "Authentication failed".into(),
            })))
            .await;
        return;
    }

    let success = json!({ "type": "auth_success", "message": "Authenticated successfully" });
    if socket.send(Message::Text(success.to_string().into())).await.is_err() {
        return;
    }
    while let Ok(frame) = updates.recv().await {
        if socket.send(Message::Text(frame.to_string().into())).await.is_err() {
            break;
        }
    }
}

async fn list_incidents(
    State(state): State<Arc<Mutex<FakeState>>>,
    headers: HeaderMap,
) -> Response {
    let state = state.lock().unwrap_or_else(|e| e.into_inner());
    if !authorized(&headers, &state) {
        return detail(StatusCode::UNAUTHORIZED, "Could not validate credentials");
    }
    if headers.get("x-api-key").and_then(|v| v.to_str().ok()) != Some(API_KEY_SECRET) {
        return detail(StatusCode::FORBIDDEN, "Invalid API key");
    }
    Json(json!({
        "items": state.incidents,
        "total": state.incidents.len(),
        "page": 1,
        "page_size": 20
    }))
    .into_response()
}

async fn review_incident(
    State(state): State<Arc<Mutex<FakeState>>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    let mut state = state.lock().unwrap_or_else(|e| e.into_inner());
    if !authorized(&headers, &state)
        || headers.get("x-api-key").and_then(|v| v.to_str().ok()) != Some(API_KEY_SECRET)
    {
        return detail(StatusCode::FORBIDDEN, "Invalid API key");
    }
    match state.incidents.iter_mut().find(|i| i["id"] == id.as_str()) {
        Some(record) => {
            if record["status"] == "open" {
                record["status"] = json!("investigating");
            }
            record["updated_at"] = json!("2024-05-02T08:00:00Z");
            Json(record.clone()).into_response()
        }
        None => detail(StatusCode::NOT_FOUND, "Incident not found"),
    }
}
