// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use mandap_provider::config::Config;
use mandap_provider::models::{ApprovalStatus, SessionState};
use mandap_provider::services::{ChannelState, ReconnectPolicy};
use mandap_provider::storage::{keys, LocalStorage, TokenStore};
use mandap_provider::ProviderApp;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, Mutex};
use wiremock::MockServer;

/// Nothing listens here; realtime connects fail fast.
#[allow(dead_code)]
pub const UNUSED_SOCKET_URL: &str = "http://127.0.0.1:9";

/// How long tests wait for asynchronous effects.
#[allow(dead_code)]
pub const WAIT: Duration = Duration::from_secs(5);

/// Profile JSON as the API serves it.
#[allow(dead_code)]
pub fn provider_json(id: &str, status: &str) -> Value {
    json!({
        "_id": id,
        "name": "Raj",
        "email": "raj@x.com",
        "phoneNumber": "999",
        "authorizationStatus": status
    })
}

/// Create a test app against a mock API and socket URL, with in-memory storage.
#[allow(dead_code)]
pub fn create_test_app(api: &MockServer, socket_url: &str) -> (ProviderApp, LocalStorage) {
    create_test_app_with_policy(api, socket_url, ReconnectPolicy::disabled())
}

#[allow(dead_code)]
pub fn create_test_app_with_policy(
    api: &MockServer,
    socket_url: &str,
    reconnect: ReconnectPolicy,
) -> (ProviderApp, LocalStorage) {
    create_test_app_at(&format!("{}/api/provider", api.uri()), socket_url, reconnect)
}

/// Create a test app against an arbitrary API base URL.
#[allow(dead_code)]
pub fn create_test_app_at(
    api_url: &str,
    socket_url: &str,
    reconnect: ReconnectPolicy,
) -> (ProviderApp, LocalStorage) {
    let config = Config {
        api_url: api_url.to_string(),
        socket_url: socket_url.to_string(),
        reconnect,
        ..Config::test_default()
    };
    let storage = LocalStorage::in_memory();
    let app = ProviderApp::with_storage(config, storage.clone()).expect("Failed to build app");
    (app, storage)
}

/// Seed storage with a persisted profile and a bearer token.
#[allow(dead_code)]
pub fn seed_session(storage: &LocalStorage, id: &str, status: &str, token: &str) {
    storage
        .set(keys::PROVIDER, &provider_json(id, status).to_string())
        .unwrap();
    TokenStore::new(storage.clone()).save(token).unwrap();
}

#[allow(dead_code)]
pub fn has_notice(app: &ProviderApp, message: &str) -> bool {
    app.notifications
        .list()
        .iter()
        .any(|n| n.message == message)
}

/// Wait until a notice with `message` has been shown.
#[allow(dead_code)]
pub async fn wait_for_notice(app: &ProviderApp, message: &str) {
    tokio::time::timeout(WAIT, async {
        while !has_notice(app, message) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("Timed out waiting for notice {message:?}"));
}

/// Wait until the session satisfies `predicate`.
#[allow(dead_code)]
pub async fn wait_for_session(
    app: &ProviderApp,
    predicate: impl FnMut(&SessionState) -> bool,
) -> SessionState {
    let mut rx = app.session.subscribe();
    let state = tokio::time::timeout(WAIT, rx.wait_for(predicate))
        .await
        .expect("Timed out waiting for session state")
        .expect("Session store dropped")
        .clone();
    state
}

/// Wait until the realtime channel satisfies `predicate`.
#[allow(dead_code)]
pub async fn wait_for_channel(
    app: &ProviderApp,
    predicate: impl FnMut(&ChannelState) -> bool,
) -> ChannelState {
    let mut rx = app.session.channel().subscribe();
    let state = tokio::time::timeout(WAIT, rx.wait_for(predicate))
        .await
        .expect("Timed out waiting for channel state")
        .expect("Channel dropped")
        .clone();
    state
}

#[allow(dead_code)]
pub fn status_of(state: &SessionState) -> Option<ApprovalStatus> {
    state.provider.as_ref().map(|p| p.approval_status)
}

// ─── Fake Socket.IO server ───────────────────────────────────────────────────

struct ServerState {
    /// Token the CONNECT packet must carry; `None` accepts anything
    required_token: Option<String>,
    received: mpsc::UnboundedSender<String>,
    push: broadcast::Sender<String>,
    active: AtomicUsize,
    total: AtomicUsize,
}

/// Minimal Socket.IO server speaking the text protocol over WebSocket.
pub struct FakeSocketServer {
    pub url: String,
    state: Arc<ServerState>,
    received: Mutex<mpsc::UnboundedReceiver<String>>,
}

#[allow(dead_code)]
impl FakeSocketServer {
    pub async fn start() -> Self {
        Self::start_with(None).await
    }

    /// Start a server that refuses CONNECT packets without `token`.
    pub async fn start_requiring(token: &str) -> Self {
        Self::start_with(Some(token.to_string())).await
    }

    async fn start_with(required_token: Option<String>) -> Self {
        let (received_tx, received_rx) = mpsc::unbounded_channel();
        let (push, _) = broadcast::channel(64);
        let state = Arc::new(ServerState {
            required_token,
            received: received_tx,
            push,
            active: AtomicUsize::new(0),
            total: AtomicUsize::new(0),
        });

        let router = Router::new()
            .route("/socket.io/", get(socket_handler))
            .with_state(state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind fake socket server");
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self {
            url: format!("http://{}", addr),
            state,
            received: Mutex::new(received_rx),
        }
    }

    /// Send a raw frame to every connected client.
    pub fn push_frame(&self, frame: &str) {
        let _ = self.state.push.send(frame.to_string());
    }

    /// Emit a Socket.IO event to every connected client.
    pub fn emit(&self, event: &str, payload: Value) {
        self.push_frame(&format!("42{}", json!([event, payload])));
    }

    /// Wait for the next client frame starting with `prefix`.
    pub async fn expect_frame(&self, prefix: &str) -> String {
        let mut received = self.received.lock().await;
        tokio::time::timeout(WAIT, async {
            loop {
                let frame = received.recv().await.expect("Server stopped");
                if frame.starts_with(prefix) {
                    return frame;
                }
            }
        })
        .await
        .unwrap_or_else(|_| panic!("Timed out waiting for frame starting with {prefix:?}"))
    }

    pub fn active_connections(&self) -> usize {
        self.state.active.load(Ordering::SeqCst)
    }

    pub fn total_connections(&self) -> usize {
        self.state.total.load(Ordering::SeqCst)
    }

    /// Wait until the number of open connections equals `count`.
    pub async fn wait_for_active(&self, count: usize) {
        tokio::time::timeout(WAIT, async {
            while self.active_connections() != count {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap_or_else(|_| {
            panic!(
                "Expected {count} active connections, found {}",
                self.active_connections()
            )
        });
    }

    /// Wait until `count` connections have been accepted in total.
    pub async fn wait_for_total(&self, count: usize) {
        tokio::time::timeout(WAIT, async {
            while self.total_connections() < count {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap_or_else(|_| {
            panic!(
                "Expected {count} connections, found {}",
                self.total_connections()
            )
        });
    }
}

async fn socket_handler(ws: WebSocketUpgrade, State(state): State<Arc<ServerState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: Arc<ServerState>) {
    state.active.fetch_add(1, Ordering::SeqCst);
    state.total.fetch_add(1, Ordering::SeqCst);
    let mut pushes = state.push.subscribe();

    let open = r#"0{"sid":"engine-sid","upgrades":[],"pingInterval":25000,"pingTimeout":20000}"#;
    if socket.send(Message::Text(open.into())).await.is_ok() {
        loop {
            tokio::select! {
                message = socket.recv() => match message {
                    Some(Ok(Message::Text(text))) => {
                        let text = text.as_str().to_string();
                        if let Some(auth) = text.strip_prefix("40") {
                            let accepted = match &state.required_token {
                                Some(token) => auth.contains(token.as_str()),
                                None => true,
                            };
                            let reply = if accepted {
                                r#"40{"sid":"socket-sid"}"#
                            } else {
                                r#"44{"message":"Authentication error"}"#
                            };
                            let _ = socket.send(Message::Text(reply.into())).await;
                        }
                        let _ = state.received.send(text);
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                },
                push = pushes.recv() => match push {
                    Ok(frame) => {
                        if socket.send(Message::Text(frame.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }
    }

    state.active.fetch_sub(1, Ordering::SeqCst);
}
