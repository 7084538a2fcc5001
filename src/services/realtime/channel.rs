// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Subscription lifecycle for the approval-status channel.
//!
//! At most one subscription exists at a time. Each subscription runs in its
//! own task and is released through its cancellation token on every exit
//! path: `disconnect()`, connecting for another provider, rejection, or
//! dropping the last channel handle.

use super::packet::{self, EnginePacket, SocketPacket, SocketPacketKind, DEFAULT_NAMESPACE};
use super::ReconnectPolicy;
use crate::error::AppError;
use crate::models::ApprovalStatus;
use crate::services::notifier::Notifier;
use crate::storage::TokenStore;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::{header::AUTHORIZATION, HeaderValue};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

/// Outbound: join the room for a provider id.
pub const JOIN_EVENT: &str = "joinProviderRoom";
/// Inbound: admin changed the approval status.
pub const STATUS_EVENT: &str = "approvalStatusUpdate";
/// Inbound: a provider account was created.
pub const REGISTRATION_EVENT: &str = "newProviderRegistration";
/// Inbound: the server saw a login for this provider.
pub const LOGIN_EVENT: &str = "loginSuccess";

/// Connection state of the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelState {
    Disconnected,
    Connecting { provider_id: String },
    Joined { provider_id: String },
}

impl ChannelState {
    pub fn provider_id(&self) -> Option<&str> {
        match self {
            ChannelState::Disconnected => None,
            ChannelState::Connecting { provider_id } | ChannelState::Joined { provider_id } => {
                Some(provider_id)
            }
        }
    }

    pub fn is_joined(&self) -> bool {
        matches!(self, ChannelState::Joined { .. })
    }
}

/// Receiver of approval-status pushes.
pub trait StatusListener: Send + Sync {
    /// `provider_id` is the provider whose room carried the update.
    fn on_status_update(&self, provider_id: &str, status: ApprovalStatus);
}

/// Handle to the realtime channel. Clones share one subscription.
#[derive(Clone)]
pub struct RealtimeChannel {
    inner: Arc<ChannelInner>,
}

struct ChannelInner {
    socket_url: String,
    tokens: TokenStore,
    notifier: Arc<dyn Notifier>,
    policy: ReconnectPolicy,
    state: watch::Sender<ChannelState>,
    subscription: Mutex<Option<Subscription>>,
    next_generation: AtomicU64,
    listener: Mutex<Option<Weak<dyn StatusListener>>>,
}

struct Subscription {
    provider_id: String,
    generation: u64,
    cancel: CancellationToken,
}

impl Drop for ChannelInner {
    fn drop(&mut self) {
        let subscription = match self.subscription.get_mut() {
            Ok(slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(subscription) = subscription {
            subscription.cancel.cancel();
        }
    }
}

impl RealtimeChannel {
    pub fn new(
        socket_url: &str,
        tokens: TokenStore,
        notifier: Arc<dyn Notifier>,
        policy: ReconnectPolicy,
    ) -> Self {
        let (state, _) = watch::channel(ChannelState::Disconnected);
        Self {
            inner: Arc::new(ChannelInner {
                socket_url: socket_url.to_string(),
                tokens,
                notifier,
                policy,
                state,
                subscription: Mutex::new(None),
                next_generation: AtomicU64::new(0),
                listener: Mutex::new(None),
            }),
        }
    }

    /// Route status pushes to `listener`. The channel does not keep it alive.
    pub fn set_listener(&self, listener: Weak<dyn StatusListener>) {
        *lock(&self.inner.listener) = Some(listener);
    }

    pub fn state(&self) -> ChannelState {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ChannelState> {
        self.inner.state.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.inner.state.borrow().is_joined()
    }

    /// Provider id of the live subscription, if any.
    pub fn provider_id(&self) -> Option<String> {
        lock(&self.inner.subscription)
            .as_ref()
            .map(|s| s.provider_id.clone())
    }

    /// Subscribe to status pushes for `provider_id`.
    ///
    /// A no-op when already subscribed for the same id. Any subscription for
    /// a different id is torn down first. Must be called within a Tokio
    /// runtime.
    pub fn connect(&self, provider_id: &str) {
        if provider_id.trim().is_empty() {
            tracing::warn!("Realtime connect requested without a provider id");
            self.inner
                .notifier
                .error("Provider ID is required for socket connection");
            return;
        }

        let mut slot = lock(&self.inner.subscription);
        if slot.as_ref().is_some_and(|s| s.provider_id == provider_id) {
            tracing::debug!(provider_id, "Realtime subscription already active");
            return;
        }
        if let Some(previous) = slot.take() {
            tracing::info!(
                provider_id = %previous.provider_id,
                "Tearing down realtime subscription for previous provider"
            );
            previous.cancel.cancel();
        }

        let token = match self.inner.tokens.token() {
            Ok(Some(token)) => token,
            Ok(None) => {
                tracing::debug!(provider_id, "No provider token, skipping realtime connect");
                self.inner.state.send_replace(ChannelState::Disconnected);
                return;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read provider token");
                self.inner.state.send_replace(ChannelState::Disconnected);
                return;
            }
        };

        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed) + 1;
        let cancel = CancellationToken::new();
        *slot = Some(Subscription {
            provider_id: provider_id.to_string(),
            generation,
            cancel: cancel.clone(),
        });
        self.inner.state.send_replace(ChannelState::Connecting {
            provider_id: provider_id.to_string(),
        });
        drop(slot);

        let task = SubscriptionTask {
            inner: Arc::downgrade(&self.inner),
            socket_url: self.inner.socket_url.clone(),
            notifier: self.inner.notifier.clone(),
            policy: self.inner.policy,
            provider_id: provider_id.to_string(),
            token,
            generation,
        };
        tracing::info!(provider_id, generation, "Starting realtime subscription");
        tokio::spawn(task.run(cancel));
    }

    /// Release the current subscription. Safe to call when disconnected.
    pub fn disconnect(&self) {
        let previous = lock(&self.inner.subscription).take();
        if let Some(previous) = previous {
            previous.cancel.cancel();
            tracing::info!(provider_id = %previous.provider_id, "Provider socket disconnected");
        }
        self.inner.state.send_if_modified(|state| {
            if *state == ChannelState::Disconnected {
                false
            } else {
                *state = ChannelState::Disconnected;
                true
            }
        });
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Build the Socket.IO WebSocket endpoint from the server base URL.
pub fn socket_endpoint(socket_url: &str) -> Result<String, AppError> {
    let mut url = reqwest::Url::parse(socket_url)
        .map_err(|e| AppError::Realtime(format!("Invalid socket URL: {}", e)))?;
    let scheme = match url.scheme() {
        "https" | "wss" => "wss",
        _ => "ws",
    };
    url.set_scheme(scheme)
        .map_err(|_| AppError::Realtime(format!("Unsupported socket URL: {}", socket_url)))?;
    url.set_path("/socket.io/");
    url.set_query(Some("EIO=4&transport=websocket"));
    Ok(url.to_string())
}

/// How one connection attempt ended.
enum SessionEnd {
    /// Local teardown; never retried
    Cancelled,
    /// Server sent a Socket.IO disconnect; never retried
    ServerDisconnect,
    /// Transport or handshake failure
    Failed { error: AppError, joined: bool },
}

struct SubscriptionTask {
    inner: Weak<ChannelInner>,
    socket_url: String,
    notifier: Arc<dyn Notifier>,
    policy: ReconnectPolicy,
    provider_id: String,
    token: String,
    generation: u64,
}

impl SubscriptionTask {
    async fn run(self, cancel: CancellationToken) {
        let mut attempt = 0u32;

        loop {
            match self.run_once(&cancel).await {
                SessionEnd::Cancelled => break,
                SessionEnd::ServerDisconnect => {
                    tracing::info!(provider_id = %self.provider_id, "Server closed realtime session");
                    self.notifier.error("Disconnected from real-time updates");
                    break;
                }
                SessionEnd::Failed { error, joined } => {
                    tracing::warn!(
                        provider_id = %self.provider_id,
                        error = %error,
                        joined,
                        "Realtime connection failed"
                    );
                    if joined {
                        attempt = 0;
                        self.notifier.error("Disconnected from real-time updates");
                    } else {
                        self.notifier.error(&error.user_message());
                    }

                    let Some(delay) = self.policy.delay_for(attempt) else {
                        tracing::info!(provider_id = %self.provider_id, attempt, "Not reconnecting");
                        break;
                    };
                    attempt += 1;
                    if !self.set_state(ChannelState::Connecting {
                        provider_id: self.provider_id.clone(),
                    }) {
                        break;
                    }
                    tracing::debug!(delay_ms = delay.as_millis() as u64, attempt, "Reconnecting");
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }

        self.finish();
    }

    async fn run_once(&self, cancel: &CancellationToken) -> SessionEnd {
        let request = match self.request() {
            Ok(request) => request,
            Err(error) => return SessionEnd::Failed { error, joined: false },
        };

        let connected = tokio::select! {
            _ = cancel.cancelled() => return SessionEnd::Cancelled,
            result = tokio_tungstenite::connect_async(request) => result,
        };
        let (stream, _response) = match connected {
            Ok(connected) => connected,
            Err(e) => {
                return SessionEnd::Failed {
                    error: AppError::Realtime(e.to_string()),
                    joined: false,
                }
            }
        };
        let (mut sink, mut stream) = stream.split();
        let mut joined = false;

        loop {
            let frame = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    let goodbye = packet::encode(&EnginePacket::Message(SocketPacket::disconnect()));
                    let _ = sink.send(Message::Text(goodbye)).await;
                    let _ = sink.close().await;
                    return SessionEnd::Cancelled;
                }
                frame = stream.next() => frame,
            };

            let text = match frame {
                Some(Ok(Message::Text(text))) => text,
                Some(Ok(Message::Close(_))) | None => {
                    return SessionEnd::Failed {
                        error: AppError::Realtime("connection closed".to_string()),
                        joined,
                    }
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    return SessionEnd::Failed {
                        error: AppError::Realtime(e.to_string()),
                        joined,
                    }
                }
            };

            let decoded = match packet::decode(&text) {
                Ok(decoded) => decoded,
                Err(e) => {
                    tracing::warn!(error = %e, frame = %text, "Ignoring undecodable frame");
                    continue;
                }
            };

            let reply = match decoded {
                EnginePacket::Open(info) => {
                    tracing::debug!(sid = %info.sid, "Engine.IO handshake");
                    Some(SocketPacket::connect(json!({ "token": self.token })))
                }
                EnginePacket::Ping(data) => {
                    let pong = packet::encode(&EnginePacket::Pong(data));
                    if let Err(e) = sink.send(Message::Text(pong)).await {
                        return SessionEnd::Failed {
                            error: AppError::Realtime(e.to_string()),
                            joined,
                        };
                    }
                    None
                }
                EnginePacket::Close => {
                    return SessionEnd::Failed {
                        error: AppError::Realtime("transport closed".to_string()),
                        joined,
                    }
                }
                EnginePacket::Message(socket) if socket.namespace == DEFAULT_NAMESPACE => {
                    match socket.kind {
                        SocketPacketKind::Connect => {
                            joined = true;
                            Some(SocketPacket::event(
                                JOIN_EVENT,
                                [Value::String(self.provider_id.clone())],
                            ))
                        }
                        SocketPacketKind::ConnectError => {
                            let message = socket
                                .error_message()
                                .unwrap_or_else(|| "connection refused".to_string());
                            return SessionEnd::Failed {
                                error: AppError::Realtime(message),
                                joined,
                            };
                        }
                        SocketPacketKind::Disconnect => return SessionEnd::ServerDisconnect,
                        SocketPacketKind::Event if joined => {
                            self.dispatch(&socket);
                            None
                        }
                        SocketPacketKind::Event | SocketPacketKind::Ack => None,
                    }
                }
                _ => None,
            };

            if let Some(reply) = reply {
                let is_join = reply.kind == SocketPacketKind::Event;
                let frame = packet::encode(&EnginePacket::Message(reply));
                if let Err(e) = sink.send(Message::Text(frame)).await {
                    return SessionEnd::Failed {
                        error: AppError::Realtime(e.to_string()),
                        joined,
                    };
                }
                if is_join {
                    if !self.set_state(ChannelState::Joined {
                        provider_id: self.provider_id.clone(),
                    }) {
                        return SessionEnd::Cancelled;
                    }
                    tracing::info!(provider_id = %self.provider_id, "Joined provider room");
                    self.notifier.success("Connected to real-time updates");
                }
            }
        }
    }

    fn request(&self) -> Result<Request, AppError> {
        let endpoint = socket_endpoint(&self.socket_url)?;
        let mut request = endpoint
            .as_str()
            .into_client_request()
            .map_err(|e| AppError::Realtime(e.to_string()))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.token))
            .map_err(|e| AppError::Realtime(format!("Invalid token header: {}", e)))?;
        request.headers_mut().insert(AUTHORIZATION, bearer);
        Ok(request)
    }

    fn dispatch(&self, socket: &SocketPacket) {
        let Some((name, args)) = socket.as_event() else {
            return;
        };
        if !self.owns_subscription() {
            tracing::debug!(
                provider_id = %self.provider_id,
                event = name,
                "Dropping event from a replaced subscription"
            );
            return;
        }
        let payload = args.first();

        match name {
            STATUS_EVENT => {
                let status = payload
                    .and_then(|p| p.get("status").or_else(|| p.get("authorizationStatus")))
                    .and_then(Value::as_str)
                    .and_then(|s| s.parse::<ApprovalStatus>().ok());
                let Some(status) = status else {
                    tracing::warn!(payload = ?payload, "Ignoring status update without a valid status");
                    return;
                };

                tracing::info!(provider_id = %self.provider_id, status = %status, "Approval status update");
                match status {
                    ApprovalStatus::Approved => self
                        .notifier
                        .success("Your provider account has been approved!"),
                    _ => self.notifier.error(status.denial_message()),
                }
                if let Some(listener) = self.listener() {
                    listener.on_status_update(&self.provider_id, status);
                }
            }
            REGISTRATION_EVENT => {
                let name = payload
                    .and_then(|p| p.pointer("/provider/name"))
                    .and_then(Value::as_str)
                    .unwrap_or("provider");
                self.notifier.success(&format!(
                    "Welcome, {}! Your account is pending approval.",
                    name
                ));
            }
            LOGIN_EVENT => self.notifier.success("Logged in successfully!"),
            other => tracing::debug!(event = other, "Ignoring realtime event"),
        }
    }

    fn listener(&self) -> Option<Arc<dyn StatusListener>> {
        let inner = self.inner.upgrade()?;
        let listener = lock(&inner.listener).clone()?;
        listener.upgrade()
    }

    fn owns_subscription(&self) -> bool {
        self.inner.upgrade().is_some_and(|inner| {
            lock(&inner.subscription).as_ref().map(|s| s.generation) == Some(self.generation)
        })
    }

    /// Publish `state` if this task still owns the subscription.
    fn set_state(&self, state: ChannelState) -> bool {
        let Some(inner) = self.inner.upgrade() else {
            return false;
        };
        let slot = lock(&inner.subscription);
        if slot.as_ref().map(|s| s.generation) != Some(self.generation) {
            return false;
        }
        inner.state.send_replace(state);
        true
    }

    /// Release the slot when the task ends on its own.
    fn finish(&self) {
        let Some(inner) = self.inner.upgrade() else {
            return;
        };
        let mut slot = lock(&inner.subscription);
        if slot.as_ref().map(|s| s.generation) == Some(self.generation) {
            *slot = None;
            inner.state.send_replace(ChannelState::Disconnected);
            tracing::debug!(provider_id = %self.provider_id, "Realtime subscription ended");
        }
    }
}
