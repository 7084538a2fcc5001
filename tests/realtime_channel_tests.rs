// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Realtime approval-status channel tests against an in-process
//! Socket.IO server.

use mandap_provider::models::ApprovalStatus;
use mandap_provider::services::realtime::StatusListener;
use mandap_provider::services::{
    ChannelState, GuardDecision, NotificationCenter, RealtimeChannel, ReconnectPolicy,
};
use mandap_provider::storage::{LocalStorage, TokenStore};
use mandap_provider::ProviderApp;
use serde_json::json;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod common;
use common::{
    create_test_app, create_test_app_with_policy, has_notice, provider_json, status_of,
    wait_for_channel, wait_for_notice, wait_for_session, FakeSocketServer,
};

fn joined(id: &str) -> ChannelState {
    ChannelState::Joined {
        provider_id: id.to_string(),
    }
}

async fn mount_auth(api: &MockServer, route: &str, status: &str) {
    Mock::given(method("POST"))
        .and(path(format!("/api/provider/{route}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "provider": provider_json("abc", status),
            "token": "jwt-abc"
        })))
        .mount(api)
        .await;
}

/// Log in an approved provider and wait for the room join.
async fn joined_app(api: &MockServer, server: &FakeSocketServer) -> ProviderApp {
    mount_auth(api, "login", "approved").await;
    let (app, _storage) = create_test_app(api, &server.url);
    app.auth.login("raj@x.com", "p1").await.unwrap();
    wait_for_channel(&app, |s| *s == joined("abc")).await;
    app
}

#[tokio::test]
async fn test_login_joins_provider_room() {
    let api = MockServer::start().await;
    let server = FakeSocketServer::start_requiring("jwt-abc").await;
    mount_auth(&api, "login", "approved").await;

    let (app, _storage) = create_test_app(&api, &server.url);
    app.auth.login("raj@x.com", "p1").await.unwrap();

    let connect = server.expect_frame("40").await;
    assert!(connect.contains("\"token\":\"jwt-abc\""));
    let join = server.expect_frame("42").await;
    assert_eq!(join, r#"42["joinProviderRoom","abc"]"#);

    wait_for_channel(&app, |s| *s == joined("abc")).await;
    assert!(app.session.channel().is_connected());
    assert_eq!(app.session.channel().provider_id().as_deref(), Some("abc"));
    wait_for_notice(&app, "Connected to real-time updates").await;
}

#[tokio::test]
async fn test_pending_provider_approved_by_push() {
    let api = MockServer::start().await;
    let server = FakeSocketServer::start().await;
    mount_auth(&api, "signup", "pending").await;

    let (app, _storage) = create_test_app(&api, &server.url);
    app.auth
        .register("Raj", "raj@x.com", "p1", "999")
        .await
        .unwrap();
    assert!(matches!(app.guard.check(), GuardDecision::Denied { .. }));
    wait_for_channel(&app, |s| *s == joined("abc")).await;

    server.emit("approvalStatusUpdate", json!({ "status": "approved" }));

    let state = wait_for_session(&app, |s| status_of(s) == Some(ApprovalStatus::Approved)).await;
    assert_eq!(state.provider_id(), Some("abc"));
    assert!(app.guard.check().is_allowed());
    assert_eq!(
        app.session.persisted().unwrap().approval_status,
        ApprovalStatus::Approved
    );
    wait_for_notice(&app, "Your provider account has been approved!").await;

    // Applied from the push alone, no profile refetch
    let requests = api.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
}

#[tokio::test]
async fn test_rejection_push_tears_down_session() {
    let api = MockServer::start().await;
    let server = FakeSocketServer::start().await;
    let app = joined_app(&api, &server).await;
    server.expect_frame("42").await;

    server.emit("approvalStatusUpdate", json!({ "status": "rejected" }));

    let state = wait_for_session(&app, |s| s.provider.is_none()).await;
    assert!(!state.loading);
    wait_for_channel(&app, |s| *s == ChannelState::Disconnected).await;
    server.expect_frame("41").await;
    server.wait_for_active(0).await;

    assert!(app.session.persisted().is_none());
    assert_eq!(
        app.guard.check(),
        GuardDecision::Redirect { to: "/login" }
    );
    assert!(has_notice(&app, "Admin rejected your approval request."));
}

#[tokio::test]
async fn test_status_push_reads_authorization_status_field() {
    let api = MockServer::start().await;
    let server = FakeSocketServer::start().await;
    let app = joined_app(&api, &server).await;

    server.emit(
        "approvalStatusUpdate",
        json!({ "providerId": "abc", "authorizationStatus": "pending" }),
    );

    let state = wait_for_session(&app, |s| status_of(s) == Some(ApprovalStatus::Pending)).await;
    assert!(state.is_authenticated());
    assert!(matches!(
        app.guard.check(),
        GuardDecision::Denied {
            status: ApprovalStatus::Pending,
            ..
        }
    ));
}

#[tokio::test]
async fn test_connect_is_idempotent_and_disconnect_is_safe() {
    let api = MockServer::start().await;
    let server = FakeSocketServer::start().await;
    let app = joined_app(&api, &server).await;
    let channel = app.session.channel();

    channel.connect("abc");
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(server.total_connections(), 1);
    assert_eq!(channel.state(), joined("abc"));

    channel.disconnect();
    channel.disconnect();
    assert_eq!(channel.state(), ChannelState::Disconnected);
    assert_eq!(channel.provider_id(), None);
    server.wait_for_active(0).await;

    // Session itself is untouched by a channel disconnect
    assert!(app.session.snapshot().is_authenticated());
}

#[tokio::test]
async fn test_connect_for_other_provider_replaces_subscription() {
    let api = MockServer::start().await;
    let server = FakeSocketServer::start().await;
    let app = joined_app(&api, &server).await;
    let channel = app.session.channel();

    channel.connect("xyz");

    server
        .expect_frame(r#"42["joinProviderRoom","xyz"]"#)
        .await;
    wait_for_channel(&app, |s| *s == joined("xyz")).await;
    server.wait_for_total(2).await;
    server.wait_for_active(1).await;
    assert_eq!(channel.provider_id().as_deref(), Some("xyz"));
}

#[tokio::test]
async fn test_connect_error_keeps_session() {
    let api = MockServer::start().await;
    let server = FakeSocketServer::start_requiring("some-other-token").await;
    mount_auth(&api, "login", "approved").await;

    let (app, _storage) = create_test_app(&api, &server.url);
    app.auth.login("raj@x.com", "p1").await.unwrap();

    wait_for_notice(&app, "Failed to connect to real-time updates").await;
    wait_for_channel(&app, |s| *s == ChannelState::Disconnected).await;

    let state = app.session.snapshot();
    assert_eq!(state.provider_id(), Some("abc"));
    assert!(app.guard.check().is_allowed());
}

#[tokio::test]
async fn test_failed_connection_retries_with_backoff() {
    let api = MockServer::start().await;
    let server = FakeSocketServer::start_requiring("some-other-token").await;
    mount_auth(&api, "login", "approved").await;

    let policy = ReconnectPolicy {
        initial_delay: Duration::from_millis(20),
        max_delay: Duration::from_millis(50),
        max_attempts: 2,
    };
    let (app, _storage) = create_test_app_with_policy(&api, &server.url, policy);
    app.auth.login("raj@x.com", "p1").await.unwrap();

    server.wait_for_total(3).await;
    wait_for_channel(&app, |s| *s == ChannelState::Disconnected).await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(server.total_connections(), 3);
}

#[tokio::test]
async fn test_server_disconnect_is_not_retried() {
    let api = MockServer::start().await;
    let server = FakeSocketServer::start().await;
    mount_auth(&api, "login", "approved").await;

    let (app, _storage) = create_test_app_with_policy(&api, &server.url, ReconnectPolicy::default());
    app.auth.login("raj@x.com", "p1").await.unwrap();
    wait_for_channel(&app, |s| *s == joined("abc")).await;

    server.push_frame("41");

    wait_for_channel(&app, |s| *s == ChannelState::Disconnected).await;
    wait_for_notice(&app, "Disconnected from real-time updates").await;
    tokio::time::sleep(Duration::from_millis(700)).await;
    assert_eq!(server.total_connections(), 1);
    assert!(app.session.snapshot().is_authenticated());
}

#[tokio::test]
async fn test_ping_is_answered() {
    let api = MockServer::start().await;
    let server = FakeSocketServer::start().await;
    let _app = joined_app(&api, &server).await;

    server.push_frame("2");
    assert_eq!(server.expect_frame("3").await, "3");
}

#[tokio::test]
async fn test_informational_events_raise_notices() {
    let api = MockServer::start().await;
    let server = FakeSocketServer::start().await;
    let app = joined_app(&api, &server).await;

    server.emit(
        "newProviderRegistration",
        json!({ "provider": { "name": "Asha" } }),
    );
    server.emit("loginSuccess", json!({ "providerId": "abc" }));

    wait_for_notice(&app, "Welcome, Asha! Your account is pending approval.").await;
    wait_for_notice(&app, "Logged in successfully!").await;
}

#[tokio::test]
async fn test_dropping_app_releases_subscription() {
    let api = MockServer::start().await;
    let server = FakeSocketServer::start().await;
    let app = joined_app(&api, &server).await;
    assert_eq!(server.active_connections(), 1);

    drop(app);
    server.wait_for_active(0).await;
}

#[tokio::test]
async fn test_connect_requires_provider_id() {
    let api = MockServer::start().await;
    let server = FakeSocketServer::start().await;
    let (app, _storage) = create_test_app(&api, &server.url);

    app.session.channel().connect("  ");

    assert_eq!(app.session.channel().state(), ChannelState::Disconnected);
    assert!(has_notice(
        &app,
        "Provider ID is required for socket connection"
    ));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(server.total_connections(), 0);
}

#[derive(Default)]
struct RecordingListener {
    statuses: Mutex<Vec<ApprovalStatus>>,
}

impl StatusListener for RecordingListener {
    fn on_status_update(&self, _provider_id: &str, status: ApprovalStatus) {
        self.statuses.lock().unwrap().push(status);
    }
}

#[tokio::test]
async fn test_channel_forwards_status_to_listener() {
    let server = FakeSocketServer::start().await;
    let tokens = TokenStore::new(LocalStorage::in_memory());
    tokens.save("jwt-abc").unwrap();

    let channel = RealtimeChannel::new(
        &server.url,
        tokens,
        Arc::new(NotificationCenter::new()),
        ReconnectPolicy::disabled(),
    );
    let listener = Arc::new(RecordingListener::default());
    let weak: Weak<dyn StatusListener> = Arc::downgrade(&listener) as Weak<dyn StatusListener>;
    channel.set_listener(weak);

    channel.connect("abc");
    let mut states = channel.subscribe();
    tokio::time::timeout(common::WAIT, states.wait_for(|s| s.is_joined()))
        .await
        .unwrap()
        .unwrap();

    server.emit("approvalStatusUpdate", json!({ "status": "pending" }));
    server.emit("approvalStatusUpdate", json!({ "status": "not-a-status" }));
    server.emit("approvalStatusUpdate", json!({ "status": "approved" }));

    tokio::time::timeout(common::WAIT, async {
        while listener.statuses.lock().unwrap().len() < 2 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(
        *listener.statuses.lock().unwrap(),
        vec![ApprovalStatus::Pending, ApprovalStatus::Approved]
    );

    // A dropped listener is simply skipped
    drop(listener);
    server.emit("approvalStatusUpdate", json!({ "status": "rejected" }));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(channel.is_connected());
}

#[tokio::test]
async fn test_push_after_provider_switch_leaves_session_alone() {
    let api = MockServer::start().await;
    let server = FakeSocketServer::start().await;
    let app = joined_app(&api, &server).await;
    let channel = app.session.channel();

    // Room now belongs to another provider than the session
    channel.connect("xyz");
    wait_for_channel(&app, |s| *s == joined("xyz")).await;
    server.wait_for_active(1).await;

    server.emit("approvalStatusUpdate", json!({ "status": "rejected" }));
    wait_for_notice(&app, "Admin rejected your approval request.").await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let state = app.session.snapshot();
    assert_eq!(state.provider_id(), Some("abc"));
    assert_eq!(status_of(&state), Some(ApprovalStatus::Approved));
    assert_eq!(app.session.persisted().unwrap().id, "abc");
    assert_eq!(channel.state(), joined("xyz"));
}
