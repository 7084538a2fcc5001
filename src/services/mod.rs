// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - session and auth logic.

pub mod auth;
pub mod notifier;
pub mod provider_api;
pub mod realtime;
pub mod route_guard;
pub mod session;

pub use auth::AuthGateway;
pub use notifier::{NotificationCenter, Notifier};
pub use provider_api::{AuthResponse, ProviderApi};
pub use realtime::{ChannelState, RealtimeChannel, ReconnectPolicy};
pub use route_guard::{evaluate, GuardDecision, RouteGuard, LOGIN_ROUTE};
pub use session::SessionStore;
