// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Protected-route decisions over a session snapshot.

use crate::models::{ApprovalStatus, SessionState};
use crate::services::notifier::Notifier;
use crate::services::session::SessionStore;
use std::sync::Arc;

/// Entry point unauthenticated or unapproved providers are sent to.
pub const LOGIN_ROUTE: &str = "/login";

/// What a protected route should do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Hydration still running: show a loading indicator
    Loading,
    /// No session
    Redirect { to: &'static str },
    /// Signed in, but the account is not approved
    Denied {
        status: ApprovalStatus,
        message: &'static str,
        redirect: &'static str,
    },
    Allow,
}

impl GuardDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, GuardDecision::Allow)
    }

    /// Route to navigate to instead, if any.
    pub fn redirect_target(&self) -> Option<&'static str> {
        match self {
            GuardDecision::Redirect { to } => Some(to),
            GuardDecision::Denied { redirect, .. } => Some(redirect),
            GuardDecision::Loading | GuardDecision::Allow => None,
        }
    }
}

/// Decide whether a protected route may render.
pub fn evaluate(state: &SessionState) -> GuardDecision {
    if state.loading {
        return GuardDecision::Loading;
    }
    let Some(provider) = state.provider.as_ref() else {
        return GuardDecision::Redirect { to: LOGIN_ROUTE };
    };
    if provider.approval_status != ApprovalStatus::Approved {
        return GuardDecision::Denied {
            status: provider.approval_status,
            message: provider.approval_status.denial_message(),
            redirect: LOGIN_ROUTE,
        };
    }
    GuardDecision::Allow
}

/// [`evaluate`] against the live store, showing the denial notice.
#[derive(Clone)]
pub struct RouteGuard {
    store: Arc<SessionStore>,
    notifier: Arc<dyn Notifier>,
}

impl RouteGuard {
    pub fn new(store: Arc<SessionStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    pub fn check(&self) -> GuardDecision {
        let decision = evaluate(&self.store.snapshot());
        if let GuardDecision::Denied { message, status, .. } = &decision {
            tracing::debug!(status = %status, "Protected route denied");
            self.notifier.error(message);
        }
        decision
    }
}
