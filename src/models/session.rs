// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-memory session state for the current provider.

use super::{ApprovalStatus, Provider};

/// Snapshot of the provider session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    /// Current provider, if any
    pub provider: Option<Provider>,
    /// True until startup hydration has finished
    pub loading: bool,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            provider: None,
            loading: true,
        }
    }
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        self.provider.is_some()
    }

    pub fn provider_id(&self) -> Option<&str> {
        self.provider.as_ref().map(|p| p.id.as_str())
    }

    /// Approval status of the current provider.
    ///
    /// A signed-out session reports `pending`, matching what the dashboard
    /// shows before anyone logs in.
    pub fn approval_status(&self) -> ApprovalStatus {
        self.provider
            .as_ref()
            .map(|p| p.approval_status)
            .unwrap_or_default()
    }
}
