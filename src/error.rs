// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent user-facing messages.

use crate::models::ApprovalStatus;

/// Application error type shared by the API client, gateway and channel.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Provider account not approved: {0}")]
    NotApproved(ApprovalStatus),

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Realtime channel error: {0}")]
    Realtime(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Notice shown for transport-level failures; never a server string.
    pub const NETWORK_NOTICE: &'static str = "Network error. Please try again.";

    /// Fallback when a server error body carries no message.
    pub const GENERIC_API_MESSAGE: &'static str = "An error occurred";

    /// Server message that the dashboard never shows as a notice.
    const SUPPRESSED_MARKER: &'static str = "already logged in";

    /// Message to present to the provider for this error.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Network(_) => Self::NETWORK_NOTICE.to_string(),
            AppError::Api { message, .. } => message.clone(),
            AppError::NotApproved(status) => status.denial_message().to_string(),
            AppError::Malformed(_) => "Unexpected response from server.".to_string(),
            AppError::BadRequest(msg) => msg.clone(),
            AppError::Storage(_) | AppError::Internal(_) => {
                "Something went wrong. Please try again.".to_string()
            }
            AppError::Realtime(_) => "Failed to connect to real-time updates".to_string(),
        }
    }

    /// Whether this error should produce a user-visible notice.
    pub fn should_notify(&self) -> bool {
        match self {
            AppError::Api { message, .. } => !message.contains(Self::SUPPRESSED_MARKER),
            _ => true,
        }
    }

    /// True when the server refused the bearer token.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, AppError::Api { status: 401, .. })
    }

    /// True for unreachable-server and timeout failures.
    pub fn is_network(&self) -> bool {
        matches!(self, AppError::Network(_))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            AppError::Malformed(err.to_string())
        } else {
            AppError::Network(err.to_string())
        }
    }
}

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, AppError>;
