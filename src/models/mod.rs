// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the application.

pub mod credentials;
pub mod notification;
pub mod provider;
pub mod session;

pub use credentials::{LoginRequest, LogoUpload, ProfileUpdate, RegisterRequest};
pub use notification::{Notification, NotificationLevel};
pub use provider::{Address, ApprovalStatus, ProfileError, Provider, RawProvider};
pub use session::SessionState;
