// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Client-side persistence (local files).

pub mod local;
pub mod token;

pub use local::LocalStorage;
pub use token::TokenStore;

/// Storage keys as constants.
pub mod keys {
    /// Serialized provider profile of the last known session
    pub const PROVIDER: &str = "mandap_user.json";
    /// Serialized bearer token cookie
    pub const TOKEN_COOKIE: &str = "provider_token.cookie";
}
