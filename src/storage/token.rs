// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Bearer token cookie (`providerToken`).
//!
//! The token is kept as a serialized cookie so its expiry travels with it:
//! 7 days, `Secure`, `SameSite=None`. An expired cookie is discarded on read.

use cookie::{Cookie, SameSite};
use time::OffsetDateTime;

use super::{keys, LocalStorage};
use crate::error::AppError;

/// Cookie name carrying the provider bearer token.
pub const TOKEN_COOKIE: &str = "providerToken";

/// Lifetime of a stored token.
const TOKEN_TTL_DAYS: i64 = 7;

/// Persistent holder for the provider bearer token.
#[derive(Clone)]
pub struct TokenStore {
    storage: LocalStorage,
}

impl TokenStore {
    pub fn new(storage: LocalStorage) -> Self {
        Self { storage }
    }

    /// Current token, if one is stored and not expired.
    pub fn token(&self) -> Result<Option<String>, AppError> {
        let Some(raw) = self.storage.get(keys::TOKEN_COOKIE)? else {
            return Ok(None);
        };

        let cookie = match Cookie::parse(raw.trim().to_string()) {
            Ok(cookie) => cookie,
            Err(e) => {
                tracing::warn!(error = %e, "Discarding unreadable token cookie");
                self.clear()?;
                return Ok(None);
            }
        };

        if let Some(expires) = cookie.expires_datetime() {
            if expires <= OffsetDateTime::now_utc() {
                tracing::info!("Stored provider token expired");
                self.clear()?;
                return Ok(None);
            }
        }

        Ok(Some(cookie.value().to_string()).filter(|t| !t.is_empty()))
    }

    /// Store a new token with a fresh 7-day expiry.
    pub fn save(&self, token: &str) -> Result<(), AppError> {
        let cookie = Self::build_cookie(token, OffsetDateTime::now_utc());
        self.storage.set(keys::TOKEN_COOKIE, &cookie.to_string())
    }

    pub fn clear(&self) -> Result<(), AppError> {
        self.storage.remove(keys::TOKEN_COOKIE)
    }

    fn build_cookie(token: &str, now: OffsetDateTime) -> Cookie<'static> {
        Cookie::build((TOKEN_COOKIE, token.to_string()))
            .path("/")
            .secure(true)
            .same_site(SameSite::None)
            .expires(now + time::Duration::days(TOKEN_TTL_DAYS))
            .build()
    }

    /// Extract the token from `Set-Cookie` response headers, if present.
    pub fn token_from_headers(headers: &reqwest::header::HeaderMap) -> Option<String> {
        headers
            .get_all(reqwest::header::SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .filter_map(|value| Cookie::parse(value.to_string()).ok())
            .find(|cookie| cookie.name() == TOKEN_COOKIE && !cookie.value().is_empty())
            .map(|cookie| cookie.value().to_string())
    }
}
