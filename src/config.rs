// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Client configuration loaded from environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::services::realtime::ReconnectPolicy;

/// Client configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the provider REST API (e.g. `http://host/api/provider`)
    pub api_url: String,
    /// Base URL of the realtime socket server
    pub socket_url: String,
    /// Directory holding the persisted session and token cookie
    pub state_dir: PathBuf,
    /// Per-request timeout for REST calls
    pub request_timeout: Duration,
    /// Realtime reconnection policy
    pub reconnect: ReconnectPolicy,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let defaults = ReconnectPolicy::default();

        Ok(Self {
            api_url: url_var("MANDAP_API_URL", "http://localhost:4000/api/provider")?,
            socket_url: url_var("MANDAP_SOCKET_URL", "http://localhost:4000")?,
            state_dir: env::var("MANDAP_STATE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(".mandap")),
            request_timeout: Duration::from_secs(parse_var("MANDAP_REQUEST_TIMEOUT_SECS", 30)?),
            reconnect: ReconnectPolicy {
                initial_delay: Duration::from_millis(parse_var(
                    "MANDAP_RECONNECT_INITIAL_MS",
                    defaults.initial_delay.as_millis() as u64,
                )?),
                max_delay: Duration::from_millis(parse_var(
                    "MANDAP_RECONNECT_MAX_MS",
                    defaults.max_delay.as_millis() as u64,
                )?),
                max_attempts: parse_var("MANDAP_RECONNECT_ATTEMPTS", defaults.max_attempts)?,
            },
        })
    }

    /// Config pointing at local test servers.
    pub fn test_default() -> Self {
        Self {
            api_url: "http://127.0.0.1:4000/api/provider".to_string(),
            socket_url: "http://127.0.0.1:4000".to_string(),
            state_dir: env::temp_dir().join("mandap-provider-test"),
            request_timeout: Duration::from_secs(5),
            reconnect: ReconnectPolicy::disabled(),
        }
    }
}

fn url_var(name: &'static str, default: &str) -> Result<String, ConfigError> {
    let value = env::var(name).unwrap_or_else(|_| default.to_string());
    let value = value.trim().trim_end_matches('/').to_string();
    if !(value.starts_with("http://") || value.starts_with("https://")) {
        return Err(ConfigError::Invalid(name, value));
    }
    Ok(value)
}

fn parse_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(name, raw)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable {0}: {1:?}")]
    Invalid(&'static str, String),
}
