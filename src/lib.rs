// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Mandap provider client: session and approval gating for the provider
//! dashboard of the mandap booking platform.
//!
//! This crate owns the provider session (login, registration, logout,
//! profile updates), the realtime approval-status channel, and the
//! protected-route decision.

pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod storage;

use config::Config;
use error::AppError;
use services::{
    AuthGateway, NotificationCenter, Notifier, ProviderApi, RealtimeChannel, RouteGuard,
    SessionStore,
};
use std::sync::Arc;
use storage::{LocalStorage, TokenStore};

/// Application wiring: one explicitly constructed instance per run.
pub struct ProviderApp {
    pub config: Config,
    pub notifications: Arc<NotificationCenter>,
    pub session: Arc<SessionStore>,
    pub auth: AuthGateway,
    pub guard: RouteGuard,
}

impl ProviderApp {
    /// Build the app with state persisted under `config.state_dir`.
    pub fn new(config: Config) -> Result<Self, AppError> {
        let storage = LocalStorage::open(&config.state_dir)?;
        Self::with_storage(config, storage)
    }

    /// Build the app on top of the given storage.
    pub fn with_storage(config: Config, storage: LocalStorage) -> Result<Self, AppError> {
        let notifications = Arc::new(NotificationCenter::new());
        let notifier: Arc<dyn Notifier> = notifications.clone();

        let tokens = TokenStore::new(storage.clone());
        let api = ProviderApi::new(&config.api_url, config.request_timeout, tokens.clone())?;
        let channel = RealtimeChannel::new(
            &config.socket_url,
            tokens,
            notifier.clone(),
            config.reconnect,
        );
        let session = SessionStore::new(storage, api.clone(), channel);
        let auth = AuthGateway::new(api, session.clone(), notifier.clone());
        let guard = RouteGuard::new(session.clone(), notifier);

        Ok(Self {
            config,
            notifications,
            session,
            auth,
            guard,
        })
    }

    /// Release the realtime subscription.
    pub fn shutdown(&self) {
        self.session.channel().disconnect();
    }
}

impl Drop for ProviderApp {
    fn drop(&mut self) {
        self.shutdown();
    }
}
