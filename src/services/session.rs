// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session store: the single source of truth for the current provider.
//!
//! Every mutation writes through to local storage and reconciles the
//! realtime subscription (connect for the new provider id, or disconnect).
//! Observers follow changes through [`SessionStore::subscribe`].

use crate::error::AppError;
use crate::models::{ApprovalStatus, Provider, SessionState};
use crate::services::provider_api::ProviderApi;
use crate::services::realtime::{RealtimeChannel, StatusListener};
use crate::storage::{keys, LocalStorage};
use std::sync::{Arc, Weak};
use tokio::sync::watch;

pub struct SessionStore {
    state: watch::Sender<SessionState>,
    storage: LocalStorage,
    api: ProviderApi,
    channel: RealtimeChannel,
}

impl SessionStore {
    /// Create the store and register it for status pushes on `channel`.
    pub fn new(storage: LocalStorage, api: ProviderApi, channel: RealtimeChannel) -> Arc<Self> {
        let (state, _) = watch::channel(SessionState::default());
        let store = Arc::new(Self {
            state,
            storage,
            api,
            channel,
        });

        let listener: Weak<dyn StatusListener> = Arc::downgrade(&store) as Weak<dyn StatusListener>;
        store.channel.set_listener(listener);
        store
    }

    pub fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn channel(&self) -> &RealtimeChannel {
        &self.channel
    }

    /// Restore the session at startup.
    ///
    /// A persisted profile is applied optimistically, then replaced by the
    /// authoritative profile from the server. If that fetch fails the cached
    /// session is not trusted: memory and storage are both cleared.
    pub async fn hydrate(&self) -> Option<Provider> {
        if let Some(cached) = self.load_persisted() {
            tracing::info!(provider_id = %cached.id, "Restoring cached session");
            let id = cached.id.clone();
            self.state.send_modify(|state| state.provider = Some(cached));
            self.channel.connect(&id);
        }

        match self.api.tokens().token() {
            Ok(Some(_)) => {}
            Ok(None) => {
                tracing::debug!("No provider token, skipping profile fetch");
                self.clear_quietly();
                return None;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read provider token");
                self.clear_quietly();
                return None;
            }
        }

        match self.api.profile().await {
            Ok(provider) => match self.set_session(provider.clone()) {
                Ok(()) => {
                    tracing::info!(
                        provider_id = %provider.id,
                        status = %provider.approval_status,
                        "Session hydrated from server"
                    );
                    Some(provider)
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to persist hydrated session");
                    self.clear_quietly();
                    None
                }
            },
            Err(e) => {
                tracing::info!(error = %e, "Profile fetch failed, clearing session");
                self.clear_quietly();
                if e.is_unauthorized() {
                    if let Err(e) = self.api.tokens().clear() {
                        tracing::warn!(error = %e, "Failed to remove rejected token");
                    }
                }
                None
            }
        }
    }

    /// Replace the session with `provider` and persist it.
    pub fn set_session(&self, provider: Provider) -> Result<(), AppError> {
        let id = provider.id.clone();
        let mut persisted = Ok(());
        // Persist under the state lock so storage never lags a newer write
        self.state.send_if_modified(|state| {
            persisted = self.persist(&provider);
            if persisted.is_err() {
                return false;
            }
            state.provider = Some(provider);
            state.loading = false;
            true
        });
        persisted?;

        self.channel.connect(&id);
        Ok(())
    }

    /// Drop the session, its persisted copy, and the realtime subscription.
    ///
    /// Memory and the channel are always cleared; a storage failure is
    /// reported afterwards.
    pub fn clear_session(&self) -> Result<(), AppError> {
        let mut removed = Ok(());
        self.state.send_modify(|state| {
            state.provider = None;
            state.loading = false;
            removed = self.storage.remove(keys::PROVIDER);
        });
        self.channel.disconnect();
        removed
    }

    /// Apply an approval status pushed for `provider_id`.
    ///
    /// Ignored unless `provider_id` is the current session. Rejection tears
    /// the session down.
    pub fn apply_status(&self, provider_id: &str, status: ApprovalStatus) -> Result<(), AppError> {
        let mut result = Ok(());
        let applied = self.state.send_if_modified(|state| {
            let Some(current) = state.provider.as_mut().filter(|p| p.id == provider_id) else {
                return false;
            };
            if status == ApprovalStatus::Rejected {
                state.provider = None;
                state.loading = false;
                result = self.storage.remove(keys::PROVIDER);
            } else {
                current.approval_status = status;
                result = self.persist(current);
            }
            true
        });

        if !applied {
            tracing::debug!(provider_id, status = %status, "Status update for another provider, ignoring");
            return Ok(());
        }
        if status == ApprovalStatus::Rejected {
            tracing::info!(provider_id, "Provider rejected, tearing down session");
            self.channel.disconnect();
        }
        result
    }

    fn clear_quietly(&self) {
        if let Err(e) = self.clear_session() {
            tracing::warn!(error = %e, "Failed to remove persisted session");
        }
    }

    fn persist(&self, provider: &Provider) -> Result<(), AppError> {
        let json = serde_json::to_string(provider)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to serialize session: {}", e)))?;
        self.storage.set(keys::PROVIDER, &json)
    }

    fn load_persisted(&self) -> Option<Provider> {
        let raw = match self.storage.get(keys::PROVIDER) {
            Ok(raw) => raw?,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read persisted session");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(provider) => Some(provider),
            Err(e) => {
                tracing::warn!(error = %e, "Discarding unreadable persisted session");
                if let Err(e) = self.storage.remove(keys::PROVIDER) {
                    tracing::warn!(error = %e, "Failed to remove persisted session");
                }
                None
            }
        }
    }

    /// Persisted profile as currently stored, if readable.
    pub fn persisted(&self) -> Option<Provider> {
        self.storage
            .get(keys::PROVIDER)
            .ok()
            .flatten()
            .and_then(|raw| serde_json::from_str(&raw).ok())
    }
}

impl StatusListener for SessionStore {
    fn on_status_update(&self, provider_id: &str, status: ApprovalStatus) {
        if let Err(e) = self.apply_status(provider_id, status) {
            tracing::error!(error = %e, status = %status, "Failed to apply status update");
        }
    }
}
