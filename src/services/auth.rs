// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Auth gateway: turns credentials into session state.
//!
//! Every operation returns `Result`. Login, registration and logout show
//! their own notices; a failed profile update shows a notice and leaves
//! recovery to the caller.

use crate::error::AppError;
use crate::models::{LoginRequest, LogoUpload, ProfileUpdate, Provider, RegisterRequest};
use crate::services::notifier::Notifier;
use crate::services::provider_api::ProviderApi;
use crate::services::session::SessionStore;
use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use validator::Validate;

/// Per-email locks serializing overlapping login/register calls.
pub type CredentialLocks = Arc<DashMap<String, Arc<Mutex<()>>>>;

#[derive(Clone)]
pub struct AuthGateway {
    api: ProviderApi,
    store: Arc<SessionStore>,
    notifier: Arc<dyn Notifier>,
    credential_locks: CredentialLocks,
}

impl AuthGateway {
    pub fn new(api: ProviderApi, store: Arc<SessionStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            api,
            store,
            notifier,
            credential_locks: Arc::new(DashMap::new()),
        }
    }

    /// Log in. Only an approved provider gets a session.
    ///
    /// Pending and rejected providers are turned away with
    /// [`AppError::NotApproved`] and nothing is stored.
    pub async fn login(&self, email: &str, password: &str) -> Result<Provider, AppError> {
        let request = LoginRequest {
            email: email.trim().to_string(),
            password: password.to_string(),
        };
        self.validate(&request)?;
        self.serialized(&request.email, self.login_locked(&request))
            .await
    }

    async fn login_locked(&self, request: &LoginRequest) -> Result<Provider, AppError> {
        let response = match self.api.login(request).await {
            Ok(response) => response,
            Err(e) => return Err(self.report(e, "Login failed. Please try again.")),
        };
        let provider = response.provider;

        if !provider.is_approved() {
            tracing::info!(
                provider_id = %provider.id,
                status = %provider.approval_status,
                "Login blocked: provider not approved"
            );
            self.notifier.error(provider.approval_status.denial_message());
            return Err(AppError::NotApproved(provider.approval_status));
        }

        // The token must be in place before the session connects the channel
        if let Some(token) = &response.token {
            self.api
                .tokens()
                .save(token)
                .map_err(|e| self.report(e, "Login failed. Please try again."))?;
        }
        self.store
            .set_session(provider.clone())
            .map_err(|e| self.report(e, "Login failed. Please try again."))?;

        tracing::info!(provider_id = %provider.id, "Provider logged in");
        self.notifier.success("Login successful.");
        Ok(provider)
    }

    /// Create an account. The new session is stored whatever its status;
    /// new accounts normally start out pending.
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
        phone_number: &str,
    ) -> Result<Provider, AppError> {
        let request = RegisterRequest {
            name: name.trim().to_string(),
            email: email.trim().to_string(),
            password: password.to_string(),
            phone_number: phone_number.trim().to_string(),
        };
        self.validate(&request)?;
        self.serialized(&request.email, self.register_locked(&request))
            .await
    }

    async fn register_locked(&self, request: &RegisterRequest) -> Result<Provider, AppError> {
        let response = match self.api.signup(request).await {
            Ok(response) => response,
            Err(e) => return Err(self.report(e, "Registration failed. Please try again.")),
        };

        if let Some(token) = &response.token {
            self.api
                .tokens()
                .save(token)
                .map_err(|e| self.report(e, "Registration failed. Please try again."))?;
        }
        self.store
            .set_session(response.provider.clone())
            .map_err(|e| self.report(e, "Registration failed. Please try again."))?;

        tracing::info!(
            provider_id = %response.provider.id,
            status = %response.provider.approval_status,
            "Provider registered"
        );
        Ok(response.provider)
    }

    /// Log out. Local state is cleared even when the server call fails;
    /// that failure is still returned.
    pub async fn logout(&self) -> Result<(), AppError> {
        let remote = self.api.logout().await;

        let local = self.store.clear_session();
        if let Err(e) = self.api.tokens().clear() {
            tracing::warn!(error = %e, "Failed to remove provider token");
        }

        match remote {
            Ok(()) => {
                local.map_err(|e| self.report(e, "Logout failed. Please try again."))?;
                tracing::info!("Provider logged out");
                self.notifier.success("Logged out successfully");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "Remote logout failed, local session cleared");
                Err(self.report(e, "Logout failed. Please try again."))
            }
        }
    }

    /// Update profile fields and, optionally, the logo.
    pub async fn update_profile(
        &self,
        update: &ProfileUpdate,
        logo: Option<LogoUpload>,
    ) -> Result<Provider, AppError> {
        let update = update.normalized();
        self.validate(&update)?;

        let provider = self
            .api
            .update_profile(&update, logo)
            .await
            .map_err(|e| self.report(e, "Failed to update profile"))?;

        self.store
            .set_session(provider.clone())
            .map_err(|e| self.report(e, "Failed to update profile"))?;

        tracing::info!(provider_id = %provider.id, "Profile updated");
        self.notifier.success("Profile updated successfully");
        Ok(provider)
    }

    /// Delete the provider account and drop the local session.
    pub async fn delete_account(&self) -> Result<(), AppError> {
        self.api
            .delete_provider()
            .await
            .map_err(|e| self.report(e, "Failed to delete account"))?;

        if let Err(e) = self.api.tokens().clear() {
            tracing::warn!(error = %e, "Failed to remove provider token");
        }
        self.store
            .clear_session()
            .map_err(|e| self.report(e, "Failed to delete account"))?;

        tracing::info!("Provider account deleted");
        self.notifier.success("Account deleted successfully");
        Ok(())
    }

    fn validate<T: Validate>(&self, request: &T) -> Result<(), AppError> {
        request.validate().map_err(|errors| {
            let message = errors
                .field_errors()
                .values()
                .flat_map(|errs| errs.iter())
                .filter_map(|err| err.message.as_ref().map(|m| m.to_string()))
                .next()
                .unwrap_or_else(|| errors.to_string());
            self.notifier.error(&message);
            AppError::BadRequest(message)
        })
    }

    /// Run `operation` holding the lock for `email`.
    ///
    /// The map entry is dropped again once no other call holds or waits on it.
    async fn serialized<T>(&self, email: &str, operation: impl Future<Output = T>) -> T {
        let key = email.to_lowercase();
        let lock = self
            .credential_locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let result = {
            let _guard = lock.lock().await;
            operation.await
        };

        drop(lock);
        self.credential_locks
            .remove_if(&key, |_, lock| Arc::strong_count(lock) == 1);
        result
    }

    /// Show the notice for `error` and hand it back.
    fn report(&self, error: AppError, fallback: &str) -> AppError {
        if error.should_notify() {
            let message = match &error {
                AppError::Network(_) => AppError::NETWORK_NOTICE.to_string(),
                AppError::Api { message, .. } if message != AppError::GENERIC_API_MESSAGE => {
                    message.clone()
                }
                AppError::BadRequest(message) => message.clone(),
                _ => fallback.to_string(),
            };
            self.notifier.error(&message);
        }
        error
    }
}
