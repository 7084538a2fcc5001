// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Provider REST API client.
//!
//! Handles:
//! - Bearer token attachment from the token store
//! - JSON and multipart request bodies
//! - Mapping of transport failures and structured server errors
//! - Validation of profile payloads (parse, don't trust)

use crate::error::AppError;
use crate::models::{LoginRequest, LogoUpload, ProfileUpdate, Provider, RegisterRequest};
use crate::storage::TokenStore;
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

/// Provider REST API client.
#[derive(Clone)]
pub struct ProviderApi {
    http: reqwest::Client,
    base_url: String,
    tokens: TokenStore,
}

/// Result of a login or signup call.
#[derive(Debug, Clone)]
pub struct AuthResponse {
    pub provider: Provider,
    /// Bearer token from the body or a `providerToken` cookie
    pub token: Option<String>,
}

#[derive(Deserialize)]
struct AuthBody {
    provider: Provider,
    #[serde(default)]
    token: Option<String>,
}

/// `/profile` answers with either a bare profile or `{ provider }`.
#[derive(Deserialize)]
#[serde(untagged)]
enum ProfileBody {
    Wrapped { provider: Provider },
    Bare(Provider),
}

impl ProfileBody {
    fn into_provider(self) -> Provider {
        match self {
            ProfileBody::Wrapped { provider } | ProfileBody::Bare(provider) => provider,
        }
    }
}

/// Structured error body returned by the API.
#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl ProviderApi {
    /// Create a client for the API rooted at `base_url` (e.g. `.../api/provider`).
    pub fn new(base_url: &str, timeout: Duration, tokens: TokenStore) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(anyhow::anyhow!("HTTP client init failed: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            tokens,
        })
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    /// `POST /signup`
    pub async fn signup(&self, request: &RegisterRequest) -> Result<AuthResponse, AppError> {
        let response = self
            .request(Method::POST, "/signup")?
            .json(request)
            .send()
            .await?;
        Self::auth_response(response).await
    }

    /// `POST /login`
    pub async fn login(&self, request: &LoginRequest) -> Result<AuthResponse, AppError> {
        let response = self
            .request(Method::POST, "/login")?
            .json(request)
            .send()
            .await?;
        Self::auth_response(response).await
    }

    /// `POST /logout`
    pub async fn logout(&self) -> Result<(), AppError> {
        let response = self.request(Method::POST, "/logout")?.send().await?;
        Self::check_response(response).await?;
        Ok(())
    }

    /// `GET /profile` - the authoritative profile for the stored token.
    pub async fn profile(&self) -> Result<Provider, AppError> {
        let response = self.request(Method::GET, "/profile")?.send().await?;
        let body: ProfileBody = Self::check_response_json(response).await?;
        Ok(body.into_provider())
    }

    /// `PUT /update-profile` as a multipart form.
    pub async fn update_profile(
        &self,
        update: &ProfileUpdate,
        logo: Option<LogoUpload>,
    ) -> Result<Provider, AppError> {
        let fields = update
            .form_fields()
            .map_err(|e| AppError::BadRequest(format!("Invalid address: {}", e)))?;

        let mut form = reqwest::multipart::Form::new();
        for (key, value) in fields {
            form = form.text(key, value);
        }
        if let Some(logo) = logo {
            let part = reqwest::multipart::Part::bytes(logo.bytes)
                .file_name(logo.file_name)
                .mime_str(&logo.content_type)
                .map_err(|e| AppError::BadRequest(format!("Invalid logo type: {}", e)))?;
            form = form.part("providerLogo", part);
        }

        let response = self
            .request(Method::PUT, "/update-profile")?
            .multipart(form)
            .send()
            .await?;
        let body: ProfileBody = Self::check_response_json(response).await?;
        Ok(body.into_provider())
    }

    /// `DELETE /delete-provider`
    pub async fn delete_provider(&self) -> Result<(), AppError> {
        let response = self
            .request(Method::DELETE, "/delete-provider")?
            .send()
            .await?;
        Self::check_response(response).await?;
        Ok(())
    }

    /// Build a request with the bearer token attached when one is stored.
    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, AppError> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(method = %method, url = %url, "Provider API request");

        let builder = self.http.request(method, url);
        Ok(match self.tokens.token()? {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        })
    }

    async fn auth_response(response: reqwest::Response) -> Result<AuthResponse, AppError> {
        let cookie_token = TokenStore::token_from_headers(response.headers());
        let body: AuthBody = Self::check_response_json(response).await?;
        Ok(AuthResponse {
            provider: body.provider,
            token: body.token.filter(|t| !t.is_empty()).or(cookie_token),
        })
    }

    /// Check response status and return error if not successful.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, AppError> {
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response.bytes().await.unwrap_or_default();
        let message = serde_json::from_slice::<ErrorBody>(&body)
            .ok()
            .and_then(|b| b.error.or(b.message))
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| AppError::GENERIC_API_MESSAGE.to_string());

        tracing::warn!(status = %status, message = %message, "Provider API error");
        Err(AppError::Api {
            status: status.as_u16(),
            message,
        })
    }

    /// Check response and parse JSON body.
    async fn check_response_json<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, AppError> {
        let response = Self::check_response(response).await?;
        let body = response.bytes().await?;
        serde_json::from_slice(&body)
            .map_err(|e| AppError::Malformed(format!("Invalid provider payload: {}", e)))
    }
}
