// ABOUTME: Provider token refresh: exchanges a refresh token at the token endpoint
// ABOUTME: A rotated refresh token is surfaced only when the provider returned one
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 OpsVault Contributors

use crate::errors::{AppError, AppResult};
use crate::oauth::ProviderAuthConfig;
use crate::secrets::ClientCredentials;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, warn};

/// Token-endpoint response, deserialized leniently: providers differ in which
/// optional fields they include
#[derive(Debug, Deserialize)]
struct TokenEndpointResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// Outcome of a successful refresh.
///
/// `refresh_token` is `Some` only when the provider rotated it; callers must
/// keep the stored value otherwise.
#[derive(Debug, Clone)]
pub struct RefreshedTokens {
    /// New access token (plaintext; caller re-encrypts before persisting)
    pub access_token: String,
    /// Rotated refresh token, when the provider issues one
    pub refresh_token: Option<String>,
    /// Access-token lifetime in seconds, when reported
    pub expires_in: Option<u64>,
}

/// Exchange seam for refresh-token grants.
///
/// The aggregator talks to this trait rather than the concrete HTTP client so
/// the refresh path stays exercisable without a live token endpoint.
#[async_trait]
pub trait TokenRefresh: Send + Sync {
    /// Exchange a refresh token for a new access token.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ReauthRequired` when the grant is rejected and
    /// `AppError::ProviderUnavailable` on transport failure.
    async fn refresh(
        &self,
        auth: &ProviderAuthConfig,
        refresh_token: &str,
        credentials: &ClientCredentials,
    ) -> AppResult<RefreshedTokens>;
}

/// Token refresh client over a shared HTTP client
pub struct TokenRefresher {
    http: reqwest::Client,
}

impl TokenRefresher {
    /// Create a refresher over an existing HTTP client
    #[must_use]
    pub const fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl TokenRefresh for TokenRefresher {
    /// Exchange a refresh token for a new access token.
    ///
    /// One POST with `grant_type=refresh_token`; no retries here. Callers
    /// invoke this lazily - on a 401 from a data call or proactively before a
    /// batch fetch - never on every read.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ReauthRequired` on a non-2xx token-endpoint response
    /// (the user must repeat the authorization flow; retrying is pointless)
    /// and `AppError::ProviderUnavailable` on network failure.
    async fn refresh(
        &self,
        auth: &ProviderAuthConfig,
        refresh_token: &str,
        credentials: &ClientCredentials,
    ) -> AppResult<RefreshedTokens> {
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", &credentials.client_id),
            ("client_secret", &credentials.client_secret),
        ];

        let response = self
            .http
            .post(auth.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| {
                AppError::provider_unavailable(auth.provider, format!("token endpoint: {e}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            // Never log the response body: some providers echo credentials back
            warn!(
                provider = auth.provider,
                status = %status,
                "token refresh rejected"
            );
            return Err(AppError::ReauthRequired(auth.provider.to_owned()));
        }

        let body: TokenEndpointResponse = response.json().await.map_err(|e| {
            AppError::provider_unavailable(auth.provider, format!("malformed token response: {e}"))
        })?;

        let rotated = body.refresh_token.filter(|rt| !rt.is_empty());
        info!(
            provider = auth.provider,
            rotated = rotated.is_some(),
            "token refresh succeeded"
        );

        Ok(RefreshedTokens {
            access_token: body.access_token,
            refresh_token: rotated,
            expires_in: body.expires_in,
        })
    }
}
