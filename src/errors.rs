// ABOUTME: Unified error taxonomy for the credential vault and aggregation core
// ABOUTME: Distinguishes operator-fixable, user-recoverable, and transient failures
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 OpsVault Contributors

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// Result alias used throughout the crate
pub type AppResult<T> = Result<T, AppError>;

/// Application error taxonomy
///
/// Propagation policy: `Configuration` and `Decryption` bubble to the caller as
/// hard failures. `NotConnected`, `ReauthRequired`, `ReconnectRequired` and
/// `ProviderUnavailable` are expected per-provider states - the aggregation
/// layer isolates them instead of failing the whole request.
///
/// Error messages must never contain token or secret values.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Missing or unresolvable key/client credential - operator must fix
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Caller asked for a provider outside the registry
    #[error("unsupported provider: {0}")]
    UnsupportedProvider(String),

    /// User has not completed authorization for this provider
    #[error("provider {0} is not connected")]
    NotConnected(String),

    /// Refresh token rejected or missing required scope - user must re-authorize
    #[error("provider {0} requires re-authentication")]
    ReauthRequired(String),

    /// Credential is missing a provider-scoped identifier captured at connect
    /// time (e.g. an accounting company id) - user must reconnect
    #[error("provider {0} connection is incomplete, reconnect required")]
    ReconnectRequired(String),

    /// Transient HTTP/network failure against a third party
    #[error("provider {0} is unavailable: {1}")]
    ProviderUnavailable(String, String),

    /// Corrupted or tampered stored secret
    #[error("decryption failed: {0}")]
    Decryption(String),

    /// Credential store failure
    #[error("database error: {0}")]
    Database(String),

    /// Caller lacks the privilege tier for this operation
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Malformed caller input
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Unexpected internal failure
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Configuration error - fatal, operator must fix
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Decryption error - logged loudly, never swallowed
    pub fn decryption(msg: impl Into<String>) -> Self {
        Self::Decryption(msg.into())
    }

    /// Database error
    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    /// Invalid caller input
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Transient provider failure
    pub fn provider_unavailable(provider: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::ProviderUnavailable(provider.into(), msg.into())
    }

    /// Whether the aggregation layer should isolate this error per provider
    /// instead of failing the whole request
    #[must_use]
    pub const fn is_per_provider(&self) -> bool {
        matches!(
            self,
            Self::NotConnected(_)
                | Self::ReauthRequired(_)
                | Self::ReconnectRequired(_)
                | Self::ProviderUnavailable(_, _)
        )
    }

    /// HTTP status code for this error
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::UnsupportedProvider(_) | Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::FORBIDDEN,
            Self::NotConnected(_) | Self::ReauthRequired(_) | Self::ReconnectRequired(_) => {
                StatusCode::CONFLICT
            }
            Self::ProviderUnavailable(_, _) => StatusCode::BAD_GATEWAY,
            Self::Configuration(_)
            | Self::Decryption(_)
            | Self::Database(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable error code
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration_error",
            Self::UnsupportedProvider(_) => "unsupported_provider",
            Self::NotConnected(_) => "not_connected",
            Self::ReauthRequired(_) => "reauth_required",
            Self::ReconnectRequired(_) => "reconnect_required",
            Self::ProviderUnavailable(_, _) => "provider_unavailable",
            Self::Decryption(_) => "decryption_error",
            Self::Database(_) => "database_error",
            Self::Unauthorized(_) => "unauthorized",
            Self::InvalidInput(_) => "invalid_input",
            Self::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({
            "error": self.code(),
            "message": self.to_string(),
        }));
        (status, body).into_response()
    }
}

impl From<uuid::Error> for AppError {
    fn from(e: uuid::Error) -> Self {
        Self::InvalidInput(format!("invalid UUID: {e}"))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        Self::Database(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_provider_errors_are_isolated() {
        assert!(AppError::ReauthRequired("stripe".into()).is_per_provider());
        assert!(AppError::provider_unavailable("zoho", "timeout").is_per_provider());
        assert!(!AppError::decryption("bad tag").is_per_provider());
        assert!(!AppError::config("missing key").is_per_provider());
    }

    #[test]
    fn status_codes_match_taxonomy() {
        assert_eq!(
            AppError::UnsupportedProvider("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Unauthorized("admin only".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::decryption("tag mismatch").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
