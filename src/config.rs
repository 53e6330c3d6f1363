// ABOUTME: Environment-only server configuration loading
// ABOUTME: Every tunable has a default; invalid values fail fast at startup
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 OpsVault Contributors

use crate::errors::{AppError, AppResult};
use std::env;

/// Name of the environment variable holding the credential encryption key
pub const ENCRYPTION_KEY_VAR: &str = "OPSVAULT_ENCRYPTION_KEY";

/// Server configuration loaded from the process environment
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP listen port
    pub http_port: u16,
    /// Database connection string
    pub database_url: String,
    /// Public base URL, used as the OAuth redirect-URI fallback when the
    /// request carries no origin
    pub base_url: String,
    /// Per-provider fetch timeout in seconds
    pub provider_timeout_secs: u64,
}

impl ServerConfig {
    /// Load configuration from the environment.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Configuration` for unparseable values.
    pub fn from_env() -> AppResult<Self> {
        let http_port = match env::var("HTTP_PORT") {
            Ok(raw) => raw
                .parse::<u16>()
                .map_err(|_| AppError::config(format!("HTTP_PORT is not a valid port: {raw}")))?,
            Err(_) => 8081,
        };

        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:data/opsvault.db".to_owned());

        let base_url =
            env::var("BASE_URL").unwrap_or_else(|_| format!("http://localhost:{http_port}"));

        let provider_timeout_secs = match env::var("PROVIDER_TIMEOUT_SECS") {
            Ok(raw) => raw.parse::<u64>().map_err(|_| {
                AppError::config(format!("PROVIDER_TIMEOUT_SECS is not a number: {raw}"))
            })?,
            Err(_) => 15,
        };

        Ok(Self {
            http_port,
            database_url,
            base_url,
            provider_timeout_secs,
        })
    }

    /// OAuth callback URI for a provider, derived from the request origin when
    /// available with the configured base URL as the hard-coded fallback
    #[must_use]
    pub fn redirect_uri(&self, origin: Option<&str>, provider: &str) -> String {
        let base = origin.unwrap_or(&self.base_url).trim_end_matches('/');
        format!("{base}/api/oauth/callback/{provider}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redirect_uri_prefers_request_origin() {
        let config = ServerConfig {
            http_port: 8081,
            database_url: "sqlite::memory:".into(),
            base_url: "https://app.example.com".into(),
            provider_timeout_secs: 15,
        };
        assert_eq!(
            config.redirect_uri(Some("https://tenant.example.com/"), "stripe"),
            "https://tenant.example.com/api/oauth/callback/stripe"
        );
        assert_eq!(
            config.redirect_uri(None, "quickbooks"),
            "https://app.example.com/api/oauth/callback/quickbooks"
        );
    }
}
