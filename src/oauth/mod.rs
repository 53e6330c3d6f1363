// ABOUTME: OAuth authorization-flow initiation with per-provider endpoint configuration
// ABOUTME: State persistence is best-effort; the URL result carries a non-fatal warning
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 OpsVault Contributors

/// Provider token-endpoint refresh client
pub mod refresh;

use crate::config::ServerConfig;
use crate::constants::{oauth_flow, providers};
use crate::database::Database;
use crate::errors::{AppError, AppResult};
use crate::models::{AuthenticatedUser, OAuthState};
use crate::secrets;
use chrono::{Duration, Utc};
use serde::Serialize;
use tracing::{info, warn};
use url::Url;
use uuid::Uuid;

pub use refresh::{RefreshedTokens, TokenRefresh, TokenRefresher};

/// Static OAuth configuration for one provider.
///
/// Scope lists and extra query parameters are configuration data, not logic;
/// adding a provider means adding a table entry, not editing a conditional.
#[derive(Debug, Clone, Copy)]
pub struct ProviderAuthConfig {
    /// Provider identifier (registry key)
    pub provider: &'static str,
    /// Published authorization endpoint
    pub authorize_url: &'static str,
    /// Published token endpoint
    pub token_url: &'static str,
    /// Fixed scope list requested at authorization
    pub scopes: &'static [&'static str],
    /// Extra query parameters (offline/consent access hints)
    pub extra_params: &'static [(&'static str, &'static str)],
    /// Whether missing per-provider config may fall back to process-wide
    /// environment credentials
    pub allow_env_fallback: bool,
    /// Whether the provider rotates the refresh token on every use
    pub rotates_refresh_token: bool,
}

/// OAuth endpoint table, one entry per supported provider
pub const AUTH_CONFIGS: &[ProviderAuthConfig] = &[
    ProviderAuthConfig {
        provider: providers::QUICKBOOKS,
        authorize_url: "https://appcenter.intuit.com/connect/oauth2",
        token_url: "https://oauth.platform.intuit.com/oauth2/v1/tokens/bearer",
        scopes: &["com.intuit.quickbooks.accounting"],
        extra_params: &[],
        // Strictly "each tenant brings its own app registration"
        allow_env_fallback: false,
        rotates_refresh_token: true,
    },
    ProviderAuthConfig {
        provider: providers::STRIPE,
        authorize_url: "https://connect.stripe.com/oauth/authorize",
        token_url: "https://connect.stripe.com/oauth/token",
        scopes: &["read_write"],
        extra_params: &[],
        allow_env_fallback: true,
        rotates_refresh_token: false,
    },
    ProviderAuthConfig {
        provider: providers::HUBSPOT,
        authorize_url: "https://app.hubspot.com/oauth/authorize",
        token_url: "https://api.hubapi.com/oauth/v1/token",
        scopes: &["crm.objects.contacts.read", "crm.objects.deals.read"],
        extra_params: &[],
        allow_env_fallback: true,
        rotates_refresh_token: false,
    },
    ProviderAuthConfig {
        provider: providers::SALESFORCE,
        authorize_url: "https://login.salesforce.com/services/oauth2/authorize",
        token_url: "https://login.salesforce.com/services/oauth2/token",
        scopes: &["api", "refresh_token"],
        extra_params: &[],
        allow_env_fallback: true,
        rotates_refresh_token: false,
    },
    ProviderAuthConfig {
        provider: providers::ZOHO,
        authorize_url: "https://accounts.zoho.com/oauth/v2/auth",
        token_url: "https://accounts.zoho.com/oauth/v2/token",
        scopes: &["ZohoCRM.modules.READ", "ZohoCRM.settings.READ"],
        extra_params: &[("access_type", "offline"), ("prompt", "consent")],
        allow_env_fallback: true,
        rotates_refresh_token: false,
    },
    ProviderAuthConfig {
        provider: providers::PIPEDRIVE,
        authorize_url: "https://oauth.pipedrive.com/oauth/authorize",
        token_url: "https://oauth.pipedrive.com/oauth/token",
        scopes: &["deals:read", "contacts:read"],
        extra_params: &[],
        allow_env_fallback: true,
        rotates_refresh_token: true,
    },
    ProviderAuthConfig {
        provider: providers::GDRIVE,
        authorize_url: "https://accounts.google.com/o/oauth2/v2/auth",
        token_url: "https://oauth2.googleapis.com/token",
        scopes: &["https://www.googleapis.com/auth/drive.readonly"],
        extra_params: &[("access_type", "offline"), ("prompt", "consent")],
        allow_env_fallback: true,
        rotates_refresh_token: false,
    },
];

/// Look up the auth configuration for a provider name
#[must_use]
pub fn auth_config(provider: &str) -> Option<&'static ProviderAuthConfig> {
    AUTH_CONFIGS.iter().find(|cfg| cfg.provider == provider)
}

/// Result of initiating an authorization flow.
///
/// `warning` carries the non-fatal side channel: state persistence can fail
/// without blocking the flow (trading strict CSRF protection for
/// availability), and the caller decides whether to surface it.
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationStart {
    /// Provider authorization URL for the client to open
    pub authorization_url: String,
    /// Anti-forgery state as sent to the provider
    pub state: String,
    /// Non-fatal degradation note, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Authorization-flow initiator
pub struct AuthorizationFlow {
    db: Database,
    config: std::sync::Arc<ServerConfig>,
}

impl AuthorizationFlow {
    /// Create the initiator
    #[must_use]
    pub const fn new(db: Database, config: std::sync::Arc<ServerConfig>) -> Self {
        Self { db, config }
    }

    /// Build the provider authorization URL for an authenticated user.
    ///
    /// Flow: resolve the client configuration, issue and persist an
    /// anti-forgery state bound to the user, then build the URL.
    ///
    /// # Errors
    ///
    /// Returns `AppError::UnsupportedProvider` for unknown providers and
    /// `AppError::Configuration` when no usable client id resolves (with a
    /// provider-specific message for strict-OAuth providers).
    pub async fn start(
        &self,
        provider: &str,
        user: &AuthenticatedUser,
        origin: Option<&str>,
    ) -> AppResult<AuthorizationStart> {
        let auth = auth_config(provider)
            .ok_or_else(|| AppError::UnsupportedProvider(provider.to_owned()))?;

        let credentials = secrets::client_credentials(&self.db, self.db.cipher(), auth).await?;

        // State encodes the provider so the callback can recover it without a
        // second lookup
        let state = format!("{}:{}", Uuid::new_v4(), provider);
        let now = Utc::now();
        let record = OAuthState {
            state: state.clone(),
            user_id: user.id,
            provider: provider.to_owned(),
            expires_at: now + Duration::minutes(oauth_flow::STATE_EXPIRES_MINUTES),
            created_at: now,
        };

        let warning = match self.db.store_oauth_state(&record).await {
            Ok(()) => None,
            Err(e) => {
                // Non-fatal: the flow works without stored state, at the cost
                // of strict CSRF verification on the callback
                warn!(provider, error = %e, "failed to persist OAuth state");
                Some("authorization state could not be persisted; CSRF verification will be skipped on callback".to_owned())
            }
        };

        let redirect_uri = self.config.redirect_uri(origin, provider);
        let mut url = Url::parse(auth.authorize_url)
            .map_err(|e| AppError::internal(format!("invalid authorize URL in table: {e}")))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("client_id", &credentials.client_id);
            query.append_pair("redirect_uri", &redirect_uri);
            query.append_pair("response_type", "code");
            query.append_pair("state", &state);
            if !auth.scopes.is_empty() {
                query.append_pair("scope", &auth.scopes.join(" "));
            }
            for (key, value) in auth.extra_params {
                query.append_pair(key, value);
            }
        }

        info!(provider, user_id = %user.id, "authorization URL issued");

        Ok(AuthorizationStart {
            authorization_url: url.into(),
            state,
            warning,
        })
    }
}
