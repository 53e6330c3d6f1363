// ABOUTME: Credential resolver: env indirection, encrypted payload, or raw plaintext
// ABOUTME: Resolves provider client credentials with a per-provider env-fallback policy
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 OpsVault Contributors

use crate::crypto::TokenCipher;
use crate::database::Database;
use crate::errors::{AppError, AppResult};
use crate::oauth::{auth_config, ProviderAuthConfig};
use crate::providers::ProviderRegistry;
use std::collections::HashMap;
use std::env;
use tracing::{debug, warn};

/// Resolved OAuth client credentials for one provider
#[derive(Debug, Clone)]
pub struct ClientCredentials {
    /// OAuth client id
    pub client_id: String,
    /// OAuth client secret
    pub client_secret: String,
}

/// Resolve a stored credential value to its usable plaintext.
///
/// Precedence:
/// 1. `env:NAME` -> process environment lookup (empty string when unset;
///    callers treat empty as "not configured"),
/// 2. encrypted payload -> decrypt,
/// 3. anything else -> returned as-is.
///
/// # Errors
///
/// Returns `AppError::Decryption` if an encrypted value fails to decrypt.
pub fn resolve(cipher: &TokenCipher, stored: &str) -> AppResult<String> {
    if let Some(var) = stored.strip_prefix("env:") {
        return Ok(env::var(var).unwrap_or_default());
    }
    cipher.decrypt(stored)
}

/// Resolve the OAuth client credentials for a provider.
///
/// Reads the per-provider config row first. A row with `enabled = false`
/// disables the provider outright, environment fallback included. Providers
/// whose auth config allows it fall back to `{PROVIDER}_CLIENT_ID` /
/// `{PROVIDER}_CLIENT_SECRET` in the environment when no usable row exists.
/// The accounting provider forbids the fallback: its integration model is
/// strictly "each tenant brings its own app registration", and a shared
/// process-wide credential would authenticate the wrong tenant.
///
/// # Errors
///
/// Returns `AppError::Configuration` when the provider is disabled or no
/// usable client id resolves, with a provider-specific message for strict
/// providers.
pub async fn client_credentials(
    db: &Database,
    cipher: &TokenCipher,
    auth: &ProviderAuthConfig,
) -> AppResult<ClientCredentials> {
    if let Some(config) = db.get_integration_config(auth.provider).await? {
        if !config.enabled {
            return Err(AppError::config(format!(
                "provider {} is disabled",
                auth.provider
            )));
        }
        let client_id = resolve(cipher, &config.client_id)?;
        let client_secret = resolve(cipher, &config.client_secret)?;
        if !client_id.is_empty() {
            return Ok(ClientCredentials {
                client_id,
                client_secret,
            });
        }
        debug!(
            provider = auth.provider,
            "configured client id resolved to empty value"
        );
    }

    if auth.allow_env_fallback {
        if let Some(client_id) = env_client_id(auth) {
            let prefix = auth.provider.to_uppercase();
            let client_secret = env::var(format!("{prefix}_CLIENT_SECRET")).unwrap_or_default();
            return Ok(ClientCredentials {
                client_id,
                client_secret,
            });
        }
        return Err(AppError::config(format!(
            "no OAuth client configured for provider {}",
            auth.provider
        )));
    }

    // Strict providers get a more specific failure so operators can tell
    // "connect your app registration" apart from generic misconfiguration
    Err(AppError::config(format!(
        "provider {} requires an explicit per-tenant OAuth app registration; \
         no shared environment fallback is permitted",
        auth.provider
    )))
}

/// List the providers that can currently be offered for connection.
///
/// A provider is connectable when its config row is enabled and the stored
/// client id resolves to a non-empty value, or, where the fallback is
/// permitted, when the environment supplies `{PROVIDER}_CLIENT_ID`. A row
/// with `enabled = false` suppresses the provider entirely; the environment
/// cannot override an explicit disable.
///
/// # Errors
///
/// Returns an error if the config query fails.
pub async fn connectable_providers(
    db: &Database,
    cipher: &TokenCipher,
    registry: &ProviderRegistry,
) -> AppResult<Vec<&'static str>> {
    let configs: HashMap<String, _> = db
        .list_integration_configs()
        .await?
        .into_iter()
        .map(|config| (config.provider.clone(), config))
        .collect();

    let mut connectable = Vec::new();
    for name in registry.supported_providers() {
        let Some(auth) = auth_config(name) else {
            continue;
        };
        match configs.get(name) {
            Some(config) if !config.enabled => {}
            Some(config) => match resolve(cipher, &config.client_id) {
                Ok(client_id) if !client_id.is_empty() => connectable.push(name),
                Ok(_) => {
                    if env_client_id(auth).is_some() {
                        connectable.push(name);
                    }
                }
                Err(_) => {
                    // Never surfaces stored material; the operator fixes the
                    // row via reconfiguration
                    warn!(provider = name, "stored client id failed to resolve");
                }
            },
            None => {
                if env_client_id(auth).is_some() {
                    connectable.push(name);
                }
            }
        }
    }
    Ok(connectable)
}

fn env_client_id(auth: &ProviderAuthConfig) -> Option<String> {
    if !auth.allow_env_fallback {
        return None;
    }
    let prefix = auth.provider.to_uppercase();
    env::var(format!("{prefix}_CLIENT_ID"))
        .ok()
        .filter(|id| !id.is_empty())
}
