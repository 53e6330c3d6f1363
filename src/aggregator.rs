// ABOUTME: Aggregation orchestrator: concurrent fan-out across a user's connections
// ABOUTME: One provider failing, timing out, or needing reauth never sinks the rest
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 OpsVault Contributors

use crate::database::Database;
use crate::errors::{AppError, AppResult};
use crate::models::{AuthenticatedUser, CredentialHealth, Integration, ProviderSummary};
use crate::oauth::refresh::{TokenRefresh, TokenRefresher};
use crate::providers::{today_utc, FetchContext, ProviderAdapter, ProviderRegistry};
use crate::secrets;
use futures_util::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Unified result of one aggregation pass
#[derive(Debug)]
pub struct AggregateResult {
    /// Whether the user has any stored connections at all
    pub connected: bool,
    /// Summaries from the providers that answered; failed providers are
    /// omitted rather than failing the whole pass
    pub summaries: Vec<ProviderSummary>,
}

/// Fans a user's stored connections out to their adapters concurrently and
/// folds the answers into one result
pub struct Aggregator {
    db: Arc<Database>,
    registry: Arc<ProviderRegistry>,
    http: reqwest::Client,
    refresher: Arc<dyn TokenRefresh>,
    provider_timeout: Duration,
}

impl Aggregator {
    /// Create an aggregator over shared handles
    #[must_use]
    pub fn new(
        db: Arc<Database>,
        registry: Arc<ProviderRegistry>,
        http: reqwest::Client,
        provider_timeout: Duration,
    ) -> Self {
        let refresher = Arc::new(TokenRefresher::new(http.clone()));
        Self::with_refresher(db, registry, http, refresher, provider_timeout)
    }

    /// Create an aggregator with an explicit refresh implementation
    #[must_use]
    pub fn with_refresher(
        db: Arc<Database>,
        registry: Arc<ProviderRegistry>,
        http: reqwest::Client,
        refresher: Arc<dyn TokenRefresh>,
        provider_timeout: Duration,
    ) -> Self {
        Self {
            db,
            registry,
            http,
            refresher,
            provider_timeout,
        }
    }

    /// Whether the user has at least one stored connection
    ///
    /// # Errors
    ///
    /// Returns an error if the connection listing fails.
    pub async fn connected(&self, user: &AuthenticatedUser) -> AppResult<bool> {
        Ok(!self.db.list_integrations_for_user(user.id).await?.is_empty())
    }

    /// Fetch fresh data from every connected provider for one user.
    ///
    /// Providers run concurrently, each under its own timeout. Per-provider
    /// failures are logged (provider name only, never token material) and the
    /// provider is omitted; only the initial connection listing can fail the
    /// whole call.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored connections cannot be listed.
    pub async fn aggregate(&self, user: &AuthenticatedUser) -> AppResult<AggregateResult> {
        let integrations = self.db.list_integrations_for_user(user.id).await?;
        if integrations.is_empty() {
            return Ok(AggregateResult {
                connected: false,
                summaries: Vec::new(),
            });
        }

        let fetches = integrations.iter().map(|integration| async move {
            let outcome = tokio::time::timeout(
                self.provider_timeout,
                self.fetch_one(integration, user),
            )
            .await;

            match outcome {
                Ok(Ok(summary)) => Some(summary),
                Ok(Err(e)) => {
                    warn!(
                        provider = %integration.provider,
                        error = %e,
                        "provider fetch failed; omitting from summary"
                    );
                    None
                }
                Err(_) => {
                    warn!(
                        provider = %integration.provider,
                        "provider fetch timed out; omitting from summary"
                    );
                    None
                }
            }
        });

        let summaries: Vec<ProviderSummary> =
            join_all(fetches).await.into_iter().flatten().collect();

        info!(
            user_id = %user.id,
            connected = integrations.len(),
            answered = summaries.len(),
            "aggregation pass complete"
        );

        Ok(AggregateResult {
            connected: true,
            summaries,
        })
    }

    /// Fetch one provider, refreshing the access token once if it is rejected
    async fn fetch_one(
        &self,
        integration: &Integration,
        user: &AuthenticatedUser,
    ) -> AppResult<ProviderSummary> {
        let adapter = self
            .registry
            .get(&integration.provider)
            .ok_or_else(|| AppError::UnsupportedProvider(integration.provider.clone()))?;

        match self
            .dispatch(&adapter, integration, user, &integration.access_token)
            .await
        {
            Err(AppError::ReauthRequired(_)) => {
                debug!(
                    provider = %integration.provider,
                    "access token rejected; attempting refresh"
                );
                let refreshed = self.refresh_tokens(&adapter, integration).await?;
                let summary = self
                    .dispatch(&adapter, integration, user, &refreshed)
                    .await?;
                Ok(summary)
            }
            other => {
                if other.is_ok() {
                    self.db.touch_integration_sync(&integration.id).await?;
                }
                other
            }
        }
    }

    /// Route to the platform-wide view only when the adapter offers one AND
    /// the caller holds the elevated role; everyone else gets the scoped view
    async fn dispatch(
        &self,
        adapter: &Arc<dyn ProviderAdapter>,
        integration: &Integration,
        user: &AuthenticatedUser,
        access_token: &str,
    ) -> AppResult<ProviderSummary> {
        let ctx = FetchContext {
            http: &self.http,
            access_token,
            scoped_id: integration.scopes.as_deref(),
            connected_account: &integration.connected_account,
            last_synced_at: integration.last_synced_at,
            today: today_utc(),
        };

        if adapter.supports_platform_view() && user.is_admin() {
            adapter.fetch_platform(&ctx).await
        } else {
            adapter.fetch(&ctx).await
        }
    }

    /// One refresh attempt. On success the new tokens are persisted (the
    /// stored refresh token is overwritten only when rotated); on failure the
    /// credential is marked as needing reauthorization.
    async fn refresh_tokens(
        &self,
        adapter: &Arc<dyn ProviderAdapter>,
        integration: &Integration,
    ) -> AppResult<String> {
        let auth = adapter.auth();
        let Some(refresh_token) = integration.refresh_token.as_deref() else {
            // Nothing to refresh with; the user has to authorize again
            self.db
                .update_integration_health(&integration.id, CredentialHealth::ReauthRequired)
                .await?;
            return Err(AppError::ReauthRequired(integration.provider.clone()));
        };

        let credentials =
            secrets::client_credentials(&self.db, self.db.cipher(), auth).await?;

        match self.refresher.refresh(auth, refresh_token, &credentials).await {
            Ok(refreshed) => {
                self.db
                    .update_integration_tokens(
                        &integration.id,
                        &refreshed.access_token,
                        refreshed.refresh_token.as_deref(),
                    )
                    .await?;
                Ok(refreshed.access_token)
            }
            Err(e) => {
                if matches!(e, AppError::ReauthRequired(_)) {
                    self.db
                        .update_integration_health(
                            &integration.id,
                            CredentialHealth::ReauthRequired,
                        )
                        .await?;
                }
                Err(e)
            }
        }
    }
}
