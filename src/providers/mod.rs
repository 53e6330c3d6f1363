// ABOUTME: Provider adapter trait and the startup-built registry keyed by provider name
// ABOUTME: Adding a provider is additive: implement the trait, register the adapter
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 OpsVault Contributors

/// File-storage provider adapter
pub mod gdrive;
/// CRM provider adapter
pub mod hubspot;
/// Shared status/amount normalization helpers
pub mod normalize;
/// CRM provider adapter
pub mod pipedrive;
/// Accounting provider adapter (strict OAuth)
pub mod quickbooks;
/// CRM provider adapter
pub mod salesforce;
/// Payments provider adapter (platform and customer-scoped views)
pub mod stripe;
/// CRM provider adapter
pub mod zoho;

use crate::errors::{AppError, AppResult};
use crate::models::ProviderSummary;
use crate::oauth::ProviderAuthConfig;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::Arc;

/// Everything an adapter needs for one fetch: a resolved access token, the
/// provider-scoped identifier captured at connect time (when the provider
/// requires one), and the shared HTTP client
pub struct FetchContext<'a> {
    /// Shared HTTP client with request timeouts applied
    pub http: &'a reqwest::Client,
    /// Resolved (decrypted) access token
    pub access_token: &'a str,
    /// Secondary scoped identifier from the credential's auxiliary field
    /// (accounting company id, CRM instance URL, external customer id)
    pub scoped_id: Option<&'a str>,
    /// Connected-account label from the credential record
    pub connected_account: &'a str,
    /// Last successful sync, echoed into the summary
    pub last_synced_at: Option<DateTime<Utc>>,
    /// Calendar date used for overdue/upcoming determination
    pub today: NaiveDate,
}

/// One provider's data adapter: speaks that provider's REST dialect and maps
/// its native schema into the shared summary shape
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Registry key
    fn name(&self) -> &'static str;

    /// OAuth endpoint configuration for this provider
    fn auth(&self) -> &'static ProviderAuthConfig;

    /// Fetch and normalize this provider's data for one connection
    async fn fetch(&self, ctx: &FetchContext<'_>) -> AppResult<ProviderSummary>;

    /// Whether this adapter offers a platform-wide privileged view
    fn supports_platform_view(&self) -> bool {
        false
    }

    /// Platform-wide view, usable only by an elevated role. The orchestrator
    /// enforces the privilege check; adapters without a platform view refuse.
    async fn fetch_platform(&self, _ctx: &FetchContext<'_>) -> AppResult<ProviderSummary> {
        Err(AppError::Unauthorized(format!(
            "provider {} has no platform-wide view",
            self.name()
        )))
    }
}

/// Registry mapping provider identifier to adapter, built once at startup
pub struct ProviderRegistry {
    adapters: HashMap<&'static str, Arc<dyn ProviderAdapter>>,
}

impl ProviderRegistry {
    /// Empty registry (tests register their own adapters)
    #[must_use]
    pub fn new() -> Self {
        Self {
            adapters: HashMap::new(),
        }
    }

    /// Registry with every built-in adapter registered
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(quickbooks::QuickBooksAdapter));
        registry.register(Arc::new(stripe::StripeAdapter));
        registry.register(Arc::new(hubspot::HubSpotAdapter));
        registry.register(Arc::new(salesforce::SalesforceAdapter));
        registry.register(Arc::new(zoho::ZohoAdapter));
        registry.register(Arc::new(pipedrive::PipedriveAdapter));
        registry.register(Arc::new(gdrive::GoogleDriveAdapter));
        registry
    }

    /// Register an adapter under its own name
    pub fn register(&mut self, adapter: Arc<dyn ProviderAdapter>) {
        self.adapters.insert(adapter.name(), adapter);
    }

    /// Look up an adapter
    #[must_use]
    pub fn get(&self, provider: &str) -> Option<Arc<dyn ProviderAdapter>> {
        self.adapters.get(provider).cloned()
    }

    /// Whether a provider name is registered
    #[must_use]
    pub fn is_supported(&self, provider: &str) -> bool {
        self.adapters.contains_key(provider)
    }

    /// Sorted list of registered provider names
    #[must_use]
    pub fn supported_providers(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.adapters.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Map a provider HTTP response status into the error taxonomy: 401 means the
/// token is no longer usable (refresh or reauth), anything else non-2xx is a
/// transient provider failure
pub(crate) fn check_status(provider: &str, response: &reqwest::Response) -> AppResult<()> {
    let status = response.status();
    if status == reqwest::StatusCode::UNAUTHORIZED {
        return Err(AppError::ReauthRequired(provider.to_owned()));
    }
    if !status.is_success() {
        return Err(AppError::provider_unavailable(
            provider,
            format!("HTTP {status}"),
        ));
    }
    Ok(())
}

/// Map a reqwest transport error into a transient provider failure
pub(crate) fn transport_error(provider: &str, e: &reqwest::Error) -> AppError {
    // reqwest errors can embed URLs with query strings; keep only the class
    let class = if e.is_timeout() {
        "timeout"
    } else if e.is_connect() {
        "connect failure"
    } else {
        "transport failure"
    };
    AppError::provider_unavailable(provider, class)
}

/// Today's date in UTC, the adapters' shared reference point
#[must_use]
pub fn today_utc() -> NaiveDate {
    Utc::now().date_naive()
}
