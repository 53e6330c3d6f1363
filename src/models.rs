// ABOUTME: Shared data model for credential records, provider config, and summaries
// ABOUTME: Provider-agnostic shapes every adapter maps its native schema into
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 OpsVault Contributors

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Privilege tier of an authenticated caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Regular user: customer-scoped views only
    User,
    /// Elevated role: platform-wide views, migration sweep
    Admin,
}

/// Authenticated identity supplied by the host application's auth middleware
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    /// User id
    pub id: Uuid,
    /// Privilege tier
    pub role: UserRole,
}

impl AuthenticatedUser {
    /// Whether this caller holds the elevated role
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

/// Credential health state stored alongside a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialHealth {
    /// Tokens are believed usable
    Ok,
    /// Refresh token rejected; user must repeat the authorization flow
    ReauthRequired,
}

impl CredentialHealth {
    /// Storage representation
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::ReauthRequired => "reauth_required",
        }
    }

    /// Parse the storage representation
    #[must_use]
    pub fn from_str_opt(value: &str) -> Option<Self> {
        match value {
            "ok" => Some(Self::Ok),
            "reauth_required" => Some(Self::ReauthRequired),
            _ => None,
        }
    }
}

/// One stored provider connection: a (user, provider[, org]) credential row.
///
/// Tokens on this struct are the decrypted values; the store encrypts at rest.
/// `scopes` carries provider-specific auxiliary data captured at connect time
/// (QuickBooks realm id, Salesforce instance URL, Stripe customer id).
#[derive(Debug, Clone)]
pub struct Integration {
    /// Row id
    pub id: String,
    /// Owning user
    pub user_id: Uuid,
    /// Organization scope; empty string when the provider is user-scoped
    pub org_id: String,
    /// Provider identifier (registry key)
    pub provider: String,
    /// Decrypted access token
    pub access_token: String,
    /// Decrypted refresh token, if the provider issues one
    pub refresh_token: Option<String>,
    /// Free-form connected-account label shown to the user
    pub connected_account: String,
    /// Credential health, unset until first observed
    pub health: Option<CredentialHealth>,
    /// Provider-specific auxiliary data (scoped identifiers)
    pub scopes: Option<String>,
    /// Last successful sync or token refresh
    pub last_synced_at: Option<DateTime<Utc>>,
    /// Row creation time
    pub created_at: DateTime<Utc>,
    /// Last row update time
    pub updated_at: DateTime<Utc>,
}

/// Fields for inserting or replacing a provider connection
#[derive(Debug, Clone)]
pub struct NewIntegration<'a> {
    /// Owning user
    pub user_id: Uuid,
    /// Organization scope; empty string when user-scoped
    pub org_id: &'a str,
    /// Provider identifier
    pub provider: &'a str,
    /// Plaintext access token (encrypted before storage)
    pub access_token: &'a str,
    /// Plaintext refresh token (encrypted before storage)
    pub refresh_token: Option<&'a str>,
    /// Connected-account label
    pub connected_account: &'a str,
    /// Provider-specific auxiliary data
    pub scopes: Option<&'a str>,
}

/// Per-provider OAuth app configuration.
///
/// `client_id` and `client_secret` each hold a plain value, an `env:NAME`
/// indirection, or an encrypted payload.
#[derive(Debug, Clone)]
pub struct IntegrationConfig {
    /// Provider identifier
    pub provider: String,
    /// OAuth client id (possibly indirected or encrypted)
    pub client_id: String,
    /// OAuth client secret (possibly indirected or encrypted)
    pub client_secret: String,
    /// Whether this provider may be offered to users
    pub enabled: bool,
}

/// Ephemeral anti-forgery record for one authorization attempt
#[derive(Debug, Clone)]
pub struct OAuthState {
    /// Random state token as sent to the provider
    pub state: String,
    /// Owning user
    pub user_id: Uuid,
    /// Provider identifier
    pub provider: String,
    /// Expiry (short TTL, 10 minutes)
    pub expires_at: DateTime<Utc>,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

/// Normalized invoice status vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    /// Settled in full
    Paid,
    /// Open with a due date today or in the future (or none)
    Unpaid,
    /// Open with a due date strictly in the past
    Overdue,
    /// Not yet issued
    Draft,
}

/// Normalized transaction direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    /// Money in
    Income,
    /// Money out
    Expense,
}

/// Normalized invoice in the unified summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    /// Provider-native invoice id
    pub id: String,
    /// Human-facing invoice number
    pub number: String,
    /// Customer display name
    pub customer_name: String,
    /// Amount in major currency units
    pub amount: f64,
    /// ISO currency code
    pub currency: String,
    /// Normalized status
    pub status: InvoiceStatus,
    /// Due date, if the provider exposes one
    pub due_date: Option<NaiveDate>,
    /// Creation date
    pub created_date: Option<NaiveDate>,
}

/// Normalized transaction in the unified summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    /// Provider-native transaction id
    pub id: String,
    /// Transaction date
    pub date: Option<NaiveDate>,
    /// Free-form description
    pub description: String,
    /// Signed amount in major units (negative for outflows where native)
    pub amount: f64,
    /// Normalized direction
    pub kind: TransactionKind,
}

/// Cash-flow snapshot for one provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CashFlow {
    /// Current balance in major units
    pub balance: f64,
    /// Income over the period
    pub income: f64,
    /// Expenses over the period
    pub expenses: f64,
    /// ISO currency code
    pub currency: String,
    /// Period label (e.g. "last_30_days")
    pub period: String,
}

/// Derived metrics over the normalized invoice list
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SummaryMetrics {
    /// Sum of unpaid + overdue invoice amounts
    pub total_receivable: f64,
    /// Sum of amounts owed outward
    pub total_payable: f64,
    /// Count of overdue invoices
    pub overdue_count: usize,
    /// Count of invoices due within the upcoming window
    pub upcoming_count: usize,
}

/// Provider-agnostic summary produced by each data adapter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSummary {
    /// Provider identifier
    pub provider: String,
    /// Connected-account label
    pub connected_account: String,
    /// Last sync timestamp
    pub last_synced_at: Option<DateTime<Utc>>,
    /// Optional cash-flow snapshot
    pub cash_flow: Option<CashFlow>,
    /// Normalized invoices
    pub invoices: Vec<Invoice>,
    /// Normalized transactions
    pub transactions: Vec<Transaction>,
    /// Derived metrics
    pub metrics: SummaryMetrics,
}

impl ProviderSummary {
    /// Empty summary carrying only connectivity information
    #[must_use]
    pub fn connectivity_only(
        provider: &str,
        connected_account: &str,
        last_synced_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            provider: provider.to_owned(),
            connected_account: connected_account.to_owned(),
            last_synced_at,
            cash_flow: None,
            invoices: Vec::new(),
            transactions: Vec::new(),
            metrics: SummaryMetrics::default(),
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => f.write_str("user"),
            Self::Admin => f.write_str("admin"),
        }
    }
}
