// ABOUTME: Application constants: provider identifiers and OAuth flow tunables
// ABOUTME: Single source of truth for registry keys used across storage and routes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 OpsVault Contributors

/// Provider identifiers used as registry and storage keys
pub mod providers {
    /// Accounting provider (strict per-tenant OAuth app registration)
    pub const QUICKBOOKS: &str = "quickbooks";
    /// Payments provider (platform-wide and customer-scoped views)
    pub const STRIPE: &str = "stripe";
    /// CRM provider
    pub const HUBSPOT: &str = "hubspot";
    /// CRM provider
    pub const SALESFORCE: &str = "salesforce";
    /// CRM provider
    pub const ZOHO: &str = "zoho";
    /// CRM provider
    pub const PIPEDRIVE: &str = "pipedrive";
    /// File-storage provider
    pub const GDRIVE: &str = "gdrive";
}

/// OAuth flow tunables
pub mod oauth_flow {
    /// TTL for anti-forgery state records
    pub const STATE_EXPIRES_MINUTES: i64 = 10;
    /// Window for counting an invoice as an upcoming payment
    pub const UPCOMING_PAYMENT_DAYS: i64 = 30;
}
