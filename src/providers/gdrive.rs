// ABOUTME: Google Drive storage adapter: connectivity check against the About endpoint
// ABOUTME: Drive carries no financial data, so the summary stays connectivity-only
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 OpsVault Contributors

use crate::constants::providers::GDRIVE;
use crate::errors::AppResult;
use crate::models::ProviderSummary;
use crate::oauth::{auth_config, ProviderAuthConfig};
use crate::providers::{check_status, transport_error, FetchContext, ProviderAdapter};
use async_trait::async_trait;
use serde::Deserialize;

const ABOUT_URL: &str = "https://www.googleapis.com/drive/v3/about";

#[derive(Debug, Deserialize)]
struct DriveAbout {
    #[serde(default)]
    user: Option<DriveUser>,
}

#[derive(Debug, Deserialize)]
struct DriveUser {
    #[serde(rename = "emailAddress", default)]
    email_address: Option<String>,
}

/// Storage adapter for Google Drive.
///
/// There are no invoices or transactions to pull; a successful About call
/// proves the credential is live and refreshes the account label.
pub struct GoogleDriveAdapter;

#[async_trait]
impl ProviderAdapter for GoogleDriveAdapter {
    fn name(&self) -> &'static str {
        GDRIVE
    }

    fn auth(&self) -> &'static ProviderAuthConfig {
        auth_config(GDRIVE).unwrap_or_else(|| unreachable!("auth table entry exists"))
    }

    async fn fetch(&self, ctx: &FetchContext<'_>) -> AppResult<ProviderSummary> {
        let response = ctx
            .http
            .get(ABOUT_URL)
            .bearer_auth(ctx.access_token)
            .query(&[("fields", "user,storageQuota")])
            .send()
            .await
            .map_err(|e| transport_error(GDRIVE, &e))?;

        check_status(GDRIVE, &response)?;
        let about: DriveAbout = response
            .json()
            .await
            .map_err(|e| transport_error(GDRIVE, &e))?;

        let account = about
            .user
            .and_then(|u| u.email_address)
            .filter(|email| !email.is_empty())
            .unwrap_or_else(|| ctx.connected_account.to_owned());

        Ok(ProviderSummary::connectivity_only(
            GDRIVE,
            &account,
            ctx.last_synced_at,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn about_response_exposes_the_account_email() {
        let about: DriveAbout = serde_json::from_str(
            r#"{"user": {"emailAddress": "ops@example.com", "displayName": "Ops"}, "storageQuota": {"limit": "1"}}"#,
        )
        .expect("parse");

        assert_eq!(
            about.user.and_then(|u| u.email_address).as_deref(),
            Some("ops@example.com")
        );
    }
}
