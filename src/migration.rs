// ABOUTME: One-shot encryption migration: re-encrypts legacy plaintext secrets
// ABOUTME: Idempotent sweep; already-encrypted values and env indirections are skipped
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 OpsVault Contributors

use crate::crypto::TokenCipher;
use crate::database::Database;
use crate::errors::{AppError, AppResult};
use crate::models::AuthenticatedUser;
use serde::Serialize;
use tracing::{error, info};

/// Counters for one table's sweep
#[derive(Debug, Default, Clone, Copy, Serialize)]
pub struct MigrationCounts {
    /// Rows whose secrets were re-encrypted
    pub migrated: usize,
    /// Rows already encrypted (or env-indirected) and left untouched
    pub skipped: usize,
    /// Rows that failed; the sweep continues past them
    pub errors: usize,
}

/// Outcome of a full migration sweep
#[derive(Debug, Default, Clone, Copy, Serialize)]
pub struct MigrationReport {
    /// Provider connection rows (access and refresh tokens)
    pub tokens: MigrationCounts,
    /// Provider config rows (client secrets)
    pub configs: MigrationCounts,
}

/// Sweep every stored secret and encrypt whatever is still plaintext.
///
/// Safe to run repeatedly: a second pass over a fully-migrated store reports
/// zero migrated. Per-row failures are counted and logged by row id only;
/// the sweep never aborts partway.
///
/// # Errors
///
/// Returns `AppError::Unauthorized` for non-admin callers and a database
/// error if either table cannot be listed.
pub async fn migrate_all(db: &Database, caller: &AuthenticatedUser) -> AppResult<MigrationReport> {
    if !caller.is_admin() {
        return Err(AppError::Unauthorized(
            "encryption migration requires the admin role".to_owned(),
        ));
    }

    let report = MigrationReport {
        tokens: migrate_tokens(db).await?,
        configs: migrate_config_secrets(db).await?,
    };

    info!(
        tokens_migrated = report.tokens.migrated,
        tokens_skipped = report.tokens.skipped,
        tokens_errors = report.tokens.errors,
        configs_migrated = report.configs.migrated,
        configs_skipped = report.configs.skipped,
        configs_errors = report.configs.errors,
        "encryption migration sweep complete"
    );
    Ok(report)
}

async fn migrate_tokens(db: &Database) -> AppResult<MigrationCounts> {
    let mut counts = MigrationCounts::default();
    let cipher = db.cipher();

    for row in db.list_raw_credential_rows().await? {
        let access_needs_work = needs_encryption(&row.access_token);
        let refresh_needs_work = row
            .refresh_token
            .as_deref()
            .is_some_and(|rt| needs_encryption(rt));

        if !access_needs_work && !refresh_needs_work {
            counts.skipped += 1;
            continue;
        }

        let result = (|| -> AppResult<(String, Option<String>)> {
            let access = if access_needs_work {
                cipher.encrypt(&row.access_token)?
            } else {
                row.access_token.clone()
            };
            let refresh = row
                .refresh_token
                .as_deref()
                .map(|rt| {
                    if needs_encryption(rt) {
                        cipher.encrypt(rt)
                    } else {
                        Ok(rt.to_owned())
                    }
                })
                .transpose()?;
            Ok((access, refresh))
        })();

        match result {
            Ok((access, refresh)) => {
                match db
                    .update_raw_credential(&row.id, &access, refresh.as_deref())
                    .await
                {
                    Ok(()) => counts.migrated += 1,
                    Err(e) => {
                        error!(row_id = %row.id, error = %e, "credential row migration failed");
                        counts.errors += 1;
                    }
                }
            }
            Err(e) => {
                error!(row_id = %row.id, error = %e, "credential row encryption failed");
                counts.errors += 1;
            }
        }
    }

    Ok(counts)
}

async fn migrate_config_secrets(db: &Database) -> AppResult<MigrationCounts> {
    let mut counts = MigrationCounts::default();
    let cipher = db.cipher();

    for row in db.list_raw_config_rows().await? {
        if !needs_encryption(&row.client_secret) {
            counts.skipped += 1;
            continue;
        }

        let sealed = match cipher.encrypt(&row.client_secret) {
            Ok(sealed) => sealed,
            Err(e) => {
                error!(provider = %row.provider, error = %e, "config secret encryption failed");
                counts.errors += 1;
                continue;
            }
        };

        match db.update_raw_config_secret(&row.provider, &sealed).await {
            Ok(()) => counts.migrated += 1,
            Err(e) => {
                error!(provider = %row.provider, error = %e, "config row migration failed");
                counts.errors += 1;
            }
        }
    }

    Ok(counts)
}

/// A value needs encryption when it is non-empty, not an env indirection, and
/// not already an encrypted payload
fn needs_encryption(stored: &str) -> bool {
    !stored.is_empty() && !stored.starts_with("env:") && !TokenCipher::is_encrypted(stored)
}
