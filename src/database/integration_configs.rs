// ABOUTME: Provider OAuth app configuration rows: client id/secret and enabled flag
// ABOUTME: Stored values may be plaintext, env: indirections, or encrypted payloads
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 OpsVault Contributors

use super::Database;
use crate::errors::{AppError, AppResult};
use crate::models::IntegrationConfig;
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

impl Database {
    /// Insert or replace a provider configuration.
    ///
    /// The client secret is encrypted before storage; the client id is kept
    /// as given (it may be an `env:` indirection that must survive verbatim).
    ///
    /// # Errors
    ///
    /// Returns an error if encryption or the upsert fails.
    pub async fn upsert_integration_config(&self, config: &IntegrationConfig) -> AppResult<()> {
        // env: indirections stay verbatim so the resolver can follow them later
        let stored_secret = if config.client_secret.starts_with("env:") {
            config.client_secret.clone()
        } else {
            self.cipher().encrypt(&config.client_secret)?
        };

        sqlx::query(
            r"
            INSERT INTO integration_configs (provider, client_id, client_secret, enabled, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (provider)
            DO UPDATE SET
                client_id = EXCLUDED.client_id,
                client_secret = EXCLUDED.client_secret,
                enabled = EXCLUDED.enabled,
                updated_at = EXCLUDED.updated_at
            ",
        )
        .bind(&config.provider)
        .bind(&config.client_id)
        .bind(&stored_secret)
        .bind(config.enabled)
        .bind(Utc::now())
        .execute(self.pool())
        .await
        .map_err(|e| AppError::database(format!("failed to upsert integration config: {e}")))?;

        Ok(())
    }

    /// Get one provider configuration with stored (unresolved) values
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn get_integration_config(
        &self,
        provider: &str,
    ) -> AppResult<Option<IntegrationConfig>> {
        let row = sqlx::query(
            "SELECT provider, client_id, client_secret, enabled \
             FROM integration_configs WHERE provider = $1",
        )
        .bind(provider)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| AppError::database(format!("failed to query integration config: {e}")))?;

        Ok(row.map(|row| Self::row_to_config(&row)))
    }

    /// List all provider configurations
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list_integration_configs(&self) -> AppResult<Vec<IntegrationConfig>> {
        let rows = sqlx::query(
            "SELECT provider, client_id, client_secret, enabled \
             FROM integration_configs ORDER BY provider",
        )
        .fetch_all(self.pool())
        .await
        .map_err(|e| AppError::database(format!("failed to list integration configs: {e}")))?;

        Ok(rows.iter().map(Self::row_to_config).collect())
    }

    fn row_to_config(row: &SqliteRow) -> IntegrationConfig {
        IntegrationConfig {
            provider: row.get("provider"),
            client_id: row.get("client_id"),
            client_secret: row.get("client_secret"),
            enabled: row.get("enabled"),
        }
    }
}
