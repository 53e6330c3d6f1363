// ABOUTME: Credential store over SQLite with token encryption at rest
// ABOUTME: Owns schema setup plus raw-value accessors for the migration sweep
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 OpsVault Contributors

/// Provider OAuth app configuration rows
pub mod integration_configs;
/// Per-user provider connection rows
pub mod integrations;
/// Ephemeral anti-forgery state rows
pub mod oauth_states;

use crate::crypto::TokenCipher;
use crate::errors::{AppError, AppResult};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Row, Sqlite};
use std::sync::Arc;
use tracing::info;

/// Credential store handle: connection pool plus the injected token cipher.
///
/// The store is the sole source of truth for coordination; there is no other
/// shared mutable state in the core. Single-row read-after-write consistency
/// is all the design requires.
#[derive(Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
    cipher: Arc<TokenCipher>,
}

/// Raw (undecrypted) credential columns, used only by the migration sweep
#[derive(Debug, Clone)]
pub struct RawCredentialRow {
    /// Row id
    pub id: String,
    /// Stored access token exactly as persisted
    pub access_token: String,
    /// Stored refresh token exactly as persisted
    pub refresh_token: Option<String>,
}

/// Raw provider config columns, used only by the migration sweep
#[derive(Debug, Clone)]
pub struct RawConfigRow {
    /// Provider identifier
    pub provider: String,
    /// Stored client secret exactly as persisted
    pub client_secret: String,
}

impl Database {
    /// Connect to the store and run schema migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection or migration fails.
    pub async fn new(database_url: &str, cipher: TokenCipher) -> AppResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect(database_url)
            .await
            .map_err(|e| AppError::database(format!("failed to connect to {database_url}: {e}")))?;

        let db = Self {
            pool,
            cipher: Arc::new(cipher),
        };
        db.migrate().await?;
        info!("credential store ready");
        Ok(db)
    }

    /// Connection pool accessor for submodules
    pub(crate) const fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Cipher accessor for submodules
    pub(crate) fn cipher(&self) -> &TokenCipher {
        &self.cipher
    }

    async fn migrate(&self) -> AppResult<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS integrations (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                org_id TEXT NOT NULL DEFAULT '',
                provider TEXT NOT NULL,
                access_token TEXT NOT NULL,
                refresh_token TEXT,
                connected_account TEXT NOT NULL DEFAULT '',
                health TEXT,
                scopes TEXT,
                last_synced_at TIMESTAMP,
                created_at TIMESTAMP NOT NULL,
                updated_at TIMESTAMP NOT NULL,
                UNIQUE (user_id, provider, org_id)
            )
            ",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("failed to create integrations table: {e}")))?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS integration_configs (
                provider TEXT PRIMARY KEY,
                client_id TEXT NOT NULL,
                client_secret TEXT NOT NULL,
                enabled INTEGER NOT NULL DEFAULT 1,
                updated_at TIMESTAMP NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::database(format!("failed to create integration_configs table: {e}"))
        })?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS oauth_states (
                state TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                provider TEXT NOT NULL,
                expires_at TIMESTAMP NOT NULL,
                created_at TIMESTAMP NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("failed to create oauth_states table: {e}")))?;

        Ok(())
    }

    /// List credential rows without decryption, for the migration sweep
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list_raw_credential_rows(&self) -> AppResult<Vec<RawCredentialRow>> {
        let rows = sqlx::query("SELECT id, access_token, refresh_token FROM integrations")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("failed to list credential rows: {e}")))?;

        Ok(rows
            .into_iter()
            .map(|row| RawCredentialRow {
                id: row.get("id"),
                access_token: row.get("access_token"),
                refresh_token: row.get("refresh_token"),
            })
            .collect())
    }

    /// Overwrite stored token columns with already-encrypted values
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub async fn update_raw_credential(
        &self,
        id: &str,
        access_token: &str,
        refresh_token: Option<&str>,
    ) -> AppResult<()> {
        sqlx::query(
            r"
            UPDATE integrations
            SET access_token = $2, refresh_token = $3, updated_at = $4
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(access_token)
        .bind(refresh_token)
        .bind(chrono::Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("failed to update credential row: {e}")))?;

        Ok(())
    }

    /// List provider config rows without decryption, for the migration sweep
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list_raw_config_rows(&self) -> AppResult<Vec<RawConfigRow>> {
        let rows = sqlx::query("SELECT provider, client_secret FROM integration_configs")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("failed to list config rows: {e}")))?;

        Ok(rows
            .into_iter()
            .map(|row| RawConfigRow {
                provider: row.get("provider"),
                client_secret: row.get("client_secret"),
            })
            .collect())
    }

    /// Overwrite a stored client secret with an already-encrypted value
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub async fn update_raw_config_secret(
        &self,
        provider: &str,
        client_secret: &str,
    ) -> AppResult<()> {
        sqlx::query(
            r"
            UPDATE integration_configs
            SET client_secret = $2, updated_at = $3
            WHERE provider = $1
            ",
        )
        .bind(provider)
        .bind(client_secret)
        .bind(chrono::Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("failed to update config secret: {e}")))?;

        Ok(())
    }
}
