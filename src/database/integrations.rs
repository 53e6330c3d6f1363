// ABOUTME: Provider connection rows: one credential per (user, provider, org) tuple
// ABOUTME: Tokens are encrypted before insert and decrypted with plaintext passthrough
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 OpsVault Contributors

use super::Database;
use crate::errors::{AppError, AppResult};
use crate::models::{CredentialHealth, Integration, NewIntegration};
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

const INTEGRATION_COLUMNS: &str = "id, user_id, org_id, provider, access_token, refresh_token, \
     connected_account, health, scopes, last_synced_at, created_at, updated_at";

impl Database {
    /// Insert or replace a provider connection, returning the row id.
    ///
    /// The UNIQUE (user, provider, org) constraint enforces the at-most-one
    /// active credential invariant; a reconnect replaces the previous row.
    /// On conflict the existing row keeps its id, so the returned id comes
    /// from the database rather than the freshly generated one.
    ///
    /// # Errors
    ///
    /// Returns an error if encryption or the upsert fails.
    pub async fn upsert_integration(&self, new: &NewIntegration<'_>) -> AppResult<String> {
        let encrypted_access = self.cipher().encrypt(new.access_token)?;
        let encrypted_refresh = new
            .refresh_token
            .map(|rt| self.cipher().encrypt(rt))
            .transpose()?;

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            r"
            INSERT INTO integrations (
                id, user_id, org_id, provider, access_token, refresh_token,
                connected_account, health, scopes, last_synced_at, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (user_id, provider, org_id)
            DO UPDATE SET
                access_token = EXCLUDED.access_token,
                refresh_token = EXCLUDED.refresh_token,
                connected_account = EXCLUDED.connected_account,
                health = EXCLUDED.health,
                scopes = EXCLUDED.scopes,
                last_synced_at = EXCLUDED.last_synced_at,
                updated_at = EXCLUDED.updated_at
            RETURNING id
            ",
        )
        .bind(&id)
        .bind(new.user_id.to_string())
        .bind(new.org_id)
        .bind(new.provider)
        .bind(&encrypted_access)
        .bind(encrypted_refresh.as_deref())
        .bind(new.connected_account)
        .bind(CredentialHealth::Ok.as_str())
        .bind(new.scopes)
        .bind(now)
        .bind(now)
        .bind(now)
        .fetch_one(self.pool())
        .await
        .map_err(|e| AppError::database(format!("failed to upsert integration: {e}")))
        .map(|row| row.get("id"))
    }

    /// Get one provider connection for a user
    ///
    /// # Errors
    ///
    /// Returns an error if the query or token decryption fails.
    pub async fn get_integration(
        &self,
        user_id: Uuid,
        provider: &str,
        org_id: &str,
    ) -> AppResult<Option<Integration>> {
        let row = sqlx::query(&format!(
            "SELECT {INTEGRATION_COLUMNS} FROM integrations \
             WHERE user_id = $1 AND provider = $2 AND org_id = $3"
        ))
        .bind(user_id.to_string())
        .bind(provider)
        .bind(org_id)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| AppError::database(format!("failed to query integration: {e}")))?;

        row.map_or_else(|| Ok(None), |row| Ok(Some(self.row_to_integration(&row)?)))
    }

    /// List all provider connections for a user
    ///
    /// # Errors
    ///
    /// Returns an error if the query or token decryption fails.
    pub async fn list_integrations_for_user(&self, user_id: Uuid) -> AppResult<Vec<Integration>> {
        let rows = sqlx::query(&format!(
            "SELECT {INTEGRATION_COLUMNS} FROM integrations \
             WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id.to_string())
        .fetch_all(self.pool())
        .await
        .map_err(|e| AppError::database(format!("failed to list integrations: {e}")))?;

        let mut integrations = Vec::with_capacity(rows.len());
        for row in rows {
            integrations.push(self.row_to_integration(&row)?);
        }
        Ok(integrations)
    }

    /// Persist tokens after a successful refresh.
    ///
    /// Only overwrites the stored refresh token when the provider actually
    /// rotated it; providers with stable refresh tokens return none and the
    /// stored value is kept. Also marks health `ok` and bumps `last_synced_at`.
    ///
    /// # Errors
    ///
    /// Returns an error if encryption or the update fails.
    pub async fn update_integration_tokens(
        &self,
        id: &str,
        access_token: &str,
        rotated_refresh_token: Option<&str>,
    ) -> AppResult<()> {
        let encrypted_access = self.cipher().encrypt(access_token)?;
        let now = Utc::now();

        if let Some(refresh) = rotated_refresh_token {
            let encrypted_refresh = self.cipher().encrypt(refresh)?;
            sqlx::query(
                r"
                UPDATE integrations
                SET access_token = $2, refresh_token = $3, health = $4,
                    last_synced_at = $5, updated_at = $5
                WHERE id = $1
                ",
            )
            .bind(id)
            .bind(&encrypted_access)
            .bind(&encrypted_refresh)
            .bind(CredentialHealth::Ok.as_str())
            .bind(now)
            .execute(self.pool())
            .await
        } else {
            sqlx::query(
                r"
                UPDATE integrations
                SET access_token = $2, health = $3, last_synced_at = $4, updated_at = $4
                WHERE id = $1
                ",
            )
            .bind(id)
            .bind(&encrypted_access)
            .bind(CredentialHealth::Ok.as_str())
            .bind(now)
            .execute(self.pool())
            .await
        }
        .map_err(|e| AppError::database(format!("failed to update integration tokens: {e}")))?;

        Ok(())
    }

    /// Update credential health
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub async fn update_integration_health(
        &self,
        id: &str,
        health: CredentialHealth,
    ) -> AppResult<()> {
        sqlx::query("UPDATE integrations SET health = $2, updated_at = $3 WHERE id = $1")
            .bind(id)
            .bind(health.as_str())
            .bind(Utc::now())
            .execute(self.pool())
            .await
            .map_err(|e| AppError::database(format!("failed to update integration health: {e}")))?;

        Ok(())
    }

    /// Mark a successful sync
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub async fn touch_integration_sync(&self, id: &str) -> AppResult<()> {
        let now = Utc::now();
        sqlx::query("UPDATE integrations SET last_synced_at = $2, updated_at = $2 WHERE id = $1")
            .bind(id)
            .bind(now)
            .execute(self.pool())
            .await
            .map_err(|e| AppError::database(format!("failed to touch integration sync: {e}")))?;

        Ok(())
    }

    /// Delete a provider connection (disconnect)
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub async fn delete_integration(
        &self,
        user_id: Uuid,
        provider: &str,
        org_id: &str,
    ) -> AppResult<()> {
        sqlx::query(
            "DELETE FROM integrations WHERE user_id = $1 AND provider = $2 AND org_id = $3",
        )
        .bind(user_id.to_string())
        .bind(provider)
        .bind(org_id)
        .execute(self.pool())
        .await
        .map_err(|e| AppError::database(format!("failed to delete integration: {e}")))?;

        Ok(())
    }

    fn row_to_integration(&self, row: &SqliteRow) -> AppResult<Integration> {
        let user_id_str: String = row.get("user_id");
        let user_id = Uuid::parse_str(&user_id_str)?;

        // Decrypt-with-passthrough: legacy plaintext rows keep working until
        // the migration sweep re-encrypts them
        let stored_access: String = row.get("access_token");
        let access_token = self.cipher().decrypt(&stored_access)?;

        let stored_refresh: Option<String> = row.get("refresh_token");
        let refresh_token = stored_refresh
            .as_deref()
            .map(|rt| self.cipher().decrypt(rt))
            .transpose()?;

        let health = row
            .get::<Option<String>, _>("health")
            .as_deref()
            .and_then(CredentialHealth::from_str_opt);

        Ok(Integration {
            id: row.get("id"),
            user_id,
            org_id: row.get("org_id"),
            provider: row.get("provider"),
            access_token,
            refresh_token,
            connected_account: row.get("connected_account"),
            health,
            scopes: row.get("scopes"),
            last_synced_at: row.get("last_synced_at"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }
}
