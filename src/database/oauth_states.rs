// ABOUTME: Ephemeral OAuth state rows for CSRF protection of authorization flows
// ABOUTME: Created at authorization start, consumed at callback, expire after a short TTL
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 OpsVault Contributors

use super::Database;
use crate::errors::{AppError, AppResult};
use crate::models::OAuthState;
use chrono::Utc;
use sqlx::Row;

impl Database {
    /// Persist an anti-forgery state record
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails. Callers in the authorization flow
    /// treat this as non-fatal.
    pub async fn store_oauth_state(&self, state: &OAuthState) -> AppResult<()> {
        sqlx::query(
            r"
            INSERT INTO oauth_states (state, user_id, provider, expires_at, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(&state.state)
        .bind(state.user_id.to_string())
        .bind(&state.provider)
        .bind(state.expires_at)
        .bind(state.created_at)
        .execute(self.pool())
        .await
        .map_err(|e| AppError::database(format!("failed to store oauth state: {e}")))?;

        Ok(())
    }

    /// Look up a still-valid state record.
    ///
    /// Expired records are treated as absent; the row is not deleted here,
    /// natural expiry plus the sweep keeps the table small.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn consume_oauth_state(&self, state: &str) -> AppResult<Option<OAuthState>> {
        let row = sqlx::query(
            "SELECT state, user_id, provider, expires_at, created_at \
             FROM oauth_states WHERE state = $1 AND expires_at > $2",
        )
        .bind(state)
        .bind(Utc::now())
        .fetch_optional(self.pool())
        .await
        .map_err(|e| AppError::database(format!("failed to query oauth state: {e}")))?;

        row.map_or_else(
            || Ok(None),
            |row| {
                let user_id_str: String = row.get("user_id");
                Ok(Some(OAuthState {
                    state: row.get("state"),
                    user_id: uuid::Uuid::parse_str(&user_id_str)?,
                    provider: row.get("provider"),
                    expires_at: row.get("expires_at"),
                    created_at: row.get("created_at"),
                }))
            },
        )
    }

    /// Delete expired state records, returning the number removed
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub async fn sweep_expired_oauth_states(&self) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM oauth_states WHERE expires_at <= $1")
            .bind(Utc::now())
            .execute(self.pool())
            .await
            .map_err(|e| AppError::database(format!("failed to sweep oauth states: {e}")))?;

        Ok(result.rows_affected())
    }
}
