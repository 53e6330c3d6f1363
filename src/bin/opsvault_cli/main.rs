// ABOUTME: Operator CLI: encryption migration sweep and expired-state cleanup
// ABOUTME: Runs against the same store as the server; commands are safe to re-run
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 OpsVault Contributors

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use opsvault::config::{ServerConfig, ENCRYPTION_KEY_VAR};
use opsvault::crypto::{MasterKey, TokenCipher};
use opsvault::database::Database;
use opsvault::migration;
use opsvault::models::{AuthenticatedUser, UserRole};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "opsvault-cli", about = "OpsVault operator tooling", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Re-encrypt any stored secrets still held in plaintext
    MigrateTokens,
    /// Delete expired authorization-flow state rows
    SweepStates,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = ServerConfig::from_env().context("failed to load configuration")?;

    let master_key =
        MasterKey::from_env(ENCRYPTION_KEY_VAR).context("failed to load encryption key")?;
    let cipher = TokenCipher::new(&master_key);

    let db = Database::new(&config.database_url, cipher)
        .await
        .context("failed to open credential store")?;

    match cli.command {
        Command::MigrateTokens => {
            // The CLI runs with operator access; the sweep still goes through
            // the same admin gate the HTTP surface uses
            let operator = AuthenticatedUser {
                id: Uuid::new_v4(),
                role: UserRole::Admin,
            };
            let report = migration::migrate_all(&db, &operator)
                .await
                .context("migration sweep failed")?;
            println!(
                "tokens: {} migrated, {} skipped, {} errors",
                report.tokens.migrated, report.tokens.skipped, report.tokens.errors
            );
            println!(
                "configs: {} migrated, {} skipped, {} errors",
                report.configs.migrated, report.configs.skipped, report.configs.errors
            );
            if report.tokens.errors > 0 || report.configs.errors > 0 {
                anyhow::bail!("migration completed with errors; see logs");
            }
        }
        Command::SweepStates => {
            let removed = db
                .sweep_expired_oauth_states()
                .await
                .context("state sweep failed")?;
            println!("removed {removed} expired authorization states");
        }
    }

    Ok(())
}
