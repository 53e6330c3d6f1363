// ABOUTME: Server binary: wires the credential store, registry, and routes together
// ABOUTME: Configuration comes from the environment; startup fails fast on bad config
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 OpsVault Contributors

use anyhow::{Context, Result};
use opsvault::aggregator::Aggregator;
use opsvault::config::{ServerConfig, ENCRYPTION_KEY_VAR};
use opsvault::crypto::{MasterKey, TokenCipher};
use opsvault::database::Database;
use opsvault::oauth::AuthorizationFlow;
use opsvault::providers::ProviderRegistry;
use opsvault::routes::{AppContext, IntegrationRoutes};
use std::sync::Arc;
use std::time::Duration;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Arc::new(ServerConfig::from_env().context("failed to load configuration")?);

    let master_key =
        MasterKey::from_env(ENCRYPTION_KEY_VAR).context("failed to load encryption key")?;
    let cipher = TokenCipher::new(&master_key);

    let db = Arc::new(
        Database::new(&config.database_url, cipher)
            .await
            .context("failed to open credential store")?,
    );

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.provider_timeout_secs))
        .build()
        .context("failed to build HTTP client")?;

    let registry = Arc::new(ProviderRegistry::with_defaults());
    let aggregator = Arc::new(Aggregator::new(
        Arc::clone(&db),
        Arc::clone(&registry),
        http.clone(),
        Duration::from_secs(config.provider_timeout_secs),
    ));
    let flow = Arc::new(AuthorizationFlow::new(
        db.as_ref().clone(),
        Arc::clone(&config),
    ));

    let context = Arc::new(AppContext {
        db,
        registry,
        aggregator,
        flow,
        config: Arc::clone(&config),
    });

    // Outer timeout is generous; per-provider timeouts inside the aggregator
    // are what actually bound a slow third party
    let app = IntegrationRoutes::routes(context)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.provider_timeout_secs * 2,
        )));

    let addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!(port = config.http_port, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}
