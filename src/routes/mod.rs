// ABOUTME: REST route handlers for authorization, aggregation, and administration
// ABOUTME: Caller identity arrives as a request extension from the host auth layer
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 OpsVault Contributors

use crate::aggregator::Aggregator;
use crate::config::ServerConfig;
use crate::database::Database;
use crate::errors::AppError;
use crate::migration;
use crate::models::AuthenticatedUser;
use crate::oauth::AuthorizationFlow;
use crate::providers::ProviderRegistry;
use crate::secrets;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Extension, Json, Router};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

/// Shared state handed to every handler
pub struct AppContext {
    /// Credential store
    pub db: Arc<Database>,
    /// Provider adapter registry
    pub registry: Arc<ProviderRegistry>,
    /// Aggregation orchestrator
    pub aggregator: Arc<Aggregator>,
    /// Authorization-flow initiator
    pub flow: Arc<AuthorizationFlow>,
    /// Server configuration
    pub config: Arc<ServerConfig>,
}

/// Integration routes
pub struct IntegrationRoutes;

impl IntegrationRoutes {
    /// Create all integration and admin routes
    pub fn routes(context: Arc<AppContext>) -> Router {
        Router::new()
            .route(
                "/api/integrations/:provider/authorize",
                post(Self::handle_authorize),
            )
            .route("/api/integrations/summary", get(Self::handle_summary))
            .route("/api/integrations/providers", get(Self::handle_providers))
            .route(
                "/api/integrations/:provider",
                delete(Self::handle_disconnect),
            )
            .route("/api/admin/migrate-tokens", post(Self::handle_migrate))
            .with_state(context)
    }

    /// Start the authorization flow for a provider
    async fn handle_authorize(
        State(context): State<Arc<AppContext>>,
        Extension(user): Extension<AuthenticatedUser>,
        Path(provider): Path<String>,
        headers: HeaderMap,
    ) -> Result<Response, AppError> {
        let origin = headers.get("origin").and_then(|v| v.to_str().ok());
        let start = context.flow.start(&provider, &user, origin).await?;
        Ok((StatusCode::OK, Json(start)).into_response())
    }

    /// Aggregate fresh data across every connected provider
    async fn handle_summary(
        State(context): State<Arc<AppContext>>,
        Extension(user): Extension<AuthenticatedUser>,
    ) -> Result<Response, AppError> {
        let result = context.aggregator.aggregate(&user).await?;
        let body = json!({
            "connected": result.connected,
            "data": result.summaries,
        });
        Ok((StatusCode::OK, Json(body)).into_response())
    }

    /// List providers the caller can currently connect.
    ///
    /// Supported-but-unconfigured providers are withheld: offering a provider
    /// whose authorize call is guaranteed to fail helps nobody.
    async fn handle_providers(
        State(context): State<Arc<AppContext>>,
    ) -> Result<Response, AppError> {
        let providers = secrets::connectable_providers(
            &context.db,
            context.db.cipher(),
            &context.registry,
        )
        .await?;
        Ok((StatusCode::OK, Json(json!({ "providers": providers }))).into_response())
    }

    /// Disconnect one provider for the caller
    async fn handle_disconnect(
        State(context): State<Arc<AppContext>>,
        Extension(user): Extension<AuthenticatedUser>,
        Path(provider): Path<String>,
    ) -> Result<Response, AppError> {
        if !context.registry.is_supported(&provider) {
            return Err(AppError::UnsupportedProvider(provider));
        }
        context.db.delete_integration(user.id, &provider, "").await?;
        info!(provider = %provider, user_id = %user.id, "integration disconnected");
        Ok((StatusCode::NO_CONTENT, ()).into_response())
    }

    /// Run the encryption migration sweep (admin only)
    async fn handle_migrate(
        State(context): State<Arc<AppContext>>,
        Extension(user): Extension<AuthenticatedUser>,
    ) -> Result<Response, AppError> {
        let report = migration::migrate_all(&context.db, &user).await?;
        Ok((StatusCode::OK, Json(report)).into_response())
    }
}
