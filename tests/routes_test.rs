// ABOUTME: Integration tests for the REST surface using in-process requests
// ABOUTME: Covers provider listing, authorization start, and the admin migration gate
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 OpsVault Contributors

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::{Extension, Router};
use opsvault::aggregator::Aggregator;
use opsvault::config::ServerConfig;
use opsvault::models::{AuthenticatedUser, IntegrationConfig};
use opsvault::oauth::AuthorizationFlow;
use opsvault::providers::ProviderRegistry;
use opsvault::routes::{AppContext, IntegrationRoutes};
use serde_json::Value;
use serial_test::serial;
use std::env;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

async fn test_app(user: AuthenticatedUser) -> (Router, Arc<opsvault::database::Database>, TempDir) {
    let (db, dir) = common::test_database().await;
    let db = Arc::new(db);

    let config = Arc::new(ServerConfig {
        http_port: 0,
        database_url: "unused".to_owned(),
        base_url: "https://vault.example.com".to_owned(),
        provider_timeout_secs: 5,
    });

    let http = reqwest::Client::new();
    let registry = Arc::new(ProviderRegistry::with_defaults());
    let aggregator = Arc::new(Aggregator::new(
        Arc::clone(&db),
        Arc::clone(&registry),
        http,
        Duration::from_secs(5),
    ));
    let flow = Arc::new(AuthorizationFlow::new(
        db.as_ref().clone(),
        Arc::clone(&config),
    ));

    let context = Arc::new(AppContext {
        db: Arc::clone(&db),
        registry,
        aggregator,
        flow,
        config,
    });

    let app = IntegrationRoutes::routes(context).layer(Extension(user));
    (app, db, dir)
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json body")
}

#[tokio::test]
#[serial]
async fn providers_endpoint_offers_only_configured_providers() {
    for provider in ["GDRIVE", "HUBSPOT", "PIPEDRIVE", "QUICKBOOKS", "SALESFORCE", "STRIPE", "ZOHO"]
    {
        env::remove_var(format!("{provider}_CLIENT_ID"));
    }
    // The strict provider must stay hidden even with its variables set
    env::set_var("QUICKBOOKS_CLIENT_ID", "should-be-ignored");
    env::set_var("HUBSPOT_CLIENT_ID", "hs_env_client");

    let (app, db, _dir) = test_app(common::regular_user()).await;
    db.upsert_integration_config(&IntegrationConfig {
        provider: "stripe".to_owned(),
        client_id: "ca_live_configured".to_owned(),
        client_secret: "sk_live_configured".to_owned(),
        enabled: true,
    })
    .await
    .expect("config");

    let response = app
        .oneshot(
            Request::get("/api/integrations/providers")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    env::remove_var("QUICKBOOKS_CLIENT_ID");
    env::remove_var("HUBSPOT_CLIENT_ID");

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["providers"], serde_json::json!(["hubspot", "stripe"]));
}

#[tokio::test]
#[serial]
async fn disabled_provider_is_never_offered() {
    // An explicit disable wins over the environment fallback
    env::set_var("STRIPE_CLIENT_ID", "ca_env_client");
    env::set_var("STRIPE_CLIENT_SECRET", "sk_env_secret");

    let (app, db, _dir) = test_app(common::regular_user()).await;
    db.upsert_integration_config(&IntegrationConfig {
        provider: "stripe".to_owned(),
        client_id: "ca_live_configured".to_owned(),
        client_secret: "sk_live_configured".to_owned(),
        enabled: false,
    })
    .await
    .expect("config");

    let listing = app
        .clone()
        .oneshot(
            Request::get("/api/integrations/providers")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(listing.status(), StatusCode::OK);
    let body = json_body(listing).await;
    assert!(!body["providers"]
        .as_array()
        .unwrap()
        .iter()
        .any(|p| p == "stripe"));

    let authorize = app
        .oneshot(
            Request::post("/api/integrations/stripe/authorize")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    env::remove_var("STRIPE_CLIENT_ID");
    env::remove_var("STRIPE_CLIENT_SECRET");

    assert_eq!(authorize.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(authorize).await;
    assert_eq!(body["error"], "configuration_error");
    assert!(body["message"].as_str().unwrap().contains("disabled"));
}

#[tokio::test]
async fn summary_with_no_connections_reports_disconnected() {
    let (app, _db, _dir) = test_app(common::regular_user()).await;

    let response = app
        .oneshot(
            Request::get("/api/integrations/summary")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["connected"], false);
    assert!(body["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn disconnecting_an_unknown_provider_is_a_bad_request() {
    let (app, _db, _dir) = test_app(common::regular_user()).await;

    let response = app
        .oneshot(
            Request::delete("/api/integrations/netsuite")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"], "unsupported_provider");
}

#[tokio::test]
#[serial]
async fn authorize_builds_a_provider_url_with_state() {
    env::set_var("STRIPE_CLIENT_ID", "ca_test_client");
    env::set_var("STRIPE_CLIENT_SECRET", "sk_test_secret");

    let (app, _db, _dir) = test_app(common::regular_user()).await;
    let response = app
        .oneshot(
            Request::post("/api/integrations/stripe/authorize")
                .header("origin", "https://tenant.example.com")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    env::remove_var("STRIPE_CLIENT_ID");
    env::remove_var("STRIPE_CLIENT_SECRET");

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let url = body["authorization_url"].as_str().unwrap();
    assert!(url.starts_with("https://connect.stripe.com/oauth/authorize?"));
    assert!(url.contains("client_id=ca_test_client"));
    assert!(!url.contains("sk_test_secret"), "secret must never leak");
    assert!(body["state"].as_str().unwrap().ends_with(":stripe"));
}

#[tokio::test]
#[serial]
async fn strict_provider_without_config_fails_with_a_specific_message() {
    // QuickBooks forbids the env fallback even when the variables are set
    env::set_var("QUICKBOOKS_CLIENT_ID", "should-be-ignored");

    let (app, _db, _dir) = test_app(common::regular_user()).await;
    let response = app
        .oneshot(
            Request::post("/api/integrations/quickbooks/authorize")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    env::remove_var("QUICKBOOKS_CLIENT_ID");

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert_eq!(body["error"], "configuration_error");
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("per-tenant OAuth app registration"));
}

#[tokio::test]
async fn migration_endpoint_rejects_regular_users() {
    let (app, _db, _dir) = test_app(common::regular_user()).await;

    let response = app
        .oneshot(
            Request::post("/api/admin/migrate-tokens")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn migration_endpoint_reports_counts_for_admins() {
    let (app, _db, _dir) = test_app(common::admin_user()).await;

    let response = app
        .oneshot(
            Request::post("/api/admin/migrate-tokens")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["tokens"]["migrated"], 0);
    assert_eq!(body["configs"]["migrated"], 0);
}
