// ABOUTME: Integration tests for the plaintext-to-encrypted migration sweep
// ABOUTME: Verifies idempotency, env-indirection skipping, and the admin gate
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 OpsVault Contributors

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use opsvault::constants::providers;
use opsvault::crypto::TokenCipher;
use opsvault::errors::AppError;
use opsvault::migration;
use opsvault::models::{IntegrationConfig, NewIntegration};

/// Seed a connection row, then force its stored tokens back to plaintext the
/// way a pre-encryption deployment would have written them
async fn seed_plaintext_credential(
    db: &opsvault::database::Database,
    provider: &str,
    access: &str,
    refresh: Option<&str>,
) -> String {
    let user = common::regular_user();
    let id = db
        .upsert_integration(&NewIntegration {
            user_id: user.id,
            org_id: "",
            provider,
            access_token: "placeholder",
            refresh_token: refresh.map(|_| "placeholder"),
            connected_account: "legacy",
            scopes: None,
        })
        .await
        .expect("upsert");
    db.update_raw_credential(&id, access, refresh)
        .await
        .expect("force plaintext");
    id
}

#[tokio::test]
async fn sweep_encrypts_legacy_plaintext_rows() {
    let (db, _dir) = common::test_database().await;
    let admin = common::admin_user();

    seed_plaintext_credential(&db, providers::STRIPE, "legacy_access", Some("legacy_refresh"))
        .await;
    seed_plaintext_credential(&db, providers::HUBSPOT, "legacy_hs", None).await;

    let report = migration::migrate_all(&db, &admin).await.expect("sweep");
    assert_eq!(report.tokens.migrated, 2);
    assert_eq!(report.tokens.skipped, 0);
    assert_eq!(report.tokens.errors, 0);

    for row in db.list_raw_credential_rows().await.expect("raw rows") {
        assert!(TokenCipher::is_encrypted(&row.access_token));
        if let Some(refresh) = &row.refresh_token {
            assert!(TokenCipher::is_encrypted(refresh));
        }
    }
}

#[tokio::test]
async fn migrated_rows_still_decrypt_to_the_original_secret() {
    let (db, _dir) = common::test_database().await;
    let admin = common::admin_user();
    let cipher = common::test_cipher();

    seed_plaintext_credential(&db, providers::ZOHO, "the_original_token", None).await;
    migration::migrate_all(&db, &admin).await.expect("sweep");

    let raw = db.list_raw_credential_rows().await.expect("raw rows");
    assert_eq!(
        cipher.decrypt(&raw[0].access_token).expect("decrypt"),
        "the_original_token"
    );
}

#[tokio::test]
async fn second_sweep_is_a_noop() {
    let (db, _dir) = common::test_database().await;
    let admin = common::admin_user();

    seed_plaintext_credential(&db, providers::STRIPE, "legacy", Some("legacy_rt")).await;
    seed_plaintext_credential(&db, providers::GDRIVE, "legacy_g", None).await;

    let first = migration::migrate_all(&db, &admin).await.expect("first");
    assert_eq!(first.tokens.migrated, 2);

    let second = migration::migrate_all(&db, &admin).await.expect("second");
    assert_eq!(second.tokens.migrated, 0);
    assert_eq!(second.tokens.skipped, 2);
    assert_eq!(second.tokens.errors, 0);
}

#[tokio::test]
async fn env_indirected_config_secrets_are_skipped() {
    let (db, _dir) = common::test_database().await;
    let admin = common::admin_user();

    db.upsert_integration_config(&IntegrationConfig {
        provider: providers::STRIPE.to_owned(),
        client_id: "client-id".to_owned(),
        client_secret: "env:STRIPE_SECRET".to_owned(),
        enabled: true,
    })
    .await
    .expect("config upsert");

    let report = migration::migrate_all(&db, &admin).await.expect("sweep");
    assert_eq!(report.configs.migrated, 0);
    assert_eq!(report.configs.skipped, 1);

    let raw = db.list_raw_config_rows().await.expect("raw configs");
    assert_eq!(raw[0].client_secret, "env:STRIPE_SECRET");
}

#[tokio::test]
async fn non_admin_callers_are_rejected() {
    let (db, _dir) = common::test_database().await;
    let user = common::regular_user();

    let err = migration::migrate_all(&db, &user)
        .await
        .expect_err("must be rejected");
    assert!(matches!(err, AppError::Unauthorized(_)));
}
