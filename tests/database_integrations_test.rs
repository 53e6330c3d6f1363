// ABOUTME: Integration tests for provider connection rows in the credential store
// ABOUTME: Covers encryption at rest, the one-credential invariant, and refresh rotation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 OpsVault Contributors

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use opsvault::constants::providers;
use opsvault::crypto::TokenCipher;
use opsvault::models::{CredentialHealth, NewIntegration};

#[tokio::test]
async fn upsert_and_get_round_trips_decrypted_tokens() {
    let (db, _dir) = common::test_database().await;
    let user = common::regular_user();

    let id = db
        .upsert_integration(&NewIntegration {
            user_id: user.id,
            org_id: "",
            provider: providers::STRIPE,
            access_token: "sk_live_access",
            refresh_token: Some("rt_live_refresh"),
            connected_account: "acct_123",
            scopes: Some("cus_987"),
        })
        .await
        .expect("upsert");

    let stored = db
        .get_integration(user.id, providers::STRIPE, "")
        .await
        .expect("get")
        .expect("row exists");

    assert_eq!(stored.id, id);
    assert_eq!(stored.access_token, "sk_live_access");
    assert_eq!(stored.refresh_token.as_deref(), Some("rt_live_refresh"));
    assert_eq!(stored.connected_account, "acct_123");
    assert_eq!(stored.scopes.as_deref(), Some("cus_987"));
    assert_eq!(stored.health, Some(CredentialHealth::Ok));
}

#[tokio::test]
async fn tokens_are_encrypted_at_rest() {
    let (db, _dir) = common::test_database().await;
    let user = common::regular_user();

    db.upsert_integration(&NewIntegration {
        user_id: user.id,
        org_id: "",
        provider: providers::HUBSPOT,
        access_token: "hs_access_token",
        refresh_token: Some("hs_refresh_token"),
        connected_account: "hub-1",
        scopes: None,
    })
    .await
    .expect("upsert");

    let raw = db.list_raw_credential_rows().await.expect("raw rows");
    assert_eq!(raw.len(), 1);
    assert!(TokenCipher::is_encrypted(&raw[0].access_token));
    assert!(TokenCipher::is_encrypted(raw[0].refresh_token.as_deref().unwrap()));
    assert!(!raw[0].access_token.contains("hs_access_token"));
}

#[tokio::test]
async fn reconnect_replaces_the_previous_credential() {
    let (db, _dir) = common::test_database().await;
    let user = common::regular_user();

    for token in ["first_token", "second_token"] {
        db.upsert_integration(&NewIntegration {
            user_id: user.id,
            org_id: "org-1",
            provider: providers::QUICKBOOKS,
            access_token: token,
            refresh_token: None,
            connected_account: "Example Co",
            scopes: Some("realm-42"),
        })
        .await
        .expect("upsert");
    }

    let all = db
        .list_integrations_for_user(user.id)
        .await
        .expect("list");
    assert_eq!(all.len(), 1, "one credential per (user, provider, org)");
    assert_eq!(all[0].access_token, "second_token");
}

#[tokio::test]
async fn reconnect_returns_the_surviving_row_id() {
    let (db, _dir) = common::test_database().await;
    let user = common::regular_user();

    let mut ids = Vec::new();
    for token in ["first_token", "second_token"] {
        let id = db
            .upsert_integration(&NewIntegration {
                user_id: user.id,
                org_id: "org-1",
                provider: providers::QUICKBOOKS,
                access_token: token,
                refresh_token: None,
                connected_account: "Example Co",
                scopes: Some("realm-42"),
            })
            .await
            .expect("upsert");
        ids.push(id);
    }

    // The conflict path keeps the original row, so both upserts must hand
    // back an id that still addresses it
    assert_eq!(ids[0], ids[1]);

    db.update_integration_health(&ids[1], CredentialHealth::ReauthRequired)
        .await
        .expect("health update");

    let stored = db
        .get_integration(user.id, providers::QUICKBOOKS, "org-1")
        .await
        .expect("get")
        .expect("row");
    assert_eq!(stored.id, ids[1]);
    assert_eq!(stored.health, Some(CredentialHealth::ReauthRequired));
}

#[tokio::test]
async fn same_provider_under_different_orgs_coexists() {
    let (db, _dir) = common::test_database().await;
    let user = common::regular_user();

    for org in ["org-a", "org-b"] {
        db.upsert_integration(&NewIntegration {
            user_id: user.id,
            org_id: org,
            provider: providers::QUICKBOOKS,
            access_token: "tok",
            refresh_token: None,
            connected_account: org,
            scopes: None,
        })
        .await
        .expect("upsert");
    }

    let all = db.list_integrations_for_user(user.id).await.expect("list");
    assert_eq!(all.len(), 2);
}

#[tokio::test]
async fn rotated_refresh_token_overwrites_stored_value() {
    let (db, _dir) = common::test_database().await;
    let user = common::regular_user();

    let id = db
        .upsert_integration(&NewIntegration {
            user_id: user.id,
            org_id: "",
            provider: providers::PIPEDRIVE,
            access_token: "old_access",
            refresh_token: Some("old_refresh"),
            connected_account: "pd-1",
            scopes: None,
        })
        .await
        .expect("upsert");

    db.update_integration_tokens(&id, "new_access", Some("new_refresh"))
        .await
        .expect("update");

    let stored = db
        .get_integration(user.id, providers::PIPEDRIVE, "")
        .await
        .expect("get")
        .expect("row");
    assert_eq!(stored.access_token, "new_access");
    assert_eq!(stored.refresh_token.as_deref(), Some("new_refresh"));
    assert!(stored.last_synced_at.is_some());
}

#[tokio::test]
async fn stable_refresh_token_is_preserved_on_update() {
    let (db, _dir) = common::test_database().await;
    let user = common::regular_user();

    let id = db
        .upsert_integration(&NewIntegration {
            user_id: user.id,
            org_id: "",
            provider: providers::SALESFORCE,
            access_token: "old_access",
            refresh_token: Some("stable_refresh"),
            connected_account: "sf-1",
            scopes: Some("https://instance.example.com"),
        })
        .await
        .expect("upsert");

    // Provider did not rotate: pass None, the stored value must survive
    db.update_integration_tokens(&id, "new_access", None)
        .await
        .expect("update");

    let stored = db
        .get_integration(user.id, providers::SALESFORCE, "")
        .await
        .expect("get")
        .expect("row");
    assert_eq!(stored.access_token, "new_access");
    assert_eq!(stored.refresh_token.as_deref(), Some("stable_refresh"));
}

#[tokio::test]
async fn health_transitions_are_persisted() {
    let (db, _dir) = common::test_database().await;
    let user = common::regular_user();

    let id = db
        .upsert_integration(&NewIntegration {
            user_id: user.id,
            org_id: "",
            provider: providers::ZOHO,
            access_token: "tok",
            refresh_token: Some("rt"),
            connected_account: "zoho-1",
            scopes: None,
        })
        .await
        .expect("upsert");

    db.update_integration_health(&id, CredentialHealth::ReauthRequired)
        .await
        .expect("health update");

    let stored = db
        .get_integration(user.id, providers::ZOHO, "")
        .await
        .expect("get")
        .expect("row");
    assert_eq!(stored.health, Some(CredentialHealth::ReauthRequired));
}

#[tokio::test]
async fn disconnect_removes_the_credential() {
    let (db, _dir) = common::test_database().await;
    let user = common::regular_user();

    db.upsert_integration(&NewIntegration {
        user_id: user.id,
        org_id: "",
        provider: providers::GDRIVE,
        access_token: "tok",
        refresh_token: None,
        connected_account: "ops@example.com",
        scopes: None,
    })
    .await
    .expect("upsert");

    db.delete_integration(user.id, providers::GDRIVE, "")
        .await
        .expect("delete");

    assert!(db
        .get_integration(user.id, providers::GDRIVE, "")
        .await
        .expect("get")
        .is_none());
}
