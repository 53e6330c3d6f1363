// ABOUTME: Integration tests for authorization-flow state rows and their TTL
// ABOUTME: Expired states read as absent and are removed by the sweep
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 OpsVault Contributors

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use chrono::{Duration, Utc};
use opsvault::constants::providers;
use opsvault::models::OAuthState;
use uuid::Uuid;

fn state_record(state: &str, minutes_from_now: i64) -> OAuthState {
    let now = Utc::now();
    OAuthState {
        state: state.to_owned(),
        user_id: Uuid::new_v4(),
        provider: providers::STRIPE.to_owned(),
        expires_at: now + Duration::minutes(minutes_from_now),
        created_at: now,
    }
}

#[tokio::test]
async fn valid_state_round_trips() {
    let (db, _dir) = common::test_database().await;
    let record = state_record("abc:stripe", 10);

    db.store_oauth_state(&record).await.expect("store");

    let found = db
        .consume_oauth_state("abc:stripe")
        .await
        .expect("consume")
        .expect("still valid");
    assert_eq!(found.user_id, record.user_id);
    assert_eq!(found.provider, providers::STRIPE);
}

#[tokio::test]
async fn expired_state_reads_as_absent() {
    let (db, _dir) = common::test_database().await;
    let record = state_record("old:stripe", -1);

    db.store_oauth_state(&record).await.expect("store");

    assert!(db
        .consume_oauth_state("old:stripe")
        .await
        .expect("consume")
        .is_none());
}

#[tokio::test]
async fn unknown_state_reads_as_absent() {
    let (db, _dir) = common::test_database().await;
    assert!(db
        .consume_oauth_state("never-stored")
        .await
        .expect("consume")
        .is_none());
}

#[tokio::test]
async fn sweep_removes_only_expired_states() {
    let (db, _dir) = common::test_database().await;

    db.store_oauth_state(&state_record("live:stripe", 10))
        .await
        .expect("store live");
    db.store_oauth_state(&state_record("dead-1:stripe", -5))
        .await
        .expect("store dead");
    db.store_oauth_state(&state_record("dead-2:stripe", -60))
        .await
        .expect("store dead");

    let removed = db.sweep_expired_oauth_states().await.expect("sweep");
    assert_eq!(removed, 2);

    assert!(db
        .consume_oauth_state("live:stripe")
        .await
        .expect("consume")
        .is_some());
}
