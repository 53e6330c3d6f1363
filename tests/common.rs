// ABOUTME: Shared helpers for integration tests: temp-file store and identities
// ABOUTME: Every test database lives in its own tempdir and uses a fixed test key
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 OpsVault Contributors

#![allow(dead_code)]

use opsvault::crypto::{MasterKey, TokenCipher};
use opsvault::database::Database;
use opsvault::models::{AuthenticatedUser, UserRole};
use tempfile::TempDir;
use uuid::Uuid;

pub const TEST_KEY: [u8; 32] = [7u8; 32];

/// Fresh store backed by a file in its own tempdir. The tempdir must stay
/// alive for the duration of the test.
pub async fn test_database() -> (Database, TempDir) {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("opsvault_test.db");
    let url = format!("sqlite:{}?mode=rwc", path.display());
    let cipher = TokenCipher::new(&MasterKey::from_bytes(TEST_KEY));
    let db = Database::new(&url, cipher).await.expect("database");
    (db, dir)
}

/// Cipher sharing the test database's key, for at-rest assertions
pub fn test_cipher() -> TokenCipher {
    TokenCipher::new(&MasterKey::from_bytes(TEST_KEY))
}

pub fn regular_user() -> AuthenticatedUser {
    AuthenticatedUser {
        id: Uuid::new_v4(),
        role: UserRole::User,
    }
}

pub fn admin_user() -> AuthenticatedUser {
    AuthenticatedUser {
        id: Uuid::new_v4(),
        role: UserRole::Admin,
    }
}
