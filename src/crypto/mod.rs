// ABOUTME: Credential encryption subsystem: master key loading and the token cipher
// ABOUTME: Key material is injected at construction, never read from ambient globals
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 OpsVault Contributors

/// AES-256-GCM credential cipher and tagged payload format
pub mod cipher;
/// Master key loading and decoding
pub mod keys;

pub use cipher::{EncryptedPayload, StoredSecret, TokenCipher};
pub use keys::MasterKey;
