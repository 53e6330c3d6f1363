// ABOUTME: Master encryption key loading and decoding for the credential cipher
// ABOUTME: Accepts base64, hex, or raw passphrase encodings and zeroizes on drop
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 OpsVault Contributors

use crate::errors::{AppError, AppResult};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use std::env;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Process-wide 256-bit master key for credential encryption.
///
/// Constructed once at startup and passed by dependency injection into
/// [`crate::crypto::cipher::TokenCipher`]. Never logged, never cloned out
/// as raw bytes beyond the cipher construction path.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct MasterKey([u8; 32]);

impl MasterKey {
    /// Wrap raw key bytes (primarily for tests)
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Load the key from a named environment variable.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Configuration` if the variable is unset or the value
    /// matches none of the accepted encodings. The error message names the
    /// variable but never echoes its value.
    pub fn from_env(var: &str) -> AppResult<Self> {
        let raw = env::var(var).map_err(|_| {
            AppError::config(format!(
                "encryption key variable {var} is not set; credential encryption cannot start"
            ))
        })?;
        Self::decode(&raw).map_err(|e| {
            AppError::config(format!("encryption key variable {var} is malformed: {e}"))
        })
    }

    /// Decode a key from its textual form.
    ///
    /// Accepted encodings, tried in order:
    /// 1. base64 of exactly 32 raw bytes
    /// 2. 64-character hex
    /// 3. a 32-character raw passphrase
    ///
    /// # Errors
    ///
    /// Returns `AppError::Configuration` when no encoding matches.
    pub fn decode(raw: &str) -> AppResult<Self> {
        let raw = raw.trim();

        if let Ok(decoded) = STANDARD.decode(raw) {
            if decoded.len() == 32 {
                let mut key = [0u8; 32];
                key.copy_from_slice(&decoded);
                return Ok(Self(key));
            }
        }

        if raw.len() == 64 {
            if let Ok(decoded) = hex::decode(raw) {
                let mut key = [0u8; 32];
                key.copy_from_slice(&decoded);
                return Ok(Self(key));
            }
        }

        if raw.len() == 32 {
            let mut key = [0u8; 32];
            key.copy_from_slice(raw.as_bytes());
            return Ok(Self(key));
        }

        Err(AppError::config(
            "expected 32-byte base64, 64-character hex, or a 32-character passphrase",
        ))
    }

    /// Borrow the raw key bytes for cipher construction
    #[must_use]
    pub(crate) const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MasterKey(<redacted>)")
    }
}
