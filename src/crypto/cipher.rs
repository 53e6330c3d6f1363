// ABOUTME: AES-256-GCM credential cipher with a tagged, versioned payload format
// ABOUTME: Plaintext values decrypt as identity to support zero-downtime migration
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 OpsVault Contributors

use crate::crypto::keys::MasterKey;
use crate::errors::{AppError, AppResult};
use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

/// Only payload version this cipher reads or writes
const PAYLOAD_VERSION: u8 = 1;
/// Only algorithm tag this cipher reads or writes
const PAYLOAD_ALGORITHM: &str = "aes-256-gcm";
/// GCM authentication tag length in bytes
const TAG_LEN: usize = 16;

/// Persisted wire format for an encrypted secret.
///
/// Serialized as a single JSON string stored in place of the raw value:
/// `{"v":1,"alg":"aes-256-gcm","iv":"<b64>","ct":"<b64>","tag":"<b64>"}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EncryptedPayload {
    /// Payload format version
    pub v: u8,
    /// Algorithm identifier
    pub alg: String,
    /// Base64-encoded 96-bit initialization vector
    pub iv: String,
    /// Base64-encoded ciphertext (tag excluded)
    pub ct: String,
    /// Base64-encoded 128-bit authentication tag
    pub tag: String,
}

/// Discriminated view of a stored credential value.
///
/// Classification replaces shape-sniffing: the value is `Encrypted` only if it
/// parses into the strict payload schema; everything else is unambiguously a
/// legacy plaintext secret.
#[derive(Debug, Clone)]
pub enum StoredSecret {
    /// Legacy pre-migration plaintext value
    Plaintext(String),
    /// Tagged encrypted payload
    Encrypted(EncryptedPayload),
}

impl StoredSecret {
    /// Classify a stored value as plaintext or encrypted payload
    #[must_use]
    pub fn classify(value: &str) -> Self {
        if !value.trim_start().starts_with('{') {
            return Self::Plaintext(value.to_owned());
        }
        match serde_json::from_str::<EncryptedPayload>(value) {
            Ok(payload) => Self::Encrypted(payload),
            Err(_) => Self::Plaintext(value.to_owned()),
        }
    }
}

/// Symmetric credential cipher for opaque secret strings.
///
/// Pure function of its input and the injected master key; no other state.
pub struct TokenCipher {
    cipher: Aes256Gcm,
}

impl TokenCipher {
    /// Build a cipher from the process master key
    #[must_use]
    pub fn new(key: &MasterKey) -> Self {
        let key = Key::<Aes256Gcm>::from_slice(key.as_bytes());
        Self {
            cipher: Aes256Gcm::new(key),
        }
    }

    /// Whether a stored value is an encrypted payload
    #[must_use]
    pub fn is_encrypted(value: &str) -> bool {
        matches!(StoredSecret::classify(value), StoredSecret::Encrypted(_))
    }

    /// Encrypt a secret into the tagged payload string.
    ///
    /// Empty input encrypts to an empty string so optional credential fields
    /// stay optional.
    ///
    /// # Errors
    ///
    /// Returns an error if encryption or payload serialization fails.
    pub fn encrypt(&self, plaintext: &str) -> AppResult<String> {
        if plaintext.is_empty() {
            return Ok(String::new());
        }

        // Fresh 96-bit IV per call; never reused for this key
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let sealed = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| AppError::internal("AES-GCM encryption failed"))?;

        // aes-gcm appends the tag; the wire format keeps ct and tag separate
        let split_at = sealed.len() - TAG_LEN;
        let (ct, tag) = sealed.split_at(split_at);

        let payload = EncryptedPayload {
            v: PAYLOAD_VERSION,
            alg: PAYLOAD_ALGORITHM.to_owned(),
            iv: STANDARD.encode(nonce),
            ct: STANDARD.encode(ct),
            tag: STANDARD.encode(tag),
        };

        serde_json::to_string(&payload)
            .map_err(|e| AppError::internal(format!("failed to serialize encrypted payload: {e}")))
    }

    /// Decrypt a stored value.
    ///
    /// Values that do not match the payload schema are returned unchanged -
    /// this is the explicit backward-compatibility contract for pre-migration
    /// plaintext secrets.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Decryption` if the payload matches the schema but
    /// carries an unknown version/algorithm, or if the authentication tag does
    /// not verify. Never returns garbled plaintext.
    pub fn decrypt(&self, stored: &str) -> AppResult<String> {
        match StoredSecret::classify(stored) {
            StoredSecret::Plaintext(value) => Ok(value),
            StoredSecret::Encrypted(payload) => self.decrypt_payload(&payload),
        }
    }

    /// Decrypt an already-classified payload
    ///
    /// # Errors
    ///
    /// Returns `AppError::Decryption` on unknown format or tag mismatch.
    pub fn decrypt_payload(&self, payload: &EncryptedPayload) -> AppResult<String> {
        if payload.v != PAYLOAD_VERSION || payload.alg != PAYLOAD_ALGORITHM {
            // Unknown crypto versions fail loudly instead of being mishandled
            return Err(AppError::decryption(format!(
                "unsupported payload format v={} alg={}",
                payload.v, payload.alg
            )));
        }

        let iv = Self::decode_field(&payload.iv, "iv")?;
        let ct = Self::decode_field(&payload.ct, "ct")?;
        let tag = Self::decode_field(&payload.tag, "tag")?;

        if iv.len() != 12 {
            return Err(AppError::decryption("invalid IV length"));
        }
        if tag.len() != TAG_LEN {
            return Err(AppError::decryption("invalid tag length"));
        }

        let mut sealed = ct;
        sealed.extend_from_slice(&tag);

        let nonce = Nonce::from_slice(&iv);
        let plaintext = self
            .cipher
            .decrypt(nonce, sealed.as_ref())
            .map_err(|_| AppError::decryption("authentication tag mismatch"))?;

        String::from_utf8(plaintext)
            .map_err(|_| AppError::decryption("decrypted secret is not valid UTF-8"))
    }

    fn decode_field(value: &str, field: &str) -> AppResult<Vec<u8>> {
        STANDARD
            .decode(value)
            .map_err(|_| AppError::decryption(format!("payload field {field} is not valid base64")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cipher() -> TokenCipher {
        TokenCipher::new(&MasterKey::from_bytes([11u8; 32]))
    }

    #[test]
    fn round_trips_arbitrary_plaintext() {
        let cipher = cipher();
        for plaintext in [
            "tok_abc123",
            r#"{"looks":"like json","but":"is a secret"}"#,
            "sp\u{e9}cial \u{2603} characters",
        ] {
            let sealed = cipher.encrypt(plaintext).expect("encrypt");
            assert!(TokenCipher::is_encrypted(&sealed));
            assert_eq!(cipher.decrypt(&sealed).expect("decrypt"), plaintext);
        }
    }

    #[test]
    fn empty_input_is_a_noop() {
        let cipher = cipher();
        assert_eq!(cipher.encrypt("").expect("encrypt"), "");
        assert!(!TokenCipher::is_encrypted(""));
    }

    #[test]
    fn plaintext_decrypts_as_identity() {
        let cipher = cipher();
        assert_eq!(
            cipher.decrypt("a-plain-token-string").expect("identity"),
            "a-plain-token-string"
        );
        assert!(!TokenCipher::is_encrypted("a-plain-token-string"));
    }

    #[test]
    fn malformed_json_is_treated_as_plaintext() {
        let cipher = cipher();
        let not_a_payload = r#"{"v":1,"alg":"aes-256-gcm"}"#;
        assert!(!TokenCipher::is_encrypted(not_a_payload));
        assert_eq!(cipher.decrypt(not_a_payload).expect("identity"), not_a_payload);
    }

    #[test]
    fn unknown_algorithm_fails_loudly() {
        let cipher = cipher();
        let sealed = cipher.encrypt("secret").expect("encrypt");
        let tampered = sealed.replace("aes-256-gcm", "rot13");
        let err = cipher.decrypt(&tampered).expect_err("must fail");
        assert!(matches!(err, AppError::Decryption(_)));
    }

    #[test]
    fn tampered_ciphertext_is_detected() {
        let cipher = cipher();
        let sealed = cipher.encrypt("secret-token-value").expect("encrypt");
        let mut payload: EncryptedPayload = serde_json::from_str(&sealed).expect("payload");

        let mut ct = STANDARD.decode(&payload.ct).expect("ct");
        ct[0] ^= 0xff;
        payload.ct = STANDARD.encode(&ct);

        let tampered = serde_json::to_string(&payload).expect("json");
        let err = cipher.decrypt(&tampered).expect_err("tamper must fail");
        assert!(matches!(err, AppError::Decryption(_)));
    }

    #[test]
    fn tampered_tag_is_detected() {
        let cipher = cipher();
        let sealed = cipher.encrypt("secret-token-value").expect("encrypt");
        let mut payload: EncryptedPayload = serde_json::from_str(&sealed).expect("payload");

        let mut tag = STANDARD.decode(&payload.tag).expect("tag");
        tag[3] ^= 0x01;
        payload.tag = STANDARD.encode(&tag);

        let tampered = serde_json::to_string(&payload).expect("json");
        let err = cipher.decrypt(&tampered).expect_err("tamper must fail");
        assert!(matches!(err, AppError::Decryption(_)));
    }

    #[test]
    fn iv_is_unique_per_call() {
        let cipher = cipher();
        let a = cipher.encrypt("same input").expect("encrypt");
        let b = cipher.encrypt("same input").expect("encrypt");
        assert_ne!(a, b);
    }
}
