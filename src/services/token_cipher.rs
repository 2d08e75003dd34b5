// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Symmetric encryption for OAuth tokens at rest.
//!
//! AES-256-GCM with a key derived from the configured master secret via
//! HKDF-SHA256. The athlete ID is bound as associated data, so a ciphertext
//! copied onto another user's document fails to decrypt. Stored format is
//! base64(nonce || ciphertext || tag).

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use hkdf::Hkdf;
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::rand::{SecureRandom, SystemRandom};
use sha2::Sha256;
use std::sync::Arc;

use crate::error::AppError;

const HKDF_SALT: &[u8] = b"stride-dashboard token cipher";
const HKDF_INFO: &[u8] = b"strava-oauth-tokens v1";

#[derive(Debug, thiserror::Error)]
pub enum CipherError {
    #[error("Key derivation failed")]
    KeyDerivation,
    #[error("Encryption failed")]
    Seal,
    #[error("Decryption failed")]
    Open,
    #[error("Malformed ciphertext: {0}")]
    Malformed(String),
}

impl From<CipherError> for AppError {
    fn from(err: CipherError) -> Self {
        AppError::Internal(anyhow::anyhow!(err))
    }
}

/// Token encryption service.
#[derive(Clone)]
pub struct TokenCipher {
    key: Arc<LessSafeKey>,
    rng: SystemRandom,
}

impl TokenCipher {
    pub fn new(master_key: &[u8]) -> Result<Self, CipherError> {
        let hk = Hkdf::<Sha256>::new(Some(HKDF_SALT), master_key);
        let mut okm = [0u8; 32];
        hk.expand(HKDF_INFO, &mut okm)
            .map_err(|_| CipherError::KeyDerivation)?;

        let unbound = UnboundKey::new(&AES_256_GCM, &okm).map_err(|_| CipherError::KeyDerivation)?;

        Ok(Self {
            key: Arc::new(LessSafeKey::new(unbound)),
            rng: SystemRandom::new(),
        })
    }

    /// Encrypt a token for `athlete_id`. Returns base64.
    pub fn encrypt(&self, plaintext: &str, athlete_id: u64) -> Result<String, CipherError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        self.rng
            .fill(&mut nonce_bytes)
            .map_err(|_| CipherError::Seal)?;
        let nonce = Nonce::assume_unique_for_key(nonce_bytes);

        let aad = athlete_id.to_be_bytes();
        let mut data = plaintext.as_bytes().to_vec();
        self.key
            .seal_in_place_append_tag(nonce, Aad::from(&aad), &mut data)
            .map_err(|_| CipherError::Seal)?;

        let mut out = Vec::with_capacity(NONCE_LEN + data.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&data);
        Ok(BASE64.encode(out))
    }

    /// Decrypt a base64 token produced by [`TokenCipher::encrypt`].
    pub fn decrypt(&self, ciphertext_b64: &str, athlete_id: u64) -> Result<String, CipherError> {
        let raw = BASE64
            .decode(ciphertext_b64)
            .map_err(|e| CipherError::Malformed(e.to_string()))?;
        if raw.len() < NONCE_LEN + AES_256_GCM.tag_len() {
            return Err(CipherError::Malformed("too short".to_string()));
        }

        let (nonce_bytes, sealed) = raw.split_at(NONCE_LEN);
        let nonce = Nonce::try_assume_unique_for_key(nonce_bytes)
            .map_err(|_| CipherError::Malformed("bad nonce".to_string()))?;

        let aad = athlete_id.to_be_bytes();
        let mut data = sealed.to_vec();
        let plaintext = self
            .key
            .open_in_place(nonce, Aad::from(&aad), &mut data)
            .map_err(|_| CipherError::Open)?;

        String::from_utf8(plaintext.to_vec()).map_err(|e| CipherError::Malformed(e.to_string()))
    }
}

/// Helper to encrypt OAuth tokens before storing.
pub fn encrypt_tokens(
    cipher: &TokenCipher,
    access_token: &str,
    refresh_token: &str,
    athlete_id: u64,
) -> Result<(String, String), CipherError> {
    Ok((
        cipher.encrypt(access_token, athlete_id)?,
        cipher.encrypt(refresh_token, athlete_id)?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cipher() -> TokenCipher {
        TokenCipher::new(b"test_token_key_32_bytes_minimum!").unwrap()
    }

    #[test]
    fn test_encrypt_decrypt() {
        let c = cipher();
        let enc = c.encrypt("access-abc", 42).unwrap();
        assert_ne!(enc, "access-abc");
        assert_eq!(c.decrypt(&enc, 42).unwrap(), "access-abc");
    }

    #[test]
    fn test_nonce_is_fresh_per_call() {
        let c = cipher();
        assert_ne!(c.encrypt("same", 1).unwrap(), c.encrypt("same", 1).unwrap());
    }

    #[test]
    fn test_wrong_athlete_fails() {
        let c = cipher();
        let enc = c.encrypt("access-abc", 42).unwrap();
        assert!(matches!(c.decrypt(&enc, 43), Err(CipherError::Open)));
    }

    #[test]
    fn test_wrong_key_fails() {
        let enc = cipher().encrypt("access-abc", 42).unwrap();
        let other = TokenCipher::new(b"another_master_key_of_32_bytes!!").unwrap();
        assert!(other.decrypt(&enc, 42).is_err());
    }

    #[test]
    fn test_malformed_input() {
        let c = cipher();
        assert!(matches!(
            c.decrypt("not base64!!", 1),
            Err(CipherError::Malformed(_))
        ));
        assert!(matches!(
            c.decrypt(&BASE64.encode([0u8; 4]), 1),
            Err(CipherError::Malformed(_))
        ));
    }
}
