//! Credential vault: authenticated encryption of provider secrets at rest.
//!
//! Credentials are serialised to JSON and sealed with AES-256-GCM under the
//! process-wide `ENCRYPTION_KEY`. The stored form is
//! `base64(nonce || ciphertext)`; a fresh random nonce is drawn per
//! encryption. Plaintext credentials exist only transiently in memory and are
//! never logged or persisted.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::RngCore;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// AES-256 key length in bytes.
const KEY_LEN: usize = 32;

/// AES-GCM standard nonce length in bytes.
const NONCE_LEN: usize = 12;

/// Errors from vault operations.
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    /// Key is not valid base64 or decodes to the wrong length
    #[error("invalid encryption key: expected base64 of {KEY_LEN} bytes")]
    InvalidKey,

    /// Stored blob is malformed or fails authentication
    #[error("failed to decrypt credential blob")]
    Decrypt,

    /// Encryption itself failed
    #[error("failed to encrypt credentials")]
    Encrypt,

    /// JSON round-trip of the credential mapping failed
    #[error("credential serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Symmetric-key vault for provider credential bundles.
#[derive(Clone)]
pub struct CredentialVault {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for CredentialVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialVault").finish_non_exhaustive()
    }
}

impl CredentialVault {
    /// Build a vault from a base64-encoded 256-bit key.
    pub fn new(key_base64: &str) -> Result<Self, VaultError> {
        let key_bytes = BASE64
            .decode(key_base64.trim())
            .map_err(|_| VaultError::InvalidKey)?;
        if key_bytes.len() != KEY_LEN {
            return Err(VaultError::InvalidKey);
        }
        let cipher = Aes256Gcm::new_from_slice(&key_bytes).map_err(|_| VaultError::InvalidKey)?;
        Ok(Self { cipher })
    }

    /// Generate a fresh base64-encoded 256-bit key.
    pub fn generate_key() -> String {
        let mut key = [0u8; KEY_LEN];
        rand::rngs::OsRng.fill_bytes(&mut key);
        BASE64.encode(key)
    }

    /// Seal a credential mapping into the stored blob format.
    pub fn encrypt<T: Serialize>(&self, credentials: &T) -> Result<String, VaultError> {
        let plaintext = serde_json::to_vec(credentials)?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_slice())
            .map_err(|_| VaultError::Encrypt)?;

        let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(blob))
    }

    /// Open a stored blob back into the credential mapping.
    pub fn decrypt<T: DeserializeOwned>(&self, blob: &str) -> Result<T, VaultError> {
        let raw = BASE64.decode(blob.trim()).map_err(|_| VaultError::Decrypt)?;
        if raw.len() <= NONCE_LEN {
            return Err(VaultError::Decrypt);
        }
        let (nonce_bytes, ciphertext) = raw.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);

        let plaintext = self
            .cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| VaultError::Decrypt)?;
        Ok(serde_json::from_slice(&plaintext)?)
    }
}
