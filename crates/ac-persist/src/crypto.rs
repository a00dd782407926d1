//! Authenticated encryption at rest for learner-identifying rows
//! (spec §6 "Persistence layout").
//!
//! The teacher's stack has no AEAD cipher — `aes-gcm` is added here for
//! this one purpose (see DESIGN.md). The key is derived by hashing the
//! configured secret down to 32 bytes with `sha2`, the same digest
//! primitive the gateway already uses for token comparison, rather than
//! requiring operators to provision a raw 256-bit key by hand.

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Key, Nonce};
use ac_domain::{Error, Result};
use sha2::{Digest, Sha256};

const NONCE_LEN: usize = 12;

pub struct Cipher {
    inner: Aes256Gcm,
}

impl Cipher {
    /// Derive a cipher from an arbitrary-length secret (e.g. the value of
    /// the environment variable named in `PersistenceConfig::encryption_key_env`).
    pub fn from_secret(secret: &[u8]) -> Self {
        let digest = Sha256::digest(secret);
        let key = Key::<Aes256Gcm>::from_slice(&digest);
        Self {
            inner: Aes256Gcm::new(key),
        }
    }

    /// Encrypt `plaintext`, returning `nonce || ciphertext`.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let mut ciphertext = self
            .inner
            .encrypt(&nonce, plaintext)
            .map_err(|e| Error::Internal(format!("encryption failed: {e}")))?;
        let mut out = nonce.to_vec();
        out.append(&mut ciphertext);
        Ok(out)
    }

    /// Decrypt a blob produced by [`Cipher::encrypt`].
    pub fn decrypt(&self, blob: &[u8]) -> Result<Vec<u8>> {
        if blob.len() < NONCE_LEN {
            return Err(Error::Internal("ciphertext shorter than nonce".into()));
        }
        let (nonce_bytes, ciphertext) = blob.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);
        self.inner
            .decrypt(nonce, ciphertext)
            .map_err(|e| Error::Internal(format!("decryption failed: {e}")))
    }

    /// Encrypt a serializable value to a base64-ish hex blob suitable for
    /// storing inline in a JSON row.
    pub fn encrypt_json<T: serde::Serialize>(&self, value: &T) -> Result<String> {
        let plaintext = serde_json::to_vec(value)?;
        let blob = self.encrypt(&plaintext)?;
        Ok(hex::encode(blob))
    }

    pub fn decrypt_json<T: serde::de::DeserializeOwned>(&self, hex_blob: &str) -> Result<T> {
        let blob = hex::decode(hex_blob).map_err(|e| Error::Internal(format!("invalid hex: {e}")))?;
        let plaintext = self.decrypt(&blob)?;
        Ok(serde_json::from_slice(&plaintext)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Row {
        learner_id: String,
        region: String,
    }

    #[test]
    fn round_trips_json() {
        let cipher = Cipher::from_secret(b"test-secret");
        let row = Row {
            learner_id: "l-1".into(),
            region: "na".into(),
        };
        let blob = cipher.encrypt_json(&row).unwrap();
        let back: Row = cipher.decrypt_json(&blob).unwrap();
        assert_eq!(row, back);
    }

    #[test]
    fn wrong_key_fails_to_decrypt() {
        let cipher_a = Cipher::from_secret(b"secret-a");
        let cipher_b = Cipher::from_secret(b"secret-b");
        let blob = cipher_a.encrypt(b"hello").unwrap();
        assert!(cipher_b.decrypt(&blob).is_err());
    }

    #[test]
    fn each_encryption_uses_a_fresh_nonce() {
        let cipher = Cipher::from_secret(b"test-secret");
        let a = cipher.encrypt(b"same-plaintext").unwrap();
        let b = cipher.encrypt(b"same-plaintext").unwrap();
        assert_ne!(a, b);
    }
}
