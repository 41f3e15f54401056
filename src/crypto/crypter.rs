//! Seed Encryption with Authenticated Encryption
//!
//! Encrypts master seeds under a passphrase-derived key using:
//! - AES-256-GCM for authenticated encryption
//! - Argon2id for key derivation from the passphrase
//! - A random nonce per ciphertext, stored as its first 12 bytes
//! - Caller-supplied associated data (the chain id for seeds)

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use argon2::{Algorithm, Argon2, Version};
use rand::rngs::OsRng;
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use zeroize::Zeroizing;

use crate::config::KdfParams;
use crate::error::{KeyStoreError, KeyStoreResult};
use crate::security::KeyingMaterial;

pub const SALT_LEN: usize = 32;
pub const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;
/// AES-GCM authentication tag length
const TAG_LEN: usize = 16;

/// Symmetric crypter holding the wallet's encryption key
pub struct SeedCrypter {
    key: Zeroizing<[u8; KEY_LEN]>,
}

impl SeedCrypter {
    pub fn from_key(key: [u8; KEY_LEN]) -> Self {
        Self {
            key: Zeroizing::new(key),
        }
    }

    /// Derive the encryption key from a passphrase using Argon2id
    pub fn from_passphrase(
        passphrase: &SecretString,
        salt: &[u8],
        params: &KdfParams,
    ) -> KeyStoreResult<Self> {
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params.to_argon2()?);

        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        argon2
            .hash_password_into(passphrase.expose_secret().as_bytes(), salt, key.as_mut())
            .map_err(|e| KeyStoreError::crypto_error(format!("Key derivation failed: {}", e)))?;

        Ok(Self { key })
    }

    /// Encrypt `plaintext`, binding it to `aad`
    pub fn encrypt(&self, plaintext: &[u8], aad: &[u8]) -> KeyStoreResult<Vec<u8>> {
        let cipher = Aes256Gcm::new_from_slice(self.key.as_ref())
            .map_err(|e| KeyStoreError::encryption_failed(format!("Failed to create cipher: {}", e)))?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, Payload { msg: plaintext, aad })
            .map_err(|e| KeyStoreError::encryption_failed(format!("Encryption failed: {}", e)))?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    /// Decrypt a ciphertext produced by [`SeedCrypter::encrypt`] with the same `aad`
    pub fn decrypt(&self, data: &[u8], aad: &[u8]) -> KeyStoreResult<KeyingMaterial> {
        if data.len() < NONCE_LEN + TAG_LEN {
            return Err(KeyStoreError::decryption_failed("Ciphertext too short"));
        }

        let cipher = Aes256Gcm::new_from_slice(self.key.as_ref())
            .map_err(|e| KeyStoreError::decryption_failed(format!("Failed to create cipher: {}", e)))?;

        let (nonce_bytes, ciphertext) = data.split_at(NONCE_LEN);
        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce_bytes), Payload { msg: ciphertext, aad })
            .map_err(|_| {
                KeyStoreError::decryption_failed("Decryption failed - wrong key or corrupted data")
            })?;

        Ok(KeyingMaterial::from_vec(plaintext))
    }
}

/// Fresh random salt for passphrase key derivation
pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    salt
}
