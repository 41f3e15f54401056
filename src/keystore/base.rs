//! Base Key Storage
//!
//! The HD keystore sits on top of a plain key store that owns the
//! wallet's encryption state and its non-HD keys. [`BaseKeyStore`] is the
//! capability the HD layer consumes; [`CryptoKeyStore`] is the in-memory
//! implementation with passphrase-based seed encryption.

use std::collections::HashMap;
use std::sync::RwLock;

use bitcoin::secp256k1::{All, PublicKey, Secp256k1, SecretKey};
use secrecy::SecretString;

use crate::config::KdfParams;
use crate::crypto::crypter::{generate_salt, SeedCrypter, SALT_LEN};
use crate::error::{KeyStoreError, KeyStoreResult};
use crate::security::KeyingMaterial;
use crate::types::{key_id, ChainId, KeyId};
use crate::{log_info, log_warn};

const MODULE: &str = "base";

/// Known plaintext encrypted at setup to verify passphrases on unlock
const PASSPHRASE_CHECK: &[u8] = b"hd-keystore passphrase check";

/// Capability the HD keystore consults for encryption and non-HD keys
pub trait BaseKeyStore {
    /// Whether the store has been switched to encrypted mode
    fn is_crypted(&self) -> bool;

    /// Encrypted and currently without a usable encryption key
    fn is_locked(&self) -> bool;

    /// Encrypt a master seed; fails when no encryption key is set
    fn encrypt_seed(&self, plain: &KeyingMaterial, chain_id: &ChainId) -> KeyStoreResult<Vec<u8>>;

    /// Decrypt a master seed; fails on a wrong key or corrupted input
    fn decrypt_seed(&self, cipher: &[u8], chain_id: &ChainId) -> KeyStoreResult<KeyingMaterial>;

    fn have_key(&self, id: &KeyId) -> bool;

    fn get_key(&self, id: &KeyId) -> KeyStoreResult<SecretKey>;

    fn get_pub_key(&self, id: &KeyId) -> KeyStoreResult<PublicKey>;
}

struct CryptoState {
    keys: HashMap<KeyId, (SecretKey, PublicKey)>,
    crypted: bool,
    salt: [u8; SALT_LEN],
    passphrase_check: Vec<u8>,
    crypter: Option<SeedCrypter>,
}

/// In-memory key store with passphrase-derived seed encryption
pub struct CryptoKeyStore {
    kdf: KdfParams,
    secp: Secp256k1<All>,
    inner: RwLock<CryptoState>,
}

impl CryptoKeyStore {
    pub fn new(kdf: KdfParams) -> Self {
        Self {
            kdf,
            secp: Secp256k1::new(),
            inner: RwLock::new(CryptoState {
                keys: HashMap::new(),
                crypted: false,
                salt: [0u8; SALT_LEN],
                passphrase_check: Vec::new(),
                crypter: None,
            }),
        }
    }

    /// Add a non-HD key, returning its identity
    pub fn add_key(&self, secret: SecretKey) -> KeyStoreResult<KeyId> {
        let pubkey = PublicKey::from_secret_key(&self.secp, &secret);
        let id = key_id(&pubkey);

        let mut state = self.write()?;
        state.keys.insert(id, (secret, pubkey));
        Ok(id)
    }

    /// Switch to encrypted mode under `passphrase`, leaving the store unlocked
    pub fn encrypt_with_passphrase(&self, passphrase: &SecretString) -> KeyStoreResult<()> {
        if self.is_crypted() {
            return Err(KeyStoreError::invalid_input("Key store is already encrypted"));
        }

        let salt = generate_salt();
        let crypter = SeedCrypter::from_passphrase(passphrase, &salt, &self.kdf)?;
        let check = crypter.encrypt(PASSPHRASE_CHECK, &salt)?;

        let mut state = self.write()?;
        if state.crypted {
            return Err(KeyStoreError::invalid_input("Key store is already encrypted"));
        }
        state.crypted = true;
        state.salt = salt;
        state.passphrase_check = check;
        state.crypter = Some(crypter);

        log_info!(MODULE, "Key store encrypted");
        Ok(())
    }

    /// Return to plaintext mode, discarding the key and passphrase check
    ///
    /// Only for undoing [`CryptoKeyStore::encrypt_with_passphrase`] before
    /// anything was encrypted under the new key.
    pub(crate) fn revert_encryption(&self) -> KeyStoreResult<()> {
        let mut state = self.write()?;
        state.crypted = false;
        state.salt = [0u8; SALT_LEN];
        state.passphrase_check.clear();
        state.crypter = None;

        log_warn!(MODULE, "Key store encryption reverted");
        Ok(())
    }

    /// Forget the encryption key
    pub fn lock(&self) -> KeyStoreResult<()> {
        let mut state = self.write()?;
        if !state.crypted {
            return Err(KeyStoreError::not_encrypted("Key store is not encrypted"));
        }
        state.crypter = None;
        Ok(())
    }

    /// Re-derive the encryption key; fails on a wrong passphrase
    pub fn unlock(&self, passphrase: &SecretString) -> KeyStoreResult<()> {
        let (salt, check) = {
            let state = self.read()?;
            if !state.crypted {
                return Err(KeyStoreError::not_encrypted("Key store is not encrypted"));
            }
            (state.salt, state.passphrase_check.clone())
        };

        let crypter = SeedCrypter::from_passphrase(passphrase, &salt, &self.kdf)?;
        if crypter.decrypt(&check, &salt).is_err() {
            log_warn!(MODULE, "Unlock rejected");
            return Err(KeyStoreError::decryption_failed("Incorrect passphrase"));
        }

        self.write()?.crypter = Some(crypter);
        Ok(())
    }

    fn read(&self) -> KeyStoreResult<std::sync::RwLockReadGuard<'_, CryptoState>> {
        self.inner
            .read()
            .map_err(|_| KeyStoreError::internal("Lock failed"))
    }

    fn write(&self) -> KeyStoreResult<std::sync::RwLockWriteGuard<'_, CryptoState>> {
        self.inner
            .write()
            .map_err(|_| KeyStoreError::internal("Lock failed"))
    }
}

impl Default for CryptoKeyStore {
    fn default() -> Self {
        Self::new(KdfParams::default())
    }
}

impl BaseKeyStore for CryptoKeyStore {
    fn is_crypted(&self) -> bool {
        self.read().map(|state| state.crypted).unwrap_or(false)
    }

    fn is_locked(&self) -> bool {
        self.read()
            .map(|state| state.crypted && state.crypter.is_none())
            .unwrap_or(true)
    }

    fn encrypt_seed(&self, plain: &KeyingMaterial, chain_id: &ChainId) -> KeyStoreResult<Vec<u8>> {
        let state = self.read()?;
        let crypter = state
            .crypter
            .as_ref()
            .ok_or_else(|| KeyStoreError::locked("No encryption key available"))?;
        crypter.encrypt(plain, chain_id.as_bytes())
    }

    fn decrypt_seed(&self, cipher: &[u8], chain_id: &ChainId) -> KeyStoreResult<KeyingMaterial> {
        let state = self.read()?;
        let crypter = state
            .crypter
            .as_ref()
            .ok_or_else(|| KeyStoreError::locked("Key store is locked"))?;
        crypter.decrypt(cipher, chain_id.as_bytes())
    }

    fn have_key(&self, id: &KeyId) -> bool {
        self.read()
            .map(|state| state.keys.contains_key(id))
            .unwrap_or(false)
    }

    fn get_key(&self, id: &KeyId) -> KeyStoreResult<SecretKey> {
        self.read()?
            .keys
            .get(id)
            .map(|(secret, _)| *secret)
            .ok_or_else(|| KeyStoreError::key_not_found(format!("No key for {}", id)))
    }

    fn get_pub_key(&self, id: &KeyId) -> KeyStoreResult<PublicKey> {
        self.read()?
            .keys
            .get(id)
            .map(|(_, pubkey)| *pubkey)
            .ok_or_else(|| KeyStoreError::key_not_found(format!("No key for {}", id)))
    }
}
