//! Master seed storage
//!
//! A chain's seed sits in exactly one of two maps: plaintext while the base
//! store is not crypted, ciphertext once it is. Inserting into one map
//! removes the chain from the other.

use secrecy::SecretString;

use super::base::{BaseKeyStore, CryptoKeyStore};
use super::{HdKeyStore, HdState};
use crate::error::{KeyStoreError, KeyStoreResult};
use crate::security::KeyingMaterial;
use crate::types::ChainId;
use crate::{log_debug, log_error, log_info};

const MODULE: &str = "seeds";

impl<B: BaseKeyStore> HdKeyStore<B> {
    /// Store a master seed, encrypting it first when the base store is crypted
    ///
    /// Overwrites any existing seed for the chain.
    pub fn add_master_seed(&self, chain_id: &ChainId, seed: KeyingMaterial) -> KeyStoreResult<()> {
        if seed.is_empty() {
            return Err(KeyStoreError::invalid_input("Master seed is empty"));
        }

        let mut state = self.state()?;
        let crypted = self.base.is_crypted();
        if crypted {
            let cipher = self.base.encrypt_seed(&seed, chain_id)?;
            state.master_seeds.remove(chain_id);
            state.crypted_master_seeds.insert(*chain_id, cipher);
        } else {
            state.crypted_master_seeds.remove(chain_id);
            state.master_seeds.insert(*chain_id, seed);
        }

        log_info!(MODULE, "Master seed stored", chain_id = chain_id, crypted = crypted);
        Ok(())
    }

    /// Store an already encrypted seed regardless of the current mode
    pub fn add_crypted_master_seed(&self, chain_id: &ChainId, cipher: Vec<u8>) -> KeyStoreResult<()> {
        let mut state = self.state()?;
        state.master_seeds.remove(chain_id);
        state.crypted_master_seeds.insert(*chain_id, cipher);

        log_debug!(MODULE, "Crypted master seed loaded", chain_id = chain_id);
        Ok(())
    }

    /// Fetch a chain's master seed, decrypting it on every call in crypted mode
    pub fn get_master_seed(&self, chain_id: &ChainId) -> KeyStoreResult<KeyingMaterial> {
        let cipher = {
            let state = self.state()?;
            if !self.base.is_crypted() {
                return state.master_seeds.get(chain_id).cloned().ok_or_else(|| {
                    KeyStoreError::seed_not_found(format!("No master seed for chain {}", chain_id))
                });
            }

            state
                .crypted_master_seeds
                .get(chain_id)
                .cloned()
                .ok_or_else(|| {
                    KeyStoreError::seed_not_found(format!(
                        "No crypted master seed for chain {}",
                        chain_id
                    ))
                })?
        };

        if self.base.is_locked() {
            return Err(KeyStoreError::locked("Key store is locked"));
        }
        self.base.decrypt_seed(&cipher, chain_id)
    }

    /// Fetch the stored ciphertext of a chain's seed; crypted mode only
    pub fn get_crypted_master_seed(&self, chain_id: &ChainId) -> KeyStoreResult<Vec<u8>> {
        let state = self.state()?;
        if !self.base.is_crypted() {
            return Err(KeyStoreError::not_encrypted("Key store is not encrypted"));
        }

        state
            .crypted_master_seeds
            .get(chain_id)
            .cloned()
            .ok_or_else(|| {
                KeyStoreError::seed_not_found(format!("No crypted master seed for chain {}", chain_id))
            })
    }

    /// Encrypt every plaintext seed and drop the plaintext copies
    ///
    /// All or nothing: if any seed fails to encrypt, both maps are left
    /// exactly as they were.
    pub fn encrypt_seeds(&self) -> KeyStoreResult<()> {
        let mut state = self.state()?;
        self.encrypt_seeds_locked(&mut state)
    }

    fn encrypt_seeds_locked(&self, state: &mut HdState) -> KeyStoreResult<()> {
        let mut encrypted = Vec::with_capacity(state.master_seeds.len());
        for (chain_id, seed) in state.master_seeds.iter() {
            match self.base.encrypt_seed(seed, chain_id) {
                Ok(cipher) => encrypted.push((*chain_id, cipher)),
                Err(e) => {
                    log_error!(MODULE, "Seed encryption failed, nothing moved", chain_id = chain_id);
                    return Err(e);
                }
            }
        }

        let count = encrypted.len();
        state.crypted_master_seeds.extend(encrypted);
        state.master_seeds.clear();

        log_info!(MODULE, "Master seeds encrypted", count = count);
        Ok(())
    }
}

impl HdKeyStore<CryptoKeyStore> {
    /// Encrypt the base store under `passphrase` and move every seed to the
    /// ciphertext map
    ///
    /// The keystore lock is held across both steps, so no caller observes
    /// an encrypted store with seeds still in the plaintext map. If the
    /// seeds cannot be moved the base store is switched back to plaintext.
    pub fn encrypt_with_passphrase(&self, passphrase: &SecretString) -> KeyStoreResult<()> {
        let mut state = self.state()?;
        self.base.encrypt_with_passphrase(passphrase)?;

        if let Err(e) = self.encrypt_seeds_locked(&mut state) {
            log_error!(MODULE, "Seeds not moved, reverting base store encryption");
            self.base.revert_encryption().map_err(|revert| {
                KeyStoreError::fatal("Base store encrypted but seeds were not moved")
                    .with_details(format!("{}; revert failed: {}", e, revert))
            })?;
            return Err(e);
        }
        Ok(())
    }
}
