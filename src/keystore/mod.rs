//! HD Keystore
//!
//! Hierarchical-deterministic key management on top of a [`BaseKeyStore`]:
//! - **seeds**: master seed per chain, plaintext or encrypted
//! - **chains**: chain metadata registry and chain bootstrap
//! - **derive**: keypath walking, pubkey minting, gap-filling indices
//! - **access**: key lookups reconciling HD keys with the base store
//!
//! One mutex guards all four maps. Every public operation takes it once
//! for its own map access and never calls another locking operation while
//! holding it; multi-step derivations re-acquire it per access.

mod access;
pub mod base;
mod chains;
mod derive;
pub mod keypath;
mod seeds;

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use bitcoin::secp256k1::{All, Secp256k1};

use crate::config::KeyStoreConfig;
use crate::error::{KeyStoreError, KeyStoreResult};
use crate::security::KeyingMaterial;
use crate::types::{ChainId, HdChain, HdPubKey, KeyId};
use crate::utils::logging;

pub use base::{BaseKeyStore, CryptoKeyStore};
pub use keypath::{resolve_template, Keypath, KeypathError, PathStep};

#[derive(Default)]
struct HdState {
    /// Plaintext seeds, used while the base store is not crypted
    master_seeds: BTreeMap<ChainId, KeyingMaterial>,
    crypted_master_seeds: BTreeMap<ChainId, Vec<u8>>,
    /// All derived pubkeys of all chains
    hd_pubkeys: HashMap<KeyId, HdPubKey>,
    chains: BTreeMap<ChainId, HdChain>,
}

/// HD key store over a base capability `B`
pub struct HdKeyStore<B: BaseKeyStore> {
    config: KeyStoreConfig,
    secp: Secp256k1<All>,
    base: B,
    state: Mutex<HdState>,
}

impl<B: BaseKeyStore> HdKeyStore<B> {
    /// Create a keystore with the default configuration
    pub fn new(base: B) -> Self {
        Self::build(base, KeyStoreConfig::default())
    }

    pub fn with_config(base: B, config: KeyStoreConfig) -> KeyStoreResult<Self> {
        config.validate()?;
        if config.debug_logging {
            logging::enable_debug();
        }
        Ok(Self::build(base, config))
    }

    fn build(base: B, config: KeyStoreConfig) -> Self {
        Self {
            config,
            secp: Secp256k1::new(),
            base,
            state: Mutex::new(HdState::default()),
        }
    }

    pub fn config(&self) -> &KeyStoreConfig {
        &self.config
    }

    /// The underlying base key store
    pub fn base(&self) -> &B {
        &self.base
    }

    fn state(&self) -> KeyStoreResult<MutexGuard<'_, HdState>> {
        self.state
            .lock()
            .map_err(|_| KeyStoreError::internal("Lock failed"))
    }
}
