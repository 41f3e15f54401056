//! HD Keystore Library
//!
//! Hierarchical-deterministic key storage for a Bitcoin wallet.
//!
//! # Architecture
//!
//! This crate provides:
//! - **keystore**: the HD keystore (seeds, chains, derivation, key access)
//! - **crypto**: extended keys and passphrase-based seed encryption
//! - **types**: chain and derived pubkey records
//! - **config**: network, keypath and KDF settings
//! - **security**: zeroizing containers for seed material
//! - **utils**: structured logging with redaction
//!
//! # Security
//!
//! Seeds live in [`KeyingMaterial`], which is zeroed on drop. Private keys
//! are never stored for HD chains; they are re-derived from the seed on
//! demand and wiped after use.
//!
//! # Example
//!
//! ```rust,ignore
//! use hd_keystore::{CryptoKeyStore, HdKeyStore, KeyingMaterial};
//!
//! let store = HdKeyStore::new(CryptoKeyStore::default());
//! let chain_id = store.create_chain_from_seed(KeyingMaterial::from_bytes(&seed), None, true, now)?;
//! let receive = store.derive_next_pubkey(&chain_id, false)?;
//! let secret = store.get_key(&receive.key_id())?;
//! ```

pub mod config;
pub mod crypto;
pub mod error;
pub mod keystore;
pub mod security;
pub mod types;
pub mod utils;

// Re-export key types for convenience
pub use config::{KdfParams, KeyStoreConfig};
pub use error::{ErrorCode, KeyStoreError, KeyStoreResult};
pub use keystore::{BaseKeyStore, CryptoKeyStore, HdKeyStore, Keypath, KeypathError};
pub use security::KeyingMaterial;
pub use types::{key_id, ChainId, HdChain, HdPubKey, KeyId, HARDENED_OFFSET};
