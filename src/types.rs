//! Shared types for the HD keystore
//!
//! Identifiers and the two persisted record shapes: the chain metadata
//! record and the derived public key record.

use std::fmt;
use std::str::FromStr;

use bitcoin::bip32::Xpub;
use bitcoin::hashes::{sha256d, Hash};
use bitcoin::secp256k1::PublicKey;
use bitcoin::PubkeyHash;
use serde::{Deserialize, Serialize};

use crate::error::{KeyStoreError, KeyStoreResult};

/// First index of the hardened range; unhardened indices are `0..HARDENED_OFFSET`
pub const HARDENED_OFFSET: u32 = 0x8000_0000;

/// Placeholder fragment for the internal/external branch digit in a keypath template
pub const BRANCH_PLACEHOLDER: &str = "c";

// =============================================================================
// Identifiers
// =============================================================================

/// Identifier of an HD chain: double-SHA256 of the master public key
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChainId([u8; 32]);

impl ChainId {
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Hash the compressed serialization of a chain's master public key
    pub fn from_master_pubkey(pubkey: &PublicKey) -> Self {
        Self(sha256d::Hash::hash(&pubkey.serialize()).to_byte_array())
    }

    pub fn from_master_xpub(xpub: &Xpub) -> Self {
        Self::from_master_pubkey(&xpub.public_key)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChainId({})", self.to_hex())
    }
}

impl FromStr for ChainId {
    type Err = KeyStoreError;

    fn from_str(s: &str) -> KeyStoreResult<Self> {
        let bytes = hex::decode(s.trim())?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| KeyStoreError::invalid_input("Chain id must be 32 bytes"))?;
        Ok(Self(bytes))
    }
}

/// Identity of a public key: hash160 of its compressed serialization
pub type KeyId = PubkeyHash;

/// Compute the [`KeyId`] of a secp256k1 public key
pub fn key_id(pubkey: &PublicKey) -> KeyId {
    bitcoin::PublicKey::new(*pubkey).pubkey_hash()
}

// =============================================================================
// Chain Record
// =============================================================================

/// Metadata for one HD chain
///
/// The master seed is not part of this record; it lives in the seed store
/// so that it can be encrypted independently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HdChain {
    pub version: i32,
    /// Derive child pubkeys from the stored branch roots instead of the seed
    pub use_pub_ckd: bool,
    /// Unix seconds, 0 means unknown
    pub create_time: i64,
    pub chain_id: ChainId,
    /// Path with a `c` fragment for the branch digit, e.g. `m/44'/0'/0'/c`
    pub keypath_template: String,
    pub external_pubkey: Option<Xpub>,
    /// `None` means only the external branch supports public derivation
    pub internal_pubkey: Option<Xpub>,
}

impl HdChain {
    pub const CURRENT_VERSION: i32 = 1;

    pub fn new(chain_id: ChainId, keypath_template: impl Into<String>, create_time: i64) -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            use_pub_ckd: false,
            create_time,
            chain_id,
            keypath_template: keypath_template.into(),
            external_pubkey: None,
            internal_pubkey: None,
        }
    }

    /// Enable public-only derivation from the given branch roots
    pub fn with_branch_roots(mut self, external: Xpub, internal: Option<Xpub>) -> Self {
        self.use_pub_ckd = true;
        self.external_pubkey = Some(external);
        self.internal_pubkey = internal;
        self
    }

    pub fn is_valid(&self) -> bool {
        if self.use_pub_ckd && self.external_pubkey.is_none() {
            return false;
        }
        !self.keypath_template.is_empty()
    }

    /// Root public key to derive `internal` branch children from, if public
    /// derivation is possible for that branch
    pub fn branch_root(&self, internal: bool) -> Option<&Xpub> {
        if !self.use_pub_ckd {
            return None;
        }
        // Without an external root nothing derives publicly
        let external = self.external_pubkey.as_ref()?;
        if internal {
            self.internal_pubkey.as_ref()
        } else {
            Some(external)
        }
    }
}

// =============================================================================
// Derived Public Key Record
// =============================================================================

/// One derived child public key of a chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HdPubKey {
    pub version: i32,
    pub pubkey: PublicKey,
    /// Child index, always below [`HARDENED_OFFSET`]
    pub child_index: u32,
    pub chain_id: ChainId,
    /// Fully resolved keypath, e.g. `m/44'/0'/0'/0/1`
    pub keypath: String,
    pub internal: bool,
}

impl HdPubKey {
    pub const CURRENT_VERSION: i32 = 1;

    pub fn key_id(&self) -> KeyId {
        key_id(&self.pubkey)
    }

    pub fn is_valid(&self) -> bool {
        self.child_index < HARDENED_OFFSET && !self.keypath.is_empty()
    }
}
