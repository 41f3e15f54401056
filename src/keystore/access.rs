//! Key lookups over HD and non-HD keys
//!
//! The derived pubkey registry is consulted first; anything it does not
//! know is delegated to the base store exactly once.

use bitcoin::secp256k1::{PublicKey, SecretKey};

use super::base::BaseKeyStore;
use super::HdKeyStore;
use crate::error::{KeyStoreError, KeyStoreResult};
use crate::{log_debug, log_warn};
use crate::types::{HdPubKey, KeyId};

const MODULE: &str = "access";

impl<B: BaseKeyStore> HdKeyStore<B> {
    /// Record a derived pubkey, replacing any record with the same key id
    pub fn load_hd_pubkey(&self, record: HdPubKey) -> KeyStoreResult<()> {
        if !record.is_valid() {
            return Err(KeyStoreError::invalid_input(format!(
                "Invalid pubkey record at index {}",
                record.child_index
            )));
        }

        let id = record.key_id();
        self.state()?.hd_pubkeys.insert(id, record);

        log_debug!(MODULE, "Pubkey recorded", key_id = id);
        Ok(())
    }

    /// Whether `id` is an HD key or known to the base store
    ///
    /// A poisoned keystore lock counts as "not an HD key" and the answer
    /// comes from the base store alone; `get_key` and `get_pub_key` report
    /// the same condition as `Internal` instead.
    pub fn have_key(&self, id: &KeyId) -> bool {
        let known = match self.state() {
            Ok(state) => state.hd_pubkeys.contains_key(id),
            Err(_) => {
                log_warn!(MODULE, "Registry lock poisoned, checking base store only", key_id = id);
                false
            }
        };
        known || self.base.have_key(id)
    }

    pub fn get_pub_key(&self, id: &KeyId) -> KeyStoreResult<PublicKey> {
        if let Some(record) = self.state()?.hd_pubkeys.get(id) {
            return Ok(record.pubkey);
        }
        self.base.get_pub_key(id)
    }

    /// Private key for `id`, re-derived from the chain seed for HD keys
    pub fn get_key(&self, id: &KeyId) -> KeyStoreResult<SecretKey> {
        let record = self.state()?.hd_pubkeys.get(id).cloned();
        match record {
            Some(record) => self.derive_key(&record),
            None => self.base.get_key(id),
        }
    }
}
