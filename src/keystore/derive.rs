//! Derivation engine
//!
//! Walks keypaths from a chain's master seed, mints child public keys and
//! allocates child indices. None of these hold the keystore lock across a
//! multi-step walk: the seed and chain are fetched through the locking
//! accessors, then derivation runs lock-free.

use std::collections::HashSet;

use bitcoin::secp256k1::SecretKey;

use super::base::BaseKeyStore;
use super::keypath::{resolve_template, Keypath};
use super::HdKeyStore;
use crate::crypto::{derive_public_child, ExtKey};
use crate::error::{KeyStoreError, KeyStoreResult};
use crate::types::{ChainId, HdPubKey, HARDENED_OFFSET};
use crate::{log_debug, log_error};

const MODULE: &str = "derive";

impl<B: BaseKeyStore> HdKeyStore<B> {
    /// Derive the extended private key at `keypath` of a chain
    ///
    /// Steps are applied strictly left to right, each from the previous
    /// result. Fails if the path is malformed or the seed is unavailable.
    pub fn priv_key_der(&self, keypath: &str, chain_id: &ChainId) -> KeyStoreResult<ExtKey> {
        let path = Keypath::parse(keypath)?;

        let mut current = {
            let seed = self.get_master_seed(chain_id)?;
            ExtKey::from_seed_material(&seed, self.config.network)?
        };
        for step in path.steps() {
            current = current.derive_child(&self.secp, step.child_number())?;
        }

        Ok(current)
    }

    /// Re-derive the private key of a recorded pubkey from its chain's seed
    pub fn derive_key(&self, record: &HdPubKey) -> KeyStoreResult<SecretKey> {
        let ext = self.priv_key_der(&record.keypath, &record.chain_id)?;
        Ok(ext.private_key())
    }

    /// Derive the child pubkey at `index` on one branch of a chain
    ///
    /// Uses the branch's stored root pubkey when the chain allows public
    /// derivation, otherwise hardened private derivation from the seed.
    /// The registry is not modified. An index in the hardened range or a
    /// failed derivation is fatal.
    pub fn derive_hd_pubkey_at_index(
        &self,
        chain_id: &ChainId,
        index: u32,
        internal: bool,
    ) -> KeyStoreResult<HdPubKey> {
        let chain = self.get_chain(chain_id)?;

        if index >= HARDENED_OFFSET {
            log_error!(MODULE, "No more available keys", chain_id = chain_id, index = index);
            return Err(KeyStoreError::fatal(format!(
                "Child index {} is outside the unhardened range",
                index
            )));
        }

        let branch_path = resolve_template(&chain.keypath_template, internal);

        let (keypath, pubkey) = match chain.branch_root(internal) {
            None => {
                let keypath = format!("{}/{}{}", branch_path, index, self.config.hardened_marker);
                let ext = self.priv_key_der(&keypath, chain_id).map_err(|e| {
                    log_error!(MODULE, "Private key derivation failed", chain_id = chain_id);
                    KeyStoreError::fatal("Private key derivation failed").with_details(e.to_string())
                })?;
                (keypath, ext.neuter(&self.secp).public_key)
            }
            Some(root) => {
                let keypath = format!("{}/{}", branch_path, index);
                let child = derive_public_child(&self.secp, root, index).map_err(|e| {
                    log_error!(MODULE, "Public key derivation failed", chain_id = chain_id);
                    KeyStoreError::fatal("Public key derivation failed").with_details(e.to_string())
                })?;
                (keypath, child.public_key)
            }
        };

        log_debug!(MODULE, "Derived child pubkey", chain_id = chain_id, keypath = keypath);
        Ok(HdPubKey {
            version: HdPubKey::CURRENT_VERSION,
            pubkey,
            child_index: index,
            chain_id: *chain_id,
            keypath,
            internal,
        })
    }

    /// Lowest child index not yet recorded for the chain and branch
    ///
    /// Fills gaps: with 0, 1, 2 and 100 recorded this returns 3, so indices
    /// are not issued in historical order.
    pub fn get_next_child_index(&self, chain_id: &ChainId, internal: bool) -> KeyStoreResult<u32> {
        let used: HashSet<u32> = self
            .state()?
            .hd_pubkeys
            .values()
            .filter(|record| record.chain_id == *chain_id && record.internal == internal)
            .map(|record| record.child_index)
            .collect();

        // Exhausting the whole unhardened range falls back to 0
        Ok((0..HARDENED_OFFSET)
            .find(|index| !used.contains(index))
            .unwrap_or(0))
    }

    /// Allocate the next index, derive its pubkey and record it
    pub fn derive_next_pubkey(&self, chain_id: &ChainId, internal: bool) -> KeyStoreResult<HdPubKey> {
        let index = self.get_next_child_index(chain_id, internal)?;
        let record = self.derive_hd_pubkey_at_index(chain_id, index, internal)?;
        self.load_hd_pubkey(record.clone())?;
        Ok(record)
    }

    /// Recorded pubkeys of a chain, external branch first, by index
    pub fn hd_pubkeys_for_chain(&self, chain_id: &ChainId) -> KeyStoreResult<Vec<HdPubKey>> {
        let mut records: Vec<HdPubKey> = self
            .state()?
            .hd_pubkeys
            .values()
            .filter(|record| record.chain_id == *chain_id)
            .cloned()
            .collect();
        records.sort_by_key(|record| (record.internal, record.child_index));
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{KdfParams, KeyStoreConfig};
    use crate::error::ErrorCode;
    use crate::keystore::CryptoKeyStore;
    use crate::security::KeyingMaterial;
    use crate::types::HdChain;
    use bitcoin::bip32::{DerivationPath, Xpriv};
    use bitcoin::secp256k1::{PublicKey, Secp256k1};
    use std::str::FromStr;

    const TV1_SEED: &str = "000102030405060708090a0b0c0d0e0f";
    // BIP32 test vector 1, chain m/0H/1
    const TV1_M_0H_1: &str = "xprv9wTYmMFdV23N2TdNG573QoEsfRrWKQgWeibmLntzniatZvR9BmLnvSxqu53Kw1UmYPxLgboyZQaXwTCg8MSY3H2EU4pWcQDnRnrVA1xe8fs";

    fn keystore() -> HdKeyStore<CryptoKeyStore> {
        HdKeyStore::with_config(
            CryptoKeyStore::new(KdfParams::minimal()),
            KeyStoreConfig::default().with_kdf(KdfParams::minimal()),
        )
        .unwrap()
    }

    fn seeded(store: &HdKeyStore<CryptoKeyStore>, seed: &[u8]) -> ChainId {
        let id = ChainId::from_bytes([0x5A; 32]);
        store.add_master_seed(&id, KeyingMaterial::from_bytes(seed)).unwrap();
        id
    }

    fn record(chain_id: ChainId, index: u32, internal: bool) -> HdPubKey {
        let secp = Secp256k1::new();
        let secret = SecretKey::from_slice(&[(index % 200) as u8 + 1; 32]).unwrap();
        HdPubKey {
            version: HdPubKey::CURRENT_VERSION,
            pubkey: PublicKey::from_secret_key(&secp, &secret),
            child_index: index,
            chain_id,
            keypath: format!("m/0'/{}/{}", internal as u8, index),
            internal,
        }
    }

    #[test]
    fn test_priv_key_der_matches_vector() {
        let store = keystore();
        let id = seeded(&store, &hex::decode(TV1_SEED).unwrap());

        let ext = store.priv_key_der("m/0'/1", &id).unwrap();
        assert_eq!(ext.xpriv().to_string(), TV1_M_0H_1);
    }

    #[test]
    fn test_priv_key_der_order_matters() {
        let store = keystore();
        let id = seeded(&store, &hex::decode(TV1_SEED).unwrap());

        let a = store.priv_key_der("m/0'/1", &id).unwrap();
        let b = store.priv_key_der("m/1/0'", &id).unwrap();
        assert_ne!(a.private_key(), b.private_key());
    }

    #[test]
    fn test_priv_key_der_master_only() {
        let store = keystore();
        let seed = hex::decode(TV1_SEED).unwrap();
        let id = seeded(&store, &seed);

        let master = Xpriv::new_master(bitcoin::Network::Bitcoin, &seed).unwrap();
        assert_eq!(store.priv_key_der("m", &id).unwrap().xpriv(), &master);
    }

    #[test]
    fn test_priv_key_der_serialized_master() {
        let store = keystore();
        let master = Xpriv::new_master(bitcoin::Network::Bitcoin, &[0x33; 32]).unwrap();
        let id = seeded(&store, &master.encode());

        let secp = Secp256k1::new();
        let expected = master
            .derive_priv(&secp, &DerivationPath::from_str("m/44'/0'/0'/0/3").unwrap())
            .unwrap();
        let derived = store.priv_key_der("m/44'/0'/0'/0/3", &id).unwrap();
        assert_eq!(derived.xpriv(), &expected);
    }

    #[test]
    fn test_priv_key_der_failures() {
        let store = keystore();
        let id = seeded(&store, &[1; 32]);

        for path in ["m/0'/c/1", "m/x", "m/4294967295", ""] {
            assert_eq!(
                store.priv_key_der(path, &id).unwrap_err().code,
                ErrorCode::InvalidKeypath,
                "{}",
                path
            );
        }
        assert_eq!(
            store.priv_key_der("m/0", &ChainId::from_bytes([0; 32])).unwrap_err().code,
            ErrorCode::SeedNotFound
        );
    }

    #[test]
    fn test_hardened_pubkey_derivation() {
        let store = keystore();
        let id = seeded(&store, &hex::decode(TV1_SEED).unwrap());
        store.add_chain(HdChain::new(id, "m/44'/0'/0'/c", 0)).unwrap();

        let external = store.derive_hd_pubkey_at_index(&id, 5, false).unwrap();
        assert_eq!(external.keypath, "m/44'/0'/0'/0/5'");
        assert_eq!(external.child_index, 5);
        assert!(!external.internal);
        assert_eq!(external.chain_id, id);

        let internal = store.derive_hd_pubkey_at_index(&id, 5, true).unwrap();
        assert_eq!(internal.keypath, "m/44'/0'/0'/1/5'");
        assert_ne!(internal.pubkey, external.pubkey);

        let secret = store.derive_key(&external).unwrap();
        assert_eq!(PublicKey::from_secret_key(&Secp256k1::new(), &secret), external.pubkey);
    }

    #[test]
    fn test_public_derivation_matches_private() {
        let store = keystore();
        let chain_id = store
            .create_chain_from_seed(KeyingMaterial::from_bytes(&[9; 32]), Some("m/44'/0'/0'/c"), true, 0)
            .unwrap();

        let record = store.derive_hd_pubkey_at_index(&chain_id, 2, true).unwrap();
        assert_eq!(record.keypath, "m/44'/0'/0'/1/2");

        let secret = store.derive_key(&record).unwrap();
        assert_eq!(PublicKey::from_secret_key(&Secp256k1::new(), &secret), record.pubkey);
    }

    #[test]
    fn test_index_at_hardened_boundary_is_fatal() {
        let store = keystore();
        let id = seeded(&store, &[1; 32]);
        store.add_chain(HdChain::new(id, "m/0'/c", 0)).unwrap();

        let err = store.derive_hd_pubkey_at_index(&id, HARDENED_OFFSET, false).unwrap_err();
        assert!(err.is_fatal());
        assert!(store.hd_pubkeys_for_chain(&id).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_chain_is_recoverable() {
        let store = keystore();
        let err = store
            .derive_hd_pubkey_at_index(&ChainId::from_bytes([1; 32]), HARDENED_OFFSET, false)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ChainNotFound);
    }

    #[test]
    fn test_missing_seed_is_fatal() {
        let store = keystore();
        let id = ChainId::from_bytes([4; 32]);
        store.add_chain(HdChain::new(id, "m/0'/c", 0)).unwrap();

        let err = store.derive_hd_pubkey_at_index(&id, 0, false).unwrap_err();
        assert!(err.is_fatal());
        assert!(err.details.unwrap().contains("SeedNotFound"));
    }

    #[test]
    fn test_next_child_index_fills_gaps() {
        let store = keystore();
        let id = ChainId::from_bytes([6; 32]);
        assert_eq!(store.get_next_child_index(&id, false).unwrap(), 0);

        for index in [0, 1, 2, 100] {
            store.load_hd_pubkey(record(id, index, false)).unwrap();
        }
        assert_eq!(store.get_next_child_index(&id, false).unwrap(), 3);
        // Other branch and other chains are independent
        assert_eq!(store.get_next_child_index(&id, true).unwrap(), 0);
        assert_eq!(
            store.get_next_child_index(&ChainId::from_bytes([7; 32]), false).unwrap(),
            0
        );
    }

    #[test]
    fn test_derive_next_pubkey_records() {
        let store = keystore();
        let chain_id = store
            .create_chain_from_seed(KeyingMaterial::from_bytes(&[2; 32]), None, true, 0)
            .unwrap();

        let first = store.derive_next_pubkey(&chain_id, false).unwrap();
        let second = store.derive_next_pubkey(&chain_id, false).unwrap();
        let change = store.derive_next_pubkey(&chain_id, true).unwrap();

        assert_eq!((first.child_index, second.child_index, change.child_index), (0, 1, 0));
        assert!(store.have_key(&second.key_id()));

        let listed = store.hd_pubkeys_for_chain(&chain_id).unwrap();
        assert_eq!(listed, vec![first, second, change]);
    }
}
