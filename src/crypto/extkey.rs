//! Extended Key Operations
//!
//! Thin layer over `bitcoin::bip32` used by the derivation engine:
//! master key creation from a seed, single-step child derivation and
//! neutering. Private extended keys are wrapped in [`ExtKey`], which
//! erases its secret scalar when dropped.

use bitcoin::bip32::{ChainCode, ChildNumber, Xpriv, Xpub};
use bitcoin::secp256k1::{All, Secp256k1, SecretKey};
use bitcoin::NetworkKind;

use crate::error::{KeyStoreError, KeyStoreResult};

/// Length of a serialized BIP32 extended key (version prefix included)
pub const EXTKEY_SERIALIZED_SIZE: usize = 78;

/// Extended private key that erases its secret on drop
pub struct ExtKey {
    inner: Xpriv,
}

impl ExtKey {
    /// Build the master key from stored seed material
    ///
    /// Material exactly [`EXTKEY_SERIALIZED_SIZE`] bytes long is an already
    /// serialized extended private key; anything else is raw entropy.
    pub fn from_seed_material(material: &[u8], network: impl Into<NetworkKind>) -> KeyStoreResult<Self> {
        if material.is_empty() {
            return Err(KeyStoreError::invalid_input("Master seed is empty"));
        }

        let inner = if material.len() == EXTKEY_SERIALIZED_SIZE {
            Xpriv::decode(material)?
        } else {
            Xpriv::new_master(network, material)?
        };
        Ok(Self { inner })
    }

    pub fn xpriv(&self) -> &Xpriv {
        &self.inner
    }

    pub fn private_key(&self) -> SecretKey {
        self.inner.private_key
    }

    /// Derive one child; `child` carries the hardened flag
    pub fn derive_child(&self, secp: &Secp256k1<All>, child: ChildNumber) -> KeyStoreResult<Self> {
        let inner = self.inner.derive_priv(secp, &[child])?;
        Ok(Self { inner })
    }

    /// Public counterpart of this key
    pub fn neuter(&self, secp: &Secp256k1<All>) -> Xpub {
        Xpub::from_priv(secp, &self.inner)
    }
}

impl ExtKey {
    /// Overwrite the secret scalar and the chain code
    fn erase(&mut self) {
        self.inner.private_key.non_secure_erase();
        self.inner.chain_code = ChainCode::from([0u8; 32]);
    }
}

impl Drop for ExtKey {
    fn drop(&mut self) {
        self.erase();
    }
}

impl std::fmt::Debug for ExtKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtKey")
            .field("depth", &self.inner.depth)
            .field("child_number", &self.inner.child_number)
            .finish()
    }
}

/// Derive a non-hardened child public key without any private material
pub fn derive_public_child(secp: &Secp256k1<All>, parent: &Xpub, index: u32) -> KeyStoreResult<Xpub> {
    let child = ChildNumber::from_normal_idx(index)?;
    Ok(parent.derive_pub(secp, &[child])?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::bip32::DerivationPath;
    use std::str::FromStr;

    // BIP32 test vector 1
    const TV1_SEED: &str = "000102030405060708090a0b0c0d0e0f";
    const TV1_MASTER: &str = "xprv9s21ZrQH143K3QTDL4LXw2F7HEK3wJUD2nW2nRk4stbPy6cq3jPPqjiChkVvvNKmPGJxWUtg6LnF5kejMRNNU3TGtRBeJgk33yuGBxrMPHi";
    const TV1_M_0H: &str = "xprv9uHRZZhk6KAJC1avXpDAp4MDc3sQKNxDiPvvkX8Br5ngLNv1TxvUxt4cV1rGL5hj6KCesnDYUhd7oWgT11eZG7XnxHrnYeSvkzY7d2bhkJ7";

    fn secp() -> Secp256k1<All> {
        Secp256k1::new()
    }

    #[test]
    fn test_master_from_entropy() {
        let seed = hex::decode(TV1_SEED).unwrap();
        let master = ExtKey::from_seed_material(&seed, NetworkKind::Main).unwrap();
        assert_eq!(master.xpriv().to_string(), TV1_MASTER);
    }

    #[test]
    fn test_master_from_serialized_key() {
        let xpriv = Xpriv::from_str(TV1_MASTER).unwrap();
        let encoded = xpriv.encode();
        assert_eq!(encoded.len(), EXTKEY_SERIALIZED_SIZE);

        let master = ExtKey::from_seed_material(&encoded, NetworkKind::Main).unwrap();
        assert_eq!(master.xpriv(), &xpriv);
    }

    #[test]
    fn test_empty_seed_rejected() {
        assert!(ExtKey::from_seed_material(&[], NetworkKind::Main).is_err());
    }

    #[test]
    fn test_hardened_child_matches_vector() {
        let seed = hex::decode(TV1_SEED).unwrap();
        let master = ExtKey::from_seed_material(&seed, NetworkKind::Main).unwrap();
        let child = master
            .derive_child(&secp(), ChildNumber::from_hardened_idx(0).unwrap())
            .unwrap();
        assert_eq!(child.xpriv().to_string(), TV1_M_0H);
    }

    #[test]
    fn test_public_derivation_matches_private() {
        let secp = secp();
        let seed = hex::decode(TV1_SEED).unwrap();
        let master = ExtKey::from_seed_material(&seed, NetworkKind::Main).unwrap();

        let via_private = master
            .derive_child(&secp, ChildNumber::from_normal_idx(7).unwrap())
            .unwrap()
            .neuter(&secp);
        let via_public = derive_public_child(&secp, &master.neuter(&secp), 7).unwrap();

        assert_eq!(via_private.public_key, via_public.public_key);

        let path = DerivationPath::from_str("m/7").unwrap();
        let reference = master.xpriv().derive_priv(&secp, &path).unwrap();
        assert_eq!(Xpub::from_priv(&secp, &reference), via_public);
    }

    #[test]
    fn test_public_derivation_rejects_hardened_index() {
        let secp = secp();
        let master = ExtKey::from_seed_material(&[5u8; 32], NetworkKind::Test).unwrap();
        assert!(derive_public_child(&secp, &master.neuter(&secp), 0x8000_0000).is_err());
    }

    #[test]
    fn test_erase_clears_secret_and_chain_code() {
        let seed = hex::decode(TV1_SEED).unwrap();
        let mut key = ExtKey::from_seed_material(&seed, NetworkKind::Main).unwrap();
        let original = *key.xpriv();

        key.erase();
        assert_ne!(key.private_key(), original.private_key);
        assert_eq!(key.xpriv().chain_code, ChainCode::from([0u8; 32]));
        assert_ne!(original.chain_code, ChainCode::from([0u8; 32]));
    }
}
