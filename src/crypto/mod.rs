//! Cryptographic primitives for the keystore
//!
//! - Extended key creation, derivation and neutering (BIP-32)
//! - Authenticated encryption of master seeds

pub mod crypter;
pub mod extkey;

pub use crypter::{generate_salt, SeedCrypter};
pub use extkey::{derive_public_child, ExtKey, EXTKEY_SERIALIZED_SIZE};
