//! Unified error types for the HD keystore
//!
//! Recoverable failures (unknown chain, locked store, malformed keypath)
//! and fatal invariant violations flow through the same struct and are
//! told apart by their [`ErrorCode`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Main error type for all keystore operations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyStoreError {
    pub code: ErrorCode,
    pub message: String,
    pub details: Option<String>,
}

impl KeyStoreError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    // Convenience constructors
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, msg)
    }

    pub fn chain_not_found(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ChainNotFound, msg)
    }

    pub fn seed_not_found(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::SeedNotFound, msg)
    }

    pub fn key_not_found(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::KeyNotFound, msg)
    }

    pub fn invalid_keypath(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidKeypath, msg)
    }

    pub fn not_encrypted(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotEncrypted, msg)
    }

    pub fn locked(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::Locked, msg)
    }

    pub fn encryption_failed(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::EncryptionFailed, msg)
    }

    pub fn decryption_failed(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::DecryptionFailed, msg)
    }

    pub fn crypto_error(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::CryptoError, msg)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, msg)
    }

    /// An invariant was violated; the caller should stop rather than retry.
    pub fn fatal(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::Fatal, msg)
    }

    pub fn is_fatal(&self) -> bool {
        self.code == ErrorCode::Fatal
    }
}

impl fmt::Display for KeyStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)?;
        if let Some(ref details) = self.details {
            write!(f, " ({})", details)?;
        }
        Ok(())
    }
}

impl std::error::Error for KeyStoreError {}

/// Error codes for categorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    // Lookup errors
    ChainNotFound,
    SeedNotFound,
    KeyNotFound,

    // Input errors
    InvalidInput,
    InvalidKeypath,
    InvalidMnemonic,

    // Store state errors
    NotEncrypted,
    Locked,

    // Crypto errors
    EncryptionFailed,
    DecryptionFailed,
    CryptoError,

    // Parse errors
    JsonError,
    HexError,

    // Internal
    Internal,

    /// Corrupted chain state or exhausted index space
    Fatal,
}

/// Result type alias for keystore operations
pub type KeyStoreResult<T> = Result<T, KeyStoreError>;

// Conversions from common error types

impl From<serde_json::Error> for KeyStoreError {
    fn from(e: serde_json::Error) -> Self {
        KeyStoreError::new(ErrorCode::JsonError, e.to_string())
    }
}

impl From<hex::FromHexError> for KeyStoreError {
    fn from(e: hex::FromHexError) -> Self {
        KeyStoreError::new(ErrorCode::HexError, e.to_string())
    }
}

impl From<bitcoin::bip32::Error> for KeyStoreError {
    fn from(e: bitcoin::bip32::Error) -> Self {
        KeyStoreError::new(ErrorCode::CryptoError, format!("BIP32 error: {}", e))
    }
}

impl From<bitcoin::secp256k1::Error> for KeyStoreError {
    fn from(e: bitcoin::secp256k1::Error) -> Self {
        KeyStoreError::new(ErrorCode::CryptoError, format!("Secp256k1 error: {}", e))
    }
}

impl From<bip39::Error> for KeyStoreError {
    fn from(e: bip39::Error) -> Self {
        KeyStoreError::new(ErrorCode::InvalidMnemonic, format!("BIP39 error: {}", e))
    }
}
