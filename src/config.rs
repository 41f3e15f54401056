//! Keystore Configuration
//!
//! Settings shared by every chain in one keystore instance:
//! - Network the master keys are created for
//! - Argon2id cost for the passphrase-derived seed encryption key
//! - Keypath conventions (hardening marker, default template)

use bitcoin::Network;
use serde::{Deserialize, Serialize};

use crate::error::{KeyStoreError, KeyStoreResult};
use crate::types::BRANCH_PLACEHOLDER;

/// Markers accepted after an index to denote a hardened step
pub const HARDENED_MARKERS: [char; 3] = ['\'', 'h', 'H'];

/// Key derivation parameters for the passphrase-derived encryption key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Memory cost in KiB
    pub memory_cost: u32,
    /// Time cost (iterations)
    pub time_cost: u32,
    /// Parallelism
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            // 64 MiB memory, 3 iterations, 4 parallel lanes
            memory_cost: 65536,
            time_cost: 3,
            parallelism: 4,
        }
    }
}

impl KdfParams {
    /// Cheapest parameters Argon2 accepts; for tests only
    pub fn minimal() -> Self {
        Self {
            memory_cost: 8,
            time_cost: 1,
            parallelism: 1,
        }
    }

    pub fn to_argon2(&self) -> KeyStoreResult<argon2::Params> {
        argon2::Params::new(self.memory_cost, self.time_cost, self.parallelism, Some(32))
            .map_err(|e| KeyStoreError::invalid_input(format!("Invalid KDF params: {}", e)))
    }
}

/// Keystore settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyStoreConfig {
    /// Network master extended keys are created for
    pub network: Network,
    pub kdf: KdfParams,
    /// Marker appended to hardened indices when building keypaths
    pub hardened_marker: char,
    /// Template used when a chain is created without an explicit one
    pub default_keypath_template: String,
    /// Emit debug-level log entries
    pub debug_logging: bool,
}

impl Default for KeyStoreConfig {
    fn default() -> Self {
        Self {
            network: Network::Bitcoin,
            kdf: KdfParams::default(),
            hardened_marker: '\'',
            default_keypath_template: "m/44'/0'/0'/c".to_string(),
            debug_logging: false,
        }
    }
}

impl KeyStoreConfig {
    pub fn testnet() -> Self {
        Self {
            network: Network::Testnet,
            default_keypath_template: "m/44'/1'/0'/c".to_string(),
            ..Self::default()
        }
    }

    /// Regtest with the cheapest KDF, so tests that encrypt stay fast
    pub fn for_testing() -> Self {
        Self {
            network: Network::Regtest,
            kdf: KdfParams::minimal(),
            default_keypath_template: "m/44'/1'/0'/c".to_string(),
            ..Self::default()
        }
    }

    pub fn with_network(mut self, network: Network) -> Self {
        self.network = network;
        self
    }

    pub fn with_kdf(mut self, kdf: KdfParams) -> Self {
        self.kdf = kdf;
        self
    }

    pub fn with_debug_logging(mut self, enabled: bool) -> Self {
        self.debug_logging = enabled;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> KeyStoreResult<()> {
        if !HARDENED_MARKERS.contains(&self.hardened_marker) {
            return Err(KeyStoreError::invalid_input(format!(
                "Unsupported hardened marker: {}",
                self.hardened_marker
            )));
        }

        validate_template(&self.default_keypath_template)?;
        self.kdf.to_argon2()?;
        Ok(())
    }
}

/// Check that a keypath template is non-empty and carries the branch placeholder
pub fn validate_template(template: &str) -> KeyStoreResult<()> {
    if template.trim().is_empty() {
        return Err(KeyStoreError::invalid_keypath("Keypath template is empty"));
    }
    if !template.split('/').any(|fragment| fragment == BRANCH_PLACEHOLDER) {
        return Err(KeyStoreError::invalid_keypath(format!(
            "Keypath template has no '{}' branch fragment: {}",
            BRANCH_PLACEHOLDER, template
        )));
    }
    Ok(())
}
