//! Chain registry and chain bootstrap

use std::collections::BTreeSet;

use bip39::Mnemonic;
use bitcoin::bip32::Xpub;
use zeroize::Zeroizing;

use super::base::BaseKeyStore;
use super::keypath::{resolve_template, Keypath};
use super::HdKeyStore;
use crate::config::validate_template;
use crate::crypto::ExtKey;
use crate::error::{KeyStoreError, KeyStoreResult};
use crate::security::KeyingMaterial;
use crate::types::{ChainId, HdChain};
use crate::{log_debug, log_info};

const MODULE: &str = "chains";

impl<B: BaseKeyStore> HdKeyStore<B> {
    /// Insert or replace a chain record
    pub fn add_chain(&self, chain: HdChain) -> KeyStoreResult<()> {
        if !chain.is_valid() {
            return Err(KeyStoreError::invalid_input(format!(
                "Chain {} is invalid: empty template or missing external root",
                chain.chain_id
            )));
        }

        let chain_id = chain.chain_id;
        self.state()?.chains.insert(chain_id, chain);

        log_debug!(MODULE, "Chain registered", chain_id = chain_id);
        Ok(())
    }

    pub fn get_chain(&self, chain_id: &ChainId) -> KeyStoreResult<HdChain> {
        self.state()?
            .chains
            .get(chain_id)
            .cloned()
            .ok_or_else(|| KeyStoreError::chain_not_found(format!("Unknown chain {}", chain_id)))
    }

    /// Chains that have usable seed material in the active seed map
    ///
    /// Sourced from the seed store, not the registry: a chain added without
    /// a seed is not available.
    pub fn get_available_chain_ids(&self) -> KeyStoreResult<BTreeSet<ChainId>> {
        let state = self.state()?;
        let ids = if self.base.is_crypted() {
            state.crypted_master_seeds.keys().copied().collect()
        } else {
            state.master_seeds.keys().copied().collect()
        };
        Ok(ids)
    }

    /// Create a chain from a master seed and register both seed and chain
    ///
    /// The template defaults to the configured one. With `use_pub_ckd` the
    /// external and internal branch roots are derived now, so later child
    /// pubkeys never need the seed.
    pub fn create_chain_from_seed(
        &self,
        seed: KeyingMaterial,
        keypath_template: Option<&str>,
        use_pub_ckd: bool,
        create_time: i64,
    ) -> KeyStoreResult<ChainId> {
        let template = keypath_template
            .unwrap_or(&self.config.default_keypath_template)
            .to_string();
        validate_template(&template)?;

        let master = ExtKey::from_seed_material(&seed, self.config.network)?;
        let chain_id = ChainId::from_master_xpub(&master.neuter(&self.secp));

        let mut chain = HdChain::new(chain_id, template.clone(), create_time);
        if use_pub_ckd {
            let external = self.branch_root(&master, &template, false)?;
            let internal = self.branch_root(&master, &template, true)?;
            chain = chain.with_branch_roots(external, Some(internal));
        }
        drop(master);

        self.add_master_seed(&chain_id, seed)?;
        self.add_chain(chain)?;

        log_info!(MODULE, "Chain created", chain_id = chain_id, use_pub_ckd = use_pub_ckd);
        Ok(chain_id)
    }

    /// Create a chain from a BIP39 mnemonic and optional passphrase
    pub fn create_chain_from_mnemonic(
        &self,
        phrase: &str,
        passphrase: &str,
        keypath_template: Option<&str>,
        use_pub_ckd: bool,
        create_time: i64,
    ) -> KeyStoreResult<ChainId> {
        let mnemonic = Mnemonic::parse(phrase)?;
        let seed = Zeroizing::new(mnemonic.to_seed(passphrase));
        let seed = KeyingMaterial::from_bytes(seed.as_ref());
        self.create_chain_from_seed(seed, keypath_template, use_pub_ckd, create_time)
    }

    /// Public key at the template resolved for one branch
    fn branch_root(&self, master: &ExtKey, template: &str, internal: bool) -> KeyStoreResult<Xpub> {
        let path = Keypath::parse(&resolve_template(template, internal))?;

        let mut current: Option<ExtKey> = None;
        for step in path.steps() {
            let next = current
                .as_ref()
                .unwrap_or(master)
                .derive_child(&self.secp, step.child_number())?;
            current = Some(next);
        }

        Ok(current.as_ref().unwrap_or(master).neuter(&self.secp))
    }
}
