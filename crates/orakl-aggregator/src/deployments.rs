//! Registry of deployed aggregator instances.
//!
//! Stands in for the ledger's account space: every aggregator lives at an
//! address derived from its deployer and a deployment counter, and proxies
//! resolve their phase aggregators through this registry.

use std::collections::BTreeMap;

use orakl_types::Address;

use crate::ledger::{AggregatorConfig, AggregatorLedger};
use crate::{AggregatorError, Result};

/// Key-derivation context for instance addresses.
const DEPLOYMENT_CONTEXT: &str = "Orakl v1 aggregator deployment address";

/// All aggregator instances, keyed by address.
#[derive(Debug, Default)]
pub struct Deployments {
    instances: BTreeMap<Address, AggregatorLedger>,
    nonce: u64,
}

impl Deployments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deploy a new aggregator owned by `deployer` and return its address.
    pub fn deploy(&mut self, deployer: Address, config: AggregatorConfig) -> Address {
        let address = derive_address(&deployer, self.nonce);
        self.nonce += 1;
        self.instances
            .insert(address, AggregatorLedger::new(address, deployer, config));
        address
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.instances.contains_key(address)
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// # Errors
    ///
    /// - [`AggregatorError::UnknownAggregator`] if nothing is deployed at `address`
    pub fn get(&self, address: &Address) -> Result<&AggregatorLedger> {
        self.instances
            .get(address)
            .ok_or(AggregatorError::UnknownAggregator(*address))
    }

    /// # Errors
    ///
    /// - [`AggregatorError::UnknownAggregator`] if nothing is deployed at `address`
    pub fn get_mut(&mut self, address: &Address) -> Result<&mut AggregatorLedger> {
        self.instances
            .get_mut(address)
            .ok_or(AggregatorError::UnknownAggregator(*address))
    }
}

fn derive_address(deployer: &Address, nonce: u64) -> Address {
    let mut hasher = blake3::Hasher::new_derive_key(DEPLOYMENT_CONTEXT);
    hasher.update(deployer.as_bytes());
    hasher.update(&nonce.to_le_bytes());
    Address::from_digest(hasher.finalize().as_bytes())
}
