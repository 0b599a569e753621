//! Submitter state: which wallets may report, and how fees are paid.
//!
//! The state is an owned object passed by reference to every component that
//! needs it. [`SubmitterState::refresh`] reloads the wallet set from its
//! [`WalletSource`]; a failed reload keeps the previous set.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use orakl_types::Address;
use tokio::sync::RwLock;

use crate::queue::SharedDb;
use crate::{ReporterError, Result};

/// Chains on which transaction fees can be delegated.
pub const FEE_DELEGATION_CHAINS: [&str; 2] = ["baobab", "cypress"];

/// Signer credential of one oracle, keyed by the aggregator it reports to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WalletRecord {
    /// Aggregator the wallet reports to.
    pub contract: Address,
    /// Oracle identity the wallet signs as.
    pub address: Address,
    /// Key handle at the signer.
    pub key_id: String,
}

/// Where wallet records come from.
#[async_trait]
pub trait WalletSource: Send + Sync {
    async fn load(&self, service: &str, chain: &str) -> Result<Vec<WalletRecord>>;
}

/// Wallets stored in the `reporters` table.
pub struct DbWalletSource {
    db: SharedDb,
}

impl DbWalletSource {
    pub fn new(db: SharedDb) -> Self {
        Self { db }
    }
}

#[async_trait]
impl WalletSource for DbWalletSource {
    async fn load(&self, service: &str, chain: &str) -> Result<Vec<WalletRecord>> {
        let conn = self.db.lock().await;
        let rows = orakl_db::queries::reporters::list_active(&conn, service, chain)
            .map_err(|e| ReporterError::WalletSource(e.to_string()))?;
        Ok(rows
            .into_iter()
            .map(|row| WalletRecord {
                contract: row.contract,
                address: row.address,
                key_id: row.key_id,
            })
            .collect())
    }
}

/// Static settings of a [`SubmitterState`].
#[derive(Clone, Debug)]
pub struct StateConfig {
    /// Name used in logs to tell reporter instances apart.
    pub name: String,
    pub service: String,
    pub chain: String,
    /// Operator toggle for fee delegation.
    pub delegated_fee: bool,
}

/// Active wallets of one reporter service on one chain.
pub struct SubmitterState {
    config: StateConfig,
    source: Arc<dyn WalletSource>,
    wallets: RwLock<HashMap<Address, WalletRecord>>,
}

impl SubmitterState {
    /// Create an empty state. Call [`refresh`](Self::refresh) to load wallets.
    pub fn new(config: StateConfig, source: Arc<dyn WalletSource>) -> Self {
        Self {
            config,
            source,
            wallets: RwLock::new(HashMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn chain(&self) -> &str {
        &self.config.chain
    }

    /// Whether transactions go through fee delegation: the operator turned
    /// it on and the chain supports it.
    pub fn delegated_fee(&self) -> bool {
        self.config.delegated_fee && FEE_DELEGATION_CHAINS.contains(&self.config.chain.as_str())
    }

    /// Reload wallets from the source. Returns the number of active wallets.
    ///
    /// On failure the previously loaded wallets stay active.
    pub async fn refresh(&self) -> Result<usize> {
        match self.source.load(&self.config.service, &self.config.chain).await {
            Ok(records) => {
                let wallets: HashMap<Address, WalletRecord> =
                    records.into_iter().map(|w| (w.contract, w)).collect();
                let count = wallets.len();
                *self.wallets.write().await = wallets;
                tracing::info!(state = %self.config.name, wallets = count, "wallets refreshed");
                Ok(count)
            }
            Err(e) => {
                let kept = self.wallets.read().await.len();
                tracing::warn!(
                    state = %self.config.name,
                    error = %e,
                    kept,
                    "wallet refresh failed, keeping previous wallets"
                );
                Err(e)
            }
        }
    }

    /// Wallet reporting to `contract`, if active.
    pub async fn lookup(&self, contract: &Address) -> Option<WalletRecord> {
        self.wallets.read().await.get(contract).cloned()
    }

    /// All active wallets, ordered by contract address.
    pub async fn active(&self) -> Vec<WalletRecord> {
        let mut wallets: Vec<WalletRecord> = self.wallets.read().await.values().cloned().collect();
        wallets.sort_by_key(|w| w.contract);
        wallets
    }

    /// Deactivate the wallet of `contract` until the next refresh.
    pub async fn remove(&self, contract: &Address) -> bool {
        let removed = self.wallets.write().await.remove(contract).is_some();
        if removed {
            tracing::info!(state = %self.config.name, contract = %contract, "wallet deactivated");
        }
        removed
    }
}
