//! Reporting pipeline: one job, a bounded number of trials.
//!
//! ## Channel selection
//!
//! Each trial uses exactly one channel, chosen by the job's
//! [`DelegationChannel`]:
//!
//! | state | channel | retried on | downgrades on |
//! |---|---|---|---|
//! | `ExternalDelegator` | delegator service | any other error | `DelegatorServerIssue` |
//! | `DirectDelegation` | node, fee-delegated | `TxTransactionFailed` | - |
//! | `Disabled` | node, plain | `TxNotMined`, `TxProcessingResponseError`, `TxMissingResponseError` | - |
//!
//! An error outside the retry classes aborts the job. The state starts at
//! `ExternalDelegator` when fee delegation is enabled and never outlives one
//! job.

use std::sync::Arc;

use async_trait::async_trait;
use orakl_types::Job;

use crate::channel::{ChannelError, SubmissionChannel, TxReceipt, TxRequest};
use crate::state::SubmitterState;
use crate::worker::JobProcessor;
use crate::{ReporterError, Result};

/// Trials per job.
pub const NUM_TRANSACTION_TRIALS: u32 = 3;

/// Which channel the next trial of a job uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DelegationChannel {
    /// Fee delegation is off: plain transactions.
    Disabled,
    ExternalDelegator,
    DirectDelegation,
}

/// The three channels of the fallback chain.
#[derive(Clone)]
pub struct Channels {
    pub external_delegator: Arc<dyn SubmissionChannel>,
    pub direct_delegation: Arc<dyn SubmissionChannel>,
    pub direct: Arc<dyn SubmissionChannel>,
}

/// Submits jobs for the wallets of one [`SubmitterState`].
pub struct Reporter {
    state: Arc<SubmitterState>,
    channels: Channels,
}

impl Reporter {
    pub fn new(state: Arc<SubmitterState>, channels: Channels) -> Self {
        Self { state, channels }
    }

    pub fn state(&self) -> &Arc<SubmitterState> {
        &self.state
    }

    /// Submit `job` and return the receipt of the confirmed transaction.
    ///
    /// # Errors
    ///
    /// - [`ReporterError::WalletNotActive`] if no wallet reports to `job.to`
    /// - [`ReporterError::Channel`] on an error outside the retry classes
    /// - [`ReporterError::RetriesExhausted`] if every trial failed retryably
    pub async fn report(&self, job: &Job) -> Result<TxReceipt> {
        let wallet = self
            .state
            .lookup(&job.to)
            .await
            .ok_or(ReporterError::WalletNotActive(job.to))?;

        let tx = TxRequest {
            from: wallet.address,
            key_id: wallet.key_id,
            to: job.to,
            payload: job.payload.clone(),
            gas_limit: job.gas_limit,
        };

        let mut channel = if self.state.delegated_fee() {
            DelegationChannel::ExternalDelegator
        } else {
            DelegationChannel::Disabled
        };

        for trial in 0..NUM_TRANSACTION_TRIALS {
            match channel {
                DelegationChannel::ExternalDelegator => {
                    match self.channels.external_delegator.submit(&tx).await {
                        Ok(receipt) => return Ok(self.confirmed(&tx, receipt, channel)),
                        Err(ChannelError::DelegatorServerIssue(e)) => {
                            tracing::warn!(to = %tx.to, trial, error = %e, "delegator unavailable, switching to direct delegation");
                            channel = DelegationChannel::DirectDelegation;
                        }
                        Err(e) => {
                            tracing::warn!(to = %tx.to, trial, error = %e, "delegated submission failed");
                        }
                    }
                }
                DelegationChannel::DirectDelegation => {
                    match self.channels.direct_delegation.submit(&tx).await {
                        Ok(receipt) => return Ok(self.confirmed(&tx, receipt, channel)),
                        Err(e) if e.is_execution_failure() => {
                            tracing::warn!(to = %tx.to, trial, error = %e, "fee-delegated transaction failed");
                        }
                        Err(e) => return Err(e.into()),
                    }
                }
                DelegationChannel::Disabled => match self.channels.direct.submit(&tx).await {
                    Ok(receipt) => return Ok(self.confirmed(&tx, receipt, channel)),
                    Err(e) if e.is_direct_retryable() => {
                        tracing::info!(to = %tx.to, trial, error = %e, "retrying transaction");
                    }
                    Err(e) => return Err(e.into()),
                },
            }
        }

        Err(ReporterError::RetriesExhausted {
            trials: NUM_TRANSACTION_TRIALS,
        })
    }

    fn confirmed(&self, tx: &TxRequest, receipt: TxReceipt, channel: DelegationChannel) -> TxReceipt {
        tracing::info!(
            state = %self.state.name(),
            to = %tx.to,
            oracle = %tx.from,
            tx_hash = %receipt.tx_hash,
            block = receipt.block_number,
            channel = ?channel,
            "transaction confirmed"
        );
        receipt
    }
}

#[async_trait]
impl JobProcessor for Reporter {
    async fn process(&self, _job_id: &str, job: &Job) -> Result<TxReceipt> {
        self.report(job).await
    }
}
