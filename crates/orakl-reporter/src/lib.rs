//! # orakl-reporter
//!
//! Off-ledger reporting: turns queued jobs into confirmed transactions.
//!
//! A [`worker::WorkerPool`] claims jobs from the durable queue and hands
//! them to a [`worker::JobProcessor`]: either the plain
//! [`pipeline::Reporter`] or the [`guard::StaleRoundGuard`] in front of it
//! for aggregator-bound jobs. The reporter resolves the oracle wallet from
//! [`state::SubmitterState`] and walks the channel fallback chain
//! `external delegator -> direct delegation -> direct` with a bounded
//! number of trials.
//!
//! ## Modules
//!
//! - [`state`]: active wallets and the delegated-fee capability
//! - [`channel`]: submission channel trait and error classes
//! - [`pipeline`]: per-job trial loop over the channel chain
//! - [`guard`]: drops jobs for superseded rounds
//! - [`queue`]: SQLite-backed queue handle
//! - [`worker`]: pool of queue consumers
//! - [`rpc`]: JSON-RPC submission channel
//! - [`delegator`]: fee delegator submission channel
//! - [`signer`]: remote transaction signing

pub mod channel;
pub mod delegator;
pub mod guard;
pub mod pipeline;
pub mod queue;
pub mod rpc;
pub mod signer;
pub mod state;
pub mod worker;

pub use channel::{ChannelError, SubmissionChannel, TxReceipt, TxRequest};
pub use guard::StaleRoundGuard;
pub use pipeline::Reporter;
pub use state::{SubmitterState, WalletRecord};

use orakl_types::{Address, RoundId};

/// Reporter error types.
#[derive(Debug, thiserror::Error)]
pub enum ReporterError {
    /// No active wallet reports to this aggregator.
    #[error("wallet for oracle {0} is not active")]
    WalletNotActive(Address),

    /// Aggregator-bound job id does not follow `<roundId>-<oracle>-<nonce>`.
    #[error("unexpected job id: {0}")]
    UnexpectedJobId(String),

    /// A newer round was already enqueued for the same oracle.
    #[error("not reporting for stale round {round_id}: latest is {latest}")]
    StaleRound { round_id: RoundId, latest: RoundId },

    /// Every trial ended in a retryable error.
    #[error("transaction not confirmed after {trials} trials")]
    RetriesExhausted { trials: u32 },

    /// A channel error outside the retryable classes.
    #[error("submission failed: {0}")]
    Channel(#[from] ChannelError),

    #[error("wallet source error: {0}")]
    WalletSource(String),

    #[error("queue error: {0}")]
    Queue(#[from] orakl_db::DbError),
}

impl ReporterError {
    /// Whether the job must be terminated instead of redelivered.
    pub fn is_permanent(&self) -> bool {
        match self {
            Self::WalletNotActive(_)
            | Self::UnexpectedJobId(_)
            | Self::StaleRound { .. }
            | Self::RetriesExhausted { .. }
            | Self::Channel(_) => true,
            Self::WalletSource(_) | Self::Queue(_) => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ReporterError>;
