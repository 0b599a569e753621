//! # orakl-aggregator
//!
//! On-ledger price feed aggregation.
//!
//! A permissioned set of oracles submits values per round to an
//! [`AggregatorLedger`]. Once a round collects `minSubmissionCount`
//! submissions its answer is the median of everything received so far.
//! Consumers read through an [`AggregatorProxy`], which can be repointed to
//! a new aggregator with a propose/confirm swap while keeping every older
//! round addressable.
//!
//! ## Modules
//!
//! - [`ledger`]: aggregator round state machine and requester permissions
//! - [`membership`]: oracle set with per-oracle reporting windows
//! - [`round`]: round records and their lifecycle
//! - [`median`]: median with floor-averaged even counts
//! - [`proxy`]: phase-indexed indirection over aggregator instances
//! - [`deployments`]: registry owning every deployed aggregator instance

pub mod deployments;
pub mod ledger;
pub mod median;
pub mod membership;
pub mod proxy;
pub mod round;

pub use deployments::Deployments;
pub use ledger::{AggregatorConfig, AggregatorLedger, OracleRoundState};
pub use proxy::AggregatorProxy;

use orakl_types::{Address, PhaseId, RoundId};

/// Maximum number of oracles an aggregator accepts.
pub const MAX_ORACLE_COUNT: usize = 77;

/// Version string reported by aggregators and proxies.
pub const TYPE_AND_VERSION: &str = "Aggregator v0.1";

/// Errors raised by aggregator and proxy entry points.
///
/// A failing entry point leaves the instance untouched.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AggregatorError {
    /// Caller is not the instance owner.
    #[error("Ownable: caller is not the owner ({0})")]
    NotOwner(Address),

    /// Oracle is not a current member.
    #[error("oracle not enabled: {0}")]
    OracleNotEnabled(Address),

    /// Oracle is already a current member.
    #[error("oracle already enabled: {0}")]
    OracleAlreadyEnabled(Address),

    /// Membership change would exceed [`MAX_ORACLE_COUNT`].
    #[error("too many oracles: {count} exceeds {max}")]
    TooManyOracles {
        count: usize,
        max: usize,
    },

    #[error("min submission count {min} exceeds max submission count {max}")]
    MinSubmissionGtMaxSubmission {
        min: u32,
        max: u32,
    },

    #[error("max submission count {max} exceeds oracle count {oracles}")]
    MaxSubmissionGtOracleNum {
        max: u32,
        oracles: usize,
    },

    #[error("restart delay {delay} must be below oracle count {oracles}")]
    RestartDelayExceedOracleNum {
        delay: u32,
        oracles: usize,
    },

    #[error("min submission count must be positive")]
    MinSubmissionZero,

    /// Oracle was added for a later round.
    #[error("oracle {oracle} not yet enabled for round {round_id}")]
    NotYetEnabledOracle {
        oracle: Address,
        round_id: RoundId,
    },

    /// Oracle already reported on this or a later round.
    #[error("cannot report on previous round {round_id}")]
    CannotReportPreviousRound {
        round_id: RoundId,
    },

    /// Round is neither the current, the next nor a still-open previous round.
    #[error("invalid round to report: {round_id}")]
    InvalidRoundToReport {
        round_id: RoundId,
    },

    /// The round before the requested one is neither answered nor timed out.
    #[error("previous round not supersedable: {round_id}")]
    PrevRoundNotSupersedable {
        round_id: RoundId,
    },

    /// Round is closed, full, or could not be opened by this oracle yet.
    #[error("round not accepting submissions: {round_id}")]
    RoundNotAcceptingSubmissions {
        round_id: RoundId,
    },

    #[error("requester not authorized: {0}")]
    RequesterNotAuthorized(Address),

    /// Requester opened a round too recently.
    #[error("requester {requester} must delay requests until after round {available_after}")]
    RequesterDelayNotMet {
        requester: Address,
        available_after: RoundId,
    },

    /// Round has no answer yet.
    #[error("No data present")]
    NoDataPresent,

    /// Confirmed address differs from the proposed one.
    #[error("invalid proposed aggregator: {0}")]
    InvalidProposedAggregator(Address),

    #[error("No proposed aggregator present")]
    NoProposedAggregator,

    /// No aggregator was ever confirmed for this phase.
    #[error("unknown phase: {0}")]
    UnknownPhase(PhaseId),

    /// Address does not belong to a deployed aggregator.
    #[error("unknown aggregator: {0}")]
    UnknownAggregator(Address),
}

/// Convenience result type for aggregator operations.
pub type Result<T> = std::result::Result<T, AggregatorError>;
