//! # orakl-types
//!
//! Shared domain types used across the Orakl workspace: ledger addresses,
//! the proxy-facing round identifier, reporter jobs, the `submit` call
//! payload and the events emitted by aggregator and proxy instances.

pub mod address;
pub mod call;
pub mod events;
pub mod job;
pub mod round;

pub use address::Address;
pub use call::SubmitCall;
pub use events::LedgerEvent;
pub use job::{Job, JobId};
pub use round::RoundData;

/// Round identifier local to one aggregator instance.
pub type RoundId = u64;

/// Identifier of the period during which an aggregator is the proxy target.
pub type PhaseId = u64;

/// Submitted and aggregated answer values.
pub type Answer = i128;

/// Unix timestamp in seconds.
pub type Timestamp = u64;

/// Delimiter between the parts of an aggregator-bound job identity.
pub const JOB_ID_DELIMITER: char = '-';

/// Errors produced while parsing or decoding shared types.
#[derive(Debug, thiserror::Error)]
pub enum TypesError {
    /// Address string is not 20 bytes of hex.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Job identity does not follow `<roundId>-<oracleAddress>-<nonce>`.
    #[error("unexpected job id: {0}")]
    UnexpectedJobId(String),

    /// Call payload cannot be decoded.
    #[error("invalid calldata: {0}")]
    InvalidCalldata(String),
}

/// Convenience result type for shared type parsing.
pub type Result<T> = std::result::Result<T, TypesError>;
