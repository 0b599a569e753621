//! Events emitted by aggregator and proxy instances.
//!
//! Every state-changing entry point returns the events it emitted, in
//! emission order, the way a transaction receipt lists its logs.

use serde::{Deserialize, Serialize};

use crate::{Address, Answer, RoundId, Timestamp};

/// A single ledger event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "PascalCase")]
pub enum LedgerEvent {
    // Aggregator events
    NewRound {
        round_id: RoundId,
        started_by: Address,
        started_at: Timestamp,
    },
    SubmissionReceived {
        submission: Answer,
        round_id: RoundId,
        oracle: Address,
    },
    AnswerUpdated {
        current: Answer,
        round_id: RoundId,
        updated_at: Timestamp,
    },
    OraclePermissionsUpdated {
        oracle: Address,
        whitelisted: bool,
    },
    RoundDetailsUpdated {
        min_submission_count: u32,
        max_submission_count: u32,
        restart_delay: u32,
        timeout: u64,
    },
    RequesterPermissionsSet {
        requester: Address,
        authorized: bool,
        delay: u32,
    },

    // Proxy events
    AggregatorProposed {
        current: Address,
        proposed: Address,
    },
    AggregatorConfirmed {
        previous: Address,
        latest: Address,
    },

    // Shared
    OwnershipTransferred {
        previous_owner: Address,
        new_owner: Address,
    },
}

impl LedgerEvent {
    /// Event name as it appears in logs.
    pub fn name(&self) -> &'static str {
        match self {
            LedgerEvent::NewRound { .. } => "NewRound",
            LedgerEvent::SubmissionReceived { .. } => "SubmissionReceived",
            LedgerEvent::AnswerUpdated { .. } => "AnswerUpdated",
            LedgerEvent::OraclePermissionsUpdated { .. } => "OraclePermissionsUpdated",
            LedgerEvent::RoundDetailsUpdated { .. } => "RoundDetailsUpdated",
            LedgerEvent::RequesterPermissionsSet { .. } => "RequesterPermissionsSet",
            LedgerEvent::AggregatorProposed { .. } => "AggregatorProposed",
            LedgerEvent::AggregatorConfirmed { .. } => "AggregatorConfirmed",
            LedgerEvent::OwnershipTransferred { .. } => "OwnershipTransferred",
        }
    }
}
