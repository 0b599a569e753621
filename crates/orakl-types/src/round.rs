//! Round data and the proxy-facing round identifier.
//!
//! A proxy addresses rounds of every aggregator it ever pointed at through a
//! single 128-bit identifier:
//!
//! ```text
//! externalId = (phaseId << 64) | localRoundId
//! ```
//!
//! so that ids keep increasing across aggregator swaps.

use serde::{Deserialize, Serialize};

use crate::{Answer, PhaseId, RoundId, Timestamp};

/// Number of bits the phase id is shifted by in an external round id.
pub const PHASE_OFFSET: u32 = 64;

/// Answer data for one round.
///
/// `round_id` and `answered_in_round` are local round ids when read from an
/// aggregator and external ids when read through a proxy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundData {
    pub round_id: u128,
    pub answer: Answer,
    pub started_at: Timestamp,
    pub updated_at: Timestamp,
    pub answered_in_round: u128,
}

impl RoundData {
    /// Rewrite both round ids as external ids of `phase_id`.
    pub fn with_phase(self, phase_id: PhaseId) -> Self {
        Self {
            round_id: external_round_id(phase_id, self.round_id as RoundId),
            answered_in_round: external_round_id(phase_id, self.answered_in_round as RoundId),
            ..self
        }
    }
}

/// Encode `(phase_id, round_id)` into an external round id.
pub fn external_round_id(phase_id: PhaseId, round_id: RoundId) -> u128 {
    (u128::from(phase_id) << PHASE_OFFSET) | u128::from(round_id)
}

/// Split an external round id into `(phase_id, local_round_id)`.
pub fn parse_external_round_id(external_id: u128) -> (PhaseId, RoundId) {
    let phase_id = (external_id >> PHASE_OFFSET) as PhaseId;
    let round_id = external_id as RoundId;
    (phase_id, round_id)
}
