//! Oracle membership for one aggregator instance.
//!
//! Each oracle keeps its status across removals so that re-adding it cannot
//! let it report twice on the same round. An oracle's reporting window
//! starts at `starting_round`; `last_reported_round` bars it from every
//! round up to and including the last one it contributed to.

use std::collections::HashMap;

use orakl_types::{Address, Answer, RoundId};
use serde::{Deserialize, Serialize};

use crate::{AggregatorError, Result};

/// Per-oracle bookkeeping.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleStatus {
    /// Whether the oracle is a current member.
    pub enabled: bool,
    /// First round the oracle may report on.
    pub starting_round: RoundId,
    /// Reporting round at the time the oracle was last removed.
    pub ending_round: RoundId,
    /// Last round the oracle contributed a submission to.
    pub last_reported_round: RoundId,
    /// Last round opened by one of this oracle's submissions.
    pub last_started_round: RoundId,
    /// Value of the oracle's most recent submission.
    pub latest_submission: Answer,
}

/// The set of oracles authorized to submit to an aggregator.
#[derive(Clone, Debug, Default)]
pub struct OracleMembership {
    statuses: HashMap<Address, OracleStatus>,
    /// Enabled oracles in the order they were added.
    enabled: Vec<Address>,
}

impl OracleMembership {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of enabled oracles.
    pub fn len(&self) -> usize {
        self.enabled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.enabled.is_empty()
    }

    /// Enabled oracles in insertion order.
    pub fn oracles(&self) -> &[Address] {
        &self.enabled
    }

    pub fn is_enabled(&self, oracle: &Address) -> bool {
        self.statuses.get(oracle).is_some_and(|s| s.enabled)
    }

    /// Status of an oracle, including removed ones.
    pub fn status(&self, oracle: &Address) -> Option<&OracleStatus> {
        self.statuses.get(oracle)
    }

    pub(crate) fn status_mut(&mut self, oracle: &Address) -> Option<&mut OracleStatus> {
        self.statuses.get_mut(oracle)
    }

    /// Disable an oracle while `reporting_round` is the newest round.
    ///
    /// # Errors
    ///
    /// - [`AggregatorError::OracleNotEnabled`] if the oracle is not a member
    pub fn remove(&mut self, oracle: Address, reporting_round: RoundId) -> Result<()> {
        let status = self
            .statuses
            .get_mut(&oracle)
            .filter(|s| s.enabled)
            .ok_or(AggregatorError::OracleNotEnabled(oracle))?;

        status.enabled = false;
        status.ending_round = reporting_round;
        self.enabled.retain(|o| *o != oracle);
        Ok(())
    }

    /// Enable an oracle while `reporting_round` is the newest round.
    ///
    /// A fresh oracle starts at the next round. An oracle removed during the
    /// current round may rejoin it; its last reported round still applies.
    ///
    /// # Errors
    ///
    /// - [`AggregatorError::OracleAlreadyEnabled`] if the oracle is a member
    pub fn add(&mut self, oracle: Address, reporting_round: RoundId) -> Result<()> {
        let status = self.statuses.entry(oracle).or_default();
        if status.enabled {
            return Err(AggregatorError::OracleAlreadyEnabled(oracle));
        }

        status.starting_round = if reporting_round != 0 && status.ending_round == reporting_round
        {
            reporting_round
        } else {
            reporting_round + 1
        };
        status.enabled = true;
        self.enabled.push(oracle);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oracle(id: u8) -> Address {
        Address([id; 20])
    }

    #[test]
    fn test_add_starts_next_round() {
        let mut m = OracleMembership::new();
        m.add(oracle(1), 0).expect("add");
        m.add(oracle(2), 4).expect("add");
        assert_eq!(m.len(), 2);
        assert_eq!(m.status(&oracle(1)).expect("status").starting_round, 1);
        assert_eq!(m.status(&oracle(2)).expect("status").starting_round, 5);
        assert_eq!(m.oracles(), &[oracle(1), oracle(2)]);
    }

    #[test]
    fn test_add_twice_fails() {
        let mut m = OracleMembership::new();
        m.add(oracle(1), 0).expect("add");
        let err = m.add(oracle(1), 0).expect_err("duplicate");
        assert_eq!(err, AggregatorError::OracleAlreadyEnabled(oracle(1)));
        assert_eq!(m.len(), 1);
    }

    #[test]
    fn test_remove_non_member_fails() {
        let mut m = OracleMembership::new();
        let err = m.remove(oracle(9), 0).expect_err("not a member");
        assert_eq!(err, AggregatorError::OracleNotEnabled(oracle(9)));
    }

    #[test]
    fn test_remove_keeps_status() {
        let mut m = OracleMembership::new();
        m.add(oracle(1), 0).expect("add");
        m.add(oracle(2), 0).expect("add");
        m.remove(oracle(1), 3).expect("remove");
        assert!(!m.is_enabled(&oracle(1)));
        assert_eq!(m.oracles(), &[oracle(2)]);
        assert_eq!(m.status(&oracle(1)).expect("status").ending_round, 3);

        let err = m.remove(oracle(1), 3).expect_err("already removed");
        assert_eq!(err, AggregatorError::OracleNotEnabled(oracle(1)));
    }

    #[test]
    fn test_readd_in_same_round_rejoins_it() {
        let mut m = OracleMembership::new();
        m.add(oracle(1), 0).expect("add");
        m.status_mut(&oracle(1)).expect("status").last_reported_round = 3;
        m.remove(oracle(1), 3).expect("remove");
        m.add(oracle(1), 3).expect("re-add");

        let status = m.status(&oracle(1)).expect("status");
        assert_eq!(status.starting_round, 3);
        assert_eq!(status.last_reported_round, 3);
    }
}
