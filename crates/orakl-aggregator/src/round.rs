//! Round records.
//!
//! Rounds live in an arena indexed by round id (round `n` at index `n - 1`).
//! A round goes `Open → Closed(Answered | TimedOut)`; a round id with no
//! record yet is idle. The thresholds in effect when the round opened are
//! stored with it, so later membership changes do not affect it.

use orakl_types::{Address, Answer, RoundData, RoundId, Timestamp};
use serde::{Deserialize, Serialize};

use crate::median::median;

/// Why a round stopped accepting submissions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CloseReason {
    /// The round produced an answer and was filled or superseded.
    Answered,
    /// The round passed its deadline without reaching the minimum count.
    TimedOut,
}

/// Lifecycle state of a round id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundStatus {
    Idle,
    Open,
    Closed(CloseReason),
}

/// One oracle's contribution to a round.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub oracle: Address,
    pub value: Answer,
}

/// A single round.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Round {
    pub round_id: RoundId,
    pub started_by: Address,
    pub started_at: Timestamp,
    /// Time of the last answer update, 0 while unanswered.
    pub updated_at: Timestamp,
    pub answer: Option<Answer>,
    pub answered_in_round: RoundId,
    /// Seconds after `started_at` before an unanswered round times out.
    pub timeout: u64,
    pub min_submission_count: u32,
    pub max_submission_count: u32,
    submissions: Vec<Submission>,
    closed: Option<CloseReason>,
}

impl Round {
    /// Open a round with the thresholds currently in effect.
    pub fn open(
        round_id: RoundId,
        started_by: Address,
        started_at: Timestamp,
        timeout: u64,
        min_submission_count: u32,
        max_submission_count: u32,
    ) -> Self {
        Self {
            round_id,
            started_by,
            started_at,
            updated_at: 0,
            answer: None,
            answered_in_round: 0,
            timeout,
            min_submission_count,
            max_submission_count,
            submissions: Vec::with_capacity(max_submission_count as usize),
            closed: None,
        }
    }

    pub fn submissions(&self) -> &[Submission] {
        &self.submissions
    }

    pub fn has_submitted(&self, oracle: &Address) -> bool {
        self.submissions.iter().any(|s| s.oracle == *oracle)
    }

    pub fn is_answered(&self) -> bool {
        self.answer.is_some()
    }

    /// Whether the round's deadline passed at `now`. A deadline past
    /// `u64::MAX` is never reached.
    pub fn is_timed_out(&self, now: Timestamp) -> bool {
        if self.started_at == 0 || self.timeout == 0 {
            return false;
        }
        self.started_at
            .checked_add(self.timeout)
            .is_some_and(|deadline| deadline < now)
    }

    pub fn status(&self, now: Timestamp) -> RoundStatus {
        if let Some(reason) = self.closed {
            return RoundStatus::Closed(reason);
        }
        if !self.is_answered() && self.is_timed_out(now) {
            return RoundStatus::Closed(CloseReason::TimedOut);
        }
        RoundStatus::Open
    }

    /// Whether the next round may open after this one.
    pub fn is_supersedable(&self, now: Timestamp) -> bool {
        self.is_answered() || self.is_timed_out(now)
    }

    /// Whether a new submission fits into this round at `now`.
    pub fn is_accepting(&self, now: Timestamp) -> bool {
        self.status(now) == RoundStatus::Open
            && self.submissions.len() < self.max_submission_count as usize
    }

    /// Record a submission and refresh the answer once the minimum count is
    /// reached. Returns the new answer when it was (re)computed.
    pub(crate) fn record(&mut self, oracle: Address, value: Answer, now: Timestamp) -> Option<Answer> {
        self.submissions.push(Submission { oracle, value });

        let mut updated = None;
        if self.submissions.len() >= self.min_submission_count as usize {
            let values: Vec<Answer> = self.submissions.iter().map(|s| s.value).collect();
            if let Some(answer) = median(&values) {
                self.answer = Some(answer);
                self.updated_at = now;
                self.answered_in_round = self.round_id;
                updated = Some(answer);
            }
        }

        if self.submissions.len() >= self.max_submission_count as usize {
            self.close(CloseReason::Answered);
        }

        updated
    }

    /// Stop accepting submissions. A round is closed at most once.
    pub(crate) fn close(&mut self, reason: CloseReason) {
        if self.closed.is_none() {
            self.closed = Some(reason);
        }
    }

    /// Answer data, if the round was answered.
    pub fn data(&self) -> Option<RoundData> {
        self.answer.map(|answer| RoundData {
            round_id: u128::from(self.round_id),
            answer,
            started_at: self.started_at,
            updated_at: self.updated_at,
            answered_in_round: u128::from(self.answered_in_round),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oracle(id: u8) -> Address {
        Address([id; 20])
    }

    #[test]
    fn test_answer_after_min_count() {
        let mut round = Round::open(1, oracle(1), 100, 60, 2, 3);
        assert_eq!(round.record(oracle(1), 10, 100), None);
        assert!(!round.is_answered());

        assert_eq!(round.record(oracle(2), 11, 101), Some(10));
        assert_eq!(round.answered_in_round, 1);
        assert_eq!(round.updated_at, 101);
        assert_eq!(round.status(101), RoundStatus::Open);

        assert_eq!(round.record(oracle(3), 12, 102), Some(11));
        assert_eq!(round.status(102), RoundStatus::Closed(CloseReason::Answered));
        assert!(!round.is_accepting(102));
    }

    #[test]
    fn test_timeout_closes_unanswered_round() {
        let mut round = Round::open(1, oracle(1), 100, 60, 2, 3);
        round.record(oracle(1), 10, 100);
        assert_eq!(round.status(160), RoundStatus::Open);
        assert_eq!(round.status(161), RoundStatus::Closed(CloseReason::TimedOut));
        assert!(round.is_supersedable(161));
        assert!(round.data().is_none());
    }

    #[test]
    fn test_answered_round_ignores_timeout() {
        let mut round = Round::open(1, oracle(1), 100, 60, 1, 3);
        round.record(oracle(1), 10, 100);
        assert_eq!(round.status(1000), RoundStatus::Open);
        assert!(round.is_accepting(1000));
    }

    #[test]
    fn test_zero_timeout_never_times_out() {
        let round = Round::open(1, oracle(1), 100, 0, 2, 3);
        assert!(!round.is_timed_out(u64::MAX));
    }

    #[test]
    fn test_unbounded_timeout_keeps_round_open() {
        let mut round = Round::open(1, oracle(1), 100, u64::MAX, 2, 3);
        assert_eq!(round.record(oracle(1), 10, 100), None);
        assert!(!round.is_timed_out(u64::MAX));
        assert!(round.is_accepting(101));
        assert_eq!(round.record(oracle(2), 11, 101), Some(10));
    }

    #[test]
    fn test_data() {
        let mut round = Round::open(4, oracle(1), 100, 60, 1, 1);
        round.record(oracle(1), -5, 120);
        let data = round.data().expect("answered");
        assert_eq!(data.round_id, 4);
        assert_eq!(data.answer, -5);
        assert_eq!(data.started_at, 100);
        assert_eq!(data.updated_at, 120);
        assert_eq!(data.answered_in_round, 4);
    }
}
