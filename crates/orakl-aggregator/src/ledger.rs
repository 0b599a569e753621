//! Aggregator ledger: round-based answer aggregation.
//!
//! ## Rounds
//!
//! Round `n + 1` opens on the first valid submission for it once round `n`
//! is supersedable (answered or timed out), or when an authorized requester
//! forces it open. A submission is valid when:
//!
//! 1. the caller is an enabled oracle whose window covers the round,
//! 2. the caller has not reported on this or a later round,
//! 3. the round is the current one, the next one, or the previous one while
//!    the current round is still unanswered,
//! 4. the round before it is supersedable, and
//! 5. the round is open and below `maxSubmissionCount`.
//!
//! From `minSubmissionCount` submissions on, every submission recomputes
//! the answer as the median of all values received for the round.
//!
//! ## Delays
//!
//! `restartDelay` counts rounds: an oracle that opened round `r` cannot
//! open another round before `r + restartDelay + 1`. Requesters have their
//! own delay with the same meaning.

use std::collections::HashMap;

use orakl_types::{Address, Answer, LedgerEvent, RoundData, RoundId, Timestamp};
use serde::{Deserialize, Serialize};

use crate::membership::{OracleMembership, OracleStatus};
use crate::round::{CloseReason, Round, RoundStatus};
use crate::{AggregatorError, Result, MAX_ORACLE_COUNT, TYPE_AND_VERSION};

/// Construction parameters of an aggregator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatorConfig {
    /// Seconds before an unanswered round times out. 0 disables timeouts.
    pub timeout: u64,
    /// Decimals of the reported answers.
    pub decimals: u8,
    /// Human-readable feed description, e.g. `"BTC-USDT"`.
    pub description: String,
}

/// Permission of an identity to force new rounds open.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequesterPermission {
    pub authorized: bool,
    /// Rounds that must pass between two rounds opened by this requester.
    pub delay: u32,
    /// Last round this requester opened.
    pub last_started_round: RoundId,
}

/// A round as seen by one oracle, used to decide what to submit next.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleRoundState {
    pub eligible_to_submit: bool,
    pub round_id: RoundId,
    pub latest_submission: Answer,
    pub started_at: Timestamp,
    pub timeout: u64,
    pub oracle_count: u32,
}

/// One deployed aggregator instance.
#[derive(Clone, Debug)]
pub struct AggregatorLedger {
    address: Address,
    owner: Address,
    config: AggregatorConfig,
    min_submission_count: u32,
    max_submission_count: u32,
    restart_delay: u32,
    membership: OracleMembership,
    /// Round `n` is stored at index `n - 1`.
    rounds: Vec<Round>,
    latest_round_id: RoundId,
    requesters: HashMap<Address, RequesterPermission>,
}

impl AggregatorLedger {
    /// Create an aggregator at `address` owned by `owner`, with no oracles.
    pub fn new(address: Address, owner: Address, config: AggregatorConfig) -> Self {
        tracing::info!(
            aggregator = %address,
            owner = %owner,
            description = %config.description,
            timeout = config.timeout,
            "aggregator created"
        );
        Self {
            address,
            owner,
            config,
            min_submission_count: 0,
            max_submission_count: 0,
            restart_delay: 0,
            membership: OracleMembership::new(),
            rounds: Vec::new(),
            latest_round_id: 0,
            requesters: HashMap::new(),
        }
    }

    // ---------------------------------------------------------------
    // Read-only accessors
    // ---------------------------------------------------------------

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn description(&self) -> &str {
        &self.config.description
    }

    pub fn decimals(&self) -> u8 {
        self.config.decimals
    }

    pub fn timeout(&self) -> u64 {
        self.config.timeout
    }

    pub fn type_and_version(&self) -> &'static str {
        TYPE_AND_VERSION
    }

    pub fn min_submission_count(&self) -> u32 {
        self.min_submission_count
    }

    pub fn max_submission_count(&self) -> u32 {
        self.max_submission_count
    }

    pub fn restart_delay(&self) -> u32 {
        self.restart_delay
    }

    /// Enabled oracles in the order they were added.
    pub fn get_oracles(&self) -> &[Address] {
        self.membership.oracles()
    }

    pub fn oracle_count(&self) -> usize {
        self.membership.len()
    }

    pub fn oracle_status(&self, oracle: &Address) -> Option<&OracleStatus> {
        self.membership.status(oracle)
    }

    /// Newest round that has been opened, 0 before the first one.
    pub fn reporting_round_id(&self) -> RoundId {
        self.rounds.len() as RoundId
    }

    /// Newest round that has an answer, 0 before the first one.
    pub fn latest_round_id(&self) -> RoundId {
        self.latest_round_id
    }

    pub fn round(&self, round_id: RoundId) -> Option<&Round> {
        if round_id == 0 {
            return None;
        }
        self.rounds.get((round_id - 1) as usize)
    }

    fn round_mut(&mut self, round_id: RoundId) -> Option<&mut Round> {
        if round_id == 0 {
            return None;
        }
        self.rounds.get_mut((round_id - 1) as usize)
    }

    pub fn round_status(&self, round_id: RoundId, now: Timestamp) -> RoundStatus {
        self.round(round_id)
            .map_or(RoundStatus::Idle, |round| round.status(now))
    }

    pub fn requester_permission(&self, requester: &Address) -> Option<&RequesterPermission> {
        self.requesters.get(requester)
    }

    /// Answer data of the latest answered round.
    ///
    /// # Errors
    ///
    /// - [`AggregatorError::NoDataPresent`] if no round has been answered
    pub fn latest_round_data(&self) -> Result<RoundData> {
        self.get_round_data(self.latest_round_id)
    }

    /// Answer data of `round_id`.
    ///
    /// # Errors
    ///
    /// - [`AggregatorError::NoDataPresent`] if the round has no answer
    pub fn get_round_data(&self, round_id: RoundId) -> Result<RoundData> {
        self.round(round_id)
            .and_then(Round::data)
            .ok_or(AggregatorError::NoDataPresent)
    }

    // ---------------------------------------------------------------
    // Owner entry points
    // ---------------------------------------------------------------

    fn only_owner(&self, caller: Address) -> Result<()> {
        if caller != self.owner {
            return Err(AggregatorError::NotOwner(caller));
        }
        Ok(())
    }

    pub fn transfer_ownership(&mut self, caller: Address, new_owner: Address) -> Result<Vec<LedgerEvent>> {
        self.only_owner(caller)?;
        let previous_owner = std::mem::replace(&mut self.owner, new_owner);
        Ok(vec![LedgerEvent::OwnershipTransferred {
            previous_owner,
            new_owner,
        }])
    }

    /// Remove and add oracles, then set the thresholds for future rounds.
    ///
    /// Removals are applied before additions. Either every change is applied
    /// or none is.
    ///
    /// # Errors
    ///
    /// - [`AggregatorError::NotOwner`] if `caller` is not the owner
    /// - [`AggregatorError::OracleNotEnabled`] if a removed oracle is not a member
    /// - [`AggregatorError::OracleAlreadyEnabled`] if an added oracle is a member
    /// - [`AggregatorError::TooManyOracles`] above [`MAX_ORACLE_COUNT`]
    /// - any threshold error from [`validate_round_details`]
    pub fn change_oracles(
        &mut self,
        caller: Address,
        removed: &[Address],
        added: &[Address],
        min_submission_count: u32,
        max_submission_count: u32,
        restart_delay: u32,
    ) -> Result<Vec<LedgerEvent>> {
        self.only_owner(caller)?;

        let reporting_round = self.reporting_round_id();
        let mut membership = self.membership.clone();
        let mut events = Vec::with_capacity(removed.len() + added.len() + 1);

        for oracle in removed {
            membership.remove(*oracle, reporting_round)?;
            events.push(LedgerEvent::OraclePermissionsUpdated {
                oracle: *oracle,
                whitelisted: false,
            });
        }

        let count = membership.len() + added.len();
        if count > MAX_ORACLE_COUNT {
            return Err(AggregatorError::TooManyOracles {
                count,
                max: MAX_ORACLE_COUNT,
            });
        }

        for oracle in added {
            membership.add(*oracle, reporting_round)?;
            events.push(LedgerEvent::OraclePermissionsUpdated {
                oracle: *oracle,
                whitelisted: true,
            });
        }

        validate_round_details(
            membership.len(),
            min_submission_count,
            max_submission_count,
            restart_delay,
        )?;

        self.membership = membership;
        events.push(self.apply_round_details(
            min_submission_count,
            max_submission_count,
            restart_delay,
            self.config.timeout,
        ));

        tracing::info!(
            aggregator = %self.address,
            removed = removed.len(),
            added = added.len(),
            oracles = self.membership.len(),
            "oracles changed"
        );

        Ok(events)
    }

    /// Set thresholds, restart delay and timeout for rounds opened from now on.
    pub fn update_future_rounds(
        &mut self,
        caller: Address,
        min_submission_count: u32,
        max_submission_count: u32,
        restart_delay: u32,
        timeout: u64,
    ) -> Result<Vec<LedgerEvent>> {
        self.only_owner(caller)?;
        validate_round_details(
            self.membership.len(),
            min_submission_count,
            max_submission_count,
            restart_delay,
        )?;
        Ok(vec![self.apply_round_details(
            min_submission_count,
            max_submission_count,
            restart_delay,
            timeout,
        )])
    }

    fn apply_round_details(&mut self, min: u32, max: u32, restart_delay: u32, timeout: u64) -> LedgerEvent {
        self.min_submission_count = min;
        self.max_submission_count = max;
        self.restart_delay = restart_delay;
        self.config.timeout = timeout;
        LedgerEvent::RoundDetailsUpdated {
            min_submission_count: min,
            max_submission_count: max,
            restart_delay,
            timeout,
        }
    }

    /// Authorize or deauthorize a requester.
    ///
    /// Setting the values already stored is a no-op and emits nothing.
    pub fn set_requester_permissions(
        &mut self,
        caller: Address,
        requester: Address,
        authorized: bool,
        delay: u32,
    ) -> Result<Vec<LedgerEvent>> {
        self.only_owner(caller)?;

        let current = self.requesters.get(&requester).copied().unwrap_or_default();
        if current.authorized == authorized && (!authorized || current.delay == delay) {
            return Ok(Vec::new());
        }

        if authorized {
            let permission = self.requesters.entry(requester).or_default();
            permission.authorized = true;
            permission.delay = delay;
        } else {
            self.requesters.remove(&requester);
        }

        tracing::info!(
            aggregator = %self.address,
            requester = %requester,
            authorized,
            delay,
            "requester permissions set"
        );

        Ok(vec![LedgerEvent::RequesterPermissionsSet {
            requester,
            authorized,
            delay,
        }])
    }

    // ---------------------------------------------------------------
    // Round entry points
    // ---------------------------------------------------------------

    /// Open the next round on behalf of an authorized requester.
    ///
    /// # Errors
    ///
    /// - [`AggregatorError::RequesterNotAuthorized`] without an authorized permission
    /// - [`AggregatorError::PrevRoundNotSupersedable`] if the current round is
    ///   neither answered nor timed out
    /// - [`AggregatorError::RequesterDelayNotMet`] if the requester opened a
    ///   round fewer than `delay + 1` rounds ago
    pub fn request_new_round(&mut self, caller: Address, now: Timestamp) -> Result<(RoundId, Vec<LedgerEvent>)> {
        let permission = self
            .requesters
            .get(&caller)
            .filter(|p| p.authorized)
            .copied()
            .ok_or(AggregatorError::RequesterNotAuthorized(caller))?;

        let current = self.reporting_round_id();
        if !self.is_supersedable(current, now) {
            return Err(AggregatorError::PrevRoundNotSupersedable { round_id: current });
        }

        let new_round = current + 1;
        let available_after = permission.last_started_round + RoundId::from(permission.delay);
        if permission.last_started_round != 0 && new_round <= available_after {
            return Err(AggregatorError::RequesterDelayNotMet {
                requester: caller,
                available_after,
            });
        }

        let event = self.initialize_new_round(new_round, caller, now);
        if let Some(permission) = self.requesters.get_mut(&caller) {
            permission.last_started_round = new_round;
        }

        Ok((new_round, vec![event]))
    }

    /// Submit `value` for `round_id` as oracle `caller`.
    pub fn submit(
        &mut self,
        caller: Address,
        round_id: RoundId,
        value: Answer,
        now: Timestamp,
    ) -> Result<Vec<LedgerEvent>> {
        self.validate_oracle_round(&caller, round_id, now)?;

        let opens_round = round_id == self.reporting_round_id() + 1;
        if opens_round {
            let status = self
                .membership
                .status(&caller)
                .ok_or(AggregatorError::OracleNotEnabled(caller))?;
            if !self.is_delayed(status, round_id) {
                return Err(AggregatorError::RoundNotAcceptingSubmissions { round_id });
            }
        } else if !self.is_accepting(round_id, now) {
            return Err(AggregatorError::RoundNotAcceptingSubmissions { round_id });
        }

        let mut events = Vec::with_capacity(3);
        if opens_round {
            events.push(self.initialize_new_round(round_id, caller, now));
            if let Some(status) = self.membership.status_mut(&caller) {
                status.last_started_round = round_id;
            }
        }

        let round = self
            .round_mut(round_id)
            .ok_or(AggregatorError::RoundNotAcceptingSubmissions { round_id })?;
        let updated = round.record(caller, value, now);

        if let Some(status) = self.membership.status_mut(&caller) {
            status.last_reported_round = round_id;
            status.latest_submission = value;
        }
        events.push(LedgerEvent::SubmissionReceived {
            submission: value,
            round_id,
            oracle: caller,
        });

        tracing::debug!(
            aggregator = %self.address,
            oracle = %caller,
            round_id,
            value,
            "submission received"
        );

        if let Some(answer) = updated {
            self.latest_round_id = self.latest_round_id.max(round_id);
            if let Some(previous) = round_id.checked_sub(1).and_then(|id| self.round_mut(id)) {
                if previous.is_answered() {
                    previous.close(CloseReason::Answered);
                }
            }
            events.push(LedgerEvent::AnswerUpdated {
                current: answer,
                round_id,
                updated_at: now,
            });
            tracing::info!(
                aggregator = %self.address,
                round_id,
                answer,
                "answer updated"
            );
        }

        Ok(events)
    }

    /// The round `oracle` should act on, and whether it may submit to it.
    ///
    /// With `queried_round_id == 0` the ledger suggests a round: the next
    /// one if the current round is supersedable and the oracle is done with
    /// it, otherwise the current one.
    pub fn oracle_round_state(&self, oracle: Address, queried_round_id: RoundId, now: Timestamp) -> OracleRoundState {
        let status = self.membership.status(&oracle).cloned().unwrap_or_default();
        let oracle_count = self.membership.len() as u32;

        let (round_id, eligible_to_submit) = if queried_round_id > 0 {
            let eligible = if self.round(queried_round_id).is_some() {
                self.is_accepting(queried_round_id, now)
            } else {
                self.is_delayed(&status, queried_round_id)
            };
            let eligible = eligible && self.validate_oracle_round(&oracle, queried_round_id, now).is_ok();
            (queried_round_id, eligible)
        } else {
            let reporting_round = self.reporting_round_id();
            let should_supersede =
                status.last_reported_round == reporting_round || !self.is_accepting(reporting_round, now);
            let (round_id, eligible) = if self.is_supersedable(reporting_round, now) && should_supersede {
                (reporting_round + 1, self.is_delayed(&status, reporting_round + 1))
            } else {
                (reporting_round, self.is_accepting(reporting_round, now))
            };
            let eligible = eligible && self.validate_oracle_round(&oracle, round_id, now).is_ok();
            (round_id, eligible)
        };

        let round = self.round(round_id);
        OracleRoundState {
            eligible_to_submit,
            round_id,
            latest_submission: status.latest_submission,
            started_at: round.map_or(0, |r| r.started_at),
            timeout: round.map_or(0, |r| r.timeout),
            oracle_count,
        }
    }

    // ---------------------------------------------------------------
    // Internals
    // ---------------------------------------------------------------

    fn validate_oracle_round(&self, oracle: &Address, round_id: RoundId, now: Timestamp) -> Result<()> {
        let status = self
            .membership
            .status(oracle)
            .filter(|s| s.enabled)
            .ok_or(AggregatorError::OracleNotEnabled(*oracle))?;

        if status.starting_round > round_id {
            return Err(AggregatorError::NotYetEnabledOracle {
                oracle: *oracle,
                round_id,
            });
        }
        if status.last_reported_round >= round_id {
            return Err(AggregatorError::CannotReportPreviousRound { round_id });
        }

        let reporting_round = self.reporting_round_id();
        if round_id != reporting_round
            && round_id != reporting_round + 1
            && !self.previous_and_current_unanswered(round_id, reporting_round)
        {
            return Err(AggregatorError::InvalidRoundToReport { round_id });
        }
        if round_id > 1 && !self.is_supersedable(round_id - 1, now) {
            return Err(AggregatorError::PrevRoundNotSupersedable {
                round_id: round_id - 1,
            });
        }
        Ok(())
    }

    fn previous_and_current_unanswered(&self, round_id: RoundId, reporting_round: RoundId) -> bool {
        round_id + 1 == reporting_round
            && self
                .round(reporting_round)
                .is_some_and(|round| !round.is_answered())
    }

    fn is_supersedable(&self, round_id: RoundId, now: Timestamp) -> bool {
        if round_id == 0 {
            return true;
        }
        self.round(round_id)
            .is_some_and(|round| round.is_supersedable(now))
    }

    fn is_accepting(&self, round_id: RoundId, now: Timestamp) -> bool {
        self.round(round_id)
            .is_some_and(|round| round.is_accepting(now))
    }

    fn is_delayed(&self, status: &OracleStatus, round_id: RoundId) -> bool {
        status.last_started_round == 0
            || round_id > status.last_started_round + RoundId::from(self.restart_delay)
    }

    /// Open `round_id` and retire the rounds it supersedes.
    fn initialize_new_round(&mut self, round_id: RoundId, started_by: Address, now: Timestamp) -> LedgerEvent {
        if let Some(previous) = round_id.checked_sub(1).and_then(|id| self.round_mut(id)) {
            if !previous.is_answered() {
                previous.close(CloseReason::TimedOut);
            }
        }
        if let Some(older) = round_id.checked_sub(2).and_then(|id| self.round_mut(id)) {
            let reason = if older.is_answered() {
                CloseReason::Answered
            } else {
                CloseReason::TimedOut
            };
            older.close(reason);
        }

        self.rounds.push(Round::open(
            round_id,
            started_by,
            now,
            self.config.timeout,
            self.min_submission_count,
            self.max_submission_count,
        ));

        tracing::info!(
            aggregator = %self.address,
            round_id,
            started_by = %started_by,
            "new round"
        );

        LedgerEvent::NewRound {
            round_id,
            started_by,
            started_at: now,
        }
    }
}

/// Check thresholds against the number of oracles they apply to.
///
/// # Errors
///
/// - [`AggregatorError::MinSubmissionGtMaxSubmission`] if `min > max`
/// - [`AggregatorError::MaxSubmissionGtOracleNum`] if `max` exceeds the oracle count
/// - [`AggregatorError::RestartDelayExceedOracleNum`] if the delay is not below the oracle count
/// - [`AggregatorError::MinSubmissionZero`] if oracles exist but `min == 0`
pub fn validate_round_details(
    oracle_count: usize,
    min_submission_count: u32,
    max_submission_count: u32,
    restart_delay: u32,
) -> Result<()> {
    if min_submission_count > max_submission_count {
        return Err(AggregatorError::MinSubmissionGtMaxSubmission {
            min: min_submission_count,
            max: max_submission_count,
        });
    }
    if max_submission_count as usize > oracle_count {
        return Err(AggregatorError::MaxSubmissionGtOracleNum {
            max: max_submission_count,
            oracles: oracle_count,
        });
    }
    if oracle_count != 0 && oracle_count <= restart_delay as usize {
        return Err(AggregatorError::RestartDelayExceedOracleNum {
            delay: restart_delay,
            oracles: oracle_count,
        });
    }
    if oracle_count != 0 && min_submission_count == 0 {
        return Err(AggregatorError::MinSubmissionZero);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const T0: Timestamp = 1_700_000_000;
    const TIMEOUT: u64 = 10;

    fn addr(id: u8) -> Address {
        Address([id; 20])
    }

    fn owner() -> Address {
        addr(0xee)
    }

    fn ledger() -> AggregatorLedger {
        AggregatorLedger::new(
            addr(0xa0),
            owner(),
            AggregatorConfig {
                timeout: TIMEOUT,
                decimals: 8,
                description: "BTC-USDT".to_string(),
            },
        )
    }

    /// Ledger with oracles 1..=n, min = min(2, n), max = n, no delay.
    fn ledger_with_oracles(n: u8) -> AggregatorLedger {
        let mut ledger = ledger();
        let oracles: Vec<Address> = (1..=n).map(addr).collect();
        ledger
            .change_oracles(owner(), &[], &oracles, u32::from(n.min(2)), u32::from(n), 0)
            .expect("change oracles");
        ledger
    }

    fn names(events: &[LedgerEvent]) -> Vec<&'static str> {
        events.iter().map(LedgerEvent::name).collect()
    }

    #[test]
    fn test_three_oracle_median_flow() {
        let mut ledger = ledger_with_oracles(3);

        let events = ledger.submit(addr(1), 1, 10, T0).expect("first");
        assert_eq!(names(&events), ["NewRound", "SubmissionReceived"]);
        assert!(matches!(ledger.latest_round_data(), Err(AggregatorError::NoDataPresent)));

        let events = ledger.submit(addr(2), 1, 11, T0 + 1).expect("second");
        assert_eq!(names(&events), ["SubmissionReceived", "AnswerUpdated"]);
        assert!(matches!(events[1], LedgerEvent::AnswerUpdated { current: 10, .. }));

        let events = ledger.submit(addr(3), 1, 12, T0 + 2).expect("third");
        assert!(matches!(events[1], LedgerEvent::AnswerUpdated { current: 11, .. }));

        let data = ledger.latest_round_data().expect("answered");
        assert_eq!(data.round_id, 1);
        assert_eq!(data.answer, 11);
        assert_eq!(data.started_at, T0);
        assert_eq!(data.updated_at, T0 + 2);
        assert_eq!(data.answered_in_round, 1);
        assert_eq!(
            ledger.round_status(1, T0 + 2),
            RoundStatus::Closed(CloseReason::Answered)
        );
    }

    #[test]
    fn test_unbounded_timeout_still_answers() {
        let mut ledger = ledger_with_oracles(3);
        ledger
            .update_future_rounds(owner(), 2, 3, 0, u64::MAX)
            .expect("update");

        ledger.submit(addr(1), 1, 10, T0).expect("first");
        let events = ledger.submit(addr(2), 1, 11, T0 + 1).expect("second");
        assert!(matches!(events[1], LedgerEvent::AnswerUpdated { current: 10, .. }));
        assert_eq!(ledger.round_status(1, u64::MAX), RoundStatus::Open);
    }

    #[test]
    fn test_full_round_rejects_more_submissions() {
        let mut ledger = ledger_with_oracles(2);
        ledger.submit(addr(1), 1, 10, T0).expect("first");
        ledger.submit(addr(2), 1, 20, T0).expect("second");
        assert_eq!(ledger.round_status(1, T0), RoundStatus::Closed(CloseReason::Answered));

        // Next round can open right away because round 1 is answered.
        let events = ledger.submit(addr(1), 2, 30, T0 + 1).expect("round 2");
        assert_eq!(names(&events), ["NewRound", "SubmissionReceived"]);
        assert_eq!(ledger.reporting_round_id(), 2);
    }

    #[test]
    fn test_cannot_report_twice() {
        let mut ledger = ledger_with_oracles(3);
        ledger.submit(addr(1), 1, 10, T0).expect("first");
        let err = ledger.submit(addr(1), 1, 11, T0).expect_err("duplicate");
        assert_eq!(err, AggregatorError::CannotReportPreviousRound { round_id: 1 });
        assert_eq!(ledger.round(1).expect("round").submissions().len(), 1);
    }

    #[test]
    fn test_non_member_cannot_submit() {
        let mut ledger = ledger_with_oracles(2);
        let err = ledger.submit(addr(9), 1, 10, T0).expect_err("stranger");
        assert_eq!(err, AggregatorError::OracleNotEnabled(addr(9)));
        assert_eq!(ledger.reporting_round_id(), 0);
    }

    #[test]
    fn test_next_round_needs_supersedable_previous() {
        let mut ledger = ledger_with_oracles(3);
        ledger.submit(addr(1), 1, 10, T0).expect("first");

        let err = ledger.submit(addr(2), 2, 10, T0 + 1).expect_err("round 1 still open");
        assert_eq!(err, AggregatorError::PrevRoundNotSupersedable { round_id: 1 });

        let err = ledger.submit(addr(2), 3, 10, T0 + 1).expect_err("skips a round");
        assert_eq!(err, AggregatorError::InvalidRoundToReport { round_id: 3 });
    }

    #[test]
    fn test_timed_out_round_moves_forward() {
        let mut ledger = ledger_with_oracles(3);
        ledger.submit(addr(1), 1, 10, T0).expect("first");

        let late = T0 + TIMEOUT + 1;
        assert_eq!(ledger.round_status(1, late), RoundStatus::Closed(CloseReason::TimedOut));

        let err = ledger.submit(addr(2), 1, 11, late).expect_err("round 1 timed out");
        assert_eq!(err, AggregatorError::RoundNotAcceptingSubmissions { round_id: 1 });

        let events = ledger.submit(addr(2), 2, 11, late).expect("round 2");
        assert_eq!(names(&events), ["NewRound", "SubmissionReceived"]);
        assert!(ledger.round(1).expect("round 1").answer.is_none());
        assert!(matches!(ledger.get_round_data(1), Err(AggregatorError::NoDataPresent)));
    }

    #[test]
    fn test_late_submission_to_previous_round() {
        let mut ledger = ledger_with_oracles(3);
        ledger.submit(addr(1), 1, 10, T0).expect("o1 r1");
        ledger.submit(addr(2), 1, 20, T0).expect("o2 r1");
        // Round 1 answered; oracle 1 opens round 2.
        ledger.submit(addr(1), 2, 30, T0 + 1).expect("o1 r2");

        // Round 2 is unanswered, so oracle 3 may still report on round 1.
        let events = ledger.submit(addr(3), 1, 40, T0 + 2).expect("o3 r1");
        assert!(matches!(events[1], LedgerEvent::AnswerUpdated { current: 20, round_id: 1, .. }));

        // Once round 2 is answered, round 1 is closed for good.
        ledger.submit(addr(2), 2, 32, T0 + 3).expect("o2 r2");
        assert_eq!(ledger.latest_round_id(), 2);
        assert_eq!(ledger.round_status(1, T0 + 3), RoundStatus::Closed(CloseReason::Answered));
    }

    #[test]
    fn test_restart_delay_limits_oracle_started_rounds() {
        let mut ledger = ledger();
        let oracles = [addr(1), addr(2), addr(3)];
        ledger
            .change_oracles(owner(), &[], &oracles, 1, 1, 1)
            .expect("change oracles");

        ledger.submit(addr(1), 1, 10, T0).expect("o1 opens r1");
        let err = ledger.submit(addr(1), 2, 11, T0).expect_err("o1 too soon");
        assert_eq!(err, AggregatorError::RoundNotAcceptingSubmissions { round_id: 2 });

        ledger.submit(addr(2), 2, 11, T0).expect("o2 opens r2");
        ledger.submit(addr(1), 3, 12, T0).expect("o1 opens r3");
        assert_eq!(ledger.latest_round_id(), 3);
    }

    #[test]
    fn test_thresholds_snapshot_at_open() {
        let mut ledger = ledger_with_oracles(3);
        ledger.submit(addr(1), 1, 10, T0).expect("open r1 with min 2");
        ledger
            .update_future_rounds(owner(), 1, 3, 0, TIMEOUT)
            .expect("lower min");

        // Round 1 still needs two submissions.
        assert!(ledger.latest_round_data().is_err());
        ledger.submit(addr(2), 1, 12, T0).expect("second");
        assert_eq!(ledger.latest_round_data().expect("answered").answer, 11);
    }

    #[test]
    fn test_change_oracles_errors_are_atomic() {
        let mut ledger = ledger_with_oracles(2);

        let err = ledger
            .change_oracles(owner(), &[addr(3)], &[], 1, 1, 0)
            .expect_err("remove non-member");
        assert_eq!(err, AggregatorError::OracleNotEnabled(addr(3)));

        // A valid removal followed by an invalid addition changes nothing.
        let err = ledger
            .change_oracles(owner(), &[addr(1)], &[addr(2)], 1, 1, 0)
            .expect_err("add member");
        assert_eq!(err, AggregatorError::OracleAlreadyEnabled(addr(2)));
        assert_eq!(ledger.get_oracles(), &[addr(1), addr(2)]);
        assert_eq!(ledger.max_submission_count(), 2);
    }

    #[test]
    fn test_remove_oracle() {
        let mut ledger = ledger_with_oracles(2);
        let events = ledger
            .change_oracles(owner(), &[addr(1)], &[], 1, 1, 0)
            .expect("remove");
        assert_eq!(names(&events), ["OraclePermissionsUpdated", "RoundDetailsUpdated"]);
        assert_eq!(ledger.get_oracles(), &[addr(2)]);

        let err = ledger.submit(addr(1), 1, 10, T0).expect_err("removed");
        assert_eq!(err, AggregatorError::OracleNotEnabled(addr(1)));
    }

    #[test]
    fn test_readded_oracle_cannot_double_report() {
        let mut ledger = ledger_with_oracles(3);
        ledger.submit(addr(1), 1, 10, T0).expect("o1 r1");
        ledger
            .change_oracles(owner(), &[addr(1)], &[], 2, 2, 0)
            .expect("remove o1");
        ledger
            .change_oracles(owner(), &[], &[addr(1)], 2, 3, 0)
            .expect("re-add o1");

        let err = ledger.submit(addr(1), 1, 99, T0).expect_err("double count");
        assert_eq!(err, AggregatorError::CannotReportPreviousRound { round_id: 1 });
    }

    #[test]
    fn test_threshold_validation() {
        let mut ledger = ledger();
        let oracles = [addr(1), addr(2)];
        assert!(matches!(
            ledger.change_oracles(owner(), &[], &oracles, 3, 2, 0),
            Err(AggregatorError::MinSubmissionGtMaxSubmission { min: 3, max: 2 })
        ));
        assert!(matches!(
            ledger.change_oracles(owner(), &[], &oracles, 1, 3, 0),
            Err(AggregatorError::MaxSubmissionGtOracleNum { max: 3, oracles: 2 })
        ));
        assert!(matches!(
            ledger.change_oracles(owner(), &[], &oracles, 1, 2, 2),
            Err(AggregatorError::RestartDelayExceedOracleNum { delay: 2, oracles: 2 })
        ));
        assert!(matches!(
            ledger.change_oracles(owner(), &[], &oracles, 0, 2, 0),
            Err(AggregatorError::MinSubmissionZero)
        ));
        assert_eq!(ledger.oracle_count(), 0);
    }

    #[test]
    fn test_too_many_oracles() {
        let mut ledger = ledger();
        let oracles: Vec<Address> = (0..=MAX_ORACLE_COUNT as u8).map(addr).collect();
        let err = ledger
            .change_oracles(owner(), &[], &oracles, 1, 1, 0)
            .expect_err("over cap");
        assert!(matches!(err, AggregatorError::TooManyOracles { .. }));
    }

    #[test]
    fn test_owner_only() {
        let mut ledger = ledger();
        let stranger = addr(0x55);
        assert_eq!(
            ledger.change_oracles(stranger, &[], &[addr(1)], 1, 1, 0),
            Err(AggregatorError::NotOwner(stranger))
        );
        assert_eq!(
            ledger.set_requester_permissions(stranger, addr(2), true, 0),
            Err(AggregatorError::NotOwner(stranger))
        );

        ledger
            .transfer_ownership(owner(), stranger)
            .expect("transfer");
        assert_eq!(ledger.owner(), stranger);
        ledger
            .change_oracles(stranger, &[], &[addr(1)], 1, 1, 0)
            .expect("new owner");
    }

    #[test]
    fn test_requester_permissions_idempotent() {
        let mut ledger = ledger();
        let requester = addr(0x42);

        let events = ledger
            .set_requester_permissions(owner(), requester, true, 0)
            .expect("authorize");
        assert_eq!(
            events,
            vec![LedgerEvent::RequesterPermissionsSet {
                requester,
                authorized: true,
                delay: 0,
            }]
        );

        let events = ledger
            .set_requester_permissions(owner(), requester, true, 0)
            .expect("same again");
        assert!(events.is_empty());

        let events = ledger
            .set_requester_permissions(owner(), requester, true, 3)
            .expect("new delay");
        assert_eq!(events.len(), 1);
        assert_eq!(ledger.requester_permission(&requester).expect("perm").delay, 3);

        let events = ledger
            .set_requester_permissions(owner(), requester, false, 0)
            .expect("deauthorize");
        assert_eq!(events.len(), 1);
        assert!(ledger.requester_permission(&requester).is_none());

        let events = ledger
            .set_requester_permissions(owner(), requester, false, 7)
            .expect("still deauthorized");
        assert!(events.is_empty());
    }

    #[test]
    fn test_request_new_round() {
        let mut ledger = ledger();
        let requester = addr(0x42);

        let err = ledger.request_new_round(addr(0x43), T0).expect_err("unauthorized");
        assert_eq!(err, AggregatorError::RequesterNotAuthorized(addr(0x43)));

        ledger
            .set_requester_permissions(owner(), requester, true, 0)
            .expect("authorize");
        let (round_id, events) = ledger.request_new_round(requester, T0).expect("request");
        assert_eq!(round_id, 1);
        assert_eq!(
            events,
            vec![LedgerEvent::NewRound {
                round_id: 1,
                started_by: requester,
                started_at: T0,
            }]
        );
    }

    #[test]
    fn test_request_new_round_respects_delay() {
        let mut ledger = ledger_with_oracles(2);
        let requester = addr(0x42);
        ledger
            .set_requester_permissions(owner(), requester, true, 1)
            .expect("authorize");

        ledger.request_new_round(requester, T0).expect("round 1");
        ledger.submit(addr(1), 1, 10, T0).expect("o1");
        ledger.submit(addr(2), 1, 10, T0).expect("o2");

        let err = ledger.request_new_round(requester, T0).expect_err("too soon");
        assert!(matches!(err, AggregatorError::RequesterDelayNotMet { available_after: 2, .. }));

        // Round 2 opened by an oracle, then the requester may open round 3.
        ledger.submit(addr(1), 2, 11, T0).expect("o1 r2");
        ledger.submit(addr(2), 2, 11, T0).expect("o2 r2");
        let (round_id, _) = ledger.request_new_round(requester, T0).expect("round 3");
        assert_eq!(round_id, 3);
    }

    #[test]
    fn test_request_needs_supersedable_round() {
        let mut ledger = ledger_with_oracles(2);
        let requester = addr(0x42);
        ledger
            .set_requester_permissions(owner(), requester, true, 0)
            .expect("authorize");
        ledger.submit(addr(1), 1, 10, T0).expect("o1");

        let err = ledger.request_new_round(requester, T0).expect_err("round open");
        assert_eq!(err, AggregatorError::PrevRoundNotSupersedable { round_id: 1 });
        let (round_id, _) = ledger
            .request_new_round(requester, T0 + TIMEOUT + 1)
            .expect("after timeout");
        assert_eq!(round_id, 2);
    }

    #[test]
    fn test_oracle_round_state_before_and_after_submission() {
        let mut ledger = ledger_with_oracles(1);

        let state = ledger.oracle_round_state(addr(1), 0, T0);
        assert_eq!(
            state,
            OracleRoundState {
                eligible_to_submit: true,
                round_id: 1,
                latest_submission: 0,
                started_at: 0,
                timeout: 0,
                oracle_count: 1,
            }
        );

        ledger.submit(addr(1), 1, 10, T0).expect("submit");
        let state = ledger.oracle_round_state(addr(1), 1, T0);
        assert_eq!(state.round_id, 1);
        assert_eq!(state.latest_submission, 10);
        assert_eq!(state.started_at, T0);
        assert_eq!(state.oracle_count, 1);
        assert!(!state.eligible_to_submit);

        // Suggests the next round now that round 1 is answered.
        let state = ledger.oracle_round_state(addr(1), 0, T0);
        assert_eq!(state.round_id, 2);
        assert!(state.eligible_to_submit);
    }

    #[test]
    fn test_oracle_round_state_points_at_open_round() {
        let mut ledger = ledger_with_oracles(3);
        ledger.submit(addr(1), 1, 10, T0).expect("o1");

        let state = ledger.oracle_round_state(addr(2), 0, T0);
        assert_eq!(state.round_id, 1);
        assert!(state.eligible_to_submit);
        assert_eq!(state.timeout, TIMEOUT);

        let state = ledger.oracle_round_state(addr(1), 0, T0);
        assert_eq!(state.round_id, 1);
        assert!(!state.eligible_to_submit);
    }
}
