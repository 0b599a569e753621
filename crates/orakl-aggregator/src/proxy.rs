//! Phase-indexed proxy over aggregator instances.
//!
//! ## Phases
//!
//! The proxy starts at phase 1 pointing at its initial aggregator. A swap is
//! two-step: the owner proposes a candidate, which is readable through the
//! `proposed_*` reads only, then confirms it. Confirming appends
//! `phase_id + 1 -> candidate` to the phase map and moves the cursor.
//! Phase map entries are never rewritten, so an external round id handed out
//! during any phase keeps resolving to the instance that produced it.

use std::collections::BTreeMap;

use orakl_types::round::parse_external_round_id;
use orakl_types::{Address, LedgerEvent, PhaseId, RoundData, RoundId};

use crate::deployments::Deployments;
use crate::ledger::AggregatorLedger;
use crate::{AggregatorError, Result};

/// Stable read entry point for one price feed.
#[derive(Clone, Debug)]
pub struct AggregatorProxy {
    owner: Address,
    phase_id: PhaseId,
    phase_aggregators: BTreeMap<PhaseId, Address>,
    proposed: Option<Address>,
}

impl AggregatorProxy {
    /// Create a proxy in phase 1 targeting `aggregator`.
    pub fn new(owner: Address, aggregator: Address) -> Self {
        let phase_id = 1;
        let mut phase_aggregators = BTreeMap::new();
        phase_aggregators.insert(phase_id, aggregator);
        Self {
            owner,
            phase_id,
            phase_aggregators,
            proposed: None,
        }
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn phase_id(&self) -> PhaseId {
        self.phase_id
    }

    /// Aggregator confirmed for `phase_id`, if any.
    pub fn phase_aggregators(&self, phase_id: PhaseId) -> Option<Address> {
        self.phase_aggregators.get(&phase_id).copied()
    }

    /// Current target. Writers submit to this address directly.
    pub fn aggregator(&self) -> Address {
        // The current phase is always present in the map.
        self.phase_aggregators
            .get(&self.phase_id)
            .copied()
            .unwrap_or(Address::ZERO)
    }

    pub fn proposed_aggregator(&self) -> Option<Address> {
        self.proposed
    }

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

    // ---------------------------------------------------------------
    // Swap
    // ---------------------------------------------------------------

    /// Record `candidate` as the next aggregator. Reads are unaffected.
    pub fn propose_aggregator(&mut self, caller: Address, candidate: Address) -> Result<Vec<LedgerEvent>> {
        self.only_owner(caller)?;
        self.proposed = Some(candidate);
        tracing::info!(current = %self.aggregator(), proposed = %candidate, "aggregator proposed");
        Ok(vec![LedgerEvent::AggregatorProposed {
            current: self.aggregator(),
            proposed: candidate,
        }])
    }

    /// Make the proposed aggregator the target of a new phase.
    ///
    /// # Errors
    ///
    /// - [`AggregatorError::NotOwner`] if `caller` is not the owner
    /// - [`AggregatorError::InvalidProposedAggregator`] unless `candidate` is
    ///   the proposed address
    pub fn confirm_aggregator(&mut self, caller: Address, candidate: Address) -> Result<Vec<LedgerEvent>> {
        self.only_owner(caller)?;
        if self.proposed != Some(candidate) {
            return Err(AggregatorError::InvalidProposedAggregator(candidate));
        }

        let previous = self.aggregator();
        let next_phase = self.phase_id + 1;
        self.phase_aggregators.insert(next_phase, candidate);
        self.phase_id = next_phase;
        self.proposed = None;

        tracing::info!(
            phase_id = next_phase,
            previous = %previous,
            latest = %candidate,
            "aggregator confirmed"
        );

        Ok(vec![LedgerEvent::AggregatorConfirmed {
            previous,
            latest: candidate,
        }])
    }

    // ---------------------------------------------------------------
    // Reads
    // ---------------------------------------------------------------

    fn current<'a>(&self, deployments: &'a Deployments) -> Result<&'a AggregatorLedger> {
        deployments.get(&self.aggregator())
    }

    /// Latest answer of the current phase, with external round ids.
    pub fn latest_round_data(&self, deployments: &Deployments) -> Result<RoundData> {
        let data = self.current(deployments)?.latest_round_data()?;
        Ok(data.with_phase(self.phase_id))
    }

    /// Answer of the round addressed by `external_id`, in whichever phase
    /// produced it.
    ///
    /// # Errors
    ///
    /// - [`AggregatorError::UnknownPhase`] if the phase was never confirmed
    /// - [`AggregatorError::NoDataPresent`] if the round has no answer
    pub fn get_round_data(&self, deployments: &Deployments, external_id: u128) -> Result<RoundData> {
        let (phase_id, round_id) = parse_external_round_id(external_id);
        let address = self
            .phase_aggregators(phase_id)
            .ok_or(AggregatorError::UnknownPhase(phase_id))?;
        let data = deployments.get(&address)?.get_round_data(round_id)?;
        Ok(data.with_phase(phase_id))
    }

    fn proposed<'a>(&self, deployments: &'a Deployments) -> Result<&'a AggregatorLedger> {
        let address = self.proposed.ok_or(AggregatorError::NoProposedAggregator)?;
        deployments.get(&address)
    }

    /// Latest answer of the proposed aggregator, with its local round ids.
    pub fn proposed_latest_round_data(&self, deployments: &Deployments) -> Result<RoundData> {
        self.proposed(deployments)?.latest_round_data()
    }

    pub fn proposed_get_round_data(&self, deployments: &Deployments, round_id: RoundId) -> Result<RoundData> {
        self.proposed(deployments)?.get_round_data(round_id)
    }

    pub fn description<'a>(&self, deployments: &'a Deployments) -> Result<&'a str> {
        Ok(self.current(deployments)?.description())
    }

    pub fn decimals(&self, deployments: &Deployments) -> Result<u8> {
        Ok(self.current(deployments)?.decimals())
    }

    pub fn type_and_version(&self, deployments: &Deployments) -> Result<&'static str> {
        Ok(self.current(deployments)?.type_and_version())
    }
}
