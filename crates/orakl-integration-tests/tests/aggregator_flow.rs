//! Integration test: aggregation read through a proxy.
//!
//! 1. Deploy an aggregator and enable three oracles
//! 2. The oracles report 10, 11 and 12 for round 1
//! 3. The proxy serves the median with external round ids
//! 4. A second aggregator is proposed, previewed and confirmed
//! 5. Reads move to phase 2 while phase 1 history stays readable

use orakl_aggregator::{AggregatorConfig, AggregatorError, AggregatorProxy, Deployments};
use orakl_types::round::{external_round_id, parse_external_round_id};
use orakl_types::{Address, LedgerEvent};

/// Simulated timestamp for deterministic testing.
const T0: u64 = 1_700_000_000;

fn owner() -> Address {
    Address([0xee; 20])
}

fn oracles() -> [Address; 3] {
    [Address([0xa1; 20]), Address([0xa2; 20]), Address([0xa3; 20])]
}

fn config(description: &str) -> AggregatorConfig {
    AggregatorConfig {
        timeout: 60,
        decimals: 8,
        description: description.to_string(),
    }
}

/// Deploy an aggregator with all three oracles, two submissions to answer.
fn deploy(deployments: &mut Deployments, description: &str) -> Address {
    let address = deployments.deploy(owner(), config(description));
    deployments
        .get_mut(&address)
        .expect("deployed")
        .change_oracles(owner(), &[], &oracles(), 2, 3, 0)
        .expect("enable oracles");
    address
}

#[test]
fn median_answer_through_proxy() {
    let mut deployments = Deployments::new();
    let feed = deploy(&mut deployments, "BTC-USDT");
    let proxy = AggregatorProxy::new(owner(), feed);

    // =========================================================
    // Step 1: Three oracles report on round 1
    // =========================================================
    let mut events = Vec::new();
    for (oracle, (value, dt)) in oracles().into_iter().zip([(10, 0), (11, 1), (12, 2)]) {
        let ledger = deployments.get_mut(&feed).expect("feed");
        events.extend(ledger.submit(oracle, 1, value, T0 + dt).expect("submit"));
    }

    assert!(matches!(
        events.first(),
        Some(LedgerEvent::NewRound { round_id: 1, .. })
    ));
    let answers: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            LedgerEvent::AnswerUpdated { current, .. } => Some(*current),
            _ => None,
        })
        .collect();
    // From the second submission on, each one recomputes the median.
    assert_eq!(answers, vec![10, 11]);

    // =========================================================
    // Step 2: Read through the proxy
    // =========================================================
    let latest = proxy.latest_round_data(&deployments).expect("latest");
    assert_eq!(latest.answer, 11);
    assert_eq!(latest.round_id, external_round_id(1, 1));
    assert_eq!(latest.answered_in_round, external_round_id(1, 1));
    assert_eq!(latest.started_at, T0);
    assert_eq!(latest.updated_at, T0 + 2);

    let by_id = proxy
        .get_round_data(&deployments, external_round_id(1, 1))
        .expect("round 1");
    assert_eq!(by_id, latest);

    assert_eq!(proxy.description(&deployments).expect("description"), "BTC-USDT");
    assert_eq!(proxy.decimals(&deployments).expect("decimals"), 8);
    assert_eq!(
        proxy.type_and_version(&deployments).expect("version"),
        "Aggregator v0.1"
    );

    // A round that never got an answer is not readable.
    assert!(matches!(
        proxy.get_round_data(&deployments, external_round_id(1, 2)),
        Err(AggregatorError::NoDataPresent)
    ));
}

#[test]
fn aggregator_swap_keeps_history() {
    let mut deployments = Deployments::new();
    let first = deploy(&mut deployments, "ETH-USDT");
    let mut proxy = AggregatorProxy::new(owner(), first);

    for (oracle, value) in oracles().into_iter().zip([100, 101, 102]) {
        deployments
            .get_mut(&first)
            .expect("first")
            .submit(oracle, 1, value, T0)
            .expect("submit");
    }

    let second = deploy(&mut deployments, "ETH-USDT");
    assert_ne!(first, second);
    for (oracle, value) in oracles().into_iter().zip([200, 202]) {
        deployments
            .get_mut(&second)
            .expect("second")
            .submit(oracle, 1, value, T0 + 10)
            .expect("submit");
    }

    // =========================================================
    // Step 1: Propose. Reads still come from the first aggregator.
    // =========================================================
    assert!(matches!(
        proxy.proposed_latest_round_data(&deployments),
        Err(AggregatorError::NoProposedAggregator)
    ));
    let events = proxy.propose_aggregator(owner(), second).expect("propose");
    assert_eq!(
        events,
        vec![LedgerEvent::AggregatorProposed {
            current: first,
            proposed: second,
        }]
    );

    let preview = proxy.proposed_latest_round_data(&deployments).expect("preview");
    assert_eq!(preview.round_id, 1);
    assert_eq!(preview.answer, 201);
    assert_eq!(proxy.latest_round_data(&deployments).expect("latest").answer, 101);

    // Only the owner confirms, and only the proposed address.
    assert!(matches!(
        proxy.confirm_aggregator(oracles()[0], second),
        Err(AggregatorError::NotOwner(_))
    ));
    assert!(matches!(
        proxy.confirm_aggregator(owner(), first),
        Err(AggregatorError::InvalidProposedAggregator(_))
    ));

    // =========================================================
    // Step 2: Confirm. Phase 2 starts at the second aggregator.
    // =========================================================
    proxy.confirm_aggregator(owner(), second).expect("confirm");
    assert_eq!(proxy.phase_id(), 2);
    assert_eq!(proxy.aggregator(), second);
    assert_eq!(proxy.proposed_aggregator(), None);
    assert_eq!(proxy.phase_aggregators(1), Some(first));
    assert_eq!(proxy.phase_aggregators(2), Some(second));

    let latest = proxy.latest_round_data(&deployments).expect("latest");
    assert_eq!(latest.answer, 201);
    assert_eq!(parse_external_round_id(latest.round_id), (2, 1));

    // Phase 1 history is still addressable by its external id.
    let old = proxy
        .get_round_data(&deployments, external_round_id(1, 1))
        .expect("phase 1");
    assert_eq!(old.answer, 101);
    assert_eq!(old.round_id, external_round_id(1, 1));

    assert!(matches!(
        proxy.get_round_data(&deployments, external_round_id(3, 1)),
        Err(AggregatorError::UnknownPhase(3))
    ));
}
