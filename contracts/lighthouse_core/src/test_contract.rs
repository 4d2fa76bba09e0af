use chrono::{Duration, Utc};
use prost::Message;

use crate::contract::{Contract, ContractState, SurplusPolicy};
use crate::errors::CoreError;
use crate::invariants::{assert_claim_shape, assert_no_shared_inputs, assert_removal_invariant};
use crate::ledger::SigningLedger;
use crate::pledge::{Pledge, PledgeBuilder};
use crate::project::ProjectSpec;
use crate::testutils::{txid, utxo, MockKey, MockLedger, MOCK_ADDRESS};
use crate::types::{OutPoint, TxOut, Utxo};
use crate::wire;

const GOAL: u64 = 100_000_000;
const QUARTER: u64 = 25_000_000;

fn setup() -> (MockLedger, ProjectSpec, Contract) {
    let ledger = MockLedger;
    let project =
        ProjectSpec::create(&ledger, "Contract Test", "Test contract functionality", GOAL, MOCK_ADDRESS)
            .unwrap();
    let contract = Contract::new(project.clone());
    (ledger, project, contract)
}

fn pledge_from(ledger: &MockLedger, project: &ProjectSpec, amount: u64, coins: &[Utxo]) -> Pledge {
    let builder = PledgeBuilder::new(project);
    let unsigned = builder.create(amount, coins).unwrap();
    let keys: Vec<MockKey> = unsigned
        .inputs()
        .iter()
        .enumerate()
        .map(|(i, _)| MockKey(i as u8))
        .collect();
    builder.sign(ledger, unsigned, &keys).unwrap()
}

fn pledge(ledger: &MockLedger, project: &ProjectSpec, seed: u8, amount: u64) -> Pledge {
    pledge_from(ledger, project, amount, &[utxo(seed, 0, amount)])
}

#[test]
fn test_empty_contract() {
    let (_, project, contract) = setup();

    assert_eq!(contract.total_pledged(), 0);
    assert_eq!(contract.progress(), 0.0);
    assert!(!contract.can_claim());
    assert!(contract.pledges().is_empty());
    assert_eq!(contract.state(), ContractState::Empty);

    let status = contract.status(Utc::now());
    assert_eq!(status.project_id, project.id());
    assert_eq!(status.goal_amount, GOAL);
    assert_eq!(status.total_pledged, 0);
    assert_eq!(status.pledge_count, 0);
    assert_eq!(status.progress, 0.0);
    assert!(!status.can_claim);
    assert!(!status.is_expired);
}

#[test]
fn test_progress_in_quarters() {
    let (ledger, project, mut contract) = setup();
    let expected = [25.0, 50.0, 75.0, 100.0];

    for (i, progress) in expected.iter().enumerate() {
        contract
            .add_pledge(pledge(&ledger, &project, i as u8 + 1, QUARTER))
            .unwrap();
        assert_eq!(contract.progress(), *progress);
        assert_eq!(contract.can_claim(), i == 3);
    }

    assert_eq!(contract.total_pledged(), GOAL);
    assert_eq!(contract.state(), ContractState::Fundable);
    assert_no_shared_inputs(&contract);
}

#[test]
fn test_progress_may_exceed_hundred() {
    let (ledger, project, mut contract) = setup();
    contract
        .add_pledge(pledge(&ledger, &project, 1, GOAL + GOAL / 2))
        .unwrap();
    assert_eq!(contract.progress(), 150.0);
    assert!(contract.can_claim());
}

#[test]
fn test_rejects_pledge_for_other_project() {
    let (ledger, _, mut contract) = setup();
    let other = ProjectSpec::create(&ledger, "Other", "Other project", GOAL, "elsewhere1").unwrap();

    let err = contract
        .add_pledge(pledge(&ledger, &other, 1, QUARTER))
        .unwrap_err();
    assert!(matches!(err, CoreError::WrongProject { .. }), "{err:?}");
    assert!(contract.pledges().is_empty());
}

#[test]
fn test_rejects_unsigned_pledge() {
    let (_, project, mut contract) = setup();
    let unsigned = PledgeBuilder::new(&project)
        .create(QUARTER, &[utxo(1, 0, QUARTER)])
        .unwrap();

    let err = contract.add_pledge(unsigned).unwrap_err();
    assert!(matches!(err, CoreError::UnsignedInput { index: 0 }), "{err:?}");
}

#[test]
fn test_rejects_pledge_below_project_minimum() {
    let (ledger, project, mut contract) = setup();
    let pledge = pledge(&ledger, &project, 1, QUARTER);

    // Amounts are not covered by input signatures; a rewritten file still loads.
    let mut msg = wire::Pledge::decode(pledge.serialize().as_slice()).unwrap();
    msg.amount = 1;
    let shrunk = Pledge::load(&msg.encode_to_vec()).unwrap();
    shrunk.validate().unwrap();

    let err = contract.add_pledge(shrunk).unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)), "{err:?}");
    assert!(err.to_string().contains("minimum"), "{err}");
    assert_eq!(contract.total_pledged(), 0);
    assert!(contract.pledges().is_empty());

    // The untouched pledge is still accepted.
    contract.add_pledge(pledge).unwrap();
    assert_eq!(contract.total_pledged(), QUARTER);
}

#[test]
fn test_rejects_duplicate_inputs() {
    let (ledger, project, mut contract) = setup();
    let shared = utxo(1, 0, QUARTER);

    let first = pledge_from(&ledger, &project, QUARTER, &[shared.clone()]);
    let first_id = first.id();
    contract.add_pledge(first).unwrap();

    // Same coin, different second input and amount: still a double count.
    let second = pledge_from(
        &ledger,
        &project,
        QUARTER + 10_000,
        &[shared, utxo(2, 0, 10_000)],
    )
    .with_memo("again");

    match contract.add_pledge(second).unwrap_err() {
        CoreError::DuplicateInput { outpoint, existing } => {
            assert_eq!(outpoint, OutPoint::new(txid(1), 0));
            assert_eq!(existing, first_id);
        }
        other => panic!("expected DuplicateInput, got {other:?}"),
    }
    assert_eq!(contract.pledges().len(), 1);
    assert_eq!(contract.total_pledged(), QUARTER);
}

#[test]
fn test_same_txid_different_index_is_distinct() {
    let (ledger, project, mut contract) = setup();
    contract
        .add_pledge(pledge_from(&ledger, &project, QUARTER, &[utxo(1, 0, QUARTER)]))
        .unwrap();
    contract
        .add_pledge(pledge_from(&ledger, &project, QUARTER, &[utxo(1, 1, QUARTER)]))
        .unwrap();
    assert_eq!(contract.pledges().len(), 2);
}

#[test]
fn test_combine_before_goal_fails() {
    let (ledger, project, mut contract) = setup();
    contract
        .add_pledge(pledge(&ledger, &project, 1, QUARTER))
        .unwrap();

    match contract.combine().unwrap_err() {
        CoreError::GoalNotReached { pledged, goal } => {
            assert_eq!(pledged, QUARTER);
            assert_eq!(goal, GOAL);
        }
        other => panic!("expected GoalNotReached, got {other:?}"),
    }
    assert!(contract.combined().is_none());
}

#[test]
fn test_combine_concatenates_inputs_and_pays_project_outputs() {
    let (ledger, project, mut contract) = setup();
    contract
        .add_pledge(pledge_from(
            &ledger,
            &project,
            QUARTER,
            &[utxo(1, 0, 10_000_000), utxo(2, 0, 15_000_000)],
        ))
        .unwrap();
    for seed in 3..6 {
        contract
            .add_pledge(pledge(&ledger, &project, seed, QUARTER))
            .unwrap();
    }

    let tx = contract.combine().unwrap();

    let input_count: usize = contract.pledges().iter().map(|p| p.inputs().len()).sum();
    assert_eq!(tx.inputs.len(), input_count);
    assert_eq!(tx.inputs.len(), 5);
    assert_eq!(tx.outputs.len(), project.outputs().len());
    assert_eq!(tx.outputs[0].amount, GOAL);
    assert!(tx.inputs.iter().all(|i| i.is_signed()));
    assert_claim_shape(&contract, &tx);
    assert_eq!(contract.combined(), Some(&tx));
    assert_eq!(contract.state(), ContractState::Combined);
}

#[test]
fn test_surplus_goes_to_first_output() {
    let ledger = MockLedger;
    let base =
        ProjectSpec::create(&ledger, "Split", "Two destinations", 60, MOCK_ADDRESS).unwrap();
    // Two destinations are only reachable through the file format.
    let mut msg = wire::Project::decode(base.serialize().as_slice()).unwrap();
    let second_script = ledger.decode_address("second1").unwrap().0;
    msg.outputs.push(wire::Output {
        amount: 40,
        script: second_script.clone(),
    });
    msg.min_pledge_amount = Some(1);
    let project = ProjectSpec::load(&msg.encode_to_vec()).unwrap();
    assert_eq!(project.goal_amount(), 100);

    let mut contract = Contract::new(project.clone());
    // Inputs overshoot the pledged amounts by 7 in total.
    contract
        .add_pledge(pledge_from(&ledger, &project, 50, &[utxo(1, 0, 53)]))
        .unwrap();
    contract
        .add_pledge(pledge_from(&ledger, &project, 50, &[utxo(2, 0, 54)]))
        .unwrap();

    let tx = contract.combine().unwrap();
    assert_eq!(tx.outputs[0].amount, 60 + 7);
    assert_eq!(tx.outputs[1].amount, 40);
    assert_eq!(tx.outputs[1].script.as_bytes(), second_script.as_slice());
    assert_eq!(tx.output_value(), tx.input_value());
}

struct SurplusToLast;

impl SurplusPolicy for SurplusToLast {
    fn distribute(&self, outputs: &mut [TxOut], surplus: u64) {
        if let Some(last) = outputs.last_mut() {
            last.amount += surplus;
        }
    }
}

#[test]
fn test_injected_surplus_policy() {
    let (ledger, project, _) = setup();
    let mut contract = Contract::with_policy(project.clone(), SurplusToLast);
    contract
        .add_pledge(pledge_from(&ledger, &project, GOAL, &[utxo(1, 0, GOAL + 5)]))
        .unwrap();

    let tx = contract.combine().unwrap();
    assert_eq!(tx.outputs.len(), 1);
    assert_eq!(tx.outputs[0].amount, GOAL + 5);
}

#[test]
fn test_remove_pledge_updates_totals_and_drops_claim() {
    let (ledger, project, mut contract) = setup();
    let pledges: Vec<Pledge> = (1..=4).map(|s| pledge(&ledger, &project, s, QUARTER)).collect();
    let removed_id = pledges[1].id();
    for p in pledges {
        contract.add_pledge(p).unwrap();
    }
    contract.combine().unwrap();
    assert_eq!(contract.state(), ContractState::Combined);

    let before = contract.total_pledged();
    let removed = contract.remove_pledge(removed_id).unwrap();
    assert_removal_invariant(before, contract.total_pledged(), removed.amount());

    assert!(contract.combined().is_none());
    assert!(!contract.can_claim());
    assert_eq!(contract.state(), ContractState::Accumulating);
    assert!(contract.combine().is_err());

    // The freed coin may be pledged again.
    contract
        .add_pledge(pledge(&ledger, &project, 2, QUARTER))
        .unwrap();
    assert!(contract.can_claim());
}

#[test]
fn test_remove_unknown_pledge() {
    let (ledger, project, mut contract) = setup();
    let stray = pledge(&ledger, &project, 9, QUARTER);
    assert!(matches!(
        contract.remove_pledge(stray.id()),
        Err(CoreError::NotFound(id)) if id == stray.id()
    ));
}

#[test]
fn test_add_after_combine_invalidates_cache() {
    let (ledger, project, mut contract) = setup();
    contract
        .add_pledge(pledge(&ledger, &project, 1, GOAL))
        .unwrap();
    let first = contract.combine().unwrap();

    contract
        .add_pledge(pledge(&ledger, &project, 2, QUARTER))
        .unwrap();
    assert!(contract.combined().is_none());
    assert_eq!(contract.state(), ContractState::Fundable);

    let second = contract.combine().unwrap();
    assert_eq!(second.inputs.len(), first.inputs.len() + 1);
    assert_eq!(second.outputs[0].amount, GOAL + QUARTER);
}

#[test]
fn test_pledges_survive_file_roundtrip_into_contract() {
    let (ledger, project, _) = setup();
    let reloaded_project = ProjectSpec::load(&project.serialize()).unwrap();
    let mut contract = Contract::new(reloaded_project);

    for seed in 1..=4 {
        let bytes = pledge(&ledger, &project, seed, QUARTER).serialize();
        contract.add_pledge(Pledge::load(&bytes).unwrap()).unwrap();
    }
    assert!(contract.can_claim());
    contract.validate_pledges().unwrap();
    assert_eq!(contract.combine().unwrap().inputs.len(), 4);
}

#[test]
fn test_status_reports_expiry() {
    let ledger = MockLedger;
    let deadline = Utc::now() - Duration::days(1);
    let project = ProjectSpec::create(&ledger, "Late", "Already over", GOAL, MOCK_ADDRESS)
        .unwrap()
        .with_expiry(deadline);
    let mut contract = Contract::new(project.clone());
    contract
        .add_pledge(pledge(&ledger, &project, 1, QUARTER))
        .unwrap();

    let status = contract.status(Utc::now());
    assert!(status.is_expired);
    assert_eq!(status.pledge_count, 1);
    assert_eq!(status.progress, 25.0);
    assert_eq!(status.state, ContractState::Accumulating);

    let json = serde_json::to_value(&status).unwrap();
    assert_eq!(json["project_id"], project.id().to_hex());
    assert_eq!(json["state"], "accumulating");
}
