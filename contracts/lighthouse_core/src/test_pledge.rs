use crate::errors::CoreError;
use crate::invariants::assert_pledge_id_fresh;
use crate::ledger::SigningLedger;
use crate::pledge::{scale_outputs, Pledge, PledgeBuilder};
use crate::project::ProjectSpec;
use crate::testutils::{txid, utxo, MockKey, MockLedger, DETACHABLE_FLAG, MOCK_ADDRESS};
use crate::types::{OutPoint, Script, TxOut, FINAL_SEQUENCE};

const GOAL: u64 = 100_000_000;

fn setup() -> (MockLedger, ProjectSpec) {
    let ledger = MockLedger;
    let project =
        ProjectSpec::create(&ledger, "Pledge Test", "Testing pledges", GOAL, MOCK_ADDRESS).unwrap();
    (ledger, project)
}

fn signed_pledge(ledger: &MockLedger, project: &ProjectSpec, seed: u8, amount: u64) -> Pledge {
    let builder = PledgeBuilder::new(project);
    let pledge = builder.create(amount, &[utxo(seed, 0, amount)]).unwrap();
    builder.sign(ledger, pledge, &[MockKey(seed)]).unwrap()
}

#[test]
fn test_create_selects_first_fit() {
    let (_, project) = setup();
    let coins = [
        utxo(1, 0, 10_000_000),
        utxo(2, 1, 20_000_000),
        utxo(3, 0, 50_000_000),
    ];

    let pledge = PledgeBuilder::new(&project)
        .create(25_000_000, &coins)
        .unwrap();

    let spent: Vec<OutPoint> = pledge.outpoints().collect();
    assert_eq!(
        spent,
        vec![OutPoint::new(txid(1), 0), OutPoint::new(txid(2), 1)]
    );
    assert_eq!(pledge.amount(), 25_000_000);
    assert_eq!(pledge.input_value(), 30_000_000);
    assert_eq!(pledge.project_id(), project.id());
    assert!(!pledge.is_signed());
    assert_pledge_id_fresh(&pledge);
}

#[test]
fn test_create_below_minimum_fails_before_selection() {
    let (_, project) = setup();
    let err = PledgeBuilder::new(&project)
        .create(project.min_pledge_amount() - 1, &[])
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)), "{err:?}");
}

#[test]
fn test_create_insufficient_funds() {
    let (_, project) = setup();
    let coins = [utxo(1, 0, 30_000), utxo(2, 0, 40_000)];

    let err = PledgeBuilder::new(&project)
        .create(100_000, &coins)
        .unwrap_err();

    match err {
        CoreError::InsufficientFunds {
            required,
            available,
        } => {
            assert_eq!(required, 100_000);
            assert_eq!(available, 70_000);
        }
        other => panic!("expected InsufficientFunds, got {other:?}"),
    }
}

#[test]
fn test_single_output_scaling_is_exact() {
    let (_, project) = setup();
    let pledge = PledgeBuilder::new(&project)
        .create(25_000_000, &[utxo(1, 0, 25_000_000)])
        .unwrap();

    assert_eq!(pledge.outputs().len(), 1);
    assert_eq!(pledge.outputs()[0].amount, 25_000_000);
    assert_eq!(pledge.outputs()[0].script, project.outputs()[0].script);
}

#[test]
fn test_scale_outputs_truncates() {
    let payouts = [
        TxOut::new(1, Script(vec![1])),
        TxOut::new(1, Script(vec![2])),
        TxOut::new(1, Script(vec![3])),
    ];

    // 1 * 2 / 3 = 0.67 for every output.
    let scaled = scale_outputs(&payouts, 2, 3);
    assert!(scaled.iter().all(|o| o.amount == 0));

    let payouts = [
        TxOut::new(70, Script(vec![1])),
        TxOut::new(30, Script(vec![2])),
    ];
    let scaled = scale_outputs(&payouts, 33, 100);
    assert_eq!(scaled[0].amount, 23); // 23.1
    assert_eq!(scaled[1].amount, 9); // 9.9
    assert_eq!(scaled[1].script, payouts[1].script);

    // Products beyond u64 stay exact.
    let big = [TxOut::new(u64::MAX, Script::default())];
    assert_eq!(scale_outputs(&big, u64::MAX, u64::MAX)[0].amount, u64::MAX);

    assert_eq!(scale_outputs(&payouts, 10, 0)[0].amount, 0);
}

#[test]
fn test_sign_produces_detachable_proofs() {
    let (ledger, project) = setup();
    let builder = PledgeBuilder::new(&project);
    let unsigned = builder
        .create(30_000, &[utxo(1, 0, 20_000), utxo(2, 0, 20_000)])
        .unwrap();
    let unsigned_id = unsigned.id();

    let signed = builder
        .sign(&ledger, unsigned, &[MockKey(1), MockKey(2)])
        .unwrap();

    assert!(signed.is_signed());
    assert_ne!(signed.id(), unsigned_id);
    assert_pledge_id_fresh(&signed);
    for input in signed.inputs() {
        assert_eq!(input.unlock_script.as_bytes()[0], DETACHABLE_FLAG);
    }
    signed.validate().unwrap();
}

#[test]
fn test_proof_survives_appended_inputs() {
    let (ledger, project) = setup();
    let pledge = signed_pledge(&ledger, &project, 1, 50_000);

    let mut widened = pledge.transaction();
    widened.inputs.push(utxo(9, 0, 1).to_input(FINAL_SEQUENCE));
    let proof = ledger
        .produce_authorization(&MockKey(1), &widened, 0, true)
        .unwrap();

    assert_eq!(proof, pledge.inputs()[0].unlock_script);
}

#[test]
fn test_sign_requires_a_key_per_input() {
    let (ledger, project) = setup();
    let builder = PledgeBuilder::new(&project);
    let unsigned = builder
        .create(30_000, &[utxo(1, 0, 20_000), utxo(2, 0, 20_000)])
        .unwrap();

    let err = builder.sign(&ledger, unsigned, &[MockKey(1)]).unwrap_err();
    assert!(matches!(err, CoreError::UnsignedInput { index: 1 }), "{err:?}");
}

#[test]
fn test_sign_rejects_foreign_pledge() {
    let (ledger, project) = setup();
    let other = ProjectSpec::create(&ledger, "Other", "Another project", GOAL, "other1").unwrap();
    let foreign = PledgeBuilder::new(&other)
        .create(20_000, &[utxo(1, 0, 20_000)])
        .unwrap();

    let err = PledgeBuilder::new(&project)
        .sign(&ledger, foreign, &[MockKey(1)])
        .unwrap_err();
    assert!(matches!(err, CoreError::WrongProject { .. }));
}

#[test]
fn test_validate_structural_failures() {
    let (_, project) = setup();
    let unsigned = PledgeBuilder::new(&project)
        .create(20_000, &[utxo(1, 0, 20_000)])
        .unwrap();
    assert!(matches!(
        unsigned.validate(),
        Err(CoreError::UnsignedInput { index: 0 })
    ));

    let empty = Pledge::load(&[]).unwrap_err();
    assert!(matches!(empty, CoreError::Serialization(_)), "{empty:?}");
}

#[test]
fn test_validate_rejects_overstated_amount() {
    use prost::Message;

    let (ledger, project) = setup();
    let pledge = signed_pledge(&ledger, &project, 1, 20_000);

    let mut msg = crate::wire::Pledge::decode(pledge.serialize().as_slice()).unwrap();
    msg.amount = 1_000_000;
    let inflated = Pledge::load(&msg.encode_to_vec()).unwrap();

    assert!(matches!(inflated.validate(), Err(CoreError::Validation(_))));
}

#[test]
fn test_serialize_load_roundtrip() {
    let (ledger, project) = setup();
    let pledge = signed_pledge(&ledger, &project, 7, 40_000)
        .with_memo("Good luck!")
        .with_refund_address("refund1")
        .with_contact("Alice", "alice@example.com");

    let loaded = Pledge::load(&pledge.serialize()).unwrap();

    assert_eq!(loaded, pledge);
    assert_eq!(loaded.id(), pledge.id());
    assert_eq!(loaded.amount(), 40_000);
    assert_eq!(loaded.memo(), Some("Good luck!"));
    assert_eq!(loaded.refund_address(), Some("refund1"));
    assert_eq!(loaded.contact().map(|c| c.email.as_str()), Some("alice@example.com"));
    loaded.validate().unwrap();
}

#[test]
fn test_absent_metadata_decodes_as_absent() {
    let (ledger, project) = setup();
    let pledge = signed_pledge(&ledger, &project, 3, 20_000);
    let loaded = Pledge::load(&pledge.serialize()).unwrap();

    assert!(loaded.memo().is_none());
    assert!(loaded.refund_address().is_none());
    assert!(loaded.contact().is_none());

    // An explicitly empty memo is not the same as no memo.
    let blank = pledge.with_memo("");
    let loaded = Pledge::load(&blank.serialize()).unwrap();
    assert_eq!(loaded.memo(), Some(""));
}

#[test]
fn test_metadata_setters_refresh_id() {
    let (ledger, project) = setup();
    let pledge = signed_pledge(&ledger, &project, 4, 20_000);
    let id = pledge.id();

    let with_memo = pledge.clone().with_memo("hi");
    let with_refund = pledge.clone().with_refund_address("r1");
    let with_contact = pledge.with_contact("Bob", "bob@example.com");

    for changed in [&with_memo, &with_refund, &with_contact] {
        assert_ne!(changed.id(), id);
        assert_pledge_id_fresh(changed);
    }
}

#[test]
fn test_load_rejects_bad_hash_lengths() {
    use prost::Message;

    let msg = crate::wire::Pledge {
        project_id: vec![0; 31],
        ..Default::default()
    };
    assert!(Pledge::load(&msg.encode_to_vec()).is_err());

    let msg = crate::wire::Pledge {
        project_id: vec![0; 32],
        inputs: vec![crate::wire::Input {
            tx_hash: vec![1; 20],
            ..Default::default()
        }],
        ..Default::default()
    };
    assert!(Pledge::load(&msg.encode_to_vec()).is_err());
}
