use std::sync::Arc;

use qledger::common::{Addr, Hash, Wei, U256};
use qledger::state::StoreView;
use qledger::store::MemDatabase;
use qledger::types::{Account, Coins, Split, SplitRule};
use qledger::validator::Validator;

fn addr(n: u64) -> Addr {
    U256::from(n).into()
}

fn fresh_view() -> StoreView {
    StoreView::new(1, Hash::zero(), Arc::new(MemDatabase::new())).unwrap()
}

fn rule(resource_id: &str, end: u64) -> SplitRule {
    SplitRule {
        initiator_address: addr(9),
        resource_id: resource_id.to_string(),
        splits: vec![Split {
            address: addr(2),
            percentage: 30,
        }],
        end_block_height: end,
    }
}

#[test]
fn test_account_round_trip() {
    let mut view = fresh_view();
    assert!(view.get_account(&addr(1)).is_none());

    let mut acc = Account::new();
    acc.sequence = 7;
    acc.balance = Coins::new(5u64.into(), 1_000u64.into());
    view.set_account(&addr(1), &acc);
    assert_eq!(view.get_account(&addr(1)).unwrap(), acc);

    view.delete_account(&addr(1));
    assert!(view.get_account(&addr(1)).is_none());
}

#[test]
fn test_get_or_create_does_not_persist() {
    let view = fresh_view();
    let acc = view.get_or_create_account(&addr(1));
    assert!(acc.is_empty());
    assert!(!view.exist(&addr(1)));
}

#[test]
fn test_split_rule_crud() {
    let mut view = fresh_view();
    assert!(!view.split_rule_exists("rid001"));
    assert!(!view.update_split_rule(&rule("rid001", 10)));

    assert!(view.add_split_rule(&rule("rid001", 10)));
    // one rule per resource id
    assert!(!view.add_split_rule(&rule("rid001", 99)));
    assert_eq!(view.get_split_rule("rid001").unwrap().end_block_height, 10);

    assert!(view.update_split_rule(&rule("rid001", 20)));
    assert_eq!(view.get_split_rule("rid001").unwrap().end_block_height, 20);

    assert!(view.delete_split_rule("rid001"));
    assert!(!view.delete_split_rule("rid001"));
    assert!(view.get_split_rule("rid001").is_none());
}

#[test]
fn test_delete_expired_split_rules() {
    let mut view = fresh_view();
    view.add_split_rule(&rule("rid001", 10));
    view.add_split_rule(&rule("rid002", 100));
    view.add_split_rule(&rule("rid003", 50));

    assert!(view.delete_expired_split_rules(51));
    assert!(view.get_split_rule("rid001").is_none());
    assert!(view.get_split_rule("rid002").is_some());
    assert!(view.get_split_rule("rid003").is_none());

    // the boundary is strict: end_block_height == height survives
    assert!(view.delete_expired_split_rules(100));
    assert!(view.get_split_rule("rid002").is_some());
    assert!(view.delete_expired_split_rules(101));
    assert!(view.get_split_rule("rid002").is_none());
}

#[test]
fn test_snapshot_revert_round_trip() {
    let mut view = fresh_view();
    let mut acc = Account::new();
    acc.balance = Coins::gamma(100u64);
    view.set_account(&addr(1), &acc);

    let snapshot = view.snapshot();
    acc.balance = Coins::gamma(50u64);
    view.set_account(&addr(1), &acc);
    view.add_split_rule(&rule("rid001", 10));
    assert_ne!(view.hash(), snapshot);

    view.revert_to_snapshot(&snapshot);
    assert_eq!(view.hash(), snapshot);
    assert_eq!(
        view.get_account(&addr(1)).unwrap().balance,
        Coins::gamma(100u64)
    );
    assert!(view.get_split_rule("rid001").is_none());
}

#[test]
fn test_nested_snapshots() {
    let mut view = fresh_view();
    view.set_nonce(&addr(1), 1);
    let outer = view.snapshot();
    view.set_nonce(&addr(1), 2);
    let inner = view.snapshot();
    view.set_nonce(&addr(1), 3);

    view.revert_to_snapshot(&inner);
    assert_eq!(view.get_nonce(&addr(1)), 2);
    view.revert_to_snapshot(&outer);
    assert_eq!(view.get_nonce(&addr(1)), 1);
}

#[test]
fn test_save_and_reopen() {
    let db = Arc::new(MemDatabase::new());
    let root = {
        let mut view = StoreView::new(1, Hash::zero(), db.clone()).unwrap();
        let mut acc = Account::new();
        acc.balance = Coins::gamma(42u64);
        view.set_account(&addr(1), &acc);
        view.add_split_rule(&rule("rid001", 10));
        view.save()
    };
    let view = StoreView::new(2, &root, db.clone()).unwrap();
    assert_eq!(view.height(), 2);
    assert_eq!(
        view.get_account(&addr(1)).unwrap().balance,
        Coins::gamma(42u64)
    );
    assert!(view.split_rule_exists("rid001"));

    // a root nobody committed is rejected
    assert!(StoreView::new(2, &Hash::hash(b"bogus"), db).is_err());
}

#[test]
fn test_view_copy_is_independent() {
    let mut view = fresh_view();
    view.set_nonce(&addr(1), 1);
    let mut copy = view.copy();
    copy.set_nonce(&addr(1), 9);
    assert_eq!(view.get_nonce(&addr(1)), 1);
    assert_eq!(copy.get_nonce(&addr(1)), 9);
    assert_ne!(view.hash(), copy.hash());
}

#[test]
fn test_balance_and_nonce_ops() {
    let mut view = fresh_view();
    assert_eq!(view.get_balance(&addr(1)), *Wei::zero());
    view.add_balance(&addr(1), &100u64.into());
    view.sub_balance(&addr(1), &30u64.into());
    assert_eq!(view.get_balance(&addr(1)), 70u64.into());

    // zero-amount deltas must not materialize an account
    view.add_balance(&addr(2), Wei::zero());
    assert!(!view.exist(&addr(2)));

    view.set_nonce(&addr(1), 5);
    assert_eq!(view.get_nonce(&addr(1)), 5);
}

#[test]
fn test_code_storage() {
    let mut view = fresh_view();
    assert!(view.get_code(&addr(1)).is_none());
    assert_eq!(view.get_code_hash(&addr(1)), *Hash::zero());

    let code = b"\x60\x60\x00";
    view.set_code(&addr(1), code);
    assert_eq!(view.get_code(&addr(1)).unwrap(), code);
    assert_eq!(view.get_code_hash(&addr(1)), Hash::hash(code));
    assert_eq!(view.get_code_size(&addr(1)), code.len());
    assert_eq!(view.get_code_by_hash(&Hash::hash(code)).unwrap(), code);
}

#[test]
fn test_storage_slots() {
    let mut view = fresh_view();
    let key: Hash = U256::from(1).into();
    let val: Hash = U256::from(0xdead_beefu64).into();

    assert!(view.get_state(&addr(1), &key).is_zero());
    view.set_state(&addr(1), &key, &val);
    assert_eq!(view.get_state(&addr(1), &key), val);

    // a second slot does not disturb the first
    let key2: Hash = U256::from(2).into();
    view.set_state(&addr(1), &key2, &U256::from(7).into());
    assert_eq!(view.get_state(&addr(1), &key), val);

    // the account's storage root moved with the writes
    assert!(!view.get_account(&addr(1)).unwrap().root.is_zero());

    // writing the zero hash deletes the slot
    view.set_state(&addr(1), &key, Hash::zero());
    assert!(view.get_state(&addr(1), &key).is_zero());
    assert_eq!(view.get_state(&addr(1), &key2), U256::from(7).into());
}

#[test]
fn test_storage_survives_save() {
    let db = Arc::new(MemDatabase::new());
    let key: Hash = U256::from(1).into();
    let root = {
        let mut view = StoreView::new(1, Hash::zero(), db.clone()).unwrap();
        view.set_state(&addr(1), &key, &U256::from(42).into());
        view.save()
    };
    let view = StoreView::new(2, &root, db).unwrap();
    assert_eq!(view.get_state(&addr(1), &key), U256::from(42).into());
}

#[test]
fn test_suicide_exist_empty() {
    let mut view = fresh_view();
    assert!(!view.suicide(&addr(1)));
    assert!(view.empty(&addr(1)));

    view.set_nonce(&addr(1), 1);
    assert!(view.exist(&addr(1)));
    assert!(!view.empty(&addr(1)));

    assert!(view.suicide(&addr(1)));
    assert!(!view.exist(&addr(1)));
    assert!(view.has_suicided(&addr(1)));

    // an account with only a pub key recorded is still "empty" per EIP-161
    view.create_account(&addr(2));
    assert!(view.exist(&addr(2)));
    assert!(view.empty(&addr(2)));
}

#[test]
fn test_refund_counter() {
    let mut view = fresh_view();
    assert_eq!(view.get_refund(), 0);
    view.add_refund(100);
    view.sub_refund(40);
    assert_eq!(view.get_refund(), 60);
    view.reset_refund();
    assert_eq!(view.get_refund(), 0);
}

#[test]
#[should_panic]
fn test_refund_below_zero_panics() {
    let mut view = fresh_view();
    view.add_refund(10);
    view.sub_refund(11);
}

#[test]
fn test_random_cross_validate() {
    use rand::{Rng, SeedableRng};
    use std::collections::HashMap;

    let addr_range = 10u64;
    let key_range = 50u64;
    let total_iter = 2_000u64;

    let db = Arc::new(MemDatabase::new());
    let mut view = StoreView::new(1, Hash::zero(), db.clone()).unwrap();
    let mut balances: HashMap<Addr, u64> = HashMap::new();
    let mut nonces: HashMap<Addr, u64> = HashMap::new();
    let mut slots: HashMap<(Addr, Hash), Hash> = HashMap::new();

    let mut rng = rand::rngs::StdRng::seed_from_u64(0);
    for i in 0..total_iter {
        let a = addr(rng.gen_range(1..=addr_range));
        match rng.gen_range(0.0..1.0) {
            r if r > 0.6 => {
                let key: Hash = U256::from(rng.gen_range(0..key_range)).into();
                let val: Hash = U256::from(i + 1).into();
                view.set_state(&a, &key, &val);
                slots.insert((a, key), val);
            }
            r if r > 0.3 => {
                let delta = rng.gen_range(1..1_000u64);
                view.add_balance(&a, &delta.into());
                *balances.entry(a).or_insert(0) += delta;
            }
            _ => {
                let nonce = rng.gen_range(0..u32::MAX as u64);
                view.set_nonce(&a, nonce);
                nonces.insert(a, nonce);
            }
        }
    }

    let root = view.save();
    let reopened = StoreView::new(2, &root, db).unwrap();
    for checked in [&view, &reopened] {
        for (a, balance) in balances.iter() {
            assert_eq!(checked.get_balance(a), (*balance).into());
        }
        for (a, nonce) in nonces.iter() {
            assert_eq!(checked.get_nonce(a), *nonce);
        }
        for ((a, key), val) in slots.iter() {
            assert_eq!(&checked.get_state(a, key), val);
        }
    }
}

#[test]
fn test_staging_buffers_are_not_merkleized() {
    let mut view = fresh_view();
    let before = view.hash();

    let key = qledger::crypto::PrivateKey::from_slice(
        Hash::hash(b"validator").as_bytes(),
    )
    .unwrap();
    view.set_validator_diff(vec![Validator::new(key.public_key(), 100)]);
    assert_eq!(view.hash(), before);

    let diff = view.get_and_clear_validator_diff();
    assert_eq!(diff.len(), 1);
    assert!(view.get_and_clear_validator_diff().is_empty());

    view.add_slash_intent(qledger::types::SlashIntent {
        address: addr(1),
        reserve_sequence: 1,
        proof: b"evidence".to_vec().into(),
    });
    assert_eq!(view.hash(), before);
    assert_eq!(view.get_slash_intents().len(), 1);
    view.clear_slash_intents();
    assert!(view.get_slash_intents().is_empty());

    assert!(!view.coinbase_processed());
    view.set_coinbase_processed(true);
    assert_eq!(view.hash(), before);

    // copies start with clean buffers
    assert!(!view.copy().coinbase_processed());
    assert!(view.copy().get_slash_intents().is_empty());
}
