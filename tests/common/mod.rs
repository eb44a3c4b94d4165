//! Shared harness for the integration tests: deterministic seeded accounts,
//! a stub validator manager, and an executor over an in-memory database.

use std::sync::Arc;

use qledger::common::{Addr, Hash};
use qledger::crypto::PrivateKey;
use qledger::execution::Executor;
use qledger::params::MINIMUM_TRANSACTION_FEE_GAMMA_WEI;
use qledger::state::LedgerState;
use qledger::store::MemDatabase;
use qledger::types::{
    Account, Coins, ReserveFundTx, ServicePaymentTx, Tx, TxInput,
};
use qledger::validator::{Validator, ValidatorManager, ValidatorSet};

pub const CHAIN_ID: &str = "test_chain_id";

pub fn min_fee() -> u64 {
    MINIMUM_TRANSACTION_FEE_GAMMA_WEI
}

pub struct PrivAccount {
    pub key: PrivateKey,
    pub address: Addr,
}

pub fn make_acc(seed: &str) -> PrivAccount {
    let key = PrivateKey::from_slice(Hash::hash(seed.as_bytes()).as_bytes())
        .unwrap();
    let address = key.public_key().address();
    PrivAccount { key, address }
}

pub struct TestValidatorManager {
    proposer: Validator,
    val_set: ValidatorSet,
}

impl ValidatorManager for TestValidatorManager {
    fn proposer(&self, _height: u64) -> Validator {
        self.proposer.clone()
    }
    fn validator_set(&self, _height: u64) -> ValidatorSet {
        self.val_set.clone()
    }
}

pub struct ExecTest {
    pub executor: Executor,
    pub proposer: PrivAccount,
    pub val2: PrivAccount,
}

impl ExecTest {
    pub fn new() -> Self {
        let proposer = make_acc("proposer");
        let val2 = make_acc("val2");
        let mut val_set = ValidatorSet::new();
        val_set.add_validator(Validator::new(proposer.key.public_key(), 999));
        val_set.add_validator(Validator::new(val2.key.public_key(), 100));
        let val_mgr = TestValidatorManager {
            proposer: Validator::new(proposer.key.public_key(), 999),
            val_set,
        };

        let db = Arc::new(MemDatabase::new());
        let mut state = LedgerState::new(CHAIN_ID, db).unwrap();
        state.reset_state(1, Hash::zero()).unwrap();
        ExecTest {
            executor: Executor::new(state, Arc::new(val_mgr)),
            proposer,
            val2,
        }
    }

    /// Write the account into state with the given GammaWei balance and the
    /// public key recorded, then commit.
    pub fn acc2state(&mut self, acc: &PrivAccount, balance: u64) {
        let mut account = Account::new();
        account.balance = Coins::gamma(balance);
        account.pub_key = Some(acc.key.public_key());
        self.executor
            .state()
            .delivered()
            .set_account(&acc.address, &account);
        self.commit();
    }

    pub fn commit(&mut self) -> Hash {
        self.executor.state().commit()
    }

    pub fn fastforward_to(&mut self, target_height: u64) {
        let root = self.executor.state().delivered().save();
        self.executor
            .state()
            .reset_state(target_height, &root)
            .unwrap();
    }

    pub fn height(&mut self) -> u64 {
        self.executor.state().height()
    }

    pub fn account(&mut self, addr: &Addr) -> Option<Account> {
        self.executor.state().delivered().get_account(addr)
    }

    pub fn balance(&mut self, addr: &Addr) -> Coins {
        self.account(addr)
            .map(|acc| acc.balance)
            .unwrap_or_else(Coins::zero)
    }
}

pub fn create_service_payment_tx(
    source: &PrivAccount, target: &PrivAccount, amount: u64, src_seq: u64,
    tgt_seq: u64, payment_seq: u64, reserve_seq: u64, resource_id: &str,
) -> ServicePaymentTx {
    let mut tx = ServicePaymentTx {
        fee: Coins::gamma(min_fee()),
        source: TxInput {
            address: source.address.clone(),
            coins: Coins::gamma(amount),
            sequence: src_seq,
            ..Default::default()
        },
        target: TxInput {
            address: target.address.clone(),
            sequence: tgt_seq,
            ..Default::default()
        },
        payment_sequence: payment_seq,
        reserve_sequence: reserve_seq,
        resource_id: resource_id.to_string(),
    };
    // the public key rides along with an account's first signed transaction
    if src_seq == 1 {
        tx.source.pub_key = Some(source.key.public_key());
    }
    if tgt_seq == 1 {
        tx.target.pub_key = Some(target.key.public_key());
    }
    tx.source.signature = source.key.sign(&tx.source_sign_bytes(CHAIN_ID));
    tx.target.signature = target.key.sign(&tx.target_sign_bytes(CHAIN_ID));
    tx
}

pub fn create_reserve_fund_tx(
    source: &PrivAccount, fund: u64, collateral: u64, seq: u64,
    resource_id: &str, duration: u64,
) -> ReserveFundTx {
    let mut tx = ReserveFundTx {
        fee: Coins::gamma(min_fee()),
        source: TxInput {
            address: source.address.clone(),
            coins: Coins::gamma(fund),
            sequence: seq,
            pub_key: Some(source.key.public_key()),
            ..Default::default()
        },
        collateral: Coins::gamma(collateral),
        resource_ids: vec![resource_id.to_string()],
        duration,
    };
    tx.source.signature = source.key.sign(&tx.sign_bytes(CHAIN_ID));
    tx
}

pub struct ServicePaymentSetup {
    pub et: ExecTest,
    pub resource_id: String,
    pub alice: PrivAccount,
    pub bob: PrivAccount,
    pub carol: PrivAccount,
    pub alice_init_balance: Coins,
    pub bob_init_balance: Coins,
    pub carol_init_balance: Coins,
}

/// The canonical channel fixture: Alice escrows 1000 fees of fund backed by
/// 1001 fees of collateral on "rid001" at height 100, Bob and Carol are
/// funded bystanders.
pub fn setup_for_service_payment() -> ServicePaymentSetup {
    let mut et = ExecTest::new();

    let alice = make_acc("User Alice");
    let bob = make_acc("User Bob");
    let carol = make_acc("User Carol");
    let alice_init_balance = Coins::gamma(10_000 * min_fee());
    let bob_init_balance = Coins::gamma(3_000 * min_fee());
    let carol_init_balance = Coins::gamma(3_000 * min_fee());
    et.acc2state(&alice, 10_000 * min_fee());
    et.acc2state(&bob, 3_000 * min_fee());
    et.acc2state(&carol, 3_000 * min_fee());

    // reserve at height 99 and commit into height 100, so screening (which
    // reads committed state) sees the pool too
    et.fastforward_to(99);

    let resource_id = "rid001";
    let reserve_tx = create_reserve_fund_tx(
        &alice,
        1_000 * min_fee(),
        1_001 * min_fee(),
        1,
        resource_id,
        1_000,
    );
    et.executor
        .execute_tx(&Tx::ReserveFund(reserve_tx))
        .expect("reserve fund tx must pass");
    et.commit();

    ServicePaymentSetup {
        et,
        resource_id: resource_id.to_string(),
        alice,
        bob,
        carol,
        alice_init_balance,
        bob_init_balance,
        carol_init_balance,
    }
}
