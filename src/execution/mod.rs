//! Transaction execution. Every variant implements the same capability pair:
//! `sanity_check(chain_id, view, tx)` is the pure admission check used for
//! mempool screening, `process(chain_id, view, tx)` applies the state
//! transition during block execution and returns the transaction hash.
//! Dispatch is a match on the variant tag.

use log::info;

use std::sync::Arc;

use crate::common::{Addr, Hash};
use crate::params::MINIMUM_TRANSACTION_FEE_GAMMA_WEI;
use crate::state::{LedgerState, StoreView};
use crate::types::{Account, Coins, ReservedFundError, Tx, TxInput, TxOutput};
use crate::validator::ValidatorManager;

mod coinbase;
mod fund;
mod payment;
mod send;
mod split;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TxError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid output: {0}")]
    InvalidOutput(String),
    #[error("unknown address {0}")]
    UnknownAddress(Addr),
    #[error("public key not found for {0}")]
    MissingPublicKey(Addr),
    #[error("invalid signature from {0}")]
    InvalidSignature(Addr),
    #[error("sequence mismatch for {addr}: got {got}, expected {expected}")]
    SequenceMismatch { addr: Addr, got: u64, expected: u64 },
    #[error(
        "insufficient fee, the transaction fee needs to be at least {0} GammaWei"
    )]
    InvalidFee(u64),
    #[error("reserved fund check failed: {0}")]
    ReservedFundCheckFailed(#[from] ReservedFundError),
    #[error("failed to split payment")]
    SplitFailure,
    #[error("insufficient funds")]
    InsufficientFunds,
    #[error("invalid transaction: {0}")]
    InvalidTx(String),
}

/// The ledger-facing executor: screens transactions against the checked view
/// and executes them against the delivered view.
pub struct Executor {
    state: LedgerState,
    val_mgr: Arc<dyn ValidatorManager>,
}

impl Executor {
    pub fn new(state: LedgerState, val_mgr: Arc<dyn ValidatorManager>) -> Self {
        Self { state, val_mgr }
    }

    pub fn state(&mut self) -> &mut LedgerState {
        &mut self.state
    }

    /// Mempool admission: sanity-check only, against the checked view.
    pub fn screen_tx(&mut self, tx: &Tx) -> Result<(), TxError> {
        let chain_id = self.state.chain_id().to_string();
        let val_mgr = self.val_mgr.clone();
        let result =
            sanity_check(&chain_id, &*val_mgr, self.state.checked(), tx);
        if let Err(err) = &result {
            info!("tx screened out: {}", err);
        }
        result
    }

    /// Block execution: sanity-check, then process against the delivered
    /// view. Errors leave the delivered view untouched.
    pub fn execute_tx(&mut self, tx: &Tx) -> Result<Hash, TxError> {
        let chain_id = self.state.chain_id().to_string();
        let val_mgr = self.val_mgr.clone();
        let view = self.state.delivered();
        sanity_check(&chain_id, &*val_mgr, view, tx)?;
        process(&chain_id, view, tx)
    }
}

pub fn sanity_check(
    chain_id: &str, val_mgr: &dyn ValidatorManager, view: &StoreView, tx: &Tx,
) -> Result<(), TxError> {
    match tx {
        Tx::Coinbase(tx) => coinbase::sanity_check(chain_id, val_mgr, view, tx),
        Tx::Send(tx) => send::sanity_check(chain_id, view, tx),
        Tx::ReserveFund(tx) => fund::sanity_check_reserve(chain_id, view, tx),
        Tx::ReleaseFund(tx) => fund::sanity_check_release(chain_id, view, tx),
        Tx::ServicePayment(tx) => payment::sanity_check(chain_id, view, tx),
        Tx::SplitRule(tx) => split::sanity_check(chain_id, view, tx),
    }
}

pub fn process(
    chain_id: &str, view: &mut StoreView, tx: &Tx,
) -> Result<Hash, TxError> {
    match tx {
        Tx::Coinbase(tx) => coinbase::process(chain_id, view, tx),
        Tx::Send(tx) => send::process(chain_id, view, tx),
        Tx::ReserveFund(tx) => fund::process_reserve(chain_id, view, tx),
        Tx::ReleaseFund(tx) => fund::process_release(chain_id, view, tx),
        Tx::ServicePayment(tx) => payment::process(chain_id, view, tx),
        Tx::SplitRule(tx) => split::process(chain_id, view, tx),
    }
}

// shared helpers

fn validate_input_basic(input: &TxInput) -> Result<(), TxError> {
    if input.address.is_zero() {
        return Err(TxError::InvalidInput("address must not be zero".into()))
    }
    if let Some(pub_key) = &input.pub_key {
        if pub_key.address() != input.address {
            return Err(TxError::InvalidInput(
                "public key does not match the address".into(),
            ))
        }
    }
    if input.signature.is_empty() {
        return Err(TxError::InvalidInput("signature must be present".into()))
    }
    Ok(())
}

fn validate_output_basic(output: &TxOutput) -> Result<(), TxError> {
    if output.address.is_zero() {
        return Err(TxError::InvalidOutput("address must not be zero".into()))
    }
    Ok(())
}

/// Fetch the account behind `input`; the account must exist. The account's
/// public key is filled in from the input the first time one is seen, since
/// the address alone cannot verify anything.
fn get_input(view: &StoreView, input: &TxInput) -> Result<Account, TxError> {
    get_or_make_input_impl(view, input, false)
}

/// Same as [get_input], but a missing account starts out as a transient
/// empty one. Nothing is persisted here; an untouched fresh account never
/// reaches the store.
fn get_or_make_input(
    view: &StoreView, input: &TxInput,
) -> Result<Account, TxError> {
    get_or_make_input_impl(view, input, true)
}

fn get_or_make_input_impl(
    view: &StoreView, input: &TxInput, make_new: bool,
) -> Result<Account, TxError> {
    let mut account = match view.get_account(&input.address) {
        Some(account) => account,
        None if make_new => Account::new(),
        None => return Err(TxError::UnknownAddress(input.address.clone())),
    };
    if account.pub_key.is_none() {
        account.pub_key = input.pub_key.clone();
    }
    if account.pub_key.is_none() {
        return Err(TxError::MissingPublicKey(input.address.clone()))
    }
    Ok(account)
}

fn verify_signature(
    account: &Account, msg: &[u8], input: &TxInput,
) -> Result<(), TxError> {
    let verified = account
        .pub_key
        .as_ref()
        .map(|pk| pk.verify(msg, &input.signature))
        .unwrap_or(false);
    if !verified {
        info!("signature verification failed, addr: {}", input.address);
        return Err(TxError::InvalidSignature(input.address.clone()))
    }
    Ok(())
}

fn check_sequence(account: &Account, input: &TxInput) -> Result<(), TxError> {
    if account.sequence + 1 != input.sequence {
        return Err(TxError::SequenceMismatch {
            addr: input.address.clone(),
            got: input.sequence,
            expected: account.sequence + 1,
        })
    }
    Ok(())
}

/// Fees are paid in GammaWei only and must meet the protocol minimum.
fn sanity_check_for_fee(fee: &Coins) -> Result<(), TxError> {
    if !fee.theta_wei.is_zero() ||
        !fee.is_gte(&Coins::gamma(MINIMUM_TRANSACTION_FEE_GAMMA_WEI))
    {
        return Err(TxError::InvalidFee(MINIMUM_TRANSACTION_FEE_GAMMA_WEI))
    }
    Ok(())
}

fn charge_fee(account: &mut Account, fee: &Coins) -> bool {
    match account.balance.checked_sub(fee) {
        Some(balance) => {
            account.balance = balance;
            true
        }
        None => false,
    }
}
