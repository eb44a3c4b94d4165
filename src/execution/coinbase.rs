//! Block reward distribution. The coinbase transaction is fee-free, signed
//! by the designated proposer, pays validators only, and the view's coinbase
//! flag makes it at-most-once per block.

use std::collections::HashSet;

use crate::common::Hash;
use crate::execution::{
    get_input, validate_output_basic, verify_signature, TxError,
};
use crate::state::StoreView;
use crate::types::{tx_id, CoinbaseTx, Tx};
use crate::validator::ValidatorManager;

pub(crate) fn sanity_check(
    chain_id: &str, val_mgr: &dyn ValidatorManager, view: &StoreView,
    tx: &CoinbaseTx,
) -> Result<(), TxError> {
    if tx.proposer.address.is_zero() {
        return Err(TxError::InvalidInput("address must not be zero".into()))
    }
    if tx.proposer.signature.is_empty() {
        return Err(TxError::InvalidInput("signature must be present".into()))
    }
    let proposer_account = get_input(view, &tx.proposer)?;

    let expected = val_mgr.proposer(view.height());
    if tx.proposer.address != expected.address() {
        return Err(TxError::InvalidTx(format!(
            "{} is not the proposer for height {}",
            tx.proposer.address,
            view.height()
        )))
    }
    if tx.block_height != view.height() {
        return Err(TxError::InvalidTx(format!(
            "coinbase height mismatch: got {}, expected {}",
            tx.block_height,
            view.height()
        )))
    }
    verify_signature(&proposer_account, &tx.sign_bytes(chain_id), &tx.proposer)?;

    let validators = val_mgr.validator_set(view.height());
    let mut seen = HashSet::new();
    for output in tx.outputs.iter() {
        validate_output_basic(output)?;
        if !seen.insert(output.address.clone()) {
            return Err(TxError::InvalidOutput(format!(
                "duplicated output address {}",
                output.address
            )))
        }
        if !validators.contains(&output.address) {
            return Err(TxError::InvalidOutput(format!(
                "{} is not a validator",
                output.address
            )))
        }
    }

    Ok(())
}

pub(crate) fn process(
    chain_id: &str, view: &mut StoreView, tx: &CoinbaseTx,
) -> Result<Hash, TxError> {
    if view.coinbase_processed() {
        return Err(TxError::InvalidTx(
            "coinbase transaction already processed".into(),
        ))
    }

    for output in tx.outputs.iter() {
        let mut account = view.get_or_create_account(&output.address);
        account.balance = account
            .balance
            .checked_add(&output.coins)
            .expect("balance overflow");
        view.set_account(&output.address, &account);
    }
    view.set_coinbase_processed(true);

    Ok(tx_id(chain_id, &Tx::Coinbase(tx.clone())))
}
