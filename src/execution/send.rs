//! Plain value transfer with multiple inputs and outputs.

use std::collections::HashSet;

use crate::common::Hash;
use crate::execution::{
    check_sequence, get_input, sanity_check_for_fee, validate_input_basic,
    validate_output_basic, verify_signature, TxError,
};
use crate::state::StoreView;
use crate::types::{tx_id, Coins, SendTx, Tx};

pub(crate) fn sanity_check(
    chain_id: &str, view: &StoreView, tx: &SendTx,
) -> Result<(), TxError> {
    if tx.inputs.is_empty() {
        return Err(TxError::InvalidInput("no inputs".into()))
    }
    if tx.outputs.is_empty() {
        return Err(TxError::InvalidOutput("no outputs".into()))
    }
    let mut seen = HashSet::new();
    for input in tx.inputs.iter() {
        validate_input_basic(input)?;
        if !seen.insert(input.address.clone()) {
            return Err(TxError::InvalidInput(format!(
                "duplicated input address {}",
                input.address
            )))
        }
    }
    let mut seen = HashSet::new();
    for output in tx.outputs.iter() {
        validate_output_basic(output)?;
        if !seen.insert(output.address.clone()) {
            return Err(TxError::InvalidOutput(format!(
                "duplicated output address {}",
                output.address
            )))
        }
    }
    sanity_check_for_fee(&tx.fee)?;

    // conservation: inputs fund the outputs plus the fee, exactly
    let total_in = coins_sum(tx.inputs.iter().map(|i| &i.coins))?;
    let total_out = coins_sum(tx.outputs.iter().map(|o| &o.coins))?;
    let expected = total_out
        .checked_add(&tx.fee)
        .ok_or_else(|| TxError::InvalidOutput("amount overflow".into()))?;
    if total_in != expected {
        return Err(TxError::InvalidTx(
            "input total != output total + fee".into(),
        ))
    }

    let sign_bytes = tx.sign_bytes(chain_id);
    for input in tx.inputs.iter() {
        let account = get_input(view, input)?;
        check_sequence(&account, input)?;
        if !account.balance.is_gte(&input.coins) {
            return Err(TxError::InsufficientFunds)
        }
        verify_signature(&account, &sign_bytes, input)?;
    }

    Ok(())
}

pub(crate) fn process(
    chain_id: &str, view: &mut StoreView, tx: &SendTx,
) -> Result<Hash, TxError> {
    for input in tx.inputs.iter() {
        let mut account = get_input(view, input)?;
        account.balance = account
            .balance
            .checked_sub(&input.coins)
            .ok_or(TxError::InsufficientFunds)?;
        account.sequence += 1;
        view.set_account(&input.address, &account);
    }
    for output in tx.outputs.iter() {
        let mut account = view.get_or_create_account(&output.address);
        account.balance = account
            .balance
            .checked_add(&output.coins)
            .expect("balance overflow");
        view.set_account(&output.address, &account);
    }

    Ok(tx_id(chain_id, &Tx::Send(tx.clone())))
}

fn coins_sum<'a>(
    coins: impl Iterator<Item = &'a Coins>,
) -> Result<Coins, TxError> {
    let mut total = Coins::zero();
    for c in coins {
        total = total
            .checked_add(c)
            .ok_or_else(|| TxError::InvalidInput("amount overflow".into()))?;
    }
    Ok(total)
}
