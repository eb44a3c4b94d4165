//! Reserved-fund lifecycle: escrow creation (ReserveFundTx) and the release
//! of an expired pool (ReleaseFundTx).

use crate::common::Hash;
use crate::execution::{
    charge_fee, check_sequence, get_input, sanity_check_for_fee,
    validate_input_basic, verify_signature, TxError,
};
use crate::params::{
    MAXIMUM_FUND_RESERVE_DURATION, MINIMUM_FUND_RESERVE_DURATION,
    RESERVED_FUND_FREEZE_PERIOD,
};
use crate::state::StoreView;
use crate::types::{tx_id, ReleaseFundTx, ReserveFundTx, Tx};

pub(crate) fn sanity_check_reserve(
    chain_id: &str, view: &StoreView, tx: &ReserveFundTx,
) -> Result<(), TxError> {
    validate_input_basic(&tx.source)?;
    let source_account = get_input(view, &tx.source)?;

    check_sequence(&source_account, &tx.source)?;
    verify_signature(&source_account, &tx.sign_bytes(chain_id), &tx.source)?;
    sanity_check_for_fee(&tx.fee)?;

    if !tx.source.coins.theta_wei.is_zero() {
        return Err(TxError::InvalidInput(
            "cannot reserve ThetaWei as service fund".into(),
        ))
    }
    if !tx.collateral.theta_wei.is_zero() {
        return Err(TxError::InvalidInput(
            "collateral must be in GammaWei".into(),
        ))
    }
    if tx.duration < MINIMUM_FUND_RESERVE_DURATION ||
        tx.duration > MAXIMUM_FUND_RESERVE_DURATION
    {
        return Err(TxError::InvalidTx(format!(
            "reserve duration must be within [{}, {}]",
            MINIMUM_FUND_RESERVE_DURATION, MAXIMUM_FUND_RESERVE_DURATION
        )))
    }
    // the collateral has to overcollateralize the escrowed fund
    if !tx.collateral.is_gte(&tx.source.coins) {
        return Err(TxError::InvalidTx("insufficient collateral".into()))
    }

    let locked = tx
        .source
        .coins
        .checked_add(&tx.collateral)
        .and_then(|c| c.checked_add(&tx.fee))
        .ok_or_else(|| TxError::InvalidInput("amount overflow".into()))?;
    if !source_account.balance.is_gte(&locked) {
        return Err(TxError::InsufficientFunds)
    }

    Ok(())
}

pub(crate) fn process_reserve(
    chain_id: &str, view: &mut StoreView, tx: &ReserveFundTx,
) -> Result<Hash, TxError> {
    let mut source_account = get_input(view, &tx.source)?;

    if !charge_fee(&mut source_account, &tx.fee) {
        return Err(TxError::InsufficientFunds)
    }
    let end_block_height = view.height() + tx.duration;
    // the reserving sequence number doubles as the pool identifier
    source_account.reserve_fund(
        tx.collateral.clone(),
        tx.source.coins.clone(),
        tx.resource_ids.clone(),
        end_block_height,
        tx.source.sequence,
    )?;
    source_account.sequence += 1;
    view.set_account(&tx.source.address, &source_account);

    Ok(tx_id(chain_id, &Tx::ReserveFund(tx.clone())))
}

pub(crate) fn sanity_check_release(
    chain_id: &str, view: &StoreView, tx: &ReleaseFundTx,
) -> Result<(), TxError> {
    validate_input_basic(&tx.source)?;
    let source_account = get_input(view, &tx.source)?;

    check_sequence(&source_account, &tx.source)?;
    verify_signature(&source_account, &tx.sign_bytes(chain_id), &tx.source)?;
    sanity_check_for_fee(&tx.fee)?;

    if !source_account.balance.is_gte(&tx.fee) {
        return Err(TxError::InsufficientFunds)
    }

    let pool = source_account
        .reserved_fund(tx.reserve_sequence)
        .ok_or_else(|| {
            TxError::from(
                crate::types::ReservedFundError::NoMatchingReserve(
                    tx.reserve_sequence,
                ),
            )
        })?;
    // leave room for in-flight payments against the expired pool
    if view.height() < pool.end_block_height + RESERVED_FUND_FREEZE_PERIOD {
        return Err(TxError::InvalidTx(
            "reserved fund not yet releasable".into(),
        ))
    }

    Ok(())
}

pub(crate) fn process_release(
    chain_id: &str, view: &mut StoreView, tx: &ReleaseFundTx,
) -> Result<Hash, TxError> {
    let mut source_account = get_input(view, &tx.source)?;

    if !charge_fee(&mut source_account, &tx.fee) {
        return Err(TxError::InsufficientFunds)
    }
    source_account.release_fund(tx.reserve_sequence)?;
    source_account.sequence += 1;
    view.set_account(&tx.source.address, &source_account);

    Ok(tx_id(chain_id, &Tx::ReleaseFund(tx.clone())))
}
