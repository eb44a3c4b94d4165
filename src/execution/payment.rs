//! The service payment settlement: a two-signature drawdown against a
//! reserved fund, with revenue sharing via split rules and double-spend
//! slashing.

use crate::common::{Addr, Hash};
use crate::execution::{
    charge_fee, check_sequence, get_input, get_or_make_input,
    sanity_check_for_fee, validate_input_basic, verify_signature, TxError,
};
use crate::state::StoreView;
use crate::types::{tx_id, Account, Coins, ServicePaymentTx, SplitRule, Tx};

pub(crate) fn sanity_check(
    chain_id: &str, view: &StoreView, tx: &ServicePaymentTx,
) -> Result<(), TxError> {
    validate_input_basic(&tx.source)?;
    validate_input_basic(&tx.target)?;

    let source_account = get_input(view, &tx.source)?;
    // the target signed and broadcasted this transaction
    let target_account = get_or_make_input(view, &tx.target)?;

    if !tx.source.coins.theta_wei.is_zero() {
        return Err(TxError::InvalidInput(
            "cannot send ThetaWei as service payment".into(),
        ))
    }

    let source_sign_bytes = tx.source_sign_bytes(chain_id);
    verify_signature(&source_account, &source_sign_bytes, &tx.source)?;

    // replay guard on the broadcaster
    check_sequence(&target_account, &tx.target)?;

    let target_sign_bytes = tx.target_sign_bytes(chain_id);
    verify_signature(&target_account, &target_sign_bytes, &tx.target)?;

    sanity_check_for_fee(&tx.fee)?;

    // No need to prove the source can cover the transfer here: a drawdown
    // that conflicts with an earlier payment sequence passes this check on
    // purpose, so that process() can put the slash evidence on chain.
    source_account.check_transfer_reserved_fund(
        &tx.target.address,
        &tx.source.coins,
        &tx.resource_id,
        tx.payment_sequence,
        view.height(),
        tx.reserve_sequence,
    )?;

    Ok(())
}

pub(crate) fn process(
    chain_id: &str, view: &mut StoreView, tx: &ServicePaymentTx,
) -> Result<Hash, TxError> {
    // the split engine may already have deleted an expired rule by the time
    // a later step fails, so stage everything behind a snapshot
    let snapshot = view.snapshot();
    match process_impl(chain_id, view, tx) {
        Ok(hash) => Ok(hash),
        Err(err) => {
            view.revert_to_snapshot(&snapshot);
            Err(err)
        }
    }
}

fn process_impl(
    chain_id: &str, view: &mut StoreView, tx: &ServicePaymentTx,
) -> Result<Hash, TxError> {
    let source_address = tx.source.address.clone();
    let target_address = tx.target.address.clone();

    let mut source_account = get_input(view, &tx.source)?;
    let mut target_account = get_or_make_input(view, &tx.target)?;

    let split_rule = view.get_split_rule(&tx.resource_id);
    let full_amount = tx.source.coins.clone();
    let coins_map = split_payment(
        view,
        split_rule,
        &tx.resource_id,
        &target_address,
        &full_amount,
    )?;

    let (should_slash, slash_intent) = source_account.transfer_reserved_fund(
        &source_address,
        &full_amount,
        tx.reserve_sequence,
        tx,
    );

    // The target broadcasts and pays the fee, judged on its own balance
    // before any credit from this very payment lands.
    if !charge_fee(&mut target_account, &tx.fee) {
        return Err(TxError::InsufficientFunds)
    }
    target_account.sequence += 1;

    if let Some(slash_intent) = slash_intent {
        view.add_slash_intent(slash_intent);
    }

    // A slashed drawdown forfeits the pool out-of-band; nothing is
    // distributed. Otherwise credit every recipient, in the deterministic
    // order the split engine produced.
    let mut credited: Vec<(Addr, Account)> = Vec::new();
    if !should_slash {
        for (addr, coins) in coins_map.iter() {
            if addr == &target_address {
                target_account.balance = target_account
                    .balance
                    .checked_add(coins)
                    .expect("balance overflow");
            } else if let Some((_, account)) =
                credited.iter_mut().find(|(a, _)| a == addr)
            {
                // a split address may appear more than once in a rule
                account.balance = account
                    .balance
                    .checked_add(coins)
                    .expect("balance overflow");
            } else {
                let mut account = view.get_or_create_account(addr);
                account.balance = account
                    .balance
                    .checked_add(coins)
                    .expect("balance overflow");
                credited.push((addr.clone(), account));
            }
        }
    }

    view.set_account(&source_address, &source_account);
    for (addr, account) in credited.iter() {
        view.set_account(addr, account);
    }
    view.set_account(&target_address, &target_account);

    Ok(tx_id(chain_id, &Tx::ServicePayment(tx.clone())))
}

/// Distribute `full_amount` according to the rule (if any), returning the
/// payout list in consensus order: split entries as declared, target last.
/// An expired rule sends everything to the target and is deleted on the spot.
fn split_payment(
    view: &mut StoreView, split_rule: Option<SplitRule>, resource_id: &str,
    target_address: &Addr, full_amount: &Coins,
) -> Result<Vec<(Addr, Coins)>, TxError> {
    let mut coins_map = Vec::new();

    let rule = match split_rule {
        Some(rule) => rule,
        // no split rule for the resource, full payment goes to the target
        None => {
            coins_map.push((target_address.clone(), full_amount.clone()));
            return Ok(coins_map)
        }
    };

    if rule.end_block_height < view.height() {
        view.delete_split_rule(resource_id);
        coins_map.push((target_address.clone(), full_amount.clone()));
        return Ok(coins_map)
    }

    // Malformed entries must never block a settlement, they just get no
    // share. `remaining` going negative means the rule over-allocates, which
    // fails the settlement as a whole.
    let mut remaining = Some(full_amount.clone());
    for split in rule.splits.iter() {
        if split.percentage > 100 || split.percentage == 0 {
            continue
        }
        let split_amount = full_amount.percentage(split.percentage);
        remaining = remaining.and_then(|r| r.checked_sub(&split_amount));
        coins_map.push((split.address.clone(), split_amount));
    }

    match remaining {
        Some(remaining) => {
            coins_map.push((target_address.clone(), remaining));
            Ok(coins_map)
        }
        None => Err(TxError::SplitFailure),
    }
}
