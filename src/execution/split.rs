//! Administration of split rules: a signed SplitRuleTx creates the rule for
//! a resource, or updates it when the initiator matches.

use crate::common::Hash;
use crate::execution::{
    charge_fee, check_sequence, get_input, sanity_check_for_fee,
    validate_input_basic, verify_signature, TxError,
};
use crate::state::StoreView;
use crate::types::{tx_id, SplitRule, SplitRuleTx, Tx};

pub(crate) fn sanity_check(
    chain_id: &str, view: &StoreView, tx: &SplitRuleTx,
) -> Result<(), TxError> {
    validate_input_basic(&tx.initiator)?;
    let initiator_account = get_input(view, &tx.initiator)?;

    check_sequence(&initiator_account, &tx.initiator)?;
    verify_signature(
        &initiator_account,
        &tx.sign_bytes(chain_id),
        &tx.initiator,
    )?;
    sanity_check_for_fee(&tx.fee)?;

    if !initiator_account.balance.is_gte(&tx.fee) {
        return Err(TxError::InsufficientFunds)
    }

    // a settlement would skip malformed entries and catch over-allocation,
    // but an administrative rule has no excuse to carry either
    let mut total: u64 = 0;
    for split in tx.splits.iter() {
        if split.percentage > 100 {
            return Err(TxError::InvalidTx(format!(
                "split percentage {} out of range",
                split.percentage
            )))
        }
        total += split.percentage as u64;
    }
    if total > 100 {
        return Err(TxError::InvalidTx(
            "split percentages exceed 100".into(),
        ))
    }

    Ok(())
}

pub(crate) fn process(
    chain_id: &str, view: &mut StoreView, tx: &SplitRuleTx,
) -> Result<Hash, TxError> {
    let mut initiator_account = get_input(view, &tx.initiator)?;

    let existing = view.get_split_rule(&tx.resource_id);
    if let Some(existing) = &existing {
        if existing.initiator_address != tx.initiator.address {
            return Err(TxError::InvalidTx(
                "split rule can only be updated by its initiator".into(),
            ))
        }
    }
    if !charge_fee(&mut initiator_account, &tx.fee) {
        return Err(TxError::InsufficientFunds)
    }
    initiator_account.sequence += 1;

    let rule = SplitRule {
        initiator_address: tx.initiator.address.clone(),
        resource_id: tx.resource_id.clone(),
        splits: tx.splits.clone(),
        end_block_height: view.height() + tx.duration,
    };
    if existing.is_some() {
        view.update_split_rule(&rule);
    } else {
        view.add_split_rule(&rule);
    }
    view.set_account(&tx.initiator.address, &initiator_account);

    Ok(tx_id(chain_id, &Tx::SplitRule(tx.clone())))
}
