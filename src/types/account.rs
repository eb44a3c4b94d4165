//! The account record and the reserved-fund protocol behind service
//! payments: escrow creation, metered drawdowns with an audit log of
//! transfer records, double-spend detection and slash evidence.

use rlp_derive::{RlpDecodable, RlpEncodable};
use serde::Serialize;

use crate::common::{append_str, decode_str, Addr, Bytes, Hash};
use crate::crypto::{append_opt_pub_key, decode_opt_pub_key, PublicKey};
use crate::types::{Coins, ServicePaymentTx};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReservedFundError {
    #[error("no reserved fund matches reserve sequence {0}")]
    NoMatchingReserve(u64),
    #[error("reserved fund expired at block height {0}")]
    ReserveExpired(u64),
    #[error("resource {0} is not covered by the reserved fund")]
    ResourceNotCovered(String),
    #[error("insufficient reserved fund")]
    InsufficientFund,
    #[error("insufficient balance")]
    InsufficientBalance,
}

/// Evidence of one prior drawdown against a pool. Reuse of the payment
/// sequence with a different target or amount is the double-spend signal.
#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
pub struct TransferRecord {
    pub service_payment: ServicePaymentTx,
    pub transfer_amount: Coins,
}

impl rlp::Encodable for TransferRecord {
    fn rlp_append(&self, s: &mut rlp::RlpStream) {
        s.begin_list(2);
        s.append(&self.service_payment);
        s.append(&self.transfer_amount);
    }
}

impl rlp::Decodable for TransferRecord {
    fn decode(rlp: &rlp::Rlp) -> Result<Self, rlp::DecoderError> {
        Ok(Self {
            service_payment: rlp.val_at(0)?,
            transfer_amount: rlp.val_at(1)?,
        })
    }
}

/// Staged evidence of reserved-fund misbehavior, consumed by consensus at
/// block finalization.
#[derive(
    Clone, PartialEq, Eq, Debug, Serialize, RlpEncodable, RlpDecodable,
)]
pub struct SlashIntent {
    pub address: Addr,
    pub reserve_sequence: u64,
    pub proof: Bytes,
}

/// An off-chain payment channel: `fund` is the escrow service payments draw
/// from, `collateral` backs the slashing penalty, and `transfer_records` is
/// the drawdown audit log.
#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
pub struct ReservedFund {
    pub collateral: Coins,
    pub fund: Coins,
    pub resource_ids: Vec<String>,
    pub end_block_height: u64,
    pub reserve_sequence: u64,
    pub transfer_records: Vec<TransferRecord>,
}

impl ReservedFund {
    pub fn has_resource_id(&self, resource_id: &str) -> bool {
        self.resource_ids.iter().any(|id| id == resource_id)
    }

    fn record_for_payment_sequence(
        &self, payment_sequence: u64,
    ) -> Option<&TransferRecord> {
        self.transfer_records
            .iter()
            .find(|r| r.service_payment.payment_sequence == payment_sequence)
    }

    /// A prior record with the same payment sequence but a different target
    /// or amount, i.e. a double-spend of the drawdown slot.
    fn conflicting_record(
        &self, payment_sequence: u64, target_address: &Addr, amount: &Coins,
    ) -> Option<&TransferRecord> {
        let record = self.record_for_payment_sequence(payment_sequence)?;
        if &record.service_payment.target.address != target_address ||
            &record.transfer_amount != amount
        {
            return Some(record)
        }
        None
    }

    fn record_transfer(&mut self, tx: &ServicePaymentTx, amount: Coins) {
        self.transfer_records.push(TransferRecord {
            service_payment: tx.clone(),
            transfer_amount: amount,
        });
    }
}

impl rlp::Encodable for ReservedFund {
    fn rlp_append(&self, s: &mut rlp::RlpStream) {
        s.begin_list(6);
        s.append(&self.collateral);
        s.append(&self.fund);
        s.begin_list(self.resource_ids.len());
        for id in self.resource_ids.iter() {
            append_str(s, id);
        }
        s.append(&self.end_block_height);
        s.append(&self.reserve_sequence);
        s.append_list(&self.transfer_records);
    }
}

impl rlp::Decodable for ReservedFund {
    fn decode(rlp: &rlp::Rlp) -> Result<Self, rlp::DecoderError> {
        let ids = rlp.at(2)?;
        let mut resource_ids = Vec::new();
        for id in ids.iter() {
            resource_ids.push(decode_str(&id)?);
        }
        Ok(Self {
            collateral: rlp.val_at(0)?,
            fund: rlp.val_at(1)?,
            resource_ids,
            end_block_height: rlp.val_at(3)?,
            reserve_sequence: rlp.val_at(4)?,
            transfer_records: rlp.list_at(5)?,
        })
    }
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
pub struct Account {
    pub sequence: u64,
    pub balance: Coins,
    pub pub_key: Option<PublicKey>,
    pub reserved_funds: Vec<ReservedFund>,
    pub code_hash: Hash,
    pub root: Hash,
}

impl Default for Account {
    fn default() -> Self {
        Self::new()
    }
}

impl Account {
    pub fn new() -> Self {
        Self {
            sequence: 0,
            balance: Coins::zero(),
            pub_key: None,
            reserved_funds: Vec::new(),
            code_hash: Hash::empty_bytes_hash().clone(),
            root: Hash::zero().clone(),
        }
    }

    /// Empty per EIP-161: zero nonce, no code, zero balance.
    pub fn is_empty(&self) -> bool {
        self.sequence == 0 &&
            &self.code_hash == Hash::empty_bytes_hash() &&
            self.balance.is_zero()
    }

    pub fn reserved_fund(
        &self, reserve_sequence: u64,
    ) -> Option<&ReservedFund> {
        self.reserved_funds
            .iter()
            .find(|p| p.reserve_sequence == reserve_sequence)
    }

    /// Lock `collateral + fund` out of the balance into a new pool.
    pub fn reserve_fund(
        &mut self, collateral: Coins, fund: Coins, resource_ids: Vec<String>,
        end_block_height: u64, reserve_sequence: u64,
    ) -> Result<(), ReservedFundError> {
        let locked = collateral
            .checked_add(&fund)
            .ok_or(ReservedFundError::InsufficientBalance)?;
        self.balance = self
            .balance
            .checked_sub(&locked)
            .ok_or(ReservedFundError::InsufficientBalance)?;
        self.reserved_funds.push(ReservedFund {
            collateral,
            fund,
            resource_ids,
            end_block_height,
            reserve_sequence,
            transfer_records: Vec::new(),
        });
        Ok(())
    }

    /// Return an expired pool's remaining value (collateral plus what
    /// payments did not drain) to the balance and drop the pool.
    pub fn release_fund(
        &mut self, reserve_sequence: u64,
    ) -> Result<Coins, ReservedFundError> {
        let idx = self
            .reserved_funds
            .iter()
            .position(|p| p.reserve_sequence == reserve_sequence)
            .ok_or(ReservedFundError::NoMatchingReserve(reserve_sequence))?;
        let pool = self.reserved_funds.remove(idx);
        let released = pool
            .collateral
            .checked_add(&pool.fund)
            .expect("pool value overflow");
        self.balance = self
            .balance
            .checked_add(&released)
            .expect("balance overflow");
        Ok(released)
    }

    /// The pure admission check for a service payment drawdown. A detected
    /// double-spend deliberately PASSES: it is a slash trigger for the
    /// process path, not an admission error, so the evidence can reach the
    /// chain.
    pub fn check_transfer_reserved_fund(
        &self, target_address: &Addr, transfer_amount: &Coins,
        resource_id: &str, payment_sequence: u64, current_block_height: u64,
        reserve_sequence: u64,
    ) -> Result<(), ReservedFundError> {
        let pool = self
            .reserved_fund(reserve_sequence)
            .ok_or(ReservedFundError::NoMatchingReserve(reserve_sequence))?;
        if pool.end_block_height < current_block_height {
            return Err(ReservedFundError::ReserveExpired(
                pool.end_block_height,
            ))
        }
        if !pool.has_resource_id(resource_id) {
            return Err(ReservedFundError::ResourceNotCovered(
                resource_id.to_string(),
            ))
        }
        if pool
            .conflicting_record(
                payment_sequence,
                target_address,
                transfer_amount,
            )
            .is_some()
        {
            return Ok(())
        }
        if pool.fund.checked_sub(transfer_amount).is_none() {
            return Err(ReservedFundError::InsufficientFund)
        }
        Ok(())
    }

    /// The destructive counterpart: drains the pool and appends the audit
    /// record, or, on a conflicting payment sequence or an overdraft, leaves
    /// the pool untouched and returns the slash intent to stage.
    pub fn transfer_reserved_fund(
        &mut self, source_address: &Addr, total_amount: &Coins,
        reserve_sequence: u64, tx: &ServicePaymentTx,
    ) -> (bool, Option<SlashIntent>) {
        let pool = match self
            .reserved_funds
            .iter_mut()
            .find(|p| p.reserve_sequence == reserve_sequence)
        {
            Some(pool) => pool,
            None => return (false, None),
        };
        if let Some(record) = pool.conflicting_record(
            tx.payment_sequence,
            &tx.target.address,
            total_amount,
        ) {
            let intent = slash_intent(
                source_address,
                reserve_sequence,
                &record.service_payment,
                tx,
            );
            return (true, Some(intent))
        }
        match pool.fund.checked_sub(total_amount) {
            Some(remaining) => {
                pool.fund = remaining;
                pool.record_transfer(tx, total_amount.clone());
                (false, None)
            }
            // overdrafting the escrow is also a slashable offense; the
            // "prior" evidence is the overdrawn payment itself
            None => {
                let intent =
                    slash_intent(source_address, reserve_sequence, tx, tx);
                (true, Some(intent))
            }
        }
    }
}

fn slash_intent(
    address: &Addr, reserve_sequence: u64, prior: &ServicePaymentTx,
    current: &ServicePaymentTx,
) -> SlashIntent {
    let mut proof = rlp::RlpStream::new_list(2);
    proof.append(prior);
    proof.append(current);
    SlashIntent {
        address: address.clone(),
        reserve_sequence,
        proof: proof.out().to_vec().into(),
    }
}

impl rlp::Encodable for Account {
    fn rlp_append(&self, s: &mut rlp::RlpStream) {
        s.begin_list(6);
        s.append(&self.sequence);
        s.append(&self.balance);
        append_opt_pub_key(s, &self.pub_key);
        s.append_list(&self.reserved_funds);
        s.append(&self.code_hash);
        s.append(&self.root);
    }
}

impl rlp::Decodable for Account {
    fn decode(rlp: &rlp::Rlp) -> Result<Self, rlp::DecoderError> {
        Ok(Self {
            sequence: rlp.val_at(0)?,
            balance: rlp.val_at(1)?,
            pub_key: decode_opt_pub_key(&rlp.at(2)?)?,
            reserved_funds: rlp.list_at(3)?,
            code_hash: rlp.val_at(4)?,
            root: rlp.val_at(5)?,
        })
    }
}
