//! Transaction variants and their canonical encodings. The wire form of a
//! transaction is a one-byte variant tag followed by the RLP body; every hash
//! and signature domain is derived from that encoding prefixed with the RLP
//! of the chain id, so two chains never share valid signatures.

use rlp_derive::{RlpDecodable, RlpEncodable};
use serde::Serialize;

use crate::common::{append_str, decode_str, Addr, Bytes, Hash};
use crate::crypto::{
    append_opt_pub_key, decode_opt_pub_key, PublicKey, Signature,
};
use crate::types::{Coins, Split};

#[derive(Clone, PartialEq, Eq, Default, Debug, Serialize)]
pub struct TxInput {
    pub address: Addr,
    pub coins: Coins,
    pub sequence: u64,
    pub pub_key: Option<PublicKey>,
    pub signature: Signature,
}

#[derive(
    Clone, PartialEq, Eq, Default, Debug, Serialize, RlpEncodable, RlpDecodable,
)]
pub struct TxOutput {
    pub address: Addr,
    pub coins: Coins,
}

impl rlp::Encodable for TxInput {
    fn rlp_append(&self, s: &mut rlp::RlpStream) {
        s.begin_list(5);
        s.append(&self.address);
        s.append(&self.coins);
        s.append(&self.sequence);
        append_opt_pub_key(s, &self.pub_key);
        s.append(&self.signature);
    }
}

impl rlp::Decodable for TxInput {
    fn decode(rlp: &rlp::Rlp) -> Result<Self, rlp::DecoderError> {
        Ok(Self {
            address: rlp.val_at(0)?,
            coins: rlp.val_at(1)?,
            sequence: rlp.val_at(2)?,
            pub_key: decode_opt_pub_key(&rlp.at(3)?)?,
            signature: rlp.val_at(4)?,
        })
    }
}

// Coinbase

/// Block reward distribution, signed by the block proposer. Carries no fee;
/// the per-block replay guard is the view's coinbase flag rather than a
/// sequence number.
#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
pub struct CoinbaseTx {
    pub proposer: TxInput,
    pub outputs: Vec<TxOutput>,
    pub block_height: u64,
}

impl CoinbaseTx {
    pub fn sign_bytes(&self, chain_id: &str) -> Vec<u8> {
        let mut tx = self.clone();
        tx.proposer.signature = Signature::empty();
        sign_bytes(chain_id, &Tx::Coinbase(tx))
    }
}

impl rlp::Encodable for CoinbaseTx {
    fn rlp_append(&self, s: &mut rlp::RlpStream) {
        s.begin_list(3);
        s.append(&self.proposer);
        s.append_list(&self.outputs);
        s.append(&self.block_height);
    }
}

impl rlp::Decodable for CoinbaseTx {
    fn decode(rlp: &rlp::Rlp) -> Result<Self, rlp::DecoderError> {
        Ok(Self {
            proposer: rlp.val_at(0)?,
            outputs: rlp.list_at(1)?,
            block_height: rlp.val_at(2)?,
        })
    }
}

// Send

/// Plain value transfer. The fee is the gap between the input and output
/// totals, so it is burned out of the inputs rather than charged separately.
#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
pub struct SendTx {
    pub fee: Coins,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
}

impl SendTx {
    pub fn sign_bytes(&self, chain_id: &str) -> Vec<u8> {
        let mut tx = self.clone();
        for input in tx.inputs.iter_mut() {
            input.signature = Signature::empty();
        }
        sign_bytes(chain_id, &Tx::Send(tx))
    }
}

impl rlp::Encodable for SendTx {
    fn rlp_append(&self, s: &mut rlp::RlpStream) {
        s.begin_list(3);
        s.append(&self.fee);
        s.append_list(&self.inputs);
        s.append_list(&self.outputs);
    }
}

impl rlp::Decodable for SendTx {
    fn decode(rlp: &rlp::Rlp) -> Result<Self, rlp::DecoderError> {
        Ok(Self {
            fee: rlp.val_at(0)?,
            inputs: rlp.list_at(1)?,
            outputs: rlp.list_at(2)?,
        })
    }
}

// ReserveFund

/// Escrow creation: locks `source.coins` as the spendable fund and
/// `collateral` as the slashing backstop, for `duration` blocks, covering the
/// listed resources.
#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
pub struct ReserveFundTx {
    pub fee: Coins,
    pub source: TxInput,
    pub collateral: Coins,
    pub resource_ids: Vec<String>,
    pub duration: u64,
}

impl ReserveFundTx {
    pub fn sign_bytes(&self, chain_id: &str) -> Vec<u8> {
        let mut tx = self.clone();
        tx.source.signature = Signature::empty();
        sign_bytes(chain_id, &Tx::ReserveFund(tx))
    }
}

impl rlp::Encodable for ReserveFundTx {
    fn rlp_append(&self, s: &mut rlp::RlpStream) {
        s.begin_list(5);
        s.append(&self.fee);
        s.append(&self.source);
        s.append(&self.collateral);
        s.begin_list(self.resource_ids.len());
        for id in self.resource_ids.iter() {
            append_str(s, id);
        }
        s.append(&self.duration);
    }
}

impl rlp::Decodable for ReserveFundTx {
    fn decode(rlp: &rlp::Rlp) -> Result<Self, rlp::DecoderError> {
        let ids = rlp.at(3)?;
        let mut resource_ids = Vec::new();
        for id in ids.iter() {
            resource_ids.push(decode_str(&id)?);
        }
        Ok(Self {
            fee: rlp.val_at(0)?,
            source: rlp.val_at(1)?,
            collateral: rlp.val_at(2)?,
            resource_ids,
            duration: rlp.val_at(4)?,
        })
    }
}

// ReleaseFund

#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
pub struct ReleaseFundTx {
    pub fee: Coins,
    pub source: TxInput,
    pub reserve_sequence: u64,
}

impl ReleaseFundTx {
    pub fn sign_bytes(&self, chain_id: &str) -> Vec<u8> {
        let mut tx = self.clone();
        tx.source.signature = Signature::empty();
        sign_bytes(chain_id, &Tx::ReleaseFund(tx))
    }
}

impl rlp::Encodable for ReleaseFundTx {
    fn rlp_append(&self, s: &mut rlp::RlpStream) {
        s.begin_list(3);
        s.append(&self.fee);
        s.append(&self.source);
        s.append(&self.reserve_sequence);
    }
}

impl rlp::Decodable for ReleaseFundTx {
    fn decode(rlp: &rlp::Rlp) -> Result<Self, rlp::DecoderError> {
        Ok(Self {
            fee: rlp.val_at(0)?,
            source: rlp.val_at(1)?,
            reserve_sequence: rlp.val_at(2)?,
        })
    }
}

// ServicePayment

/// Off-chain payment channel settlement. The source authorizes the transfer
/// amount off-chain; the target countersigns and broadcasts, pays the fee,
/// and is the only party whose on-chain sequence advances.
#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
pub struct ServicePaymentTx {
    pub fee: Coins,
    pub source: TxInput,
    pub target: TxInput,
    pub payment_sequence: u64,
    pub reserve_sequence: u64,
    pub resource_id: String,
}

impl ServicePaymentTx {
    /// What the source signs: only the addresses, the transfer amount and the
    /// channel coordinates. Fee, sequences and the other party's key are the
    /// broadcaster's business and are excluded so the off-chain authorization
    /// does not need to anticipate them.
    pub fn source_sign_bytes(&self, chain_id: &str) -> Vec<u8> {
        let tx = ServicePaymentTx {
            fee: Coins::zero(),
            source: TxInput {
                address: self.source.address.clone(),
                coins: self.source.coins.clone(),
                ..Default::default()
            },
            target: TxInput {
                address: self.target.address.clone(),
                ..Default::default()
            },
            payment_sequence: self.payment_sequence,
            reserve_sequence: self.reserve_sequence,
            resource_id: self.resource_id.clone(),
        };
        sign_bytes(chain_id, &Tx::ServicePayment(tx))
    }

    /// What the target signs: the whole transaction (source signature, fee
    /// and target sequence included) minus its own signature, binding the
    /// broadcaster to exactly this submission.
    pub fn target_sign_bytes(&self, chain_id: &str) -> Vec<u8> {
        let mut tx = self.clone();
        tx.target.signature = Signature::empty();
        sign_bytes(chain_id, &Tx::ServicePayment(tx))
    }
}

impl rlp::Encodable for ServicePaymentTx {
    fn rlp_append(&self, s: &mut rlp::RlpStream) {
        s.begin_list(6);
        s.append(&self.fee);
        s.append(&self.source);
        s.append(&self.target);
        s.append(&self.payment_sequence);
        s.append(&self.reserve_sequence);
        append_str(s, &self.resource_id);
    }
}

impl rlp::Decodable for ServicePaymentTx {
    fn decode(rlp: &rlp::Rlp) -> Result<Self, rlp::DecoderError> {
        Ok(Self {
            fee: rlp.val_at(0)?,
            source: rlp.val_at(1)?,
            target: rlp.val_at(2)?,
            payment_sequence: rlp.val_at(3)?,
            reserve_sequence: rlp.val_at(4)?,
            resource_id: decode_str(&rlp.at(5)?)?,
        })
    }
}

// SplitRule administration

#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
pub struct SplitRuleTx {
    pub fee: Coins,
    pub initiator: TxInput,
    pub resource_id: String,
    pub splits: Vec<Split>,
    pub duration: u64,
}

impl SplitRuleTx {
    pub fn sign_bytes(&self, chain_id: &str) -> Vec<u8> {
        let mut tx = self.clone();
        tx.initiator.signature = Signature::empty();
        sign_bytes(chain_id, &Tx::SplitRule(tx))
    }
}

impl rlp::Encodable for SplitRuleTx {
    fn rlp_append(&self, s: &mut rlp::RlpStream) {
        s.begin_list(5);
        s.append(&self.fee);
        s.append(&self.initiator);
        append_str(s, &self.resource_id);
        s.append_list(&self.splits);
        s.append(&self.duration);
    }
}

impl rlp::Decodable for SplitRuleTx {
    fn decode(rlp: &rlp::Rlp) -> Result<Self, rlp::DecoderError> {
        Ok(Self {
            fee: rlp.val_at(0)?,
            initiator: rlp.val_at(1)?,
            resource_id: decode_str(&rlp.at(2)?)?,
            splits: rlp.list_at(3)?,
            duration: rlp.val_at(4)?,
        })
    }
}

// Tx

#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
pub enum Tx {
    Coinbase(CoinbaseTx),
    Send(SendTx),
    ReserveFund(ReserveFundTx),
    ReleaseFund(ReleaseFundTx),
    ServicePayment(ServicePaymentTx),
    SplitRule(SplitRuleTx),
}

impl Tx {
    const COINBASE: u8 = 0x1;
    const SEND: u8 = 0x2;
    const RESERVE_FUND: u8 = 0x3;
    const RELEASE_FUND: u8 = 0x4;
    const SERVICE_PAYMENT: u8 = 0x5;
    const SPLIT_RULE: u8 = 0x6;

    /// Canonical wire encoding: variant tag, then the RLP body.
    pub fn to_bytes(&self) -> Vec<u8> {
        let (tag, body) = match self {
            Tx::Coinbase(tx) => (Self::COINBASE, rlp::encode(tx)),
            Tx::Send(tx) => (Self::SEND, rlp::encode(tx)),
            Tx::ReserveFund(tx) => (Self::RESERVE_FUND, rlp::encode(tx)),
            Tx::ReleaseFund(tx) => (Self::RELEASE_FUND, rlp::encode(tx)),
            Tx::ServicePayment(tx) => (Self::SERVICE_PAYMENT, rlp::encode(tx)),
            Tx::SplitRule(tx) => (Self::SPLIT_RULE, rlp::encode(tx)),
        };
        let mut buff = vec![tag];
        buff.extend_from_slice(body.as_ref());
        buff
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Tx, rlp::DecoderError> {
        if bytes.is_empty() {
            return Err(rlp::DecoderError::RlpIsTooShort)
        }
        let rlp = rlp::Rlp::new(&bytes[1..]);
        Ok(match bytes[0] {
            Self::COINBASE => Tx::Coinbase(rlp.as_val()?),
            Self::SEND => Tx::Send(rlp.as_val()?),
            Self::RESERVE_FUND => Tx::ReserveFund(rlp.as_val()?),
            Self::RELEASE_FUND => Tx::ReleaseFund(rlp.as_val()?),
            Self::SERVICE_PAYMENT => Tx::ServicePayment(rlp.as_val()?),
            Self::SPLIT_RULE => Tx::SplitRule(rlp.as_val()?),
            _ => return Err(rlp::DecoderError::Custom("unknown tx tag")),
        })
    }

    pub fn fee(&self) -> Coins {
        match self {
            Tx::Coinbase(_) => Coins::zero(),
            Tx::Send(tx) => tx.fee.clone(),
            Tx::ReserveFund(tx) => tx.fee.clone(),
            Tx::ReleaseFund(tx) => tx.fee.clone(),
            Tx::ServicePayment(tx) => tx.fee.clone(),
            Tx::SplitRule(tx) => tx.fee.clone(),
        }
    }
}

/// Chain-scoped canonical bytes: RLP(chain id) ‖ wire encoding of `tx`.
pub fn sign_bytes(chain_id: &str, tx: &Tx) -> Vec<u8> {
    let mut buff = rlp::encode(&Bytes::from(chain_id.as_bytes())).to_vec();
    buff.extend_from_slice(&tx.to_bytes());
    buff
}

/// The transaction hash: Keccak of the chain-scoped canonical encoding of the
/// fully signed transaction.
pub fn tx_id(chain_id: &str, tx: &Tx) -> Hash {
    Hash::hash(&sign_bytes(chain_id, tx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::U256;
    use crate::crypto::PrivateKey;

    fn test_key(seed: &str) -> PrivateKey {
        PrivateKey::from_slice(Hash::hash(seed.as_bytes()).as_bytes()).unwrap()
    }

    fn sample_payment() -> ServicePaymentTx {
        let source = test_key("src");
        let target = test_key("tgt");
        let mut tx = ServicePaymentTx {
            fee: Coins::gamma(10u64),
            source: TxInput {
                address: source.public_key().address(),
                coins: Coins::gamma(200u64),
                sequence: 1,
                pub_key: Some(source.public_key()),
                signature: Signature::empty(),
            },
            target: TxInput {
                address: target.public_key().address(),
                coins: Coins::zero(),
                sequence: 1,
                pub_key: Some(target.public_key()),
                signature: Signature::empty(),
            },
            payment_sequence: 1,
            reserve_sequence: 1,
            resource_id: "rid001".to_string(),
        };
        tx.source.signature = source.sign(&tx.source_sign_bytes("chain"));
        tx.target.signature = target.sign(&tx.target_sign_bytes("chain"));
        tx
    }

    #[test]
    fn test_wire_round_trip() {
        let tx = Tx::ServicePayment(sample_payment());
        let decoded = Tx::from_bytes(&tx.to_bytes()).unwrap();
        assert_eq!(tx, decoded);

        let send = Tx::Send(SendTx {
            fee: Coins::gamma(10u64),
            inputs: vec![TxInput {
                address: U256::from(1).into(),
                coins: Coins::gamma(110u64),
                sequence: 3,
                pub_key: None,
                signature: Signature::from_slice(&[7u8; 65]),
            }],
            outputs: vec![TxOutput {
                address: U256::from(2).into(),
                coins: Coins::gamma(100u64),
            }],
        });
        assert_eq!(Tx::from_bytes(&send.to_bytes()).unwrap(), send);
    }

    #[test]
    fn test_sign_domains_are_asymmetric() {
        let tx = sample_payment();
        // the source domain ignores everything the broadcaster fills in later
        let mut late = tx.clone();
        late.fee = Coins::gamma(99u64);
        late.target.sequence = 7;
        assert_eq!(
            tx.source_sign_bytes("chain"),
            late.source_sign_bytes("chain")
        );
        // ...while the target domain binds all of it
        assert_ne!(
            tx.target_sign_bytes("chain"),
            late.target_sign_bytes("chain")
        );
        // and both domains are chain-scoped
        assert_ne!(
            tx.source_sign_bytes("chain"),
            tx.source_sign_bytes("other-chain")
        );
    }

    #[test]
    fn test_tx_id_depends_on_signatures() {
        let tx = sample_payment();
        let mut stripped = tx.clone();
        stripped.target.signature = Signature::empty();
        assert_ne!(
            tx_id("chain", &Tx::ServicePayment(tx)),
            tx_id("chain", &Tx::ServicePayment(stripped))
        );
    }
}
