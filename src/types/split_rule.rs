use rlp_derive::{RlpDecodable, RlpEncodable};
use serde::Serialize;

use std::fmt;

use crate::common::{append_str, decode_str, Addr};

/// One participant of a payment split: the address and the integer percentage
/// (0..=100) of each payment it should receive.
#[derive(
    Clone, PartialEq, Eq, Debug, Serialize, RlpEncodable, RlpDecodable,
)]
pub struct Split {
    pub address: Addr,
    pub percentage: u8,
}

/// The payment split agreement for one resource. At most one rule exists per
/// resource id at any time; after `end_block_height` the rule is dead weight
/// and gets swept.
#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
pub struct SplitRule {
    pub initiator_address: Addr,
    pub resource_id: String,
    pub splits: Vec<Split>,
    pub end_block_height: u64,
}

impl rlp::Encodable for SplitRule {
    fn rlp_append(&self, s: &mut rlp::RlpStream) {
        s.begin_list(4);
        s.append(&self.initiator_address);
        append_str(s, &self.resource_id);
        s.append_list(&self.splits);
        s.append(&self.end_block_height);
    }
}

impl rlp::Decodable for SplitRule {
    fn decode(rlp: &rlp::Rlp) -> Result<Self, rlp::DecoderError> {
        Ok(Self {
            initiator_address: rlp.val_at(0)?,
            resource_id: decode_str(&rlp.at(1)?)?,
            splits: rlp.list_at(2)?,
            end_block_height: rlp.val_at(3)?,
        })
    }
}

impl fmt::Display for SplitRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SplitRule{{{} {} {:?} {}}}",
            self.initiator_address,
            self.resource_id,
            self.splits,
            self.end_block_height
        )
    }
}
