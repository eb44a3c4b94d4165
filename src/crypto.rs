//! secp256k1 keys and signatures. Addresses are the trailing 20 bytes of the
//! Keccak-256 of the uncompressed public key body, and all signatures are made
//! over the Keccak-256 of the message bytes.

use serde::{Serialize, Serializer};
use sha3::Digest;

use std::fmt;

use crate::common::{Addr, Bytes, BytesRef, Hash};

#[derive(Clone)]
pub struct PrivateKey(libsecp256k1::SecretKey);

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct PublicKey(libsecp256k1::PublicKey);

/// A 65-byte `r ‖ s ‖ v` signature. The empty value stands for "unsigned" in
/// transaction inputs and sign-bytes construction.
#[derive(Clone, PartialEq, Eq, Default, Debug)]
pub struct Signature(Bytes);

impl PrivateKey {
    pub fn from_slice(s: &[u8]) -> Option<Self> {
        if s.len() != 32 {
            return None
        }
        let mut raw = [0u8; 32];
        raw.copy_from_slice(s);
        Some(Self(libsecp256k1::SecretKey::parse(&raw).ok()?))
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey(libsecp256k1::PublicKey::from_secret_key(&self.0))
    }

    pub fn sign(&self, msg: &[u8]) -> Signature {
        let digest = Hash::hash(msg).to_fixed_bytes();
        let msg = libsecp256k1::Message::parse(&digest);
        let (sig, rec_id) = libsecp256k1::sign(&msg, &self.0);
        let mut raw = [0u8; 65];
        raw[..64].copy_from_slice(&sig.serialize());
        raw[64] = rec_id.serialize();
        Signature(raw[..].into())
    }
}

impl PublicKey {
    /// Parse a 65-byte uncompressed key (leading `0x04`).
    pub fn from_slice(s: &[u8]) -> Option<Self> {
        if s.len() != 65 {
            return None
        }
        let mut raw = [0u8; 65];
        raw.copy_from_slice(s);
        Some(Self(libsecp256k1::PublicKey::parse(&raw).ok()?))
    }

    pub fn to_bytes(&self) -> [u8; 65] {
        self.0.serialize()
    }

    pub fn address(&self) -> Addr {
        let raw = self.to_bytes();
        Addr::from_slice(&sha3::Keccak256::digest(&raw[1..]).as_slice()[12..])
    }

    pub fn verify(&self, msg: &[u8], signature: &Signature) -> bool {
        let raw = &signature.0;
        if raw.len() != 65 {
            return false
        }
        let mut sig = [0u8; 64];
        sig.copy_from_slice(&raw[..64]);
        let sig = match libsecp256k1::Signature::parse_standard(&sig) {
            Ok(sig) => sig,
            Err(_) => return false,
        };
        let digest = Hash::hash(msg).to_fixed_bytes();
        libsecp256k1::verify(
            &libsecp256k1::Message::parse(&digest),
            &sig,
            &self.0,
        )
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", BytesRef(&self.to_bytes()))
    }
}

impl Serialize for PublicKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        BytesRef::serialize(&BytesRef(&self.to_bytes()), serializer)
    }
}

impl rlp::Encodable for PublicKey {
    fn rlp_append(&self, s: &mut rlp::RlpStream) {
        s.encoder().encode_value(&self.to_bytes())
    }
}

impl Signature {
    pub fn empty() -> Self {
        Self(Bytes::empty())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn from_slice(s: &[u8]) -> Self {
        Self(s.into())
    }
}

impl Serialize for Signature {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        Bytes::serialize(&self.0, serializer)
    }
}

impl rlp::Encodable for Signature {
    fn rlp_append(&self, s: &mut rlp::RlpStream) {
        s.encoder().encode_value(&self.0)
    }
}

impl rlp::Decodable for Signature {
    fn decode(rlp: &rlp::Rlp) -> Result<Self, rlp::DecoderError> {
        Ok(Self(rlp.as_val()?))
    }
}

/// Optional public keys encode as a possibly-empty byte string: absent keys
/// become empty strings, never missing fields, so record layouts stay fixed.
pub fn append_opt_pub_key(s: &mut rlp::RlpStream, key: &Option<PublicKey>) {
    match key {
        Some(key) => s.append(&Bytes::from(&key.to_bytes()[..])),
        None => s.append(&Bytes::empty()),
    };
}

pub fn decode_opt_pub_key(
    rlp: &rlp::Rlp,
) -> Result<Option<PublicKey>, rlp::DecoderError> {
    let bytes: Bytes = rlp.as_val()?;
    if bytes.is_empty() {
        return Ok(None)
    }
    PublicKey::from_slice(&bytes)
        .map(Some)
        .ok_or(rlp::DecoderError::Custom("malformed public key"))
}
