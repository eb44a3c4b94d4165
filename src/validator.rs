use serde::Serialize;

use crate::common::Addr;
use crate::crypto::PublicKey;

/// The public information of a validator.
#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
pub struct Validator {
    pub_key: PublicKey,
    stake: u64,
}

impl Validator {
    pub fn new(pub_key: PublicKey, stake: u64) -> Self {
        Self { pub_key, stake }
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.pub_key
    }

    pub fn address(&self) -> Addr {
        self.pub_key.address()
    }

    pub fn stake(&self) -> u64 {
        self.stake
    }
}

/// A set of validators, kept sorted by address so iteration order is part of
/// no one's hash-map luck.
#[derive(Clone, Default, Debug)]
pub struct ValidatorSet {
    validators: Vec<Validator>,
}

impl ValidatorSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_validator(&mut self, validator: Validator) {
        self.validators.push(validator);
        self.validators.sort_by(|a, b| a.address().cmp(&b.address()));
    }

    pub fn get_validator(&self, id: &Addr) -> Option<&Validator> {
        self.validators.iter().find(|v| &v.address() == id)
    }

    pub fn contains(&self, id: &Addr) -> bool {
        self.get_validator(id).is_some()
    }

    pub fn size(&self) -> usize {
        self.validators.len()
    }

    pub fn total_stake(&self) -> u64 {
        self.validators.iter().map(|v| v.stake).sum()
    }

    pub fn validators(&self) -> &[Validator] {
        &self.validators
    }
}

/// What the executor needs from validator management: who proposes and who
/// may be rewarded at a given height.
pub trait ValidatorManager: Send + Sync {
    fn proposer(&self, height: u64) -> Validator;
    fn validator_set(&self, height: u64) -> ValidatorSet;
}
