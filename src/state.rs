//! The typed ledger view over the authenticated tree: accounts, split rules,
//! contract code and storage slots, plus the per-block staging buffers
//! (slash intents, validator diff) that consensus drains at finalization and
//! that never touch the Merkle store.

use log::error;

use std::sync::Arc;

use crate::common::{Addr, BytesRef, Hash, Wei};
use crate::store::{Database, StoreError, TreeStore};
use crate::types::{Account, SlashIntent, SplitRule};
use crate::validator::Validator;

const ACCOUNT_PREFIX: u8 = 0x01;
const CODE_PREFIX: u8 = 0x02;
const SPLIT_RULE_PREFIX: u8 = 0x03;

pub fn account_key(addr: &Addr) -> Vec<u8> {
    let mut key = vec![ACCOUNT_PREFIX];
    key.extend_from_slice(addr.as_bytes());
    key
}

pub fn code_key(code_hash: &Hash) -> Vec<u8> {
    let mut key = vec![CODE_PREFIX];
    key.extend_from_slice(code_hash.as_bytes());
    key
}

pub fn split_rule_key(resource_id: &str) -> Vec<u8> {
    let mut key = vec![SPLIT_RULE_PREFIX];
    key.extend_from_slice(resource_id.as_bytes());
    key
}

pub fn split_rule_key_prefix() -> Vec<u8> {
    vec![SPLIT_RULE_PREFIX]
}

pub struct StoreView {
    height: u64,
    store: TreeStore,

    coinbase_processed: bool,
    slash_intents: Vec<SlashIntent>,
    validators_diff: Vec<Validator>,
    refund: u64,
}

impl StoreView {
    /// Open a view of the state at `root` (`Hash::zero()` for a fresh chain).
    pub fn new(
        height: u64, root: &Hash, db: Arc<dyn Database>,
    ) -> Result<StoreView, StoreError> {
        Ok(StoreView {
            height,
            store: TreeStore::new(root, db)?,
            coinbase_processed: false,
            slash_intents: Vec::new(),
            validators_diff: Vec::new(),
            refund: 0,
        })
    }

    /// An independent working copy with fresh staging buffers.
    pub fn copy(&self) -> StoreView {
        StoreView {
            height: self.height,
            store: self.store.copy(),
            coinbase_processed: false,
            slash_intents: Vec::new(),
            validators_diff: Vec::new(),
            refund: 0,
        }
    }

    /// The Merkle root of the current logical contents.
    pub fn hash(&self) -> Hash {
        self.store.hash()
    }

    pub fn height(&self) -> u64 {
        self.height
    }

    pub fn increment_height(&mut self) {
        self.height += 1;
    }

    /// Persist the view into the backing store and return the state root.
    pub fn save(&mut self) -> Hash {
        self.store.commit()
    }

    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.store.get(key)
    }

    pub fn set(&mut self, key: &[u8], value: &[u8]) {
        self.store.set(key, value)
    }

    pub fn delete(&mut self, key: &[u8]) -> bool {
        self.store.delete(key)
    }

    // staging buffers

    pub fn add_slash_intent(&mut self, slash_intent: SlashIntent) {
        self.slash_intents.push(slash_intent);
    }

    pub fn get_slash_intents(&self) -> &[SlashIntent] {
        &self.slash_intents
    }

    pub fn clear_slash_intents(&mut self) {
        self.slash_intents.clear();
    }

    pub fn coinbase_processed(&self) -> bool {
        self.coinbase_processed
    }

    pub fn set_coinbase_processed(&mut self, processed: bool) {
        self.coinbase_processed = processed;
    }

    pub fn set_validator_diff(&mut self, diff: Vec<Validator>) {
        self.validators_diff = diff;
    }

    pub fn get_and_clear_validator_diff(&mut self) -> Vec<Validator> {
        std::mem::take(&mut self.validators_diff)
    }

    // accounts

    pub fn get_account(&self, addr: &Addr) -> Option<Account> {
        let data = self.get(&account_key(addr))?;
        if data.is_empty() {
            return None
        }
        match rlp::decode(&data) {
            Ok(acc) => Some(acc),
            Err(err) => panic!(
                "Error reading account {:x} error: {:?}",
                BytesRef(&data),
                err
            ),
        }
    }

    pub fn set_account(&mut self, addr: &Addr, acc: &Account) {
        let bytes = rlp::encode(acc);
        self.set(&account_key(addr), bytes.as_ref());
    }

    pub fn delete_account(&mut self, addr: &Addr) {
        self.delete(&account_key(addr));
    }

    /// A transient account for `addr`: the stored one, or a fresh empty one
    /// that is NOT persisted until a later `set_account`.
    pub fn get_or_create_account(&self, addr: &Addr) -> Account {
        self.get_account(addr).unwrap_or_default()
    }

    // split rules

    pub fn split_rule_exists(&self, resource_id: &str) -> bool {
        self.get_split_rule(resource_id).is_some()
    }

    /// Each resource id can have at most one split rule.
    pub fn add_split_rule(&mut self, split_rule: &SplitRule) -> bool {
        if self.split_rule_exists(&split_rule.resource_id) {
            return false
        }
        self.set_split_rule(split_rule);
        true
    }

    pub fn update_split_rule(&mut self, split_rule: &SplitRule) -> bool {
        if !self.split_rule_exists(&split_rule.resource_id) {
            return false
        }
        self.set_split_rule(split_rule);
        true
    }

    pub fn get_split_rule(&self, resource_id: &str) -> Option<SplitRule> {
        let data = self.get(&split_rule_key(resource_id))?;
        if data.is_empty() {
            return None
        }
        match rlp::decode(&data) {
            Ok(rule) => Some(rule),
            Err(err) => panic!(
                "Error reading split rule {:x} error: {:?}",
                BytesRef(&data),
                err
            ),
        }
    }

    pub fn set_split_rule(&mut self, split_rule: &SplitRule) {
        let bytes = rlp::encode(split_rule);
        self.set(&split_rule_key(&split_rule.resource_id), bytes.as_ref());
    }

    pub fn delete_split_rule(&mut self, resource_id: &str) -> bool {
        self.delete(&split_rule_key(resource_id))
    }

    /// Sweep every rule whose `end_block_height` is below `current_height`.
    pub fn delete_expired_split_rules(&mut self, current_height: u64) -> bool {
        let mut expired_keys = Vec::new();
        self.store.traverse(&split_rule_key_prefix(), |key, value| {
            let rule: SplitRule = match rlp::decode(value) {
                Ok(rule) => rule,
                Err(err) => panic!(
                    "Error reading split rule {:x} error: {:?}",
                    BytesRef(value),
                    err
                ),
            };
            if rule.end_block_height < current_height {
                expired_keys.push(key.to_vec());
            }
            true
        });
        for key in expired_keys.iter() {
            if !self.store.delete(key) {
                error!("Failed to delete expired split rules");
                return false
            }
        }
        true
    }

    // VM state interface

    pub fn create_account(&mut self, addr: &Addr) {
        self.set_account(addr, &Account::new());
    }

    pub fn get_balance(&self, addr: &Addr) -> Wei {
        self.get_or_create_account(addr).balance.gamma_wei
    }

    pub fn add_balance(&mut self, addr: &Addr, amount: &Wei) {
        if amount.is_zero() {
            return
        }
        let mut account = self.get_or_create_account(addr);
        account.balance.gamma_wei = account
            .balance
            .gamma_wei
            .checked_add(amount)
            .expect("balance overflow");
        self.set_account(addr, &account);
    }

    pub fn sub_balance(&mut self, addr: &Addr, amount: &Wei) {
        if amount.is_zero() {
            return
        }
        let mut account = self.get_or_create_account(addr);
        account.balance.gamma_wei = account
            .balance
            .gamma_wei
            .checked_sub(amount)
            .expect("balance underflow");
        self.set_account(addr, &account);
    }

    pub fn get_nonce(&self, addr: &Addr) -> u64 {
        self.get_or_create_account(addr).sequence
    }

    pub fn set_nonce(&mut self, addr: &Addr, nonce: u64) {
        let mut account = self.get_or_create_account(addr);
        account.sequence = nonce;
        self.set_account(addr, &account);
    }

    pub fn get_code_hash(&self, addr: &Addr) -> Hash {
        match self.get_account(addr) {
            Some(account) => account.code_hash,
            None => Hash::zero().clone(),
        }
    }

    pub fn get_code(&self, addr: &Addr) -> Option<Vec<u8>> {
        let account = self.get_account(addr)?;
        if &account.code_hash == Hash::empty_bytes_hash() {
            return None
        }
        self.get_code_by_hash(&account.code_hash)
    }

    pub fn get_code_by_hash(&self, code_hash: &Hash) -> Option<Vec<u8>> {
        self.get(&code_key(code_hash))
    }

    /// Content-addressed code storage: the account records the Keccak of the
    /// code, the code lives under the code prefix keyed by that hash.
    pub fn set_code(&mut self, addr: &Addr, code: &[u8]) {
        let mut account = self.get_or_create_account(addr);
        let code_hash = Hash::hash(code);
        self.set(&code_key(&code_hash), code);
        account.code_hash = code_hash;
        self.set_account(addr, &account);
    }

    pub fn get_code_size(&self, addr: &Addr) -> usize {
        self.get_code(addr).map(|code| code.len()).unwrap_or(0)
    }

    pub fn add_refund(&mut self, gas: u64) {
        self.refund += gas;
    }

    pub fn sub_refund(&mut self, gas: u64) {
        if gas > self.refund {
            panic!("Refund counter below zero")
        }
        self.refund -= gas;
    }

    pub fn get_refund(&self) -> u64 {
        self.refund
    }

    pub fn reset_refund(&mut self) {
        self.refund = 0;
    }

    fn account_storage(&self, account: &Account) -> TreeStore {
        self.store
            .subtree(&account.root)
            .expect("account storage root not materialized")
    }

    pub fn get_state(&self, addr: &Addr, key: &Hash) -> Hash {
        let account = match self.get_account(addr) {
            Some(account) => account,
            None => return Hash::zero().clone(),
        };
        let enc = match self.account_storage(&account).get(key.as_bytes()) {
            Some(enc) if !enc.is_empty() => enc,
            _ => return Hash::zero().clone(),
        };
        let content = rlp::Rlp::new(&enc)
            .data()
            .expect("undecodable storage slot");
        let mut padded = [0u8; 32];
        padded[32 - content.len()..].copy_from_slice(content);
        padded.into()
    }

    /// Write a storage slot under the account's sub-tree; the zero hash
    /// deletes the slot. The new sub-root is persisted on the account record
    /// before the account itself is written.
    pub fn set_state(&mut self, addr: &Addr, key: &Hash, val: &Hash) {
        let mut account = self.get_or_create_account(addr);
        let mut tree = self.account_storage(&account);
        if val.is_zero() {
            tree.delete(key.as_bytes());
        } else {
            let trimmed: Vec<u8> = val
                .as_bytes()
                .iter()
                .skip_while(|b| **b == 0)
                .cloned()
                .collect();
            let encoded = rlp::encode(&crate::common::Bytes::from(trimmed));
            tree.set(key.as_bytes(), encoded.as_ref());
        }
        account.root = tree.hash();
        self.set_account(addr, &account);
    }

    pub fn suicide(&mut self, addr: &Addr) -> bool {
        if self.get_account(addr).is_none() {
            return false
        }
        self.delete_account(addr);
        true
    }

    pub fn has_suicided(&self, addr: &Addr) -> bool {
        self.get_account(addr).is_none()
    }

    /// Whether the account exists; true also for just-suicided addresses
    /// that were re-created in the same block.
    pub fn exist(&self, addr: &Addr) -> bool {
        self.get_account(addr).is_some()
    }

    pub fn empty(&self, addr: &Addr) -> bool {
        match self.get_account(addr) {
            Some(account) => account.is_empty(),
            None => true,
        }
    }

    /// The snapshot token is the current root; every mutation materializes
    /// its trie nodes immediately, so nesting snapshots is free.
    pub fn snapshot(&self) -> Hash {
        self.store.hash()
    }

    /// Reverting to a root this store never materialized is an invariant
    /// violation and fatal.
    pub fn revert_to_snapshot(&mut self, root: &Hash) {
        self.store = match self.store.revert(root) {
            Ok(store) => store,
            Err(err) => panic!("{}", err),
        };
    }
}

/// The two working views of the ledger: `delivered` accumulates the block
/// being executed, `checked` screens mempool candidates, both rebased onto
/// the committed root on every commit.
pub struct LedgerState {
    chain_id: String,
    db: Arc<dyn Database>,
    checked: StoreView,
    delivered: StoreView,
}

impl LedgerState {
    pub fn new(
        chain_id: &str, db: Arc<dyn Database>,
    ) -> Result<LedgerState, StoreError> {
        Ok(LedgerState {
            chain_id: chain_id.to_string(),
            checked: StoreView::new(0, Hash::zero(), db.clone())?,
            delivered: StoreView::new(0, Hash::zero(), db.clone())?,
            db,
        })
    }

    pub fn chain_id(&self) -> &str {
        &self.chain_id
    }

    pub fn height(&self) -> u64 {
        self.delivered.height()
    }

    pub fn delivered(&mut self) -> &mut StoreView {
        &mut self.delivered
    }

    pub fn checked(&mut self) -> &mut StoreView {
        &mut self.checked
    }

    /// Rebase both views onto `root` at `height`, dropping anything staged.
    pub fn reset_state(
        &mut self, height: u64, root: &Hash,
    ) -> Result<(), StoreError> {
        self.checked = StoreView::new(height, root, self.db.clone())?;
        self.delivered = StoreView::new(height, root, self.db.clone())?;
        Ok(())
    }

    /// Persist the delivered view, advance one block and re-base the checked
    /// view onto the new root. Expired split rules are swept as part of the
    /// block boundary.
    pub fn commit(&mut self) -> Hash {
        let height = self.delivered.height();
        self.delivered.delete_expired_split_rules(height);
        let root = self.delivered.save();
        self.reset_state(height + 1, &root)
            .expect("just-committed root must be readable");
        root
    }
}
