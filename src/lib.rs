//! # qLedger: a ledger execution core
//!
//! qLedger is the deterministic heart of a blockchain node: it takes signed
//! transactions, validates them against the current chain state, applies the
//! state mutations, and exposes a cryptographically authenticated view of the
//! result. Everything around it (consensus, block assembly, networking, the
//! CLI) talks to this crate through a small number of seams and is not part
//! of it.
//!
//! # Overview
//!
//! The crate is layered bottom-up:
//!
//! - [store]: the persistence seam. A [store::Database] is an unordered byte
//!   store with atomic batches (an in-memory one ships here, a RocksDB one in
//!   `qledger-tools`); [store::TreeStore] is the authenticated Merkle tree on
//!   top of it, with copy-on-write nodes so snapshots and reverts are just
//!   re-rooting.
//! - [state]: [state::StoreView], the typed ledger façade over a tree store
//!   (accounts, split rules, contract code and storage, per-block staging
//!   buffers), and [state::LedgerState], the delivered/checked view pair a
//!   node executes and screens against.
//! - [types]: the canonical records. Everything that is persisted or signed
//!   has a fixed RLP layout, and the state root is a bit-exact function of
//!   these encodings.
//! - [execution]: the transaction executors behind [execution::Executor],
//!   one `sanity_check`/`process` pair per variant. The service payment
//!   executor is the interesting one: a two-signature off-chain settlement
//!   with revenue splitting and double-spend slashing.
//!
//! # On determinism
//!
//! A block executed twice from the same root must commit the same root, so
//! none of the code here consults clocks, randomness, or hash-map iteration
//! order. Where an ordering is observable (payout distribution, validator
//! sets, trie traversal) it is explicitly pinned: split entries pay out in
//! declaration order with the target last, validator sets sort by address,
//! and traversal is ascending by key.
//!
//! # On failure
//!
//! Transaction-level failures are ordinary [execution::TxError] values and
//! leave the view untouched. Store-level corruption (undecodable records,
//! unknown roots) panics instead: a node that cannot trust its own state
//! must halt rather than silently diverge from the chain. One deliberate
//! non-error: a double-spent drawdown *succeeds* as a transaction, staging a
//! slash intent for consensus, because the evidence itself has to make it
//! on-chain.

pub mod common;
pub mod crypto;
pub mod execution;
pub mod params;
pub mod state;
pub mod store;
pub mod types;
pub mod validator;
