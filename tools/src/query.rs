//! Read-only state queries against a committed root, JSON-rendered the way
//! the node's `query` command consumes them.

use serde_json::{json, Value};

use qledger::common::Addr;
use qledger::state::StoreView;

/// The account record at `addr`, or `null` if it does not exist.
pub fn account(view: &StoreView, addr: &Addr) -> Value {
    match view.get_account(addr) {
        Some(account) => json!(account),
        None => Value::Null,
    }
}

/// The split rule registered for `resource_id`, or `null`.
pub fn split_rule(view: &StoreView, resource_id: &str) -> Value {
    match view.get_split_rule(resource_id) {
        Some(rule) => json!(rule),
        None => Value::Null,
    }
}
