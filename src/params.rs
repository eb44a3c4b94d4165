//! Protocol constants. These are chain configuration, compiled in for now.

/// Lowest acceptable transaction fee, in GammaWei.
pub const MINIMUM_TRANSACTION_FEE_GAMMA_WEI: u64 = 1_000_000_000_000;

/// Lowest acceptable gas price for smart-contract transactions, in GammaWei.
pub const MINIMUM_GAS_PRICE: u64 = 100_000_000;

/// Bounds on the lifetime of a reserved fund, in blocks.
pub const MINIMUM_FUND_RESERVE_DURATION: u64 = 300;
pub const MAXIMUM_FUND_RESERVE_DURATION: u64 = 43_200;

/// Blocks past expiry before a reserved fund may be released, leaving room
/// for in-flight service payments to land.
pub const RESERVED_FUND_FREEZE_PERIOD: u64 = 5;
