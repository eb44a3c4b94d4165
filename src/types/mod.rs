mod account;
mod coins;
mod split_rule;
mod tx;

pub use account::{
    Account, ReservedFund, ReservedFundError, SlashIntent, TransferRecord,
};
pub use coins::Coins;
pub use split_rule::{Split, SplitRule};
pub use tx::{
    sign_bytes, tx_id, CoinbaseTx, ReleaseFundTx, ReserveFundTx, SendTx,
    ServicePaymentTx, SplitRuleTx, Tx, TxInput, TxOutput,
};
