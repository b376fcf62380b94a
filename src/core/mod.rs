//! Core business logic module
//!
//! This module contains the ledger components:
//! - `account_store` - Persistent, indexed account set with a single writer gate
//! - `transaction_log` - Append-only block log with filtered scans
//! - `ledger` - Business operations over both

pub mod account_store;
pub mod ledger;
pub mod transaction_log;

pub use account_store::AccountStore;
pub use ledger::{Ledger, LedgerConfig, TransferReceipt, ACCOUNTS_FILE, TRANSACTIONS_FILE};
pub use transaction_log::{LogScan, TransactionLog};
