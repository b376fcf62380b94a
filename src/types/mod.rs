//! Types module
//!
//! Contains core data structures used throughout the application.
//! This module organizes types into logical submodules:
//! - `account`: Account and role types
//! - `transaction`: Transaction kinds and log records
//! - `amount`: Parsing and formatting of money amounts
//! - `error`: Error types for the ledger

pub mod account;
pub mod amount;
pub mod error;
pub mod transaction;

pub use account::{Account, AccountNo, Role};
pub use amount::{format_amount, parse_amount, parse_balance, round_amount};
pub use error::LedgerError;
pub use transaction::{
    TransactionRecord, TransactionStatus, TransactionType, CASH_SENTINEL, TIMESTAMP_FORMAT,
};
