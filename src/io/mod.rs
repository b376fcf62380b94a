//! I/O module
//!
//! Handles the on-disk formats of the ledger.
//!
//! # Components
//!
//! - `csv_format` - Account file and admin report CSV handling
//! - `log_format` - Transaction log block formatting, parsing and splitting

pub mod csv_format;
pub mod log_format;

pub use csv_format::{
    account_record, convert_account_record, parse_account_line, read_accounts,
    write_accounts_report, write_transactions_report, AccountFileWriter, AccountRow,
    CsvAccountRecord,
};
pub use log_format::{
    field_value, format_transaction_block, parse_key_value, parse_transaction_block, Blocks,
};
