//! Error types for the Ledger Server
//!
//! This module defines all error types that can occur while serving ledger
//! requests. Every variant is recovered at the connection boundary and turned
//! into the failure token of the command that produced it; none of them stop
//! the server.
//!
//! # Error Categories
//!
//! - **Parse Errors**: Malformed payload lines, account rows or log blocks
//! - **Business Rejections**: Unknown accounts, insufficient funds, bad credentials, duplicates
//! - **Arithmetic Errors**: Overflow in balance calculations
//! - **I/O Errors**: Account file or transaction log could not be read or written

use rust_decimal::Decimal;
use thiserror::Error;

/// Main error type for the ledger
///
/// Each variant carries the context needed to log the rejection. The details
/// never reach the client; the connection only sees the command's failure token.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    /// Payload, account row or log block could not be parsed
    #[error("Parse error{}: {message}", line.map(|l| format!(" at line {}", l)).unwrap_or_default())]
    ParseError {
        /// Line number where the error occurred (if available)
        line: Option<u64>,
        /// Description of the parsing error
        message: String,
    },

    /// Amount is malformed, zero or negative
    #[error("Invalid amount '{amount}'")]
    InvalidAmount {
        /// The rejected amount as received
        amount: String,
    },

    /// No account with the given number exists
    #[error("Account {account_no} not found")]
    AccountNotFound {
        /// Account number that was looked up
        account_no: String,
    },

    /// Debit would take the balance below zero
    ///
    /// The operation is rejected and no balance changes.
    #[error("Insufficient funds for account {account_no}: balance {balance}, requested {requested}")]
    InsufficientFunds {
        /// Account being debited
        account_no: String,
        /// Balance at the time of the request
        balance: Decimal,
        /// Requested debit
        requested: Decimal,
    },

    /// Username already taken (case-insensitive)
    #[error("Username '{username}' is already registered")]
    DuplicateUsername {
        /// The rejected username
        username: String,
    },

    /// Account number already present in the store
    #[error("Account {account_no} already exists")]
    DuplicateAccount {
        /// The rejected account number
        account_no: String,
    },

    /// Sender and recipient of a transfer are the same account
    #[error("Account {account_no} cannot transfer to itself")]
    SelfTransfer {
        /// The account on both sides
        account_no: String,
    },

    /// Username and password hash did not match any account
    #[error("Authentication failed for '{username}'")]
    AuthFailed {
        /// Username that was presented
        username: String,
    },

    /// Arithmetic overflow would occur
    ///
    /// The operation is rejected to keep the balance representable.
    #[error("Arithmetic overflow in {operation} for account {account_no}")]
    ArithmeticOverflow {
        /// Operation that would overflow
        operation: String,
        /// Account being credited
        account_no: String,
    },

    /// I/O error occurred while reading or writing the persisted state
    #[error("I/O error: {message}")]
    IoError {
        /// Description of the I/O error
        message: String,
    },
}

// Conversion from io::Error to LedgerError
impl From<std::io::Error> for LedgerError {
    fn from(error: std::io::Error) -> Self {
        LedgerError::IoError {
            message: error.to_string(),
        }
    }
}

// Conversion from csv::Error to LedgerError
impl From<csv::Error> for LedgerError {
    fn from(error: csv::Error) -> Self {
        if error.is_io_error() {
            return LedgerError::IoError {
                message: error.to_string(),
            };
        }

        let line = error.position().map(|pos| pos.line());

        LedgerError::ParseError {
            line,
            message: error.to_string(),
        }
    }
}

// Helper functions for creating common errors

impl LedgerError {
    /// Create a ParseError without position information
    pub fn parse(message: impl Into<String>) -> Self {
        LedgerError::ParseError {
            line: None,
            message: message.into(),
        }
    }

    /// Create an InvalidAmount error
    pub fn invalid_amount(amount: &str) -> Self {
        LedgerError::InvalidAmount {
            amount: amount.to_string(),
        }
    }

    /// Create an AccountNotFound error
    pub fn account_not_found(account_no: &str) -> Self {
        LedgerError::AccountNotFound {
            account_no: account_no.to_string(),
        }
    }

    /// Create an InsufficientFunds error
    pub fn insufficient_funds(account_no: &str, balance: Decimal, requested: Decimal) -> Self {
        LedgerError::InsufficientFunds {
            account_no: account_no.to_string(),
            balance,
            requested,
        }
    }

    /// Create a DuplicateUsername error
    pub fn duplicate_username(username: &str) -> Self {
        LedgerError::DuplicateUsername {
            username: username.to_string(),
        }
    }

    /// Create a DuplicateAccount error
    pub fn duplicate_account(account_no: &str) -> Self {
        LedgerError::DuplicateAccount {
            account_no: account_no.to_string(),
        }
    }

    /// Create a SelfTransfer error
    pub fn self_transfer(account_no: &str) -> Self {
        LedgerError::SelfTransfer {
            account_no: account_no.to_string(),
        }
    }

    /// Create an AuthFailed error
    pub fn auth_failed(username: &str) -> Self {
        LedgerError::AuthFailed {
            username: username.to_string(),
        }
    }

    /// Create an ArithmeticOverflow error
    pub fn arithmetic_overflow(operation: &str, account_no: &str) -> Self {
        LedgerError::ArithmeticOverflow {
            operation: operation.to_string(),
            account_no: account_no.to_string(),
        }
    }

    /// Whether this error came from the storage layer rather than a rejected request
    pub fn is_io(&self) -> bool {
        matches!(self, LedgerError::IoError { .. })
    }
}
