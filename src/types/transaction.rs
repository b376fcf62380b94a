//! Transaction-related types for the Ledger Server
//!
//! This module defines the kinds of mutating operation the ledger performs
//! and the immutable record each committed operation leaves in the
//! transaction log.

use super::account::AccountNo;
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;

/// Counterparty used for cash movements
///
/// A withdrawal is recorded as a payment from the account to `ATM`, a
/// deposit as a payment from `ATM` to the account.
pub const CASH_SENTINEL: &str = "ATM";

/// Timestamp format used in the transaction log
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Mutating operations recorded in the transaction log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionType {
    /// Move funds from one account to another
    Transfer,

    /// Take cash out of an account
    ///
    /// Requires the balance to cover the amount.
    Withdraw,

    /// Put cash into an account
    Deposit,
}

impl TransactionType {
    /// Uppercase name as written to the log and accepted on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Transfer => "TRANSFER",
            TransactionType::Withdraw => "WITHDRAW",
            TransactionType::Deposit => "DEPOSIT",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "TRANSFER" => Ok(TransactionType::Transfer),
            "WITHDRAW" => Ok(TransactionType::Withdraw),
            "DEPOSIT" => Ok(TransactionType::Deposit),
            other => Err(format!("Invalid transaction type: '{}'", other)),
        }
    }
}

/// Outcome recorded with a transaction
///
/// Only committed operations reach the log, so the ledger itself writes
/// `Success`. `Failed` is kept so logs written by other tools still parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    Success,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Success => "Success",
            TransactionStatus::Failed => "Failed",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "success" => Ok(TransactionStatus::Success),
            "failed" => Ok(TransactionStatus::Failed),
            other => Err(format!("Invalid transaction status: '{}'", other)),
        }
    }
}

/// One entry of the transaction log
///
/// Appended exactly once per committed mutating operation and never changed
/// afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionRecord {
    /// Username of the account that initiated the operation
    pub sender_name: String,

    /// Paying side; `ATM` for deposits
    pub sender_acc_no: AccountNo,

    /// Receiving side; `ATM` for withdrawals
    pub receiver_acc_no: AccountNo,

    /// Kind of operation
    pub tx_type: TransactionType,

    /// Outcome
    pub status: TransactionStatus,

    /// Local wall-clock time, seconds precision
    pub timestamp: NaiveDateTime,

    /// Positive amount moved
    pub amount: Decimal,

    /// Connection worker that performed the operation
    pub worker_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("TRANSFER", TransactionType::Transfer)]
    #[case("withdraw", TransactionType::Withdraw)]
    #[case("Deposit", TransactionType::Deposit)]
    #[case(" DEPOSIT ", TransactionType::Deposit)]
    fn test_transaction_type_parsing(#[case] input: &str, #[case] expected: TransactionType) {
        assert_eq!(input.parse::<TransactionType>().unwrap(), expected);
    }

    #[rstest]
    #[case("withdrawal")]
    #[case("")]
    #[case("refund")]
    fn test_transaction_type_parsing_errors(#[case] input: &str) {
        assert!(input.parse::<TransactionType>().is_err());
    }

    #[test]
    fn test_status_display_round_trips() {
        for status in [TransactionStatus::Success, TransactionStatus::Failed] {
            assert_eq!(status.to_string().parse::<TransactionStatus>().unwrap(), status);
        }
    }
}
