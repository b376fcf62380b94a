//! Offline admin reports
//!
//! Read-only views over the data directory for operators: the account list
//! and the transaction history filtered by type or by today's date. They open
//! the files directly and never touch a running server.

use super::args::TransactionsArgs;
use crate::core::Ledger;
use crate::io::csv_format::{write_accounts_report, write_transactions_report};
use crate::types::{TransactionRecord, TransactionType};
use chrono::NaiveDate;
use std::io::Write;

/// Write every account as CSV
pub fn print_accounts(ledger: &Ledger, output: &mut dyn Write) -> Result<(), String> {
    write_accounts_report(&ledger.list_accounts(), output)
}

/// Filter and order records for the transaction report
///
/// Keeps records matching `tx_type` (if set) and dated `on` (if set), newest
/// first. Records with equal timestamps keep their log order reversed.
pub fn select_transactions(
    mut records: Vec<TransactionRecord>,
    tx_type: Option<TransactionType>,
    on: Option<NaiveDate>,
) -> Vec<TransactionRecord> {
    records.retain(|r| {
        tx_type.map_or(true, |t| r.tx_type == t) && on.map_or(true, |d| r.timestamp.date() == d)
    });
    records.reverse();
    records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    records
}

/// Write the filtered transaction report as CSV
pub fn print_transactions(
    ledger: &Ledger,
    args: &TransactionsArgs,
    output: &mut dyn Write,
) -> Result<(), String> {
    let records = ledger.transactions().map_err(|e| e.to_string())?;
    let today = args.today.then(|| chrono::Local::now().date_naive());
    let selected = select_transactions(records, args.tx_type.map(Into::into), today);
    write_transactions_report(&selected, output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TransactionStatus;
    use rstest::rstest;
    use rust_decimal::Decimal;

    fn record(tx_type: TransactionType, day: u32, hour: u32, worker: &str) -> TransactionRecord {
        TransactionRecord {
            sender_name: "alice".to_string(),
            sender_acc_no: "1001".to_string(),
            receiver_acc_no: "1002".to_string(),
            tx_type,
            status: TransactionStatus::Success,
            timestamp: NaiveDate::from_ymd_opt(2025, 6, day)
                .unwrap()
                .and_hms_opt(hour, 0, 0)
                .unwrap(),
            amount: Decimal::ONE,
            worker_id: worker.to_string(),
        }
    }

    fn sample() -> Vec<TransactionRecord> {
        vec![
            record(TransactionType::Deposit, 1, 9, "w1"),
            record(TransactionType::Transfer, 2, 9, "w2"),
            record(TransactionType::Withdraw, 2, 12, "w3"),
            record(TransactionType::Transfer, 2, 12, "w4"),
        ]
    }

    #[rstest]
    #[case::all(None, None, &["w4", "w3", "w2", "w1"])]
    #[case::transfers(Some(TransactionType::Transfer), None, &["w4", "w2"])]
    #[case::one_day(None, NaiveDate::from_ymd_opt(2025, 6, 1), &["w1"])]
    #[case::type_and_day(Some(TransactionType::Withdraw), NaiveDate::from_ymd_opt(2025, 6, 2), &["w3"])]
    #[case::nothing(Some(TransactionType::Deposit), NaiveDate::from_ymd_opt(2025, 6, 2), &[])]
    fn test_select_transactions(
        #[case] tx_type: Option<TransactionType>,
        #[case] on: Option<NaiveDate>,
        #[case] expected_workers: &[&str],
    ) {
        let selected = select_transactions(sample(), tx_type, on);
        let workers: Vec<&str> = selected.iter().map(|r| r.worker_id.as_str()).collect();
        assert_eq!(workers, expected_workers);
    }
}
