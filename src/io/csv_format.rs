//! CSV format handling for the account file and admin reports
//!
//! This module centralizes all CSV format concerns, providing:
//! - CsvAccountRecord structure for deserialization
//! - Conversion from CSV records to accounts
//! - Account file serialization (full rows, header first), keeping rows that
//!   failed to load so a rewrite never drops them
//! - Admin report serialization for accounts and transactions
//!
//! Functions take readers and writers rather than paths so they can be
//! tested against in-memory buffers.
//!
//! # Account File Format
//!
//! ```text
//! AccountNo,Role,Username,Password,FullName,Balance
//! 1001,user,alice,5e88...,Alice Smith,100.00
//! ```
//!
//! Registration payloads use the same columns without the header row.

use crate::types::{
    format_amount, parse_balance, Account, LedgerError, TransactionRecord, CASH_SENTINEL,
    TIMESTAMP_FORMAT,
};
use csv::{ByteRecord, ReaderBuilder, Trim, Writer, WriterBuilder};
use log::warn;
use serde::Deserialize;
use std::io::{Read, Write};

/// Header row of the account file
pub const ACCOUNT_HEADER: [&str; 6] = [
    "AccountNo",
    "Role",
    "Username",
    "Password",
    "FullName",
    "Balance",
];

/// CSV record structure for deserialization
///
/// All fields are raw strings; validation happens in
/// [`convert_account_record`]. Without a header row serde maps columns by
/// position, so the same struct reads registration lines.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct CsvAccountRecord {
    #[serde(rename = "AccountNo")]
    pub account_no: String,
    #[serde(rename = "Role")]
    pub role: String,
    #[serde(rename = "Username")]
    pub username: String,
    #[serde(rename = "Password")]
    pub password: String,
    #[serde(rename = "FullName")]
    pub full_name: String,
    #[serde(rename = "Balance")]
    pub balance: String,
}

/// One data row of the account file
#[derive(Debug, Clone, PartialEq)]
pub enum AccountRow {
    Valid(Account),
    /// A row that failed to load, kept as read
    Invalid(ByteRecord),
}

/// Convert a CsvAccountRecord to an Account
///
/// This function:
/// - Requires non-empty account number, username and password hash
/// - Rejects the cash endpoint `ATM` as an account number
/// - Parses the role case-insensitively
/// - Parses the balance as a non-negative decimal rounded to two places
///
/// # Arguments
///
/// * `record` - The deserialized CSV record
///
/// # Returns
///
/// Result containing either:
/// - Ok(Account) - Successfully converted record
/// - Err(String) - Error message describing the conversion failure
pub fn convert_account_record(record: CsvAccountRecord) -> Result<Account, String> {
    if record.account_no.is_empty() {
        return Err("Account number is empty".to_string());
    }
    if record.account_no.eq_ignore_ascii_case(CASH_SENTINEL) {
        return Err(format!(
            "Account number {} is reserved for cash operations",
            record.account_no
        ));
    }
    if record.username.is_empty() {
        return Err(format!("Username is empty for account {}", record.account_no));
    }
    if record.password.is_empty() {
        return Err(format!(
            "Password hash is empty for account {}",
            record.account_no
        ));
    }

    let role = record
        .role
        .parse()
        .map_err(|e| format!("{} for account {}", e, record.account_no))?;

    let balance = parse_balance(&record.balance).map_err(|_| {
        format!(
            "Invalid balance '{}' for account {}",
            record.balance, record.account_no
        )
    })?;

    Ok(Account {
        account_no: record.account_no,
        role,
        username: record.username,
        password_hash: record.password,
        full_name: record.full_name,
        balance,
    })
}

/// Parse a single registration line into an Account
///
/// # Errors
///
/// Returns `ParseError` if the line is empty, has the wrong number of
/// columns, or fails [`convert_account_record`].
pub fn parse_account_line(line: &str) -> Result<Account, LedgerError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .trim(Trim::All)
        .from_reader(line.trim().as_bytes());

    let record: CsvAccountRecord = match reader.deserialize().next() {
        Some(result) => result?,
        None => return Err(LedgerError::parse("Empty account line")),
    };

    convert_account_record(record).map_err(LedgerError::parse)
}

/// Read every row of an account file
///
/// Rows that fail to parse are logged and returned as
/// [`AccountRow::Invalid`] so one corrupt row neither takes the store down
/// nor disappears on the next rewrite.
///
/// # Errors
///
/// Returns `IoError` if the underlying reader fails.
pub fn read_accounts<R: Read>(input: R) -> Result<Vec<AccountRow>, LedgerError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(input);
    let headers = reader.byte_headers()?.clone();

    let mut rows = Vec::new();
    for result in reader.byte_records() {
        let record = match result {
            Ok(record) => record,
            Err(e) if e.is_io_error() => return Err(e.into()),
            Err(e) => {
                warn!("Skipping unreadable account row: {}", e);
                continue;
            }
        };

        let converted = record
            .deserialize::<CsvAccountRecord>(Some(&headers))
            .map_err(|e| e.to_string())
            .and_then(convert_account_record);
        match converted {
            Ok(account) => rows.push(AccountRow::Valid(account)),
            Err(e) => {
                warn!("Keeping unparsable account row as is: {}", e);
                rows.push(AccountRow::Invalid(record));
            }
        }
    }

    Ok(rows)
}

fn account_row(account: &Account) -> [String; 6] {
    [
        account.account_no.clone(),
        account.role.to_string(),
        account.username.clone(),
        account.password_hash.clone(),
        account.full_name.clone(),
        format_amount(account.balance),
    ]
}

/// An account as a raw CSV record
pub fn account_record(account: &Account) -> ByteRecord {
    ByteRecord::from(account_row(account).to_vec())
}

/// Writes a complete account file, header first
///
/// Rows are written in call order. Kept invalid rows may have any number of
/// fields.
pub struct AccountFileWriter<W: Write> {
    writer: Writer<W>,
}

impl<W: Write> AccountFileWriter<W> {
    /// Start a file by writing the header row
    ///
    /// # Errors
    ///
    /// Returns `IoError` if the write fails.
    pub fn new(output: W) -> Result<Self, LedgerError> {
        let mut writer = WriterBuilder::new().flexible(true).from_writer(output);
        writer.write_record(ACCOUNT_HEADER)?;
        Ok(AccountFileWriter { writer })
    }

    pub fn write_account(&mut self, account: &Account) -> Result<(), LedgerError> {
        self.writer.write_record(account_row(account))?;
        Ok(())
    }

    pub fn write_raw(&mut self, record: &ByteRecord) -> Result<(), LedgerError> {
        self.writer.write_byte_record(record)?;
        Ok(())
    }

    /// Flush everything written so far
    pub fn finish(mut self) -> Result<(), LedgerError> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Append one account row, optionally preceded by the header row
///
/// # Errors
///
/// Returns `IoError` if a write fails.
pub fn append_account_row(
    account: &Account,
    with_header: bool,
    output: &mut dyn Write,
) -> Result<(), LedgerError> {
    let mut writer = WriterBuilder::new().has_headers(false).from_writer(output);
    if with_header {
        writer.write_record(ACCOUNT_HEADER)?;
    }
    writer.write_record(account_row(account))?;
    writer.flush()?;
    Ok(())
}

/// Write the admin account listing
///
/// Columns: account_no, role, username, full_name, balance. Password hashes
/// are left out. Accounts are sorted by account number for deterministic
/// output.
///
/// # Arguments
///
/// * `accounts` - Slice of accounts to write
/// * `output` - Mutable reference to a writer for outputting CSV
///
/// # Returns
///
/// * `Ok(())` if writing succeeded
/// * `Err(String)` if a write error occurred
pub fn write_accounts_report(accounts: &[Account], output: &mut dyn Write) -> Result<(), String> {
    let mut writer = Writer::from_writer(output);

    writer
        .write_record(["account_no", "role", "username", "full_name", "balance"])
        .map_err(|e| format!("Failed to write CSV header: {}", e))?;

    let mut sorted_accounts = accounts.to_vec();
    sorted_accounts.sort_by(|a, b| a.account_no.cmp(&b.account_no));

    for account in sorted_accounts {
        writer
            .write_record(&[
                account.account_no,
                account.role.to_string(),
                account.username,
                account.full_name,
                format_amount(account.balance),
            ])
            .map_err(|e| format!("Failed to write account record: {}", e))?;
    }

    writer
        .flush()
        .map_err(|e| format!("Failed to flush output: {}", e))?;

    Ok(())
}

/// Write the admin transaction listing
///
/// Columns: timestamp, type, sender, receiver, amount, status, worker.
/// Records are written in the order given.
pub fn write_transactions_report(
    records: &[TransactionRecord],
    output: &mut dyn Write,
) -> Result<(), String> {
    let mut writer = Writer::from_writer(output);

    writer
        .write_record([
            "timestamp", "type", "sender", "receiver", "amount", "status", "worker",
        ])
        .map_err(|e| format!("Failed to write CSV header: {}", e))?;

    for record in records {
        writer
            .write_record(&[
                record.timestamp.format(TIMESTAMP_FORMAT).to_string(),
                record.tx_type.to_string(),
                record.sender_acc_no.clone(),
                record.receiver_acc_no.clone(),
                format_amount(record.amount),
                record.status.to_string(),
                record.worker_id.clone(),
            ])
            .map_err(|e| format!("Failed to write transaction record: {}", e))?;
    }

    writer
        .flush()
        .map_err(|e| format!("Failed to flush output: {}", e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Role, TransactionStatus, TransactionType};
    use chrono::NaiveDate;
    use rstest::rstest;
    use rust_decimal::Decimal;

    fn raw(account_no: &str, role: &str, balance: &str) -> CsvAccountRecord {
        CsvAccountRecord {
            account_no: account_no.to_string(),
            role: role.to_string(),
            username: "alice".to_string(),
            password: "abc123".to_string(),
            full_name: "Alice Smith".to_string(),
            balance: balance.to_string(),
        }
    }

    #[rstest]
    #[case("user", Role::User, "100", Decimal::new(10000, 2))]
    #[case("ADMIN", Role::Admin, "0.0", Decimal::ZERO)]
    #[case("user", Role::User, "12.345", Decimal::new(1235, 2))]
    fn test_convert_account_record_valid(
        #[case] role: &str,
        #[case] expected_role: Role,
        #[case] balance: &str,
        #[case] expected_balance: Decimal,
    ) {
        let account = convert_account_record(raw("1001", role, balance)).unwrap();
        assert_eq!(account.account_no, "1001");
        assert_eq!(account.role, expected_role);
        assert_eq!(account.balance, expected_balance);
        assert_eq!(account.password_hash, "abc123");
    }

    #[rstest]
    #[case::empty_account_no("", "user", "1", "Account number is empty")]
    #[case::invalid_role("1001", "teller", "1", "Invalid role")]
    #[case::negative_balance("1001", "user", "-1", "Invalid balance")]
    #[case::non_numeric_balance("1001", "user", "lots", "Invalid balance")]
    fn test_convert_account_record_errors(
        #[case] account_no: &str,
        #[case] role: &str,
        #[case] balance: &str,
        #[case] expected_error: &str,
    ) {
        let result = convert_account_record(raw(account_no, role, balance));
        assert!(result.unwrap_err().contains(expected_error));
    }

    #[rstest]
    #[case::plain("1001,user,alice,abc,Alice Smith,100.0")]
    #[case::spaces(" 1001 , user , alice , abc , Alice Smith , 100.0 ")]
    #[case::trailing_newline("1001,user,alice,abc,Alice Smith,100.0\n")]
    fn test_parse_account_line(#[case] line: &str) {
        let account = parse_account_line(line).unwrap();
        assert_eq!(account.account_no, "1001");
        assert_eq!(account.username, "alice");
        assert_eq!(account.full_name, "Alice Smith");
        assert_eq!(account.balance, Decimal::new(10000, 2));
    }

    #[rstest]
    #[case::empty("")]
    #[case::too_few_columns("1001,user,alice")]
    #[case::bad_balance("1001,user,alice,abc,Alice,abc")]
    fn test_parse_account_line_errors(#[case] line: &str) {
        assert!(matches!(
            parse_account_line(line),
            Err(LedgerError::ParseError { .. })
        ));
    }

    #[test]
    fn test_read_accounts_keeps_malformed_rows() {
        let input = "AccountNo,Role,Username,Password,FullName,Balance\n\
                     1001,user,alice,h1,Alice,100.00\n\
                     1002,user,bob\n\
                     1003,user,carol,h3,Carol,not-money\n\
                     1004,admin,dave,h4,Dave,0.00\n";

        let rows = read_accounts(input.as_bytes()).unwrap();
        assert_eq!(rows.len(), 4);
        assert!(matches!(&rows[0], AccountRow::Valid(a) if a.account_no == "1001"));
        assert_eq!(rows[1], AccountRow::Invalid(ByteRecord::from(vec!["1002", "user", "bob"])));
        assert!(matches!(&rows[2], AccountRow::Invalid(r) if &r[5] == b"not-money"));
        assert!(matches!(&rows[3], AccountRow::Valid(a) if a.role == Role::Admin));
    }

    #[test]
    fn test_account_file_writer_preserves_order_and_raw_rows() {
        let bob = Account::new("1002", Role::User, "bob", "h2", "Bob, Jr.", Decimal::new(5, 1));
        let root = Account::new("1001", Role::Admin, "root", "h1", "Root", Decimal::ZERO);

        let mut output = Vec::new();
        let mut writer = AccountFileWriter::new(&mut output).unwrap();
        writer.write_account(&bob).unwrap();
        writer
            .write_raw(&ByteRecord::from(vec!["1003", "user", "carol"]))
            .unwrap();
        writer.write_account(&root).unwrap();
        writer.finish().unwrap();

        let text = String::from_utf8(output.clone()).unwrap();
        assert_eq!(
            text,
            "AccountNo,Role,Username,Password,FullName,Balance\n\
             1002,user,bob,h2,\"Bob, Jr.\",0.50\n\
             1003,user,carol\n\
             1001,admin,root,h1,Root,0.00\n"
        );

        let reread = read_accounts(output.as_slice()).unwrap();
        assert_eq!(reread[0], AccountRow::Valid(bob));
        assert!(matches!(reread[1], AccountRow::Invalid(_)));
        assert_eq!(reread[2], AccountRow::Valid(root));
    }

    #[rstest]
    #[case::upper("ATM")]
    #[case::lower("atm")]
    fn test_cash_endpoint_is_not_an_account_number(#[case] account_no: &str) {
        let result = convert_account_record(raw(account_no, "user", "0"));
        assert!(result.unwrap_err().contains("reserved for cash operations"));
    }

    #[rstest]
    #[case::with_header(true, "AccountNo,Role,Username,Password,FullName,Balance\n1001,user,alice,h,Alice,1.00\n")]
    #[case::without_header(false, "1001,user,alice,h,Alice,1.00\n")]
    fn test_append_account_row(#[case] with_header: bool, #[case] expected: &str) {
        let account = Account::new("1001", Role::User, "alice", "h", "Alice", Decimal::ONE);
        let mut output = Vec::new();
        append_account_row(&account, with_header, &mut output).unwrap();
        assert_eq!(String::from_utf8(output).unwrap(), expected);
    }

    #[rstest]
    #[case::empty(vec![], "account_no,role,username,full_name,balance\n")]
    #[case::sorted_without_password(
        vec![
            Account::new("1002", Role::User, "bob", "secret", "Bob", Decimal::new(3000, 2)),
            Account::new("1001", Role::User, "alice", "secret", "Alice", Decimal::new(12000, 2)),
        ],
        "account_no,role,username,full_name,balance\n1001,user,alice,Alice,120.00\n1002,user,bob,Bob,30.00\n"
    )]
    fn test_write_accounts_report(#[case] accounts: Vec<Account>, #[case] expected_output: &str) {
        let mut output = Vec::new();
        write_accounts_report(&accounts, &mut output).unwrap();
        assert_eq!(String::from_utf8(output).unwrap(), expected_output);
    }

    #[test]
    fn test_write_transactions_report() {
        let record = TransactionRecord {
            sender_name: "alice".to_string(),
            sender_acc_no: "ATM".to_string(),
            receiver_acc_no: "1001".to_string(),
            tx_type: TransactionType::Deposit,
            status: TransactionStatus::Success,
            timestamp: NaiveDate::from_ymd_opt(2025, 1, 31)
                .unwrap()
                .and_hms_opt(14, 5, 9)
                .unwrap(),
            amount: Decimal::new(5000, 2),
            worker_id: "worker-1".to_string(),
        };

        let mut output = Vec::new();
        write_transactions_report(&[record], &mut output).unwrap();
        assert_eq!(
            String::from_utf8(output).unwrap(),
            "timestamp,type,sender,receiver,amount,status,worker\n\
             2025-01-31 14:05:09,DEPOSIT,ATM,1001,50.00,Success,worker-1\n"
        );
    }
}
