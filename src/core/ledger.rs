//! Ledger operations
//!
//! This module provides the `Ledger` struct, which combines the account store
//! and the transaction log and enforces the business rules of every request.
//!
//! # Operation Flow
//!
//! ```text
//! transfer / withdraw / deposit
//!     │
//!     ├─► validate amount (> 0 after rounding to 2 places)
//!     ├─► AccountStore::apply_update
//!     │       ├─ mutate staged copies (funds check, checked arithmetic)
//!     │       ├─ persist account file
//!     │       ├─ journal: TransactionLog::append
//!     │       └─ commit to index
//!     └─► new balance
//! ```
//!
//! A rejected operation changes no balance and writes no log entry. Read
//! operations never take the writer gate.

use crate::core::account_store::AccountStore;
use crate::core::transaction_log::{LogScan, TransactionLog};
use crate::io::csv_format::parse_account_line;
use crate::io::log_format::field_value;
use crate::types::{
    round_amount, Account, LedgerError, TransactionRecord, TransactionStatus, TransactionType,
    CASH_SENTINEL,
};
use chrono::{Local, NaiveDateTime, SubsecRound};
use log::info;
use rust_decimal::Decimal;
use std::path::PathBuf;

/// File name of the account store inside the data directory
pub const ACCOUNTS_FILE: &str = "users.txt";

/// File name of the transaction log inside the data directory
pub const TRANSACTIONS_FILE: &str = "transactions.txt";

/// Configuration for opening a ledger
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerConfig {
    /// Directory holding the account file and the transaction log
    pub data_dir: PathBuf,

    /// Reject registrations whose username is already taken (ignoring case)
    ///
    /// Off by default: clients are expected to call `CHECK_DUPLICATE` first.
    pub enforce_unique_usernames: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        LedgerConfig {
            data_dir: PathBuf::from("data"),
            enforce_unique_usernames: false,
        }
    }
}

impl LedgerConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        LedgerConfig {
            data_dir: data_dir.into(),
            ..Default::default()
        }
    }

    pub fn accounts_path(&self) -> PathBuf {
        self.data_dir.join(ACCOUNTS_FILE)
    }

    pub fn transactions_path(&self) -> PathBuf {
        self.data_dir.join(TRANSACTIONS_FILE)
    }
}

/// Result of a committed transfer
#[derive(Debug, Clone, PartialEq)]
pub struct TransferReceipt {
    /// Username of the sending account, as written to the log
    pub sender_name: String,

    /// Sender balance after the debit
    pub new_sender_balance: Decimal,
}

/// The ledger: accounts plus their transaction history
#[derive(Debug)]
pub struct Ledger {
    accounts: AccountStore,
    log: TransactionLog,
    enforce_unique_usernames: bool,
}

impl Ledger {
    /// Open the ledger in `config.data_dir`, creating the directory if needed
    ///
    /// # Errors
    ///
    /// Returns `IoError` if the directory cannot be created or the account
    /// file cannot be read.
    pub fn open(config: &LedgerConfig) -> Result<Self, LedgerError> {
        std::fs::create_dir_all(&config.data_dir)?;
        let accounts = AccountStore::open(config.accounts_path())?;
        let log = TransactionLog::new(config.transactions_path());
        Ok(Ledger::from_parts(
            accounts,
            log,
            config.enforce_unique_usernames,
        ))
    }

    /// Assemble a ledger from an already opened store and log
    pub fn from_parts(
        accounts: AccountStore,
        log: TransactionLog,
        enforce_unique_usernames: bool,
    ) -> Self {
        Ledger {
            accounts,
            log,
            enforce_unique_usernames,
        }
    }

    pub fn accounts(&self) -> &AccountStore {
        &self.accounts
    }

    pub fn log(&self) -> &TransactionLog {
        &self.log
    }

    /// Authenticate by exact username and password hash
    ///
    /// # Errors
    ///
    /// Returns `AuthFailed` if no account matches both exactly.
    pub fn authenticate(&self, username: &str, password_hash: &str) -> Result<Account, LedgerError> {
        self.accounts
            .list_all()
            .into_iter()
            .find(|a| a.username == username && a.password_hash == password_hash)
            .ok_or_else(|| LedgerError::auth_failed(username))
    }

    /// Whether any account's username matches `identifier`, ignoring case
    pub fn check_duplicate(&self, identifier: &str) -> bool {
        self.accounts.find_by_username(identifier).is_some()
    }

    /// Register a new account from a CSV line
    ///
    /// # Errors
    ///
    /// - `ParseError` if the line is malformed
    /// - `DuplicateAccount` if the account number exists
    /// - `DuplicateUsername` if usernames are enforced unique and this one is taken
    /// - `IoError` if the account file cannot be written
    pub fn register(&self, account_line: &str) -> Result<Account, LedgerError> {
        let account = parse_account_line(account_line)?;
        self.accounts.insert(account, self.enforce_unique_usernames)
    }

    /// Move `amount` from `sender` to `recipient`
    ///
    /// Both balances change together or not at all, and exactly one
    /// `TRANSFER` record is logged on success.
    ///
    /// # Arguments
    ///
    /// * `sender` - Account to debit
    /// * `recipient` - Account to credit
    /// * `amount` - Positive amount, rounded to two places
    /// * `worker_id` - Tag of the connection worker, written to the log
    ///
    /// # Errors
    ///
    /// - `InvalidAmount` if the amount is not positive
    /// - `SelfTransfer` if both accounts are the same
    /// - `AccountNotFound` if either account is unknown
    /// - `InsufficientFunds` if the sender's balance is below the amount
    /// - `IoError` if persisting or logging fails
    pub fn transfer(
        &self,
        sender: &str,
        recipient: &str,
        amount: Decimal,
        worker_id: &str,
    ) -> Result<TransferReceipt, LedgerError> {
        let amount = validate_amount(amount)?;
        if sender == recipient {
            return Err(LedgerError::self_transfer(sender));
        }

        let (committed, ()) = self.accounts.apply_update(
            &[sender, recipient],
            |staged| {
                let (from, to) = staged.split_at_mut(1);
                let (from, to) = (&mut from[0], &mut to[0]);
                if from.balance < amount {
                    return Err(LedgerError::insufficient_funds(
                        &from.account_no,
                        from.balance,
                        amount,
                    ));
                }
                from.balance -= amount;
                to.balance = to
                    .balance
                    .checked_add(amount)
                    .ok_or_else(|| LedgerError::arithmetic_overflow("transfer", &to.account_no))?;
                Ok(())
            },
            |staged, _| {
                self.log.append(&TransactionRecord {
                    sender_name: staged[0].username.clone(),
                    sender_acc_no: staged[0].account_no.clone(),
                    receiver_acc_no: staged[1].account_no.clone(),
                    tx_type: TransactionType::Transfer,
                    status: TransactionStatus::Success,
                    timestamp: now(),
                    amount,
                    worker_id: worker_id.to_string(),
                })
            },
        )?;

        let sender = &committed[0];
        info!(
            "[{}] Transfer {:.2} from {} to {}",
            worker_id, amount, sender.account_no, recipient
        );

        Ok(TransferReceipt {
            sender_name: sender.username.clone(),
            new_sender_balance: sender.balance,
        })
    }

    /// Withdraw cash from or deposit cash into an account
    ///
    /// The log record uses `ATM` as the counterparty: the account pays `ATM`
    /// on a withdrawal and `ATM` pays the account on a deposit.
    ///
    /// # Arguments
    ///
    /// * `account_no` - Account to update
    /// * `amount` - Positive amount, rounded to two places
    /// * `kind` - `Withdraw` or `Deposit`
    /// * `worker_id` - Tag of the connection worker, written to the log
    ///
    /// # Returns
    ///
    /// The account's new balance.
    ///
    /// # Errors
    ///
    /// - `ParseError` if `kind` is `Transfer`
    /// - `InvalidAmount` if the amount is not positive
    /// - `AccountNotFound` if the account is unknown
    /// - `InsufficientFunds` if a withdrawal exceeds the balance
    /// - `ArithmeticOverflow` if a deposit cannot be represented
    /// - `IoError` if persisting or logging fails
    pub fn withdraw_or_deposit(
        &self,
        account_no: &str,
        amount: Decimal,
        kind: TransactionType,
        worker_id: &str,
    ) -> Result<Decimal, LedgerError> {
        if kind == TransactionType::Transfer {
            return Err(LedgerError::parse(
                "TRANSFER is not a withdraw or deposit operation",
            ));
        }
        let amount = validate_amount(amount)?;

        let (_, new_balance) = self.accounts.apply_update(
            &[account_no],
            |staged| {
                let account = &mut staged[0];
                account.balance = match kind {
                    TransactionType::Withdraw => {
                        if account.balance < amount {
                            return Err(LedgerError::insufficient_funds(
                                &account.account_no,
                                account.balance,
                                amount,
                            ));
                        }
                        account.balance - amount
                    }
                    _ => account.balance.checked_add(amount).ok_or_else(|| {
                        LedgerError::arithmetic_overflow("deposit", &account.account_no)
                    })?,
                };
                Ok(account.balance)
            },
            |staged, _| {
                let account = &staged[0];
                let (sender_acc_no, receiver_acc_no) = match kind {
                    TransactionType::Withdraw => (account.account_no.clone(), CASH_SENTINEL.to_string()),
                    _ => (CASH_SENTINEL.to_string(), account.account_no.clone()),
                };
                self.log.append(&TransactionRecord {
                    sender_name: account.username.clone(),
                    sender_acc_no,
                    receiver_acc_no,
                    tx_type: kind,
                    status: TransactionStatus::Success,
                    timestamp: now(),
                    amount,
                    worker_id: worker_id.to_string(),
                })
            },
        )?;

        info!(
            "[{}] {} {:.2} on {}, balance {:.2}",
            worker_id, kind, amount, account_no, new_balance
        );
        Ok(new_balance)
    }

    /// Current balance of an account
    ///
    /// # Errors
    ///
    /// Returns `AccountNotFound` if the account is unknown.
    pub fn balance_of(&self, account_no: &str) -> Result<Decimal, LedgerError> {
        Ok(self.accounts.find_by_account(account_no)?.balance)
    }

    /// Full name of an account holder
    ///
    /// # Errors
    ///
    /// Returns `AccountNotFound` if the account is unknown.
    pub fn name_of(&self, account_no: &str) -> Result<String, LedgerError> {
        Ok(self.accounts.find_by_account(account_no)?.full_name)
    }

    /// Lazy sequence of log blocks in which the account is sender or receiver
    ///
    /// Matches whole field values, so `100` matches neither `1001` nor an
    /// amount of `100.00`.
    ///
    /// # Errors
    ///
    /// Returns `IoError` if the log exists but cannot be opened.
    pub fn history_of(
        &self,
        account_no: &str,
    ) -> Result<LogScan<'_, impl FnMut(&str) -> bool>, LedgerError> {
        let account_no = account_no.trim().to_string();
        self.log.scan(move |block| {
            field_value(block, "SenderAccNo") == Some(account_no.as_str())
                || field_value(block, "ReceiverAccNo") == Some(account_no.as_str())
        })
    }

    /// Every account, in registration order
    pub fn list_accounts(&self) -> Vec<Account> {
        self.accounts.list_all()
    }

    /// Every parsable record in the log, oldest first
    ///
    /// # Errors
    ///
    /// Returns `IoError` if the log cannot be read.
    pub fn transactions(&self) -> Result<Vec<TransactionRecord>, LedgerError> {
        self.log.records()
    }
}

/// Round to two places and require a positive result
fn validate_amount(amount: Decimal) -> Result<Decimal, LedgerError> {
    let rounded = round_amount(amount);
    if rounded <= Decimal::ZERO {
        return Err(LedgerError::invalid_amount(&amount.to_string()));
    }
    Ok(rounded)
}

/// Local wall-clock time truncated to whole seconds
fn now() -> NaiveDateTime {
    Local::now().naive_local().trunc_subsecs(0)
}
