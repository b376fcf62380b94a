//! Persistent account store
//!
//! This module provides the `AccountStore` struct, which owns every account
//! and the CSV file that holds them.
//!
//! # Design
//!
//! ```text
//!   readers ──► RwLock<AccountIndex> ◄── commit (brief write lock)
//!                                           ▲
//!   writers ──► write_gate ──► stage ──► persist ──► journal ──┘
//!               (Mutex<()>)    copies    temp+rename  log append
//! ```
//!
//! The accounts live in memory as an ordered `Vec` plus a `HashMap` from
//! account number to position. Rows that failed to load stay in the file
//! layout untouched and are written back in place on every rewrite. Every mutation goes through a single writer
//! gate, stages copies of the accounts it touches, writes the whole file with
//! the copies substituted, runs the caller's journal step (the transaction log
//! append) and only then commits the copies to the index. A failure at any
//! step leaves both the index and the file as they were.
//!
//! # Thread Safety
//!
//! Readers take the read lock only, so they never wait on disk I/O. The write
//! lock is held just long enough to swap in the committed copies. Lock order is
//! always writer gate first, then the index lock. Poisoned locks are recovered
//! because the index is only ever replaced wholesale after a successful write.

use crate::io::csv_format::{
    account_record, append_account_row, parse_account_line, read_accounts, AccountFileWriter,
    AccountRow,
};
use crate::types::{Account, AccountNo, LedgerError};
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use csv::ByteRecord;
use std::io::{self, BufReader, BufWriter, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A row of the account file
#[derive(Debug)]
enum Slot {
    /// Position in `AccountIndex::accounts`
    Account(usize),
    /// Row left out of the index, written back as read
    Kept(ByteRecord),
}

/// Accounts in file order with a lookup table by account number
#[derive(Debug, Default)]
struct AccountIndex {
    accounts: Vec<Account>,
    by_no: HashMap<AccountNo, usize>,
    layout: Vec<Slot>,
}

impl AccountIndex {
    fn from_rows(rows: Vec<AccountRow>) -> Self {
        let mut index = AccountIndex::default();
        for row in rows {
            match row {
                AccountRow::Valid(account) if index.by_no.contains_key(&account.account_no) => {
                    warn!(
                        "Ignoring duplicate row for account {}",
                        account.account_no
                    );
                    index.layout.push(Slot::Kept(account_record(&account)));
                }
                AccountRow::Valid(account) => index.push(account),
                AccountRow::Invalid(record) => index.layout.push(Slot::Kept(record)),
            }
        }
        index
    }

    fn kept_rows(&self) -> usize {
        self.layout.len() - self.accounts.len()
    }

    fn get(&self, account_no: &str) -> Option<&Account> {
        self.by_no.get(account_no).map(|&pos| &self.accounts[pos])
    }

    fn push(&mut self, account: Account) {
        self.layout.push(Slot::Account(self.accounts.len()));
        self.by_no
            .insert(account.account_no.clone(), self.accounts.len());
        self.accounts.push(account);
    }

    fn replace(&mut self, account: Account) {
        if let Some(&pos) = self.by_no.get(&account.account_no) {
            self.accounts[pos] = account;
        }
    }

    fn username_taken(&self, username: &str) -> bool {
        self.accounts.iter().any(|a| a.username_matches(username))
    }
}

/// Account store backed by a CSV file
///
/// # Examples
///
/// ```no_run
/// use ledger_server::core::AccountStore;
///
/// let store = AccountStore::open("data/users.txt").unwrap();
/// let account = store.find_by_account("1001").unwrap();
/// println!("{} has {:.2}", account.full_name, account.balance);
/// ```
#[derive(Debug)]
pub struct AccountStore {
    path: PathBuf,
    index: RwLock<AccountIndex>,
    write_gate: Mutex<()>,
}

impl AccountStore {
    /// Open the store, loading the account file if it exists
    ///
    /// A missing file is an empty store; the file is created on the first
    /// registration. Malformed rows are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns `IoError` if the file exists but cannot be read.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, LedgerError> {
        let path = path.into();

        let loaded = match File::open(&path) {
            Ok(file) => read_accounts(BufReader::new(file))?,
            Err(e) if e.kind() == ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        let index = AccountIndex::from_rows(loaded);
        info!(
            "Loaded {} accounts from {}",
            index.accounts.len(),
            path.display()
        );
        if index.kept_rows() > 0 {
            warn!(
                "{} rows of {} could not be loaded and are kept as is",
                index.kept_rows(),
                path.display()
            );
        }

        Ok(AccountStore {
            path,
            index: RwLock::new(index),
            write_gate: Mutex::new(()),
        })
    }

    /// Path of the backing account file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of accounts
    pub fn len(&self) -> usize {
        self.read_index().accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up an account by number
    ///
    /// # Errors
    ///
    /// Returns `AccountNotFound` if no account has this number.
    pub fn find_by_account(&self, account_no: &str) -> Result<Account, LedgerError> {
        self.read_index()
            .get(account_no)
            .cloned()
            .ok_or_else(|| LedgerError::account_not_found(account_no))
    }

    /// Look up an account by username, ignoring case
    pub fn find_by_username(&self, username: &str) -> Option<Account> {
        self.read_index()
            .accounts
            .iter()
            .find(|a| a.username_matches(username))
            .cloned()
    }

    /// Snapshot of every account in file order
    pub fn list_all(&self) -> Vec<Account> {
        self.read_index().accounts.clone()
    }

    /// Atomically update one or more accounts
    ///
    /// Under the writer gate this:
    /// 1. Stages copies of the accounts named by `ids`, in that order
    /// 2. Runs `mutate` on the copies
    /// 3. Persists the full account set with the copies substituted
    /// 4. Runs `journal` with the updated copies and the mutator's output
    /// 5. Commits the copies to the in-memory index
    ///
    /// If `journal` fails the previous file contents are written back before
    /// the error is returned.
    ///
    /// # Arguments
    ///
    /// * `ids` - Distinct account numbers to update
    /// * `mutate` - Applies the change to the staged copies; may reject it
    /// * `journal` - Records the change once it is durable
    ///
    /// # Returns
    ///
    /// The committed accounts, in `ids` order, and the mutator's output.
    ///
    /// # Errors
    ///
    /// - `AccountNotFound` if any id is unknown (nothing runs)
    /// - whatever `mutate` or `journal` return
    /// - `IoError` if the account file cannot be written
    pub fn apply_update<T, M, J>(
        &self,
        ids: &[&str],
        mutate: M,
        journal: J,
    ) -> Result<(Vec<Account>, T), LedgerError>
    where
        M: FnOnce(&mut [Account]) -> Result<T, LedgerError>,
        J: FnOnce(&[Account], &T) -> Result<(), LedgerError>,
    {
        let _gate = self.lock_gate();

        let mut staged = Vec::with_capacity(ids.len());
        {
            let index = self.read_index();
            for (i, id) in ids.iter().enumerate() {
                if ids[..i].contains(id) {
                    return Err(LedgerError::parse(format!(
                        "Account {} named twice in one update",
                        id
                    )));
                }
                let account = index
                    .get(id)
                    .ok_or_else(|| LedgerError::account_not_found(id))?;
                staged.push(account.clone());
            }
        }

        let output = mutate(&mut staged)?;

        self.persist(&staged)?;

        if let Err(journal_error) = journal(&staged, &output) {
            error!(
                "Journal step failed, restoring {}: {}",
                self.path.display(),
                journal_error
            );
            if let Err(restore_error) = self.persist(&[]) {
                error!(
                    "Failed to restore {}: {}",
                    self.path.display(),
                    restore_error
                );
            }
            return Err(journal_error);
        }

        {
            let mut index = self.write_index();
            for account in &staged {
                index.replace(account.clone());
            }
        }

        debug!("Committed update to {:?}", ids);
        Ok((staged, output))
    }

    /// Register an account from a CSV line
    ///
    /// The line has the columns `accountNo,role,username,passwordHash,fullName,balance`.
    ///
    /// # Errors
    ///
    /// - `ParseError` if the line is malformed
    /// - `DuplicateAccount` if the account number exists
    /// - `IoError` if the file cannot be written
    pub fn append(&self, line: &str) -> Result<Account, LedgerError> {
        let account = parse_account_line(line)?;
        self.insert(account, false)
    }

    /// Register an already parsed account
    ///
    /// When `unique_username` is set, a case-insensitive username clash is
    /// rejected with `DuplicateUsername` under the same writer gate, so two
    /// concurrent registrations cannot both pass the check.
    ///
    /// # Errors
    ///
    /// Same as [`AccountStore::append`], plus `DuplicateUsername`.
    pub fn insert(&self, account: Account, unique_username: bool) -> Result<Account, LedgerError> {
        let _gate = self.lock_gate();

        {
            let index = self.read_index();
            if index.get(&account.account_no).is_some() {
                return Err(LedgerError::duplicate_account(&account.account_no));
            }
            if unique_username && index.username_taken(&account.username) {
                return Err(LedgerError::duplicate_username(&account.username));
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)?;
        let len = file.metadata()?.len();

        let mut writer = BufWriter::new(&file);
        // A file edited by hand may lack the final newline
        if len > 0 && !ends_with_newline(&file)? {
            writer.write_all(b"\n")?;
        }
        append_account_row(&account, len == 0, &mut writer)?;
        writer.flush()?;
        drop(writer);
        file.sync_all()?;

        self.write_index().push(account.clone());
        info!(
            "Registered account {} ({})",
            account.account_no, account.username
        );
        Ok(account)
    }

    /// Write the full account file, substituting `overrides`, via temp file and rename
    fn persist(&self, overrides: &[Account]) -> Result<(), LedgerError> {
        let tmp_path = self.temp_path();
        {
            let index = self.read_index();
            let file = File::create(&tmp_path)?;
            let mut writer = AccountFileWriter::new(BufWriter::new(&file))?;
            for slot in &index.layout {
                match slot {
                    Slot::Account(pos) => {
                        let account = &index.accounts[*pos];
                        let account = overrides
                            .iter()
                            .find(|o| o.account_no == account.account_no)
                            .unwrap_or(account);
                        writer.write_account(account)?;
                    }
                    Slot::Kept(record) => writer.write_raw(record)?,
                }
            }
            writer.finish()?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn lock_gate(&self) -> MutexGuard<'_, ()> {
        self.write_gate
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn read_index(&self) -> RwLockReadGuard<'_, AccountIndex> {
        self.index.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_index(&self) -> RwLockWriteGuard<'_, AccountIndex> {
        self.index.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn ends_with_newline(mut file: &File) -> io::Result<bool> {
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}
