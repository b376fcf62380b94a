//! Append-only transaction log
//!
//! This module provides the `TransactionLog` struct, which appends one block
//! per committed operation and serves filtered scans over the history.
//!
//! # Thread Safety
//!
//! Appends and scans share one mutex, separate from the account store's
//! writer gate. A scan holds the mutex for as long as its [`LogScan`]
//! iterator is alive, so it can never observe half of a block that is being
//! written. Each append writes its whole block with a single `write_all` and
//! syncs before returning.

use crate::io::log_format::{format_transaction_block, parse_transaction_block, Blocks};
use crate::types::{LedgerError, TransactionRecord};
use log::warn;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Transaction log backed by a block-structured text file
#[derive(Debug)]
pub struct TransactionLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl TransactionLog {
    /// Create a log handle for `path`
    ///
    /// The file is created on the first append; a missing file scans as empty.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        TransactionLog {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Path of the backing log file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record as a block
    ///
    /// # Errors
    ///
    /// Returns `IoError` if the file cannot be opened, written or synced.
    pub fn append(&self, record: &TransactionRecord) -> Result<(), LedgerError> {
        let block = format_transaction_block(record);
        let _guard = self.lock();

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(block.as_bytes())?;
        file.sync_data()?;
        Ok(())
    }

    /// Lazily iterate over the raw blocks that satisfy `predicate`
    ///
    /// The returned iterator holds the log's lock until it is dropped, so
    /// appends wait for the scan to finish.
    ///
    /// # Errors
    ///
    /// Returns `IoError` if the file exists but cannot be opened. Read errors
    /// during iteration are yielded as items.
    pub fn scan<P>(&self, predicate: P) -> Result<LogScan<'_, P>, LedgerError>
    where
        P: FnMut(&str) -> bool,
    {
        let guard = self.lock();
        let blocks = match File::open(&self.path) {
            Ok(file) => Some(Blocks::new(BufReader::new(file))),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };

        Ok(LogScan {
            _guard: guard,
            blocks,
            predicate,
        })
    }

    /// Parse every block of the log into records
    ///
    /// Blocks that fail to parse are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns `IoError` if the file cannot be read.
    pub fn records(&self) -> Result<Vec<TransactionRecord>, LedgerError> {
        let mut records = Vec::new();
        for block in self.scan(|_| true)? {
            let block = block?;
            match parse_transaction_block(&block) {
                Ok(record) => records.push(record),
                Err(e) => warn!("Skipping log block: {}", e),
            }
        }
        Ok(records)
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Lazy filtered scan over the transaction log
///
/// Yields each matching block's text without the separating blank line.
pub struct LogScan<'a, P> {
    _guard: MutexGuard<'a, ()>,
    blocks: Option<Blocks<BufReader<File>>>,
    predicate: P,
}

impl<P> Iterator for LogScan<'_, P>
where
    P: FnMut(&str) -> bool,
{
    type Item = Result<String, LedgerError>;

    fn next(&mut self) -> Option<Self::Item> {
        let blocks = self.blocks.as_mut()?;
        loop {
            match blocks.next()? {
                Ok(block) if (self.predicate)(&block) => return Some(Ok(block)),
                Ok(_) => continue,
                Err(e) => return Some(Err(e.into())),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::log_format::field_value;
    use crate::types::{TransactionStatus, TransactionType};
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use std::fs;
    use std::sync::Arc;
    use std::thread;
    use tempfile::TempDir;

    fn record(sender: &str, receiver: &str, worker: &str) -> TransactionRecord {
        TransactionRecord {
            sender_name: "alice".to_string(),
            sender_acc_no: sender.to_string(),
            receiver_acc_no: receiver.to_string(),
            tx_type: TransactionType::Transfer,
            status: TransactionStatus::Success,
            timestamp: NaiveDate::from_ymd_opt(2025, 3, 1)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap(),
            amount: Decimal::new(1000, 2),
            worker_id: worker.to_string(),
        }
    }

    #[test]
    fn test_scan_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let log = TransactionLog::new(dir.path().join("transactions.txt"));
        assert_eq!(log.scan(|_| true).unwrap().count(), 0);
        assert!(log.records().unwrap().is_empty());
    }

    #[test]
    fn test_append_then_scan_filters() {
        let dir = TempDir::new().unwrap();
        let log = TransactionLog::new(dir.path().join("transactions.txt"));
        log.append(&record("1001", "1002", "worker-1")).unwrap();
        log.append(&record("1003", "1004", "worker-2")).unwrap();
        log.append(&record("1002", "1001", "worker-3")).unwrap();

        let matching: Vec<String> = log
            .scan(|block| field_value(block, "ReceiverAccNo") == Some("1001"))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(matching.len(), 1);
        assert!(matching[0].contains("Thread: worker-3,"));
        assert!(!matching[0].ends_with('\n'));
    }

    #[test]
    fn test_records_skip_corrupt_blocks() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("transactions.txt");
        let log = TransactionLog::new(&path);
        log.append(&record("1001", "1002", "worker-1")).unwrap();
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"garbage line\n\n").unwrap();
        log.append(&record("1002", "1001", "worker-2")).unwrap();

        let records = log.records().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].worker_id, "worker-2");
    }

    #[test]
    fn test_concurrent_appends_do_not_interleave() {
        let dir = TempDir::new().unwrap();
        let log = Arc::new(TransactionLog::new(dir.path().join("transactions.txt")));

        let mut handles = vec![];
        for t in 0..8 {
            let log = Arc::clone(&log);
            handles.push(thread::spawn(move || {
                for i in 0..25 {
                    log.append(&record("1001", "1002", &format!("worker-{}-{}", t, i)))
                        .unwrap();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let records = log.records().unwrap();
        assert_eq!(records.len(), 200);

        let contents = fs::read_to_string(log.path()).unwrap();
        assert_eq!(contents.matches("SenderName:").count(), 200);
    }
}
