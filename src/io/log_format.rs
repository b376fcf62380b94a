//! Block format of the transaction log
//!
//! Each record is written as one block: one `Key: value,` line per field,
//! followed by a blank line.
//!
//! ```text
//! SenderName: alice,
//! SenderAccNo: 1001,
//! ReceiverAccNo: 1002,
//! Type: TRANSFER,
//! Status: Success,
//! DateTime: 2025-01-31 14:05:09,
//! Amount: 30.00,
//! Thread: worker-3,
//!
//! ```
//!
//! The same `Key: value` line shape is used by request payloads, so
//! [`parse_key_value`] is shared with the protocol decoder.

use crate::types::{
    format_amount, parse_amount, LedgerError, TransactionRecord, TIMESTAMP_FORMAT,
};
use chrono::NaiveDateTime;
use std::io::{self, BufRead};

/// Split a `Key: value,` line into its trimmed key and value
///
/// A single trailing comma on the value is dropped. Returns `None` when the
/// line has no colon.
pub fn parse_key_value(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once(':')?;
    let value = value.trim();
    let value = value.strip_suffix(',').unwrap_or(value).trim_end();
    Some((key.trim(), value))
}

/// Value of the first line in `block` whose key equals `key`
pub fn field_value<'a>(block: &'a str, key: &str) -> Option<&'a str> {
    block
        .lines()
        .filter_map(parse_key_value)
        .find(|(k, _)| *k == key)
        .map(|(_, v)| v)
}

/// Render a record as a log block, including the terminating blank line
pub fn format_transaction_block(record: &TransactionRecord) -> String {
    format!(
        "SenderName: {},\n\
         SenderAccNo: {},\n\
         ReceiverAccNo: {},\n\
         Type: {},\n\
         Status: {},\n\
         DateTime: {},\n\
         Amount: {},\n\
         Thread: {},\n\n",
        record.sender_name,
        record.sender_acc_no,
        record.receiver_acc_no,
        record.tx_type,
        record.status,
        record.timestamp.format(TIMESTAMP_FORMAT),
        format_amount(record.amount),
        record.worker_id,
    )
}

/// Parse one log block back into a record
///
/// Unknown keys are ignored; every known key must be present.
///
/// # Errors
///
/// Returns `ParseError` naming the first missing or malformed field.
pub fn parse_transaction_block(block: &str) -> Result<TransactionRecord, LedgerError> {
    let require = |key: &str| {
        field_value(block, key).ok_or_else(|| LedgerError::parse(format!("Missing {}", key)))
    };

    let tx_type = require("Type")?.parse().map_err(LedgerError::parse)?;
    let status = require("Status")?.parse().map_err(LedgerError::parse)?;

    let raw_timestamp = require("DateTime")?;
    let timestamp = NaiveDateTime::parse_from_str(raw_timestamp, TIMESTAMP_FORMAT)
        .map_err(|e| LedgerError::parse(format!("Invalid DateTime '{}': {}", raw_timestamp, e)))?;

    Ok(TransactionRecord {
        sender_name: require("SenderName")?.to_string(),
        sender_acc_no: require("SenderAccNo")?.to_string(),
        receiver_acc_no: require("ReceiverAccNo")?.to_string(),
        tx_type,
        status,
        timestamp,
        amount: parse_amount(require("Amount")?)?,
        worker_id: require("Thread")?.to_string(),
    })
}

/// Iterator over the blocks of a log
///
/// Yields each block's lines joined with `\n`, without the separating blank
/// line. Runs of blank lines are collapsed and a final block without a
/// trailing blank line is still yielded.
pub struct Blocks<R> {
    reader: R,
    line: String,
}

impl<R: BufRead> Blocks<R> {
    pub fn new(reader: R) -> Self {
        Blocks {
            reader,
            line: String::new(),
        }
    }
}

impl<R: BufRead> Iterator for Blocks<R> {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut block = String::new();
        loop {
            self.line.clear();
            match self.reader.read_line(&mut self.line) {
                Ok(0) => return (!block.is_empty()).then_some(Ok(block)),
                Ok(_) => {
                    let line = self.line.trim_end_matches(['\r', '\n']);
                    if line.trim().is_empty() {
                        if !block.is_empty() {
                            return Some(Ok(block));
                        }
                        continue;
                    }
                    if !block.is_empty() {
                        block.push('\n');
                    }
                    block.push_str(line);
                }
                Err(e) => return Some(Err(e)),
            }
        }
    }
}
