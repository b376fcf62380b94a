//! Ledger Server Library
//! # Overview
//!
//! This library provides a socket-reachable payment ledger: it authenticates
//! users, moves money between accounts, handles cash withdrawals and
//! deposits, and keeps an append-only history of every committed operation.
//! State lives in two plain files, a CSV account file and a block-structured
//! transaction log.
//!
//! # Architecture
//!
//! The system is organized into several key components:
//!
//! - [`types`] - Core data types (Account, TransactionRecord, LedgerError, etc.)
//! - [`cli`] - CLI arguments parsing and offline admin reports
//! - [`core`] - Business logic components:
//!   - [`core::account_store`] - Indexed, persisted account set with a single writer gate
//!   - [`core::transaction_log`] - Append-only log with lazy filtered scans
//!   - [`core::ledger`] - Transfer, withdraw/deposit, lookups, authentication, registration
//! - [`io`] - Account file CSV handling and log block format
//! - [`server`] - TCP accept loop, line protocol, per-connection workers
//!
//! # Operations
//!
//! - **Transfer**: Debit one account and credit another atomically
//! - **Withdraw**: Debit an account against the `ATM` cash endpoint (requires sufficient balance)
//! - **Deposit**: Credit an account from the `ATM` cash endpoint
//! - **Lookups**: Balance, recipient name, transaction history
//! - **Identity**: Authenticate, register, duplicate username check
//!
//! # Guarantees
//!
//! - Balances never go negative
//! - A transfer's debit and credit are never observed separately
//! - Every committed mutation has exactly one log record, written before success is reported

// Module declarations
pub mod cli;
pub mod core;
pub mod io;
pub mod server;
pub mod types;

pub use core::{AccountStore, Ledger, LedgerConfig, TransactionLog, TransferReceipt};
pub use server::{LedgerServer, ServerConfig};
pub use types::{
    Account, AccountNo, LedgerError, Role, TransactionRecord, TransactionStatus, TransactionType,
};
