use crate::core::LedgerConfig;
use crate::server::{ServerConfig, DEFAULT_IDLE_TIMEOUT_SECS};
use crate::types::TransactionType;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Payment ledger server
#[derive(Parser, Debug)]
#[command(name = "ledger-server")]
#[command(about = "Serve and inspect a payment ledger", long_about = None)]
pub struct CliArgs {
    /// Directory holding users.txt and transactions.txt
    #[arg(
        long = "data-dir",
        value_name = "DIR",
        default_value = "data",
        env = "LEDGER_DATA_DIR",
        global = true,
        help = "Directory holding the account file and transaction log"
    )]
    pub data_dir: PathBuf,

    #[command(subcommand)]
    pub command: Option<CliCommand>,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum CliCommand {
    /// Accept client connections (default)
    Serve(ServeArgs),

    /// Print every account as CSV
    Accounts,

    /// Print logged transactions as CSV, newest first
    Transactions(TransactionsArgs),
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct ServeArgs {
    /// Address to listen on
    #[arg(
        long = "bind",
        value_name = "ADDR",
        default_value = "0.0.0.0:9999",
        env = "LEDGER_BIND",
        help = "Address to listen on"
    )]
    pub bind: String,

    /// Idle timeout in seconds
    #[arg(
        long = "idle-timeout",
        value_name = "SECS",
        default_value_t = DEFAULT_IDLE_TIMEOUT_SECS,
        env = "LEDGER_IDLE_TIMEOUT",
        help = "Close connections idle for this many seconds (0 disables)"
    )]
    pub idle_timeout_secs: u64,

    /// Runtime worker threads
    #[arg(
        long = "workers",
        value_name = "COUNT",
        env = "LEDGER_WORKERS",
        help = "Runtime worker threads (default: CPU cores)"
    )]
    pub workers: Option<usize>,

    /// Reject registrations with a taken username
    #[arg(
        long = "enforce-unique-usernames",
        help = "Reject registrations whose username is already taken, ignoring case"
    )]
    pub enforce_unique_usernames: bool,
}

impl Default for ServeArgs {
    fn default() -> Self {
        ServeArgs {
            bind: ServerConfig::default().bind_addr,
            idle_timeout_secs: DEFAULT_IDLE_TIMEOUT_SECS,
            workers: None,
            enforce_unique_usernames: false,
        }
    }
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct TransactionsArgs {
    /// Only show this transaction type
    #[arg(long = "type", value_name = "TYPE", help = "Only show this transaction type")]
    pub tx_type: Option<TypeFilter>,

    /// Only show today's transactions
    #[arg(long = "today", help = "Only show transactions from today (local time)")]
    pub today: bool,
}

/// Serve options on their own, for running without a subcommand
#[derive(Parser, Debug)]
struct ImplicitServe {
    #[command(flatten)]
    serve: ServeArgs,
}

/// Transaction type filter for the admin report
#[derive(Clone, Copy, Debug, PartialEq, ValueEnum)]
pub enum TypeFilter {
    Transfer,
    Withdraw,
    Deposit,
}

impl From<TypeFilter> for TransactionType {
    fn from(filter: TypeFilter) -> Self {
        match filter {
            TypeFilter::Transfer => TransactionType::Transfer,
            TypeFilter::Withdraw => TransactionType::Withdraw,
            TypeFilter::Deposit => TransactionType::Deposit,
        }
    }
}

impl CliArgs {
    /// The selected subcommand, `serve` when none was given
    ///
    /// An implicit `serve` still honours the `LEDGER_*` environment variables.
    pub fn command(&self) -> CliCommand {
        self.command.clone().unwrap_or_else(|| {
            let serve = ImplicitServe::try_parse_from(["ledger-server"])
                .map(|implicit| implicit.serve)
                .unwrap_or_default();
            CliCommand::Serve(serve)
        })
    }

    /// Ledger configuration from the data directory and serve options
    pub fn to_ledger_config(&self) -> LedgerConfig {
        let enforce_unique_usernames = match &self.command {
            Some(CliCommand::Serve(serve)) => serve.enforce_unique_usernames,
            _ => false,
        };
        LedgerConfig {
            data_dir: self.data_dir.clone(),
            enforce_unique_usernames,
        }
    }
}

impl ServeArgs {
    /// Create a ServerConfig from the serve options
    ///
    /// Unset values fall back to defaults; invalid values are replaced with
    /// defaults and a warning is logged.
    pub fn to_server_config(&self) -> ServerConfig {
        ServerConfig::new(
            self.bind.clone(),
            self.idle_timeout_secs,
            self.workers.unwrap_or_else(num_cpus::get),
        )
    }
}
