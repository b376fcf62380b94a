//! Ledger Server CLI
//!
//! Serves the ledger over TCP, or prints admin reports from the data directory.
//!
//! # Usage
//!
//! ```bash
//! cargo run --                                   # serve on 0.0.0.0:9999 with ./data
//! cargo run -- --data-dir /srv/ledger serve --bind 127.0.0.1:7000 --idle-timeout 60
//! cargo run -- accounts > accounts.csv
//! cargo run -- transactions --type transfer --today
//! ```
//!
//! Logging is controlled with `RUST_LOG` and defaults to `ledger_server=info`.
//!
//! # Exit Codes
//!
//! - 0: Success (server shut down cleanly, or report written)
//! - 1: Error (data directory unreadable, address in use, etc.)

use anyhow::{Context, Result};
use ledger_server::cli::{self, CliCommand};
use ledger_server::{Ledger, LedgerServer};
use log::info;
use std::env;
use std::sync::Arc;

fn main() -> Result<()> {
    if env::var_os("RUST_LOG").is_none() {
        env::set_var("RUST_LOG", "ledger_server=info");
    }
    pretty_env_logger::init();

    let args = cli::parse_args();
    let ledger = Ledger::open(&args.to_ledger_config())
        .with_context(|| format!("Failed to open ledger in {}", args.data_dir.display()))?;

    match args.command() {
        CliCommand::Serve(serve) => {
            let config = serve.to_server_config();
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(config.worker_threads)
                .enable_all()
                .build()
                .context("Failed to build runtime")?;

            runtime.block_on(async {
                let server = LedgerServer::bind(&config, Arc::new(ledger))
                    .await
                    .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
                server.run().await;
                info!("Ledger server stopped");
                Ok::<(), anyhow::Error>(())
            })
        }
        CliCommand::Accounts => {
            let mut output = std::io::stdout();
            cli::print_accounts(&ledger, &mut output).map_err(anyhow::Error::msg)
        }
        CliCommand::Transactions(filters) => {
            let mut output = std::io::stdout();
            cli::print_transactions(&ledger, &filters, &mut output).map_err(anyhow::Error::msg)
        }
    }
}
