//! Connection dispatcher
//!
//! Accepts TCP connections and serves the line protocol over them.
//!
//! # Architecture
//!
//! ```text
//!   TcpListener ──accept──► tokio task per connection (worker-N)
//!                               │
//!                               ├─ LinesCodec ─► Session ─► Frame
//!                               │
//!                               ├─ spawn_blocking ─► Dispatcher ─► Ledger
//!                               │
//!                               └─ Response lines ─► LinesCodec
//! ```
//!
//! # Components
//!
//! - `protocol` - Command keywords, request decoding and response encoding
//! - `session` - Per-connection framing state machine
//! - `dispatcher` - Maps requests to ledger operations and errors to failure tokens
//! - `registry` - Live worker tracking
//! - `connection` - The per-connection read/dispatch/write loop

pub mod connection;
pub mod dispatcher;
pub mod protocol;
pub mod registry;
pub mod session;

pub use dispatcher::Dispatcher;
pub use protocol::{Command, Request, Response};
pub use registry::{WorkerGuard, WorkerRegistry};
pub use session::{Frame, Session};

use crate::core::Ledger;
use crate::types::LedgerError;
use log::{error, info, warn};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

/// Default idle timeout in seconds
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 300;

/// Pause after a failed accept
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Server configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    /// Address to listen on
    pub bind_addr: String,

    /// Close a connection after this long without a line; `None` waits forever
    pub idle_timeout: Option<Duration>,

    /// Runtime worker threads
    pub worker_threads: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind_addr: "0.0.0.0:9999".to_string(),
            idle_timeout: Some(Duration::from_secs(DEFAULT_IDLE_TIMEOUT_SECS)),
            worker_threads: num_cpus::get(),
        }
    }
}

impl ServerConfig {
    /// Create a configuration, validating the values
    ///
    /// An idle timeout of zero disables the timeout. A worker thread count of
    /// zero falls back to the number of CPUs with a warning.
    ///
    /// # Arguments
    ///
    /// * `bind_addr` - Address to listen on, e.g. `0.0.0.0:9999`
    /// * `idle_timeout_secs` - Idle timeout in seconds
    /// * `worker_threads` - Runtime worker threads
    pub fn new(bind_addr: impl Into<String>, idle_timeout_secs: u64, worker_threads: usize) -> Self {
        let default = ServerConfig::default();

        let worker_threads = if worker_threads == 0 {
            warn!(
                "worker threads must be at least 1, using default {}",
                default.worker_threads
            );
            default.worker_threads
        } else {
            worker_threads
        };

        let idle_timeout = (idle_timeout_secs > 0).then(|| Duration::from_secs(idle_timeout_secs));

        ServerConfig {
            bind_addr: bind_addr.into(),
            idle_timeout,
            worker_threads,
        }
    }
}

/// A bound ledger server
pub struct LedgerServer {
    listener: TcpListener,
    dispatcher: Dispatcher,
    registry: Arc<WorkerRegistry>,
    idle_timeout: Option<Duration>,
}

impl LedgerServer {
    /// Bind the listening socket
    ///
    /// # Errors
    ///
    /// Returns `IoError` if the address cannot be bound.
    pub async fn bind(config: &ServerConfig, ledger: Arc<Ledger>) -> Result<Self, LedgerError> {
        let listener = TcpListener::bind(&config.bind_addr).await?;
        Ok(LedgerServer {
            listener,
            dispatcher: Dispatcher::new(ledger),
            registry: Arc::new(WorkerRegistry::new()),
            idle_timeout: config.idle_timeout,
        })
    }

    /// Address the server is listening on
    pub fn local_addr(&self) -> Result<SocketAddr, LedgerError> {
        Ok(self.listener.local_addr()?)
    }

    pub fn registry(&self) -> &Arc<WorkerRegistry> {
        &self.registry
    }

    /// Accept connections until `shutdown` completes
    ///
    /// Each connection runs on its own task. Accept errors are logged and do
    /// not stop the loop; the next accept waits briefly.
    pub async fn serve_until<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        info!(
            "Ledger server listening on {}",
            self.listener
                .local_addr()
                .map(|a| a.to_string())
                .unwrap_or_else(|_| "<unknown>".to_string())
        );

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let worker = self.registry.register(peer);
                        tokio::spawn(connection::handle_connection(
                            stream,
                            peer,
                            self.dispatcher.clone(),
                            worker,
                            self.idle_timeout,
                        ));
                    }
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                        // Errors such as EMFILE persist until a connection closes
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    }
                },
                _ = &mut shutdown => break,
            }
        }

        let active = self.registry.active_workers();
        info!("Shutting down with {} active connections", active.len());
        for (id, peer) in active {
            info!("  {} ({})", id, peer);
        }
    }

    /// Accept connections until Ctrl-C
    pub async fn run(self) {
        self.serve_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
    }
}
