//! Connection worker
//!
//! One task per accepted connection. It reads lines through a `LinesCodec`,
//! feeds them to a [`Session`], hands each complete frame to the
//! [`Dispatcher`] on the blocking pool and writes the response lines back.
//!
//! The loop ends when the peer closes, on a read or write error, when a
//! request block is too long, or when no line arrives within the idle
//! timeout. Requests are never retried.

use super::dispatcher::Dispatcher;
use super::registry::WorkerGuard;
use super::session::Session;
use futures::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::codec::{Framed, LinesCodec};

/// Longest accepted line in bytes
pub const MAX_LINE_LENGTH: usize = 64 * 1024;

/// Serve one connection until it closes
pub async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    dispatcher: Dispatcher,
    worker: WorkerGuard,
    idle_timeout: Option<Duration>,
) {
    let worker_id = worker.id().to_string();
    info!("[{}] Connected: {}", worker_id, peer);

    let mut lines = Framed::new(stream, LinesCodec::new_with_max_length(MAX_LINE_LENGTH));
    let mut session = Session::new();

    loop {
        let next = match idle_timeout {
            Some(limit) => match timeout(limit, lines.next()).await {
                Ok(next) => next,
                Err(_) => {
                    warn!(
                        "[{}] Idle for {}s, closing {}",
                        worker_id,
                        limit.as_secs(),
                        peer
                    );
                    break;
                }
            },
            None => lines.next().await,
        };

        let line = match next {
            Some(Ok(line)) => line,
            Some(Err(e)) => {
                warn!("[{}] Read error from {}: {}", worker_id, peer, e);
                break;
            }
            None => break,
        };

        let frame = match session.feed(&line) {
            Ok(Some(frame)) => frame,
            Ok(None) => continue,
            Err(e) => {
                warn!("[{}] Closing {}: {}", worker_id, peer, e);
                break;
            }
        };

        let failure = frame.failure();
        let task_dispatcher = dispatcher.clone();
        let task_worker_id = worker_id.clone();
        let response =
            match tokio::task::spawn_blocking(move || task_dispatcher.dispatch(frame, &task_worker_id))
                .await
            {
                Ok(response) => response,
                Err(e) => {
                    error!("[{}] Request task failed: {}", worker_id, e);
                    failure
                }
            };

        // The codec terminates the last line; inner lines are joined with '\n'
        if let Err(e) = lines.send(response.lines().join("\n")).await {
            warn!("[{}] Write error to {}: {}", worker_id, peer, e);
            break;
        }
    }

    if session.in_block() {
        debug!("[{}] Discarding incomplete request from {}", worker_id, peer);
    }
    info!("[{}] Disconnected: {}", worker_id, peer);
}
