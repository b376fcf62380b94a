//! Per-connection request framing
//!
//! A `Session` turns the stream of lines read from one connection into
//! complete request frames.
//!
//! ```text
//!                 keyword line                 blank line
//! AwaitingCommand ───────────► ReadingPayload ───────────► (frame) ─┐
//!       ▲   │ blank lines                  │ payload lines          │
//!       │   └──┘ ignored                   └──┘ collected           │
//!       └───────────────────────────────────────────────────────────┘
//! ```
//!
//! Clients sometimes send extra blank lines after a payload; those arrive
//! while awaiting a command and are skipped. An unrecognised keyword still
//! collects its payload so the reply comes after the whole block.
//!
//! A block may carry at most [`MAX_PAYLOAD_LINES`] payload lines. A longer
//! block is an error and the connection is expected to close.

use super::protocol::{Command, Response};
use crate::types::LedgerError;

/// Most payload lines accepted in one block; the largest request uses 3
pub const MAX_PAYLOAD_LINES: usize = 8;

/// A complete request block
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Known command with its payload lines
    Request {
        command: Command,
        payload: Vec<String>,
    },

    /// Keyword that is not part of the protocol
    Unknown { keyword: String },
}

impl Frame {
    /// Response to send if this frame cannot be served
    pub fn failure(&self) -> Response {
        match self {
            Frame::Request { command, .. } => command.failure(),
            Frame::Unknown { .. } => Response::UnknownCommand,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    AwaitingCommand,
    ReadingPayload {
        keyword: String,
        payload: Vec<String>,
    },
}

/// Line-driven framing state machine for one connection
#[derive(Debug)]
pub struct Session {
    state: SessionState,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Session {
            state: SessionState::AwaitingCommand,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Whether a partially read block is pending
    pub fn in_block(&self) -> bool {
        matches!(self.state, SessionState::ReadingPayload { .. })
    }

    /// Feed one line (without its terminator)
    ///
    /// Returns a frame when `line` completes a block.
    ///
    /// # Errors
    ///
    /// Returns `ParseError` when a block grows past [`MAX_PAYLOAD_LINES`].
    /// The pending block is discarded.
    pub fn feed(&mut self, line: &str) -> Result<Option<Frame>, LedgerError> {
        let blank = line.trim().is_empty();

        let frame = match &mut self.state {
            SessionState::AwaitingCommand if blank => None,
            SessionState::AwaitingCommand => {
                self.state = SessionState::ReadingPayload {
                    keyword: line.trim().to_string(),
                    payload: Vec::new(),
                };
                None
            }
            SessionState::ReadingPayload { keyword, payload } if !blank => {
                if payload.len() >= MAX_PAYLOAD_LINES {
                    let message = format!(
                        "{} block exceeds {} payload lines",
                        keyword, MAX_PAYLOAD_LINES
                    );
                    self.state = SessionState::AwaitingCommand;
                    return Err(LedgerError::parse(message));
                }
                payload.push(line.trim().to_string());
                None
            }
            SessionState::ReadingPayload { .. } => {
                match std::mem::replace(&mut self.state, SessionState::AwaitingCommand) {
                    SessionState::ReadingPayload { keyword, payload } => {
                        Some(match Command::from_keyword(&keyword) {
                            Some(command) => Frame::Request { command, payload },
                            None => Frame::Unknown { keyword },
                        })
                    }
                    SessionState::AwaitingCommand => None,
                }
            }
        };
        Ok(frame)
    }
}
