//! Error classes of the player client
//!
//! Only [`ConnectionError`] (and a bad configuration) may stop the process.
//! Everything raised while a turn is in progress is contained to that turn.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Startup failure: the process must not enter the dispatch loop.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("could not resolve server address '{address}': {source}")]
    Resolve {
        address: String,
        #[source]
        source: io::Error,
    },
    #[error("server unreachable: {0}")]
    Io(#[from] io::Error),
    #[error("could not encode handshake: {0}")]
    Encode(#[from] bincode::Error),
    #[error("server rejected the handshake: {reason}")]
    Rejected { reason: String },
    #[error("no handshake answer within {0:?}")]
    HandshakeTimeout(std::time::Duration),
    #[error("invalid player identity: {0}")]
    InvalidIdentity(String),
}

/// Per-turn failure of the order channel.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("socket error: {0}")]
    Io(#[from] io::Error),
    #[error("could not encode orders: {0}")]
    Encode(#[from] bincode::Error),
    #[error("no acknowledgement for turn {0} in time")]
    AckTimeout(u32),
    #[error("orders for turn {0} were already sent")]
    AlreadySent(u32),
    #[error("session channel closed")]
    Closed,
}

/// Raised by a decision policy; never travels past the dispatcher.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("player {number} of the {team} team is not in the snapshot")]
    PlayerNotFound { team: shared::TeamSide, number: u32 },
    #[error("could not build order: {0}")]
    Order(#[from] shared::OrderError),
    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Error)]
pub enum ShutdownError {
    #[error("could not deliver goodbye to the server: {0}")]
    Io(#[from] io::Error),
    #[error("could not encode goodbye: {0}")]
    Encode(#[from] bincode::Error),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegisterError {
    #[error("a turn handler is already registered for this session")]
    AlreadyRegistered,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file {}: {}", .path.display(), .source)]
    Read { path: PathBuf, source: io::Error },
    #[error("could not parse config file {}: {}", .path.display(), .source)]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("player number {0} is outside the 1..=11 squad range")]
    InvalidNumber(u32),
    #[error("starting position {0:?} is off the field")]
    InvalidPosition(shared::Point),
    #[error("{0} must be greater than zero")]
    ZeroTimeout(&'static str),
}
