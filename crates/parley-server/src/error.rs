//! Server error types.

use std::fmt;

use parley_core::{ConnectionError, TransferError};

/// Errors that can occur in the server.
#[derive(Debug)]
pub enum ServerError {
    /// Configuration error (unusable bind address, missing files directory,
    /// zero capacities).
    ///
    /// Fatal at startup. Fix configuration and restart.
    Config(String),

    /// Transport/network error (accept failure, socket I/O error).
    ///
    /// Fatal for the connection it happened on. From `Server::run`, fatal
    /// for the server.
    Transport(String),

    /// Internal error (handler state machine misuse).
    ///
    /// Should never happen in correct implementation. Indicates a bug.
    Internal(String),

    /// A transfer session on this connection failed.
    ///
    /// Covers malformed or rejected filenames, local file errors, and peers
    /// that disconnect before the declared size. Only that connection is
    /// affected.
    Transfer(TransferError),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration error: {msg}"),
            Self::Transport(msg) => write!(f, "transport error: {msg}"),
            Self::Internal(msg) => write!(f, "internal error: {msg}"),
            Self::Transfer(err) => write!(f, "transfer failed: {err}"),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Transfer(err) => Some(err),
            _ => None,
        }
    }
}

impl From<TransferError> for ServerError {
    fn from(err: TransferError) -> Self {
        Self::Transfer(err)
    }
}

impl From<ConnectionError> for ServerError {
    fn from(err: ConnectionError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<std::io::Error> for ServerError {
    fn from(err: std::io::Error) -> Self {
        Self::Transport(err.to_string())
    }
}
