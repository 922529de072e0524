//! Error types for the Parley core.
//!
//! Connection errors are state-machine misuse by the runtime. Transfer errors
//! describe why a single upload or download session ended early; they never
//! affect any other connection.

use std::io;

use parley_proto::ProtocolError;
use thiserror::Error;

use crate::connection::ConnectionState;

/// Errors from the connection handler state machine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// Operation not valid in the current state
    #[error("invalid state transition: cannot {operation} from {state:?}")]
    InvalidState {
        /// Current state when error occurred
        state: ConnectionState,
        /// Operation that was attempted
        operation: &'static str,
    },
}

/// Reasons a transfer session failed.
///
/// The `Display` form is the human-readable reason surfaced to the UI in
/// `Failed{reason}` events.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    /// Could not establish the transfer connection
    #[error("could not connect to {addr}: {reason}")]
    Connect {
        /// Address we tried to reach
        addr: String,
        /// Underlying failure
        reason: String,
    },

    /// Local file could not be opened, read, or written
    #[error("local file error: {0}")]
    LocalIo(String),

    /// Malformed header or handshake
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Server answered with the `ERROR` marker
    #[error("server refused the transfer (file missing or unreadable)")]
    Peer,

    /// An await point exceeded its deadline
    #[error("timed out during {operation}")]
    Timeout {
        /// What was being waited on
        operation: &'static str,
    },

    /// Socket error in the middle of a transfer
    #[error("transport error: {0}")]
    Transport(String),

    /// Peer closed the connection before the declared size was reached
    #[error("connection closed after {received} of {expected} bytes")]
    PrematureClosure {
        /// Bytes received before the close
        received: u64,
        /// Declared transfer size
        expected: u64,
    },

    /// Byte count does not match the declared size
    #[error("incomplete transfer: moved {moved} of {expected} bytes")]
    SizeMismatch {
        /// Bytes actually moved
        moved: u64,
        /// Declared transfer size
        expected: u64,
    },

    /// Transfer was cancelled by its owner
    #[error("transfer cancelled")]
    Cancelled,
}

impl TransferError {
    /// Wrap a local file error.
    pub fn local_io(err: &io::Error) -> Self {
        Self::LocalIo(err.to_string())
    }

    /// Wrap a socket error.
    pub fn transport(err: &io::Error) -> Self {
        Self::Transport(err.to_string())
    }

    /// Returns true if the session ended because the peer went away.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, Self::PrematureClosure { .. } | Self::Transport(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancelled_reason_text() {
        assert_eq!(TransferError::Cancelled.to_string(), "transfer cancelled");
    }

    #[test]
    fn protocol_error_converts() {
        let err: TransferError = ProtocolError::InvalidSize("0".to_string()).into();
        assert_eq!(err.to_string(), "protocol error: invalid size: \"0\"");
    }

    #[test]
    fn io_helpers_keep_message() {
        let io = io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed");
        assert_eq!(TransferError::transport(&io), TransferError::Transport("pipe closed".into()));
        assert!(TransferError::transport(&io).is_disconnect());
        assert!(!TransferError::local_io(&io).is_disconnect());
    }
}
