//! Protocol error types.

use thiserror::Error;

/// Result alias for codec operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors produced while parsing headers, handshakes, or filenames.
///
/// None of these are fatal for a chat connection. They fail the transfer
/// session the header tried to start and nothing else.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Header shape is wrong (e.g. keyword not followed by a separator)
    #[error("malformed {command} header: {reason}")]
    MalformedHeader {
        /// Command the header belongs to
        command: &'static str,
        /// What was wrong with it
        reason: &'static str,
    },

    /// Header carries no filename
    #[error("missing filename in {command} header")]
    MissingFilename {
        /// Command the header belongs to
        command: &'static str,
    },

    /// UPLOAD header carries no declared size
    #[error("missing declared size in UPLOAD header")]
    MissingSize,

    /// Declared or announced size is zero, negative, or not a number
    #[error("invalid size: {0:?}")]
    InvalidSize(String),

    /// Header bytes are not UTF-8
    #[error("{command} header is not valid UTF-8")]
    InvalidUtf8 {
        /// Command the header belongs to
        command: &'static str,
    },

    /// Filename cannot be used as a flat name inside the file store
    #[error("invalid filename {name:?}: {reason}")]
    InvalidFilename {
        /// Offending name
        name: String,
        /// Why it was rejected
        reason: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ProtocolError::InvalidSize("-5".to_string());
        assert_eq!(err.to_string(), "invalid size: \"-5\"");

        let err = ProtocolError::MissingFilename { command: "DOWNLOAD" };
        assert_eq!(err.to_string(), "missing filename in DOWNLOAD header");
    }
}
