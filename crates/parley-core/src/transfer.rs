//! Transfer session accounting.
//!
//! A [`TransferSession`] counts the bytes of one upload or download against
//! the size declared in its header. It never moves past the declared size:
//! surplus input is cut off and reported back to the caller. The same type
//! is used by the server sinks and by the client worker.

use crate::error::TransferError;

/// Which way the payload flows, seen from the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferDirection {
    /// Client sends the file to the server
    Upload,
    /// Server sends the file to the client
    Download,
}

impl TransferDirection {
    /// Lowercase label for logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Upload => "upload",
            Self::Download => "download",
        }
    }
}

/// Coarse progress state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// More bytes expected
    InProgress,
    /// Declared size reached
    Complete,
}

/// Byte accounting for a single transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferSession {
    direction: TransferDirection,
    filename: String,
    declared_size: u64,
    bytes_moved: u64,
}

impl TransferSession {
    /// Create a session with nothing moved yet.
    pub fn new(
        direction: TransferDirection,
        filename: impl Into<String>,
        declared_size: u64,
    ) -> Self {
        Self { direction, filename: filename.into(), declared_size, bytes_moved: 0 }
    }

    /// Upload session.
    pub fn upload(filename: impl Into<String>, declared_size: u64) -> Self {
        Self::new(TransferDirection::Upload, filename, declared_size)
    }

    /// Download session.
    pub fn download(filename: impl Into<String>, declared_size: u64) -> Self {
        Self::new(TransferDirection::Download, filename, declared_size)
    }

    /// Transfer direction.
    pub fn direction(&self) -> TransferDirection {
        self.direction
    }

    /// Filename from the header.
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Size announced in the header.
    pub fn declared_size(&self) -> u64 {
        self.declared_size
    }

    /// Bytes credited so far.
    pub fn bytes_moved(&self) -> u64 {
        self.bytes_moved
    }

    /// Bytes still expected.
    pub fn remaining(&self) -> u64 {
        self.declared_size - self.bytes_moved
    }

    /// True once the declared size has been reached.
    pub fn is_complete(&self) -> bool {
        self.bytes_moved == self.declared_size
    }

    /// Current status.
    pub fn status(&self) -> SessionStatus {
        if self.is_complete() { SessionStatus::Complete } else { SessionStatus::InProgress }
    }

    /// Largest read that cannot overshoot the declared size.
    pub fn next_read_len(&self, cap: usize) -> usize {
        usize::try_from(self.remaining()).map_or(cap, |remaining| remaining.min(cap))
    }

    /// Credit up to `n` bytes. Returns how many were actually credited.
    pub fn credit(&mut self, n: u64) -> u64 {
        let credited = n.min(self.remaining());
        self.bytes_moved += credited;
        credited
    }

    /// Credit a chunk and return the prefix that belongs to this transfer.
    ///
    /// Bytes past the declared size are not part of the file.
    pub fn accept<'a>(&mut self, chunk: &'a [u8]) -> &'a [u8] {
        let credited = self.credit(chunk.len() as u64);
        &chunk[..credited as usize]
    }

    /// Close the books on this session.
    ///
    /// # Errors
    ///
    /// - `TransferError::SizeMismatch` if fewer bytes than declared moved
    pub fn finish(&self) -> Result<u64, TransferError> {
        if self.is_complete() {
            Ok(self.bytes_moved)
        } else {
            Err(TransferError::SizeMismatch {
                moved: self.bytes_moved,
                expected: self.declared_size,
            })
        }
    }

    /// Error describing a peer close at the current position.
    pub fn premature_closure(&self) -> TransferError {
        TransferError::PrematureClosure {
            received: self.bytes_moved,
            expected: self.declared_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accept_truncates_surplus() {
        let mut session = TransferSession::upload("a.txt", 5);

        assert_eq!(session.accept(b"abc"), b"abc");
        assert_eq!(session.accept(b"defgh"), b"de");
        assert!(session.is_complete());
        assert_eq!(session.accept(b"ijk"), b"");
        assert_eq!(session.finish(), Ok(5));
    }

    #[test]
    fn next_read_len_never_overshoots() {
        let mut session = TransferSession::download("a.bin", 10);
        assert_eq!(session.next_read_len(4096), 10);

        session.credit(7);
        assert_eq!(session.next_read_len(4096), 3);
        assert_eq!(session.next_read_len(2), 2);
    }

    #[test]
    fn short_transfer_reports_mismatch() {
        let mut session = TransferSession::download("a.bin", 10);
        session.credit(4);

        assert_eq!(session.status(), SessionStatus::InProgress);
        assert_eq!(session.finish(), Err(TransferError::SizeMismatch { moved: 4, expected: 10 }));
        assert_eq!(session.premature_closure(), TransferError::PrematureClosure {
            received: 4,
            expected: 10
        });
    }
}
