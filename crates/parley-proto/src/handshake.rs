//! Download handshake parsing.
//!
//! The server answers a download request either with the five bytes `ERROR`
//! or with `<size>\n` followed immediately by payload. TCP may split the
//! handshake across reads or coalesce it with the first payload bytes, so
//! [`Handshake::parse`] is called on the accumulated prefix until it returns
//! `Some`.

use bytes::Bytes;

use crate::{
    ERROR_MARKER,
    errors::{ProtocolError, Result},
    message::parse_size,
};

/// Longest handshake line accepted before a newline must have been seen.
///
/// `u64::MAX` is 20 digits; anything past this bound cannot be a size.
pub const MAX_HANDSHAKE_LEN: usize = 32;

/// Parsed server reply to a download request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Handshake {
    /// Server will stream `size` bytes
    Size {
        /// Announced payload length
        size: u64,
        /// Payload bytes that arrived in the same read as the handshake
        leftover: Bytes,
    },

    /// Server refused the request (file missing or unreadable)
    Refused,
}

impl Handshake {
    /// Parse the handshake from the bytes received so far.
    ///
    /// Returns `Ok(None)` while more input is needed.
    ///
    /// # Errors
    ///
    /// - `InvalidSize` if the line is not a positive decimal number
    /// - `MalformedHeader` if no newline appears within
    ///   [`MAX_HANDSHAKE_LEN`] bytes
    pub fn parse(buf: &[u8]) -> Result<Option<Self>> {
        if buf.starts_with(ERROR_MARKER) {
            return Ok(Some(Self::Refused));
        }
        if ERROR_MARKER.starts_with(buf) {
            return Ok(None);
        }

        let Some(pos) = buf.iter().position(|&b| b == b'\n') else {
            if buf.len() > MAX_HANDSHAKE_LEN {
                return Err(ProtocolError::MalformedHeader {
                    command: "DOWNLOAD",
                    reason: "handshake line too long",
                });
            }
            return Ok(None);
        };

        let line = std::str::from_utf8(&buf[..pos])
            .map_err(|_| ProtocolError::InvalidUtf8 { command: "DOWNLOAD" })?;
        let size = parse_size(line.trim())?;

        Ok(Some(Self::Size { size, leftover: Bytes::copy_from_slice(&buf[pos + 1..]) }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refusal_is_recognized_once_complete() {
        assert_eq!(Handshake::parse(b"").unwrap(), None);
        assert_eq!(Handshake::parse(b"ERR").unwrap(), None);
        assert_eq!(Handshake::parse(b"ERROR").unwrap(), Some(Handshake::Refused));
    }

    #[test]
    fn size_with_coalesced_payload() {
        let parsed = Handshake::parse(b"11\nhello world").unwrap();
        assert_eq!(
            parsed,
            Some(Handshake::Size { size: 11, leftover: Bytes::from_static(b"hello world") })
        );
    }

    #[test]
    fn partial_size_needs_more_input() {
        assert_eq!(Handshake::parse(b"123").unwrap(), None);
    }

    #[test]
    fn zero_or_garbage_size_is_rejected() {
        assert!(matches!(Handshake::parse(b"0\n"), Err(ProtocolError::InvalidSize(_))));
        assert!(matches!(Handshake::parse(b"abc\n"), Err(ProtocolError::InvalidSize(_))));
    }

    #[test]
    fn unterminated_line_is_bounded() {
        let long = [b'1'; MAX_HANDSHAKE_LEN + 1];
        assert!(matches!(
            Handshake::parse(&long),
            Err(ProtocolError::MalformedHeader { .. })
        ));
    }
}
