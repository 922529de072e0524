//! Classification of inbound buffers.
//!
//! One read from a connection is one message. Classification is by literal
//! prefix with priority `UPLOAD` > `DOWNLOAD` > exact `USERLIST` > chat.

use bytes::Bytes;

use crate::{
    DOWNLOAD, UPLOAD, USERLIST,
    errors::{ProtocolError, Result},
};

/// Parsed `UPLOAD <filename> <size>` header.
///
/// # Invariants
///
/// - `declared_size > 0`
/// - `leftover` holds exactly the bytes that followed the header newline in
///   the buffer the header arrived in. They are file payload and must be
///   credited to the transfer before anything else is read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadHeader {
    /// Destination filename (a single whitespace-free token)
    pub filename: String,
    /// Number of payload bytes the client announced
    pub declared_size: u64,
    /// Payload bytes already consumed together with the header
    pub leftover: Bytes,
}

/// A classified inbound buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Plain chat text, relayed verbatim
    Chat(Bytes),

    /// Start of an upload; the rest of the connection is file payload
    Upload(UploadHeader),

    /// Request to stream a stored file back on this connection
    Download {
        /// Requested filename, verbatim (may contain spaces)
        filename: String,
    },

    /// Request for the current user list
    UserListRequest,
}

impl Message {
    /// Classify one read buffer.
    ///
    /// # Errors
    ///
    /// - `ProtocolError` if the buffer starts with a transfer keyword but the
    ///   header is malformed. Chat and `USERLIST` never fail.
    pub fn classify(buf: &[u8]) -> Result<Self> {
        if buf.starts_with(UPLOAD) {
            parse_upload(buf).map(Self::Upload)
        } else if buf.starts_with(DOWNLOAD) {
            parse_download(buf).map(|filename| Self::Download { filename })
        } else if buf == USERLIST {
            Ok(Self::UserListRequest)
        } else {
            Ok(Self::Chat(Bytes::copy_from_slice(buf)))
        }
    }

    /// Short name of the message kind, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Chat(_) => "chat",
            Self::Upload(_) => "upload",
            Self::Download { .. } => "download",
            Self::UserListRequest => "userlist",
        }
    }
}

fn parse_upload(buf: &[u8]) -> Result<UploadHeader> {
    let (line, leftover) = match buf.iter().position(|&b| b == b'\n') {
        Some(pos) => (&buf[..pos], &buf[pos + 1..]),
        None => (buf, &[][..]),
    };
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    let line =
        std::str::from_utf8(line).map_err(|_| ProtocolError::InvalidUtf8 { command: "UPLOAD" })?;

    let mut tokens = line.split_whitespace();
    if tokens.next() != Some("UPLOAD") {
        return Err(ProtocolError::MalformedHeader {
            command: "UPLOAD",
            reason: "keyword must be followed by a separator",
        });
    }

    let filename = tokens.next().ok_or(ProtocolError::MissingFilename { command: "UPLOAD" })?;
    let declared_size = parse_size(tokens.next().ok_or(ProtocolError::MissingSize)?)?;

    Ok(UploadHeader {
        filename: filename.to_string(),
        declared_size,
        leftover: Bytes::copy_from_slice(leftover),
    })
}

fn parse_download(buf: &[u8]) -> Result<String> {
    let Some((&separator, rest)) = buf[DOWNLOAD.len()..].split_first() else {
        return Err(ProtocolError::MissingFilename { command: "DOWNLOAD" });
    };
    if !separator.is_ascii_whitespace() {
        return Err(ProtocolError::MalformedHeader {
            command: "DOWNLOAD",
            reason: "keyword must be followed by a separator",
        });
    }

    let name = trim_terminators(rest);
    if name.is_empty() {
        return Err(ProtocolError::MissingFilename { command: "DOWNLOAD" });
    }

    std::str::from_utf8(name)
        .map(str::to_string)
        .map_err(|_| ProtocolError::InvalidUtf8 { command: "DOWNLOAD" })
}

/// Parse a decimal size token. Zero, negative and non-numeric are rejected.
pub(crate) fn parse_size(token: &str) -> Result<u64> {
    match token.parse::<u64>() {
        Ok(0) | Err(_) => Err(ProtocolError::InvalidSize(token.to_string())),
        Ok(size) => Ok(size),
    }
}

/// Strip trailing line terminators and NUL padding.
fn trim_terminators(mut bytes: &[u8]) -> &[u8] {
    while let [rest @ .., b'\r' | b'\n' | 0] = bytes {
        bytes = rest;
    }
    bytes
}
