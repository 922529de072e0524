//! Builders for outgoing headers and server notices.
//!
//! Every builder returns an owned [`Bytes`] so the result can be fanned out to
//! many connection queues without copying.

use bytes::{BufMut, Bytes, BytesMut};

use crate::{ERROR_MARKER, notice::UserEntry};

/// `UPLOAD <filename> <size>\n`, sent by a client before the file payload.
pub fn upload_header(filename: &str, size: u64) -> Bytes {
    Bytes::from(format!("UPLOAD {filename} {size}\n"))
}

/// `DOWNLOAD <filename>`, sent by a client on a fresh connection.
pub fn download_request(filename: &str) -> Bytes {
    Bytes::from(format!("DOWNLOAD {filename}"))
}

/// `FILE <filename> <size>\n`, broadcast once an upload is committed.
pub fn file_notice(filename: &str, size: u64) -> Bytes {
    Bytes::from(format!("FILE {filename} {size}\n"))
}

/// Human-readable companion of [`file_notice`].
pub fn upload_notice(filename: &str) -> Bytes {
    Bytes::from(format!("uploaded: {filename}\n"))
}

/// `USERLIST name:addr\n...` reply. Unnamed clients have an empty name.
pub fn user_list_reply(entries: &[UserEntry]) -> Bytes {
    let mut buf = BytesMut::with_capacity(16 + entries.len() * 24);
    buf.put_slice(b"USERLIST ");
    for entry in entries {
        buf.put_slice(entry.name.as_bytes());
        buf.put_u8(b':');
        buf.put_slice(entry.address.as_bytes());
        buf.put_u8(b'\n');
    }
    buf.freeze()
}

/// `<size>\n`, the success handshake that precedes download payload.
pub fn handshake(size: u64) -> Bytes {
    Bytes::from(format!("{size}\n"))
}

/// The download refusal marker.
pub fn refusal() -> Bytes {
    Bytes::from_static(ERROR_MARKER)
}
