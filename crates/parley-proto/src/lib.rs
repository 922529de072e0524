//! Parley wire protocol.
//!
//! The relay multiplexes chat text and three control commands over one raw
//! TCP byte stream. There is no framing preamble on the wire: a single read
//! buffer is classified by literal prefix, and the legacy command forms are
//! kept byte-for-byte so older clients keep working.
//!
//! # Wire grammar
//!
//! ```text
//! client → server   USERLIST
//! client → server   UPLOAD <filename> <size>\n<raw file bytes...>
//! client → server   DOWNLOAD <filename>
//! server → client   USERLIST name1:addr1\nname2:addr2\n...
//! server → all      FILE <filename> <size>\n
//! server → client   ERROR                       (download refused)
//! server → client   <size>\n<raw file bytes...> (download handshake)
//! anything else     chat text, relayed verbatim
//! ```
//!
//! # Components
//!
//! - [`Message`]: classified inbound buffer (server side)
//! - [`Handshake`]: incremental download handshake parser (client side)
//! - [`ServerNotice`]: parsed server output on a chat connection (client side)
//! - [`encode`]: builders for every outgoing header and marker

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod encode;
pub mod errors;
mod handshake;
mod message;
mod notice;

pub use errors::{ProtocolError, Result};
pub use handshake::{Handshake, MAX_HANDSHAKE_LEN};
pub use message::{Message, UploadHeader};
pub use notice::{ServerNotice, UserEntry};

/// Upload command keyword.
pub const UPLOAD: &[u8] = b"UPLOAD";

/// Download command keyword.
pub const DOWNLOAD: &[u8] = b"DOWNLOAD";

/// User list request literal, also the prefix of the reply.
pub const USERLIST: &[u8] = b"USERLIST";

/// Prefix of the structured "file available" broadcast.
pub const FILE: &[u8] = b"FILE";

/// Marker sent instead of a handshake when a download cannot be served.
///
/// Exactly these 5 bytes are written, then the connection is closed.
pub const ERROR_MARKER: &[u8; 5] = b"ERROR";
