//! Connection handler state machine.
//!
//! One instance per accepted connection. The runtime feeds it each read
//! buffer and executes the returned actions. Chat connections stay in the
//! chat states for their whole life; a transfer header moves the connection
//! into a terminal transfer state that ends with `Close`.
//!
//! # State Machine
//!
//! ```text
//! ┌─────────┐  first chat   ┌───────┐
//! │ Unnamed │──────────────>│ Named │──┐ chat / USERLIST
//! └─────────┘               └───────┘<─┘
//!      │                        │
//!      │ UPLOAD / DOWNLOAD      │ UPLOAD / DOWNLOAD
//!      ↓                        ↓
//! ┌──────────────────────────────────┐  finish_transfer  ┌────────┐
//! │ UploadActive / DownloadActive    │──────────────────>│ Closed │
//! └──────────────────────────────────┘                   └────────┘
//! ```

use bytes::Bytes;
use parley_proto::{Message, UploadHeader};

use crate::error::ConnectionError;

/// Actions returned by the connection state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionAction {
    /// Record this display name for the connection (first writer wins)
    SetName(String),

    /// Enqueue these bytes to every registered connection, sender included
    Broadcast(Bytes),

    /// Reply to this connection only with the current user list
    SendUserList,

    /// Run the upload sink on this connection
    BeginUpload(UploadHeader),

    /// Run the download source on this connection
    BeginDownload {
        /// Requested filename
        filename: String,
    },

    /// A message was dropped; log it and keep the connection open
    Warn {
        /// What was wrong with the message
        reason: String,
    },

    /// Close the connection
    Close {
        /// Reason for closing the connection
        reason: String,
    },
}

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Accepted, no chat sent yet
    Unnamed,
    /// Display name recorded
    Named,
    /// Rest of the connection is upload payload
    UploadActive,
    /// Rest of the connection is a download stream
    DownloadActive,
    /// Terminal
    Closed,
}

impl ConnectionState {
    /// True while the connection is on the chat path.
    pub fn is_chat(self) -> bool {
        matches!(self, Self::Unnamed | Self::Named)
    }
}

/// Per-connection handler state machine.
#[derive(Debug, Clone)]
pub struct ChatConnection {
    state: ConnectionState,
    joined: bool,
}

impl Default for ChatConnection {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatConnection {
    /// Create a connection in [`ConnectionState::Unnamed`].
    pub fn new() -> Self {
        Self { state: ConnectionState::Unnamed, joined: false }
    }

    /// Current state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// True once the peer has sent a chat message or a user list request
    /// and the connection is still on the chat path.
    ///
    /// Until then broadcasts stay in the outbound queue. A connection that
    /// opens with a transfer header never sees them, so nothing precedes
    /// the `ERROR` marker or the size handshake.
    pub fn receives_broadcasts(&self) -> bool {
        self.joined && self.state.is_chat()
    }

    /// Classify one read buffer and handle it.
    ///
    /// A malformed transfer header does not fail: it yields a single
    /// [`ConnectionAction::Warn`] and the state is unchanged.
    pub fn handle_read(&mut self, buf: &[u8]) -> Result<Vec<ConnectionAction>, ConnectionError> {
        self.require_chat("handle_read")?;

        match Message::classify(buf) {
            Ok(message) => self.handle_message(message),
            Err(err) => Ok(vec![ConnectionAction::Warn { reason: err.to_string() }]),
        }
    }

    /// Handle one classified message.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::InvalidState` if the connection has left the chat
    ///   path
    pub fn handle_message(
        &mut self,
        message: Message,
    ) -> Result<Vec<ConnectionAction>, ConnectionError> {
        self.require_chat("handle_message")?;

        let actions = match message {
            Message::Chat(bytes) => {
                self.joined = true;
                let mut actions = Vec::with_capacity(2);
                if self.state == ConnectionState::Unnamed {
                    // The first chat message names the connection even when
                    // its leading token is empty.
                    self.state = ConnectionState::Named;
                    actions.push(ConnectionAction::SetName(display_name(&bytes)));
                }
                actions.push(ConnectionAction::Broadcast(bytes));
                actions
            },
            Message::UserListRequest => {
                self.joined = true;
                vec![ConnectionAction::SendUserList]
            },
            Message::Upload(header) => {
                self.state = ConnectionState::UploadActive;
                vec![ConnectionAction::BeginUpload(header)]
            },
            Message::Download { filename } => {
                self.state = ConnectionState::DownloadActive;
                vec![ConnectionAction::BeginDownload { filename }]
            },
        };

        Ok(actions)
    }

    /// Transfer session ended; the connection closes.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::InvalidState` if no transfer is active
    pub fn finish_transfer(&mut self) -> Result<Vec<ConnectionAction>, ConnectionError> {
        let reason = match self.state {
            ConnectionState::UploadActive => "upload finished",
            ConnectionState::DownloadActive => "download finished",
            state => {
                return Err(ConnectionError::InvalidState { state, operation: "finish_transfer" });
            },
        };

        self.state = ConnectionState::Closed;
        Ok(vec![ConnectionAction::Close { reason: reason.to_string() }])
    }

    /// Peer disconnected or the socket failed. Idempotent.
    pub fn close(&mut self, reason: impl Into<String>) -> Vec<ConnectionAction> {
        if self.state == ConnectionState::Closed {
            return Vec::new();
        }
        self.state = ConnectionState::Closed;
        vec![ConnectionAction::Close { reason: reason.into() }]
    }

    fn require_chat(&self, operation: &'static str) -> Result<(), ConnectionError> {
        if self.state.is_chat() {
            Ok(())
        } else {
            Err(ConnectionError::InvalidState { state: self.state, operation })
        }
    }
}

/// Display name carried by a chat message: the text before the first
/// whitespace, with NUL padding removed.
pub fn display_name(text: &[u8]) -> String {
    let end = text.iter().position(u8::is_ascii_whitespace).unwrap_or(text.len());
    String::from_utf8_lossy(&text[..end]).trim_matches('\0').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_chat_names_connection() {
        let mut conn = ChatConnection::new();
        let actions = conn.handle_read(b"alice joined the chat").unwrap();

        assert_eq!(actions, vec![
            ConnectionAction::SetName("alice".to_string()),
            ConnectionAction::Broadcast(Bytes::from_static(b"alice joined the chat")),
        ]);
        assert_eq!(conn.state(), ConnectionState::Named);
    }

    #[test]
    fn second_chat_only_broadcasts() {
        let mut conn = ChatConnection::new();
        conn.handle_read(b"alice joined the chat").unwrap();

        let actions = conn.handle_read(b"bob pretends to be alice").unwrap();
        assert_eq!(actions, vec![ConnectionAction::Broadcast(Bytes::from_static(
            b"bob pretends to be alice"
        ))]);
    }

    #[test]
    fn whitespace_leading_chat_names_with_empty_token() {
        let mut conn = ChatConnection::new();
        let actions = conn.handle_read(b" hello").unwrap();

        assert_eq!(actions, vec![
            ConnectionAction::SetName(String::new()),
            ConnectionAction::Broadcast(Bytes::from_static(b" hello")),
        ]);
        assert_eq!(conn.state(), ConnectionState::Named);

        let actions = conn.handle_read(b"mallory hi").unwrap();
        assert_eq!(actions, vec![ConnectionAction::Broadcast(Bytes::from_static(b"mallory hi"))]);
    }

    #[test]
    fn userlist_keeps_state() {
        let mut conn = ChatConnection::new();
        assert_eq!(conn.handle_read(b"USERLIST").unwrap(), vec![ConnectionAction::SendUserList]);
        assert_eq!(conn.state(), ConnectionState::Unnamed);
        assert!(conn.receives_broadcasts());
    }

    #[test]
    fn broadcasts_wait_for_first_chat_path_message() {
        let mut conn = ChatConnection::new();
        assert!(!conn.receives_broadcasts());

        conn.handle_read(b"UPLOAD a.txt -5\n").unwrap();
        assert!(!conn.receives_broadcasts());

        conn.handle_read(b"alice joined the chat").unwrap();
        assert!(conn.receives_broadcasts());
    }

    #[test]
    fn transfer_connections_never_receive_broadcasts() {
        let mut conn = ChatConnection::new();
        conn.handle_read(b"DOWNLOAD nope.txt").unwrap();
        assert!(!conn.receives_broadcasts());

        conn.finish_transfer().unwrap();
        assert!(!conn.receives_broadcasts());
    }

    #[test]
    fn malformed_header_warns_and_stays_open() {
        let mut conn = ChatConnection::new();
        conn.handle_read(b"alice joined the chat").unwrap();

        let actions = conn.handle_read(b"UPLOAD a.txt -5\n").unwrap();
        assert!(matches!(actions.as_slice(), [ConnectionAction::Warn { .. }]));
        assert_eq!(conn.state(), ConnectionState::Named);
    }

    #[test]
    fn upload_is_terminal() {
        let mut conn = ChatConnection::new();
        let actions = conn.handle_read(b"UPLOAD a.txt 3\nabc").unwrap();
        assert!(matches!(actions.as_slice(), [ConnectionAction::BeginUpload(_)]));
        assert_eq!(conn.state(), ConnectionState::UploadActive);

        let err = conn.handle_read(b"more").unwrap_err();
        assert_eq!(err, ConnectionError::InvalidState {
            state: ConnectionState::UploadActive,
            operation: "handle_read",
        });

        let actions = conn.finish_transfer().unwrap();
        assert!(matches!(actions.as_slice(), [ConnectionAction::Close { .. }]));
        assert_eq!(conn.state(), ConnectionState::Closed);
    }

    #[test]
    fn download_then_finish() {
        let mut conn = ChatConnection::new();
        let actions = conn.handle_read(b"DOWNLOAD my file.txt").unwrap();
        assert_eq!(actions, vec![ConnectionAction::BeginDownload {
            filename: "my file.txt".to_string()
        }]);
        assert!(conn.finish_transfer().is_ok());
    }

    #[test]
    fn finish_without_transfer_is_rejected() {
        let mut conn = ChatConnection::new();
        assert!(conn.finish_transfer().is_err());
    }

    #[test]
    fn close_is_idempotent() {
        let mut conn = ChatConnection::new();
        assert_eq!(conn.close("eof").len(), 1);
        assert!(conn.close("eof").is_empty());
    }

    #[test]
    fn display_name_trims_padding() {
        assert_eq!(display_name(b"alice\0\0"), "alice");
        assert_eq!(display_name(b"[bob]: hi"), "[bob]:");
        assert_eq!(display_name(b""), "");
    }
}
