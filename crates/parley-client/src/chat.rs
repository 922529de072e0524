//! Chat session.
//!
//! The long-lived connection a chat UI holds. The server names a connection
//! after the first token of its first chat message, so the session opens
//! with a join greeting that starts with the username.

use std::{io, time::Duration};

use parley_proto::{ServerNotice, USERLIST};
use thiserror::Error;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
};

use crate::net;

/// Read buffer for server output.
const RECV_BUFFER_SIZE: usize = 65536;

/// Chat session errors.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Could not reach the relay.
    #[error("could not connect to {addr}: {source}")]
    Connect {
        /// Relay address
        addr: String,
        /// Underlying failure
        source: io::Error,
    },

    /// Username unusable as a display name.
    #[error("invalid username {0:?}: must be non-empty with no whitespace or ':'")]
    InvalidName(String),

    /// Socket error on an established session.
    #[error("chat connection error: {0}")]
    Io(#[from] io::Error),
}

/// A username becomes the first token of the greeting and a `name:addr`
/// row in user list replies, so it cannot contain whitespace or `:`.
fn is_valid_username(name: &str) -> bool {
    !name.is_empty() && !name.chars().any(|c| c.is_whitespace() || c == ':')
}

/// Connected chat session.
#[derive(Debug)]
pub struct ChatSession {
    stream: TcpStream,
    username: String,
    buf: Vec<u8>,
}

impl ChatSession {
    /// Connect and send the join greeting.
    pub async fn connect(
        addr: &str,
        username: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ChatError> {
        let username = username.into();
        if !is_valid_username(&username) {
            return Err(ChatError::InvalidName(username));
        }

        let stream = net::connect(addr, timeout)
            .await
            .map_err(|source| ChatError::Connect { addr: addr.to_string(), source })?;

        let mut session = Self { stream, username, buf: vec![0u8; RECV_BUFFER_SIZE] };
        let greeting = format!("{} joined the chat", session.username);
        session.stream.write_all(greeting.as_bytes()).await?;
        tracing::info!(username = %session.username, "joined chat");

        Ok(session)
    }

    /// Display name this session announced.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Send `[username]: text`.
    pub async fn send_chat(&mut self, text: &str) -> Result<(), ChatError> {
        let line = format!("[{}]: {text}", self.username);
        self.stream.write_all(line.as_bytes()).await?;
        Ok(())
    }

    /// Ask the server for the user list. The reply arrives via
    /// [`ChatSession::recv`].
    pub async fn request_user_list(&mut self) -> Result<(), ChatError> {
        self.stream.write_all(USERLIST).await?;
        Ok(())
    }

    /// Wait for the next read from the server.
    ///
    /// Returns `None` once the server has closed the connection.
    pub async fn recv(&mut self) -> Result<Option<Vec<ServerNotice>>, ChatError> {
        let n = self.stream.read(&mut self.buf).await?;
        if n == 0 {
            return Ok(None);
        }
        Ok(Some(ServerNotice::parse_all(&self.buf[..n])))
    }

    /// Send the leave greeting and close the connection.
    pub async fn leave(mut self) -> Result<(), ChatError> {
        let farewell = format!("{} left the chat", self.username);
        self.stream.write_all(farewell.as_bytes()).await?;
        self.stream.shutdown().await?;
        tracing::info!(username = %self.username, "left chat");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usernames_are_single_tokens_without_colons() {
        assert!(is_valid_username("alice"));
        assert!(is_valid_username("[bob]"));
        assert!(!is_valid_username(""));
        assert!(!is_valid_username("two words"));
        assert!(!is_valid_username("a:b"));
    }
}
