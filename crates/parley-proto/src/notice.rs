//! Parsing of server output on a chat connection.

use crate::USERLIST;

/// One row of a user list: display name and peer IP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserEntry {
    /// Display name, empty if the connection never sent chat
    pub name: String,
    /// Peer IP address as text
    pub address: String,
}

/// Something the server sent on a chat connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerNotice {
    /// A file was committed to the server's store and can be downloaded
    FileAvailable {
        /// Stored filename
        filename: String,
        /// Size in bytes
        size: u64,
    },

    /// Reply to a user list request
    UserList(Vec<UserEntry>),

    /// Relayed chat text or a human-readable notice
    Chat(String),
}

impl ServerNotice {
    /// Split one read from a chat connection into notices.
    ///
    /// Text is split on newlines. A `FILE` line with a valid size becomes
    /// [`ServerNotice::FileAvailable`]. A `USERLIST ` reply consumes the rest
    /// of the buffer. Everything else is chat.
    pub fn parse_all(buf: &[u8]) -> Vec<Self> {
        let mut notices = Vec::new();
        let mut rest = buf;

        while !rest.is_empty() {
            if let Some(list) = rest.strip_prefix(USERLIST).and_then(|r| r.strip_prefix(b" ")) {
                notices.push(Self::UserList(parse_entries(list)));
                break;
            }

            let (line, tail) = match rest.iter().position(|&b| b == b'\n') {
                Some(pos) => (&rest[..pos], &rest[pos + 1..]),
                None => (rest, &[][..]),
            };
            rest = tail;

            let line = String::from_utf8_lossy(line);
            let line = line.trim_end_matches(['\r', '\0']);
            if line.is_empty() {
                continue;
            }

            notices.push(parse_file_line(line).unwrap_or_else(|| Self::Chat(line.to_string())));
        }

        notices
    }
}

fn parse_file_line(line: &str) -> Option<ServerNotice> {
    let body = line.strip_prefix("FILE ")?;
    let (filename, size) = body.rsplit_once(' ')?;
    let size = size.parse::<u64>().ok()?;
    if filename.is_empty() {
        return None;
    }
    Some(ServerNotice::FileAvailable { filename: filename.to_string(), size })
}

fn parse_entries(list: &[u8]) -> Vec<UserEntry> {
    String::from_utf8_lossy(list)
        .split('\n')
        .map(|row| row.trim_end_matches(['\r', '\0']))
        .filter(|row| !row.is_empty())
        .map(|row| match row.split_once(':') {
            Some((name, address)) => {
                UserEntry { name: name.to_string(), address: address.to_string() }
            },
            None => UserEntry { name: row.to_string(), address: String::new() },
        })
        .collect()
}
