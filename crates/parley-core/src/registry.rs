//! Client registry.
//!
//! Tracks every accepted, not yet closed connection together with its peer
//! address, optional display name, and outbound handle. Entries are keyed by
//! a monotonically increasing [`ConnectionId`], so iterating the map visits
//! connections in accept order. That order is the snapshot order used by
//! broadcast.
//!
//! The registry is plain data. The runtime wraps it in one async mutex and
//! every operation here runs inside that critical section.

use std::{collections::BTreeMap, fmt, net::SocketAddr};

use parley_proto::UserEntry;

/// Identifier assigned to a connection at accept time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Wrap a raw id.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw id value.
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Registry entry for one live connection.
#[derive(Debug, Clone)]
pub struct ClientEntry<T> {
    /// Remote address of the peer
    pub address: SocketAddr,
    /// Display name, set at most once
    pub name: Option<String>,
    /// Handle used to enqueue outbound bytes for this connection
    pub outbound: T,
}

/// Table of live connections.
///
/// `T` is the outbound handle type. The server uses a bounded channel
/// sender; tests use whatever is convenient.
#[derive(Debug)]
pub struct ClientRegistry<T> {
    clients: BTreeMap<ConnectionId, ClientEntry<T>>,
    next_id: u64,
}

impl<T> Default for ClientRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ClientRegistry<T> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self { clients: BTreeMap::new(), next_id: 1 }
    }

    /// Register a freshly accepted connection and return its id.
    ///
    /// Ids are never reused within one registry.
    pub fn register(&mut self, address: SocketAddr, outbound: T) -> ConnectionId {
        let id = ConnectionId(self.next_id);
        self.next_id += 1;
        self.clients.insert(id, ClientEntry { address, name: None, outbound });
        id
    }

    /// Set the display name of a connection.
    ///
    /// Returns `false` without changing anything if the connection is
    /// unknown or already named.
    pub fn set_name(&mut self, id: ConnectionId, name: impl Into<String>) -> bool {
        match self.clients.get_mut(&id) {
            Some(entry) if entry.name.is_none() => {
                entry.name = Some(name.into());
                true
            },
            _ => false,
        }
    }

    /// Remove a connection. Returns its entry if it was registered.
    pub fn unregister(&mut self, id: ConnectionId) -> Option<ClientEntry<T>> {
        self.clients.remove(&id)
    }

    /// Entry for a connection. `None` if not registered.
    pub fn get(&self, id: ConnectionId) -> Option<&ClientEntry<T>> {
        self.clients.get(&id)
    }

    /// Display name of a connection. `None` if unknown or unnamed.
    pub fn name(&self, id: ConnectionId) -> Option<&str> {
        self.clients.get(&id).and_then(|entry| entry.name.as_deref())
    }

    /// Check if a connection is registered.
    pub fn contains(&self, id: ConnectionId) -> bool {
        self.clients.contains_key(&id)
    }

    /// Number of live connections.
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// True if no connection is registered.
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Rows for a user list reply, in snapshot order.
    ///
    /// The address column is the peer IP only. Unnamed connections have an
    /// empty name.
    pub fn user_list(&self) -> Vec<UserEntry> {
        self.clients
            .values()
            .map(|entry| UserEntry {
                name: entry.name.clone().unwrap_or_default(),
                address: entry.address.ip().to_string(),
            })
            .collect()
    }
}

impl<T: Clone> ClientRegistry<T> {
    /// Outbound handles of all live connections, in snapshot order.
    pub fn snapshot(&self) -> Vec<(ConnectionId, T)> {
        self.clients.iter().map(|(id, entry)| (*id, entry.outbound.clone())).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(last: u8) -> SocketAddr {
        SocketAddr::from(([10, 0, 0, last], 40000 + u16::from(last)))
    }

    #[test]
    fn register_assigns_increasing_ids() {
        let mut registry = ClientRegistry::new();
        let a = registry.register(addr(1), ());
        let b = registry.register(addr(2), ());

        assert!(a < b);
        assert_eq!(registry.len(), 2);
        assert_eq!(a.to_string(), "conn-1");
    }

    #[test]
    fn name_is_set_once() {
        let mut registry = ClientRegistry::new();
        let id = registry.register(addr(1), ());

        assert!(registry.set_name(id, "alice"));
        assert!(!registry.set_name(id, "mallory"));
        assert_eq!(registry.name(id), Some("alice"));
    }

    #[test]
    fn set_name_on_unknown_connection_fails() {
        let mut registry: ClientRegistry<()> = ClientRegistry::new();
        assert!(!registry.set_name(ConnectionId::new(7), "ghost"));
    }

    #[test]
    fn unregister_removes_entry() {
        let mut registry = ClientRegistry::new();
        let id = registry.register(addr(1), "queue");

        let entry = registry.unregister(id).unwrap();
        assert_eq!(entry.outbound, "queue");
        assert!(registry.is_empty());
        assert!(registry.unregister(id).is_none());
    }

    #[test]
    fn user_list_in_accept_order_with_ip_only() {
        let mut registry = ClientRegistry::new();
        let a = registry.register(addr(1), ());
        registry.register(addr(2), ());
        registry.set_name(a, "alice");

        let list = registry.user_list();
        assert_eq!(list, vec![
            UserEntry { name: "alice".to_string(), address: "10.0.0.1".to_string() },
            UserEntry { name: String::new(), address: "10.0.0.2".to_string() },
        ]);
    }

    #[test]
    fn snapshot_skips_closed_connections() {
        let mut registry = ClientRegistry::new();
        let a = registry.register(addr(1), 'a');
        let b = registry.register(addr(2), 'b');
        let c = registry.register(addr(3), 'c');
        registry.unregister(b);

        assert_eq!(registry.snapshot(), vec![(a, 'a'), (c, 'c')]);
    }
}
