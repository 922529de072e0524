//! Shared client registry.
//!
//! Wraps [`ClientRegistry`] in a single async mutex. Every method takes the
//! lock for the duration of one registry operation and releases it before
//! returning; nothing here touches the network.

use std::{net::SocketAddr, sync::Arc};

use bytes::Bytes;
use parley_core::{ClientRegistry, ConnectionId};
use parley_proto::UserEntry;
use tokio::sync::{Mutex, mpsc};

use crate::broadcast::{self, BroadcastReport};

/// Handle for enqueueing bytes to one connection.
pub type Outbound = mpsc::Sender<Bytes>;

/// Registry shared by the acceptor and all handler tasks.
#[derive(Debug, Clone, Default)]
pub struct SharedRegistry {
    inner: Arc<Mutex<ClientRegistry<Outbound>>>,
}

impl SharedRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an accepted connection.
    pub async fn register(&self, address: SocketAddr, outbound: Outbound) -> ConnectionId {
        self.inner.lock().await.register(address, outbound)
    }

    /// Record a display name. Returns `false` if already named.
    pub async fn set_name(&self, id: ConnectionId, name: String) -> bool {
        self.inner.lock().await.set_name(id, name)
    }

    /// Remove a connection. Returns `false` if it was not registered.
    pub async fn unregister(&self, id: ConnectionId) -> bool {
        self.inner.lock().await.unregister(id).is_some()
    }

    /// Display name of a connection.
    pub async fn name(&self, id: ConnectionId) -> Option<String> {
        self.inner.lock().await.name(id).map(str::to_string)
    }

    /// Number of live connections.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    /// True if no connection is registered.
    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }

    /// Rows for a USERLIST reply.
    pub async fn user_list(&self) -> Vec<UserEntry> {
        self.inner.lock().await.user_list()
    }

    /// Outbound handles of every live connection, in snapshot order.
    pub async fn snapshot(&self) -> Vec<(ConnectionId, Outbound)> {
        self.inner.lock().await.snapshot()
    }

    /// Enqueue `bytes` to every connection in the current snapshot.
    ///
    /// The lock is held only while the snapshot is taken.
    pub async fn broadcast(&self, bytes: Bytes) -> BroadcastReport {
        let targets = self.snapshot().await;
        broadcast::fan_out(&targets, &bytes)
    }
}
