//! Relay state shared by every connection.

use std::{net::SocketAddr, sync::Arc};

use parley_core::ConnectionId;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    sync::mpsc,
};

use crate::{config::ServerConfig, files::FileStore, handler, registry::SharedRegistry};

struct RelayInner {
    registry: SharedRegistry,
    files: FileStore,
    config: ServerConfig,
}

/// Cheaply cloneable handle to the relay: registry, file store and config.
///
/// Transport-agnostic. [`Relay::accept`] takes any duplex byte stream, which
/// lets the same handler run over tokio TCP, in-memory pipes, or a simulated
/// network.
#[derive(Clone)]
pub struct Relay {
    inner: Arc<RelayInner>,
}

impl Relay {
    /// Create relay state from a configuration.
    pub fn new(config: ServerConfig) -> Self {
        let files = FileStore::new(config.files_dir.clone());
        Self { inner: Arc::new(RelayInner { registry: SharedRegistry::new(), files, config }) }
    }

    /// Shared client registry.
    pub fn registry(&self) -> &SharedRegistry {
        &self.inner.registry
    }

    /// File store root.
    pub fn files(&self) -> &FileStore {
        &self.inner.files
    }

    /// Relay configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    /// Register an accepted stream and spawn its handler task.
    ///
    /// The connection is fully registered (address and outbound queue) before
    /// the handler starts, so broadcasts never see a half-built entry.
    pub async fn accept<S>(&self, stream: S, peer: SocketAddr) -> ConnectionId
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(self.config().outbound_queue_capacity.max(1));
        let id = self.registry().register(peer, tx).await;
        tracing::info!(conn = %id, %peer, "connection accepted");

        let relay = self.clone();
        tokio::spawn(handler::run(stream, id, rx, relay));

        id
    }
}
