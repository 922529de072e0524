//! Parley relay server.
//!
//! Tokio runtime around [`parley_core`]'s state machines: accepts TCP
//! connections, relays chat to every connected client, and serves file
//! uploads and downloads on dedicated connections using the same wire
//! grammar.
//!
//! # Architecture
//!
//! ```text
//! Server::run ──accept──> Relay::accept ──register──> SharedRegistry
//!                               │
//!                               └─spawn──> handler task (one per connection)
//!                                            │  select! { read, outbound }
//!                                            ├─ chat      → broadcast (enqueue to every queue)
//!                                            ├─ USERLIST  → unicast reply
//!                                            ├─ UPLOAD    → upload sink → FILE notice broadcast
//!                                            └─ DOWNLOAD  → download source
//! ```
//!
//! # Components
//!
//! - [`Server`]: listener and accept loop
//! - [`Relay`]: shared state handle; transport-agnostic accept
//! - [`SharedRegistry`]: client registry behind one async mutex
//! - [`FileStore`]: flat directory uploads land in and downloads come from

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod broadcast;
mod config;
pub mod download;
mod error;
mod files;
mod handler;
mod registry;
mod relay;
pub mod upload;

use std::{io, net::SocketAddr};

pub use broadcast::BroadcastReport;
pub use config::{
    DEFAULT_BIND_ADDRESS, DEFAULT_OUTBOUND_QUEUE_CAPACITY, DownloadConfig, ServerConfig,
};
pub use error::ServerError;
pub use files::{FileStore, validate_filename};
pub use registry::{Outbound, SharedRegistry};
pub use relay::Relay;
use tokio::net::TcpListener;

/// Parley relay server bound to a TCP listener.
pub struct Server {
    listener: TcpListener,
    relay: Relay,
}

impl Server {
    /// Validate the configuration and bind the listener.
    pub async fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        config.validate()?;

        let listener = TcpListener::bind(&config.bind_address).await.map_err(|e| {
            ServerError::Config(format!("cannot bind {}: {e}", config.bind_address))
        })?;

        Ok(Self { listener, relay: Relay::new(config) })
    }

    /// Local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Shared relay state, e.g. for inspecting the registry.
    pub fn relay(&self) -> &Relay {
        &self.relay
    }

    /// Accept connections until a non-transient accept error occurs.
    pub async fn run(self) -> Result<(), ServerError> {
        tracing::info!("Server starting on {}", self.local_addr()?);

        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    if let Err(e) = stream.set_nodelay(true) {
                        tracing::debug!(%peer, "set_nodelay failed: {e}");
                    }
                    self.relay.accept(stream, peer).await;
                },
                Err(e) if is_transient(&e) => {
                    tracing::warn!("Accept interrupted: {e}");
                },
                Err(e) => {
                    tracing::error!("Accept error: {e}");
                    return Err(e.into());
                },
            }
        }
    }
}

fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::Interrupted
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::WouldBlock
    )
}
