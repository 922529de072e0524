//! Parley client.
//!
//! The initiating side of the relay protocol: a [`ChatSession`] for the
//! long-lived chat connection and a transfer worker that uploads or
//! downloads one file per fresh connection.
//!
//! # Transfers
//!
//! ```text
//! spawn_transfer ──> worker task ──connect──> relay
//!        │                │
//!        │                ├─ UPLOAD <name> <size>\n, then chunks
//!        │                └─ DOWNLOAD <name>, handshake, then chunks
//!        ↓
//! TransferHandle: next_event() / pause() / resume() / cancel() / wait()
//! ```
//!
//! Events follow the order `Started`, zero or more `Progress`, then exactly
//! one of `Completed` or `Failed`. A failure before the connection is up
//! skips `Started`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod chat;
mod config;
mod event;
pub mod net;
mod progress;
mod worker;

pub use chat::{ChatError, ChatSession};
pub use config::TransferConfig;
pub use event::TransferEvent;
pub use parley_core::TransferError;
pub use progress::{ProgressSample, format_throughput};
pub use worker::{TransferHandle, TransferRequest, spawn_transfer};
