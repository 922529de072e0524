//! Parley core logic.
//!
//! Everything in this crate is Sans-IO: no sockets, no files, no clocks.
//! State machines consume already-parsed input and return actions for a
//! runtime to execute, which keeps them deterministic and easy to test.
//!
//! # Components
//!
//! - [`ClientRegistry`]: table of live connections, generic over the
//!   outbound handle so the runtime picks its own queue type
//! - [`ChatConnection`]: per-connection handler state machine
//! - [`TransferSession`]: byte accounting for one upload or download
//! - [`TransferError`]: failure taxonomy shared by server and client
//!
//! # Action pattern
//!
//! ```text
//! read buffer ──> Message::classify ──> ChatConnection::handle_message
//!                                              │
//!                                              ↓
//!                                    Vec<ConnectionAction>
//!                                              │
//!                       runtime executes: broadcast, name, transfer, close
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod connection;
pub mod error;
pub mod registry;
pub mod transfer;

pub use connection::{ChatConnection, ConnectionAction, ConnectionState, display_name};
pub use error::{ConnectionError, TransferError};
pub use registry::{ClientEntry, ClientRegistry, ConnectionId};
pub use transfer::{SessionStatus, TransferDirection, TransferSession};
