//! Transfer worker configuration.

use std::time::Duration;

/// Timeouts and chunk sizes for one transfer.
#[derive(Debug, Clone)]
pub struct TransferConfig {
    /// Bound on establishing the transfer connection
    pub connect_timeout: Duration,
    /// How long an upload waits for optional ack bytes after its header
    pub ack_grace: Duration,
    /// Pause between the upload header and the first payload chunk
    pub settle_delay: Duration,
    /// Bytes read from the local file per upload chunk
    pub upload_chunk_size: usize,
    /// Bound on a single write
    pub write_timeout: Duration,
    /// Bound on each read while waiting for the download handshake
    pub handshake_timeout: Duration,
    /// A download read stalled longer than this ends the transfer
    pub read_timeout: Duration,
    /// Largest single download read
    pub download_chunk_cap: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(3),
            ack_grace: Duration::from_secs(1),
            settle_delay: Duration::from_millis(100),
            upload_chunk_size: 4096,
            write_timeout: Duration::from_secs(30),
            handshake_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(60),
            download_chunk_cap: 65536,
        }
    }
}

impl TransferConfig {
    /// Short delays for tests and local development.
    pub fn development() -> Self {
        Self {
            ack_grace: Duration::from_millis(20),
            settle_delay: Duration::ZERO,
            read_timeout: Duration::from_secs(5),
            ..Self::default()
        }
    }
}
