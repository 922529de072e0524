//! Server configuration.

use std::{path::PathBuf, time::Duration};

use crate::error::ServerError;

/// Default listen address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:9999";

/// Size of the per-connection read buffer. One read is one message.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 65536;

/// Messages a connection's outbound queue holds before broadcasts to it are
/// dropped.
pub const DEFAULT_OUTBOUND_QUEUE_CAPACITY: usize = 256;

/// Download stream chunk size.
pub const DEFAULT_CHUNK_SIZE: usize = 65536;

/// How long one send may make no progress before it counts as a stall.
pub const DEFAULT_SEND_RETRY_DELAY: Duration = Duration::from_millis(50);

/// Consecutive stalls tolerated before a download is aborted.
pub const DEFAULT_SEND_RETRY_LIMIT: u32 = 10;

/// Pause between download chunks.
pub const DEFAULT_CHUNK_DELAY: Duration = Duration::from_micros(500);

/// Download source tuning.
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    /// Bytes read from disk and sent per chunk
    pub chunk_size: usize,
    /// Deadline for a single send to make progress
    pub send_retry_delay: Duration,
    /// Consecutive stalled sends before giving up
    pub send_retry_limit: u32,
    /// Throttle between chunks
    pub chunk_delay: Duration,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            send_retry_delay: DEFAULT_SEND_RETRY_DELAY,
            send_retry_limit: DEFAULT_SEND_RETRY_LIMIT,
            chunk_delay: DEFAULT_CHUNK_DELAY,
        }
    }
}

/// Relay configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to (e.g., "0.0.0.0:9999")
    pub bind_address: String,
    /// Directory uploads are stored in and downloads are served from
    pub files_dir: PathBuf,
    /// Capacity of each connection's outbound queue
    pub outbound_queue_capacity: usize,
    /// Read buffer size per connection
    pub read_buffer_size: usize,
    /// Abort an upload whose peer sends nothing for this long. `None` waits
    /// forever.
    pub upload_idle_timeout: Option<Duration>,
    /// Download source tuning
    pub download: DownloadConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            files_dir: PathBuf::from("."),
            outbound_queue_capacity: DEFAULT_OUTBOUND_QUEUE_CAPACITY,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            upload_idle_timeout: None,
            download: DownloadConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Default configuration storing files under `files_dir`.
    pub fn with_files_dir(files_dir: impl Into<PathBuf>) -> Self {
        Self { files_dir: files_dir.into(), ..Self::default() }
    }

    /// Reject values the runtime cannot work with.
    pub fn validate(&self) -> Result<(), ServerError> {
        if self.outbound_queue_capacity == 0 {
            return Err(ServerError::Config("outbound queue capacity must be nonzero".into()));
        }
        if self.read_buffer_size == 0 || self.download.chunk_size == 0 {
            return Err(ServerError::Config("buffer and chunk sizes must be nonzero".into()));
        }
        if !self.files_dir.is_dir() {
            return Err(ServerError::Config(format!(
                "files directory {} does not exist",
                self.files_dir.display()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_protocol_constants() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_address, "0.0.0.0:9999");
        assert_eq!(config.read_buffer_size, 65536);
        assert_eq!(config.download.send_retry_limit, 10);
        assert!(config.upload_idle_timeout.is_none());
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config =
            ServerConfig { outbound_queue_capacity: 0, ..ServerConfig::with_files_dir(dir.path()) };
        assert!(matches!(config.validate(), Err(ServerError::Config(_))));
    }

    #[test]
    fn missing_files_dir_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig::with_files_dir(dir.path().join("nope"));
        assert!(matches!(config.validate(), Err(ServerError::Config(_))));
        assert!(ServerConfig::with_files_dir(dir.path()).validate().is_ok());
    }
}
