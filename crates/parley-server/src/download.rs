//! File download source.
//!
//! Answers a download request with either the `ERROR` marker or a size
//! handshake followed by the file contents. Sends that stop making progress
//! are retried against a small stall budget instead of blocking forever.

use parley_core::{TransferError, TransferSession};
use parley_proto::encode;
use tokio::{
    fs::File,
    io::{AsyncReadExt, AsyncWrite, AsyncWriteExt},
};

use crate::{config::DownloadConfig, files::FileStore};

/// Stream `filename` from `files` to the peer.
///
/// If the file cannot be opened the `ERROR` marker is sent and
/// `LocalIo` is returned. The writer is shut down in every case.
pub async fn send_download<W>(
    writer: &mut W,
    filename: &str,
    files: &FileStore,
    config: &DownloadConfig,
) -> Result<TransferSession, TransferError>
where
    W: AsyncWrite + Unpin,
{
    let (mut file, size) = match open(files, filename).await {
        Ok(opened) => opened,
        Err(err) => {
            tracing::info!(filename, error = %err, "refusing download");
            send_all(writer, &encode::refusal(), config).await?;
            writer.shutdown().await.map_err(|e| TransferError::transport(&e))?;
            return Err(err);
        },
    };

    send_all(writer, &encode::handshake(size), config).await?;

    let mut session = TransferSession::download(filename, size);
    let mut buf = vec![0u8; config.chunk_size.max(1)];
    loop {
        let n = file.read(&mut buf).await.map_err(|e| TransferError::local_io(&e))?;
        if n == 0 {
            break;
        }

        let chunk = session.accept(&buf[..n]);
        send_all(writer, chunk, config).await?;
        tracing::debug!(filename, moved = session.bytes_moved(), total = size, "download chunk");

        if session.is_complete() {
            break;
        }
        tokio::time::sleep(config.chunk_delay).await;
    }

    writer.flush().await.map_err(|e| TransferError::transport(&e))?;
    writer.shutdown().await.map_err(|e| TransferError::transport(&e))?;
    session.finish()?;

    Ok(session)
}

async fn open(files: &FileStore, filename: &str) -> Result<(File, u64), TransferError> {
    let path = files.resolve(filename)?;
    let file = File::open(&path).await.map_err(|e| TransferError::local_io(&e))?;
    let metadata = file.metadata().await.map_err(|e| TransferError::local_io(&e))?;
    if !metadata.is_file() {
        return Err(TransferError::LocalIo(format!("{} is not a regular file", path.display())));
    }
    Ok((file, metadata.len()))
}

/// Write all of `data`, counting consecutive sends that make no progress
/// within `send_retry_delay`.
async fn send_all<W>(
    writer: &mut W,
    mut data: &[u8],
    config: &DownloadConfig,
) -> Result<(), TransferError>
where
    W: AsyncWrite + Unpin,
{
    let mut stalls = 0u32;
    while !data.is_empty() {
        match tokio::time::timeout(config.send_retry_delay, writer.write(data)).await {
            Ok(Ok(0)) => {
                return Err(TransferError::Transport("peer stopped accepting data".to_string()));
            },
            Ok(Ok(n)) => {
                data = &data[n..];
                stalls = 0;
            },
            Ok(Err(e)) => return Err(TransferError::transport(&e)),
            Err(_) => {
                stalls += 1;
                tracing::debug!(stalls, "download send stalled");
                if stalls > config.send_retry_limit {
                    return Err(TransferError::Timeout { operation: "download send" });
                }
            },
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn fast_config() -> DownloadConfig {
        DownloadConfig { chunk_delay: Duration::ZERO, ..DownloadConfig::default() }
    }

    #[tokio::test]
    async fn missing_file_sends_error_marker() {
        let dir = tempfile::tempdir().unwrap();
        let files = FileStore::new(dir.path());
        let (mut server, mut client) = tokio::io::duplex(64);

        let err = send_download(&mut server, "nope.txt", &files, &fast_config()).await.unwrap_err();
        assert!(matches!(err, TransferError::LocalIo(_)));

        let mut received = Vec::new();
        client.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, b"ERROR");
    }

    #[tokio::test]
    async fn streams_handshake_then_payload() {
        let dir = tempfile::tempdir().unwrap();
        let payload: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        std::fs::write(dir.path().join("big.bin"), &payload).unwrap();
        let files = FileStore::new(dir.path());
        let (mut server, mut client) = tokio::io::duplex(8192);

        let reader = tokio::spawn(async move {
            let mut received = Vec::new();
            client.read_to_end(&mut received).await.unwrap();
            received
        });

        let config = DownloadConfig { chunk_size: 4096, ..fast_config() };
        let session = send_download(&mut server, "big.bin", &files, &config).await.unwrap();
        drop(server);

        assert_eq!(session.bytes_moved(), payload.len() as u64);
        let received = reader.await.unwrap();
        let mut expected = format!("{}\n", payload.len()).into_bytes();
        expected.extend_from_slice(&payload);
        assert_eq!(received, expected);
    }

    #[tokio::test]
    async fn stalled_peer_exhausts_retry_budget() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("big.bin"), vec![7u8; 64 * 1024]).unwrap();
        let files = FileStore::new(dir.path());
        let (mut server, _client) = tokio::io::duplex(1024);

        let config = DownloadConfig {
            send_retry_delay: Duration::from_millis(5),
            send_retry_limit: 3,
            ..fast_config()
        };
        let err = send_download(&mut server, "big.bin", &files, &config).await.unwrap_err();
        assert_eq!(err, TransferError::Timeout { operation: "download send" });
    }
}
