//! File upload sink.
//!
//! Receives exactly `declared_size` bytes into the file store. The leftover
//! bytes that arrived with the header are written first; after that the sink
//! never reads more than the remaining byte count, so nothing past the
//! payload is consumed from the connection.

use std::time::Duration;

use parley_core::{TransferError, TransferSession};
use parley_proto::UploadHeader;
use tokio::{
    fs::File,
    io::{AsyncRead, AsyncReadExt, AsyncWriteExt},
};

use crate::files::FileStore;

/// Receive an upload into `files`.
///
/// Returns the completed session. If the peer disconnects early the partial
/// file stays on disk and `PrematureClosure` is returned.
pub async fn receive_upload<R>(
    reader: &mut R,
    header: UploadHeader,
    files: &FileStore,
    read_buffer_size: usize,
    idle_timeout: Option<Duration>,
) -> Result<TransferSession, TransferError>
where
    R: AsyncRead + Unpin,
{
    let path = files.resolve(&header.filename)?;
    let mut file = File::create(&path).await.map_err(|e| TransferError::local_io(&e))?;
    let mut session = TransferSession::upload(header.filename, header.declared_size);

    let carried = session.accept(&header.leftover);
    if carried.len() < header.leftover.len() {
        tracing::warn!(
            filename = session.filename(),
            surplus = header.leftover.len() - carried.len(),
            "discarding bytes past declared size"
        );
    }
    file.write_all(carried).await.map_err(|e| TransferError::local_io(&e))?;

    let mut buf = vec![0u8; read_buffer_size.max(1)];
    while !session.is_complete() {
        let len = session.next_read_len(buf.len());
        let n = read_chunk(reader, &mut buf[..len], idle_timeout).await;
        let n = match n {
            Ok(0) => {
                file.flush().await.map_err(|e| TransferError::local_io(&e))?;
                return Err(session.premature_closure());
            },
            Ok(n) => n,
            Err(err) => {
                file.flush().await.map_err(|e| TransferError::local_io(&e))?;
                return Err(err);
            },
        };

        let chunk = session.accept(&buf[..n]);
        file.write_all(chunk).await.map_err(|e| TransferError::local_io(&e))?;
        tracing::debug!(
            filename = session.filename(),
            moved = session.bytes_moved(),
            total = session.declared_size(),
            "upload chunk"
        );
    }

    file.flush().await.map_err(|e| TransferError::local_io(&e))?;
    file.sync_all().await.map_err(|e| TransferError::local_io(&e))?;

    Ok(session)
}

async fn read_chunk<R>(
    reader: &mut R,
    buf: &mut [u8],
    idle_timeout: Option<Duration>,
) -> Result<usize, TransferError>
where
    R: AsyncRead + Unpin,
{
    let read = match idle_timeout {
        Some(limit) => tokio::time::timeout(limit, reader.read(buf))
            .await
            .map_err(|_| TransferError::Timeout { operation: "upload read" })?,
        None => reader.read(buf).await,
    };
    read.map_err(|e| TransferError::transport(&e))
}
