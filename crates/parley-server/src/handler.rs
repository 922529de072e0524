//! Per-connection handler task.
//!
//! Owns one accepted stream for its whole life. A single `select!` loop
//! reads from the peer and drains the connection's outbound queue, so
//! broadcasts from other tasks never write to this socket directly. The
//! queue is only drained once the peer has joined the chat path; until then
//! broadcasts wait in the queue, and a transfer connection never drains it.
//! Each read is fed to the [`ChatConnection`] state machine and the returned
//! actions are executed here.

use bytes::Bytes;
use parley_core::{ChatConnection, ConnectionAction, ConnectionId};
use parley_proto::{UploadHeader, encode};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf},
    sync::mpsc,
};

use crate::{Relay, download, error::ServerError, upload};

/// Run a connection to completion and remove it from the registry.
pub(crate) async fn run<S>(
    stream: S,
    id: ConnectionId,
    outbound: mpsc::Receiver<Bytes>,
    relay: Relay,
) where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let result = serve(stream, id, outbound, &relay).await;
    relay.registry().unregister(id).await;

    match result {
        Ok(()) => tracing::info!(conn = %id, "connection closed"),
        Err(ServerError::Transfer(err)) => {
            tracing::warn!(conn = %id, error = %err, "connection closed after failed transfer");
        },
        Err(err) => tracing::warn!(conn = %id, error = %err, "connection error"),
    }
}

/// What the read path decided.
enum Flow {
    Continue,
    Close,
}

async fn serve<S>(
    stream: S,
    id: ConnectionId,
    mut outbound: mpsc::Receiver<Bytes>,
    relay: &Relay,
) -> Result<(), ServerError>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (mut reader, mut writer) = tokio::io::split(stream);
    let mut conn = ChatConnection::new();
    let mut buf = vec![0u8; relay.config().read_buffer_size.max(1)];

    loop {
        tokio::select! {
            read = reader.read(&mut buf) => {
                let n = read?;
                if n == 0 {
                    conn.close("peer closed");
                    return Ok(());
                }
                tracing::debug!(conn = %id, bytes = n, "read");

                let actions = conn.handle_read(&buf[..n])?;
                let mut executor = Executor {
                    id,
                    conn: &mut conn,
                    reader: &mut reader,
                    writer: &mut writer,
                    relay,
                };
                if let Flow::Close = executor.execute(actions).await? {
                    return Ok(());
                }
            },
            Some(bytes) = outbound.recv(), if conn.receives_broadcasts() => {
                writer.write_all(&bytes).await?;
            },
        }
    }
}

/// Borrowed view of one connection while it executes actions.
struct Executor<'a, S> {
    id: ConnectionId,
    conn: &'a mut ChatConnection,
    reader: &'a mut ReadHalf<S>,
    writer: &'a mut WriteHalf<S>,
    relay: &'a Relay,
}

impl<S> Executor<'_, S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    async fn execute(&mut self, actions: Vec<ConnectionAction>) -> Result<Flow, ServerError> {
        let mut pending = actions;
        while !pending.is_empty() {
            let mut next = Vec::new();
            for action in pending {
                match action {
                    ConnectionAction::SetName(name) => {
                        if self.relay.registry().set_name(self.id, name.clone()).await {
                            tracing::info!(conn = %self.id, %name, "connection named");
                        }
                    },
                    ConnectionAction::Broadcast(bytes) => {
                        let report = self.relay.registry().broadcast(bytes).await;
                        tracing::debug!(
                            conn = %self.id,
                            delivered = report.delivered,
                            dropped = report.dropped,
                            "broadcast"
                        );
                    },
                    ConnectionAction::SendUserList => {
                        let entries = self.relay.registry().user_list().await;
                        self.writer.write_all(&encode::user_list_reply(&entries)).await?;
                    },
                    ConnectionAction::BeginUpload(header) => {
                        next.extend(self.upload(header).await?);
                    },
                    ConnectionAction::BeginDownload { filename } => {
                        next.extend(self.download(&filename).await?);
                    },
                    ConnectionAction::Warn { reason } => {
                        tracing::warn!(conn = %self.id, %reason, "dropping malformed message");
                    },
                    ConnectionAction::Close { reason } => {
                        tracing::debug!(conn = %self.id, %reason, "closing");
                        return Ok(Flow::Close);
                    },
                }
            }
            pending = next;
        }
        Ok(Flow::Continue)
    }

    async fn upload(&mut self, header: UploadHeader) -> Result<Vec<ConnectionAction>, ServerError> {
        let config = self.relay.config();
        tracing::info!(
            conn = %self.id,
            filename = %header.filename,
            size = header.declared_size,
            "upload started"
        );

        let result = upload::receive_upload(
            &mut *self.reader,
            header,
            self.relay.files(),
            config.read_buffer_size,
            config.upload_idle_timeout,
        )
        .await;
        let actions = self.conn.finish_transfer()?;

        let session = result?;
        tracing::info!(
            conn = %self.id,
            filename = session.filename(),
            size = session.bytes_moved(),
            "upload complete"
        );

        let registry = self.relay.registry();
        registry.broadcast(encode::file_notice(session.filename(), session.bytes_moved())).await;
        registry.broadcast(encode::upload_notice(session.filename())).await;

        Ok(actions)
    }

    async fn download(&mut self, filename: &str) -> Result<Vec<ConnectionAction>, ServerError> {
        tracing::info!(conn = %self.id, filename, "download requested");

        let result = download::send_download(
            &mut *self.writer,
            filename,
            self.relay.files(),
            &self.relay.config().download,
        )
        .await;
        let actions = self.conn.finish_transfer()?;

        let session = result?;
        tracing::info!(
            conn = %self.id,
            filename,
            size = session.bytes_moved(),
            "download complete"
        );

        Ok(actions)
    }
}
