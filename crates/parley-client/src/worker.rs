//! Transfer worker.
//!
//! Each transfer runs as its own tokio task on its own connection, never on
//! the chat connection. The owner gets a [`TransferHandle`] with an event
//! stream and pause/resume/cancel controls.
//!
//! Cancellation races the whole transfer future against a
//! [`CancellationToken`]; on cancel the future is dropped, which closes the
//! local file and the socket wherever the transfer happened to be waiting.
//! Pause is a watch flag checked between chunks.

use std::path::{Path, PathBuf};

use parley_core::{TransferError, TransferSession};
use parley_proto::{Handshake, ProtocolError, encode};
use tokio::{
    fs::File,
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    sync::{mpsc, watch},
    task::JoinHandle,
    time::Instant,
};
use tokio_util::sync::CancellationToken;

use crate::{config::TransferConfig, event::TransferEvent, net, progress::ProgressSample};

/// What to transfer.
#[derive(Debug, Clone)]
pub enum TransferRequest {
    /// Send a local file to the server under its base name
    Upload {
        /// Local file to send
        source: PathBuf,
    },

    /// Fetch a file from the server
    Download {
        /// Name on the server
        filename: String,
        /// Where to write it locally
        destination: PathBuf,
    },
}

/// Handle to a running transfer.
#[derive(Debug)]
pub struct TransferHandle {
    events: mpsc::UnboundedReceiver<TransferEvent>,
    pause: watch::Sender<bool>,
    cancel: CancellationToken,
    task: JoinHandle<Result<u64, TransferError>>,
}

impl TransferHandle {
    /// Stop moving bytes at the next chunk boundary.
    pub fn pause(&self) {
        self.pause.send_replace(true);
    }

    /// Continue after [`TransferHandle::pause`].
    pub fn resume(&self) {
        self.pause.send_replace(false);
    }

    /// Abort the transfer. A `Failed` event follows immediately.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Next event. `None` once the worker has finished and all events were
    /// read.
    pub async fn next_event(&mut self) -> Option<TransferEvent> {
        self.events.recv().await
    }

    /// True once the worker task has ended.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the worker and return its outcome.
    pub async fn wait(self) -> Result<u64, TransferError> {
        self.task
            .await
            .map_err(|e| TransferError::Transport(format!("transfer task ended abnormally: {e}")))?
    }
}

/// Start a transfer against the relay at `addr`.
///
/// Must be called from within a tokio runtime.
pub fn spawn_transfer(
    addr: impl Into<String>,
    request: TransferRequest,
    config: TransferConfig,
) -> TransferHandle {
    let (events_tx, events) = mpsc::unbounded_channel();
    let (pause, pause_rx) = watch::channel(false);
    let cancel = CancellationToken::new();

    let reporter = Reporter { events: events_tx, started: Instant::now() };
    let task = tokio::spawn(run(addr.into(), request, config, reporter, pause_rx, cancel.clone()));

    TransferHandle { events, pause, cancel, task }
}

async fn run(
    addr: String,
    request: TransferRequest,
    config: TransferConfig,
    mut reporter: Reporter,
    mut pause: watch::Receiver<bool>,
    cancel: CancellationToken,
) -> Result<u64, TransferError> {
    let result = {
        let work = async {
            match &request {
                TransferRequest::Upload { source } => {
                    upload(&addr, source, &config, &mut reporter, &mut pause).await
                },
                TransferRequest::Download { filename, destination } => {
                    download(&addr, filename, destination, &config, &mut reporter, &mut pause).await
                },
            }
        };

        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(TransferError::Cancelled),
            result = work => result,
        }
    };

    match &result {
        Ok(bytes) => {
            tracing::info!(bytes, "transfer complete");
            reporter.emit(TransferEvent::Completed { bytes: *bytes });
        },
        Err(err) => {
            tracing::warn!(error = %err, "transfer failed");
            reporter.emit(TransferEvent::Failed { reason: err.to_string() });
        },
    }

    result
}

/// Event sink with the transfer's start time.
struct Reporter {
    events: mpsc::UnboundedSender<TransferEvent>,
    started: Instant,
}

impl Reporter {
    fn emit(&self, event: TransferEvent) {
        // Owner may have dropped the handle; the transfer still runs to its end.
        let _ = self.events.send(event);
    }

    fn start(&mut self, filename: &str, size: u64) {
        self.started = Instant::now();
        self.emit(TransferEvent::Started { filename: filename.to_string(), size });
    }

    fn progress(&self, session: &TransferSession) {
        let sample = ProgressSample {
            bytes_moved: session.bytes_moved(),
            total: session.declared_size(),
            elapsed: self.started.elapsed(),
        };
        self.emit(TransferEvent::Progress {
            bytes_moved: sample.bytes_moved,
            percentage: sample.percentage(),
            throughput: sample.throughput(),
        });
    }
}

/// Wait until the pause flag is cleared. Returns at once if not paused.
pub(crate) async fn wait_while_paused(pause: &mut watch::Receiver<bool>) {
    while *pause.borrow_and_update() {
        if pause.changed().await.is_err() {
            break;
        }
    }
}

async fn connect(addr: &str, config: &TransferConfig) -> Result<TcpStream, TransferError> {
    net::connect(addr, config.connect_timeout)
        .await
        .map_err(|e| TransferError::Connect { addr: addr.to_string(), reason: e.to_string() })
}

async fn send(
    stream: &mut TcpStream,
    data: &[u8],
    config: &TransferConfig,
) -> Result<(), TransferError> {
    net::write_all_timeout(stream, data, config.write_timeout).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::TimedOut {
            TransferError::Timeout { operation: "write" }
        } else {
            TransferError::transport(&e)
        }
    })
}

fn upload_name(source: &Path) -> Result<String, TransferError> {
    let name = source.file_name().and_then(|name| name.to_str()).ok_or_else(|| {
        TransferError::LocalIo(format!("{} has no usable file name", source.display()))
    })?;

    if name.chars().any(char::is_whitespace) {
        return Err(ProtocolError::InvalidFilename {
            name: name.to_string(),
            reason: "upload names cannot contain whitespace",
        }
        .into());
    }
    Ok(name.to_string())
}

async fn upload(
    addr: &str,
    source: &Path,
    config: &TransferConfig,
    reporter: &mut Reporter,
    pause: &mut watch::Receiver<bool>,
) -> Result<u64, TransferError> {
    let filename = upload_name(source)?;
    let mut file = File::open(source).await.map_err(|e| TransferError::local_io(&e))?;
    let size = file.metadata().await.map_err(|e| TransferError::local_io(&e))?.len();
    if size == 0 {
        return Err(ProtocolError::InvalidSize("0".to_string()).into());
    }

    let mut stream = connect(addr, config).await?;
    reporter.start(&filename, size);
    send(&mut stream, &encode::upload_header(&filename, size), config).await?;

    let mut ack = [0u8; 64];
    match tokio::time::timeout(config.ack_grace, stream.read(&mut ack)).await {
        Ok(Ok(0)) => return Err(TransferError::PrematureClosure { received: 0, expected: size }),
        Ok(Ok(n)) => tracing::debug!(bytes = n, "ignoring upload ack bytes"),
        Ok(Err(e)) => return Err(TransferError::transport(&e)),
        Err(_) => {},
    }
    tokio::time::sleep(config.settle_delay).await;

    let mut session = TransferSession::upload(filename, size);
    let mut buf = vec![0u8; config.upload_chunk_size.max(1)];
    while !session.is_complete() {
        wait_while_paused(pause).await;

        let len = session.next_read_len(buf.len());
        let n = file.read(&mut buf[..len]).await.map_err(|e| TransferError::local_io(&e))?;
        if n == 0 {
            break;
        }

        send(&mut stream, &buf[..n], config).await?;
        session.credit(n as u64);
        reporter.progress(&session);
    }

    stream.shutdown().await.map_err(|e| TransferError::transport(&e))?;
    session.finish()
}

async fn download(
    addr: &str,
    filename: &str,
    destination: &Path,
    config: &TransferConfig,
    reporter: &mut Reporter,
    pause: &mut watch::Receiver<bool>,
) -> Result<u64, TransferError> {
    let mut stream = connect(addr, config).await?;
    send(&mut stream, &encode::download_request(filename), config).await?;

    let mut buf = vec![0u8; config.download_chunk_cap.max(1)];
    let mut pending = Vec::new();
    let (size, leftover) = loop {
        let n = tokio::time::timeout(config.handshake_timeout, stream.read(&mut buf))
            .await
            .map_err(|_| TransferError::Timeout { operation: "download handshake" })?
            .map_err(|e| TransferError::transport(&e))?;
        if n == 0 {
            return Err(ProtocolError::MalformedHeader {
                command: "DOWNLOAD",
                reason: "connection closed during handshake",
            }
            .into());
        }

        pending.extend_from_slice(&buf[..n]);
        match Handshake::parse(&pending)? {
            None => continue,
            Some(Handshake::Refused) => return Err(TransferError::Peer),
            Some(Handshake::Size { size, leftover }) => break (size, leftover),
        }
    };

    let mut file = File::create(destination).await.map_err(|e| TransferError::local_io(&e))?;
    reporter.start(filename, size);

    let mut session = TransferSession::download(filename, size);
    let carried = session.accept(&leftover);
    if !carried.is_empty() {
        file.write_all(carried).await.map_err(|e| TransferError::local_io(&e))?;
        reporter.progress(&session);
    }

    while !session.is_complete() {
        wait_while_paused(pause).await;

        let len = session.next_read_len(buf.len());
        let read = tokio::time::timeout(config.read_timeout, stream.read(&mut buf[..len])).await;
        let n = match read {
            Err(_) => {
                tracing::warn!(filename, moved = session.bytes_moved(), "download read stalled");
                break;
            },
            Ok(Ok(0)) => {
                file.flush().await.map_err(|e| TransferError::local_io(&e))?;
                return Err(session.premature_closure());
            },
            Ok(Ok(n)) => n,
            Ok(Err(e)) => return Err(TransferError::transport(&e)),
        };

        let chunk = session.accept(&buf[..n]);
        file.write_all(chunk).await.map_err(|e| TransferError::local_io(&e))?;
        reporter.progress(&session);
    }

    file.flush().await.map_err(|e| TransferError::local_io(&e))?;
    session.finish()
}
