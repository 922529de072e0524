//! TCP connection helpers.

use std::{io, time::Duration};

use tokio::{
    io::{AsyncWrite, AsyncWriteExt},
    net::TcpStream,
};

/// Connect to `addr`, giving up after `timeout`.
pub async fn connect(addr: &str, timeout: Duration) -> io::Result<TcpStream> {
    let stream = tokio::time::timeout(timeout, TcpStream::connect(addr)).await.map_err(|_| {
        io::Error::new(io::ErrorKind::TimedOut, format!("connect to {addr} timed out"))
    })??;
    stream.set_nodelay(true)?;
    Ok(stream)
}

/// Write all of `data`, failing with `TimedOut` if it takes longer than
/// `timeout`.
pub async fn write_all_timeout<W>(writer: &mut W, data: &[u8], timeout: Duration) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    tokio::time::timeout(timeout, writer.write_all(data))
        .await
        .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "write timed out"))?
}
