//! Upload and download tests over real loopback TCP.
//!
//! Uses the raw legacy wire forms so the server is checked byte-for-byte,
//! independent of the client crate.

use std::time::Duration;

use parley_proto::{ServerNotice, encode};
use parley_server::{Relay, Server, ServerConfig};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    time::timeout,
};

async fn start_server() -> (std::net::SocketAddr, Relay, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let config = ServerConfig {
        bind_address: "127.0.0.1:0".to_string(),
        ..ServerConfig::with_files_dir(dir.path())
    };
    let server = Server::bind(config).await.unwrap();
    let addr = server.local_addr().unwrap();
    let relay = server.relay().clone();
    tokio::spawn(server.run());
    (addr, relay, dir)
}

async fn connect(addr: std::net::SocketAddr) -> TcpStream {
    let stream = TcpStream::connect(addr).await.unwrap();
    stream.set_nodelay(true).unwrap();
    stream
}

async fn read_all(stream: &mut TcpStream) -> Vec<u8> {
    let mut received = Vec::new();
    timeout(Duration::from_secs(5), stream.read_to_end(&mut received)).await.unwrap().unwrap();
    received
}

/// Connect a chat client, send its greeting and wait for the echo.
async fn join(addr: std::net::SocketAddr, name: &str) -> TcpStream {
    let mut stream = connect(addr).await;
    let greeting = format!("{name} joined the chat");
    stream.write_all(greeting.as_bytes()).await.unwrap();

    let mut echo = vec![0u8; greeting.len()];
    timeout(Duration::from_secs(5), stream.read_exact(&mut echo)).await.unwrap().unwrap();
    assert_eq!(echo, greeting.as_bytes());
    stream
}

async fn wait_for_clients(relay: &Relay, n: usize) {
    timeout(Duration::from_secs(5), async {
        while relay.registry().len().await != n {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn download_of_missing_file_is_exactly_error() {
    let (addr, _relay, _dir) = start_server().await;
    let mut stream = connect(addr).await;

    stream.write_all(&encode::download_request("nope.txt")).await.unwrap();

    assert_eq!(read_all(&mut stream).await, b"ERROR");
}

#[tokio::test]
async fn download_rejects_path_escape() {
    let (addr, _relay, _dir) = start_server().await;
    let mut stream = connect(addr).await;

    stream.write_all(b"DOWNLOAD ../outside.txt").await.unwrap();

    assert_eq!(read_all(&mut stream).await, b"ERROR");
}

#[tokio::test]
async fn download_name_with_spaces() {
    let (addr, _relay, dir) = start_server().await;
    std::fs::write(dir.path().join("my notes.txt"), b"hello").unwrap();
    let mut stream = connect(addr).await;

    stream.write_all(b"DOWNLOAD my notes.txt").await.unwrap();

    assert_eq!(read_all(&mut stream).await, b"5\nhello");
}

#[tokio::test]
async fn chat_before_download_request_is_not_written_to_transfer() {
    let (addr, relay, dir) = start_server().await;
    std::fs::write(dir.path().join("notes.txt"), b"hello").unwrap();
    let mut missing = connect(addr).await;
    let mut present = connect(addr).await;
    wait_for_clients(&relay, 2).await;

    let mut alice = join(addr, "alice").await;
    alice.write_all(b"[alice]: two\nlines").await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    missing.write_all(&encode::download_request("nope.txt")).await.unwrap();
    present.write_all(&encode::download_request("notes.txt")).await.unwrap();

    assert_eq!(read_all(&mut missing).await, b"ERROR");
    assert_eq!(read_all(&mut present).await, b"5\nhello");
}

#[tokio::test]
async fn split_upload_is_stored_and_announced() {
    let (addr, _relay, dir) = start_server().await;
    let mut observer = join(addr, "observer").await;

    let mut upload = connect(addr).await;
    upload.write_all(b"UPLOAD up.bin 10\nabc").await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    upload.write_all(b"defg").await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    upload.write_all(b"hij").await.unwrap();

    let mut seen = Vec::new();
    let mut buf = [0u8; 256];
    while !seen.ends_with(b"uploaded: up.bin\n") {
        let n = timeout(Duration::from_secs(5), observer.read(&mut buf)).await.unwrap().unwrap();
        assert_ne!(n, 0, "observer connection closed");
        seen.extend_from_slice(&buf[..n]);
    }

    assert_eq!(ServerNotice::parse_all(&seen), vec![
        ServerNotice::FileAvailable { filename: "up.bin".to_string(), size: 10 },
        ServerNotice::Chat("uploaded: up.bin".to_string()),
    ]);
    assert_eq!(std::fs::read(dir.path().join("up.bin")).unwrap(), b"abcdefghij");

    // Transfer connections are single-purpose: the server closes it.
    assert!(read_all(&mut upload).await.is_empty());
}

#[tokio::test]
async fn interrupted_upload_is_not_announced() {
    let (addr, relay, dir) = start_server().await;
    let mut observer = join(addr, "observer").await;

    let mut upload = connect(addr).await;
    upload.write_all(b"UPLOAD partial.bin 100\nabc").await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    drop(upload);

    wait_for_clients(&relay, 1).await;

    let mut buf = [0u8; 64];
    assert!(timeout(Duration::from_millis(200), observer.read(&mut buf)).await.is_err());
    assert_eq!(std::fs::read(dir.path().join("partial.bin")).unwrap(), b"abc");
}
