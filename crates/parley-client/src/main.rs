//! Parley client binary.
//!
//! # Usage
//!
//! ```bash
//! # Chat as alice; type lines, `/users` lists users, `/quit` leaves
//! parley-client --server 127.0.0.1:9999 chat --name alice
//!
//! # Upload and download files
//! parley-client --server 127.0.0.1:9999 upload ./report.pdf
//! parley-client --server 127.0.0.1:9999 download report.pdf --output ./copy.pdf
//! ```

use std::{path::PathBuf, time::Duration};

use clap::{Parser, Subcommand};
use parley_client::{ChatSession, TransferConfig, TransferEvent, TransferRequest, spawn_transfer};
use parley_proto::ServerNotice;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Parley chat relay client
#[derive(Parser, Debug)]
#[command(name = "parley-client")]
#[command(about = "Chat and file transfer client for the Parley relay")]
#[command(version)]
struct Args {
    /// Relay address
    #[arg(short, long, default_value = "127.0.0.1:9999")]
    server: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload a local file
    Upload {
        /// File to send
        path: PathBuf,
    },

    /// Download a file from the relay
    Download {
        /// Name on the server
        name: String,

        /// Local destination (defaults to the name in the current directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Join the chat
    Chat {
        /// Display name
        #[arg(short, long)]
        name: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    match args.command {
        Command::Upload { path } => {
            transfer(&args.server, TransferRequest::Upload { source: path }).await?;
        },
        Command::Download { name, output } => {
            let destination = output.unwrap_or_else(|| PathBuf::from(&name));
            transfer(&args.server, TransferRequest::Download { filename: name, destination })
                .await?;
        },
        Command::Chat { name } => chat(&args.server, name).await?,
    }

    Ok(())
}

async fn transfer(
    server: &str,
    request: TransferRequest,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut handle = spawn_transfer(server, request, TransferConfig::default());

    while let Some(event) = handle.next_event().await {
        match event {
            TransferEvent::Started { filename, size } => {
                tracing::info!("Transferring {filename} ({size} bytes)");
            },
            TransferEvent::Progress { percentage, throughput, .. } => {
                tracing::info!("{percentage}% {throughput}");
            },
            TransferEvent::Completed { bytes } => tracing::info!("Done: {bytes} bytes"),
            TransferEvent::Failed { reason } => tracing::error!("Failed: {reason}"),
        }
    }

    handle.wait().await?;
    Ok(())
}

async fn chat(server: &str, name: String) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = ChatSession::connect(server, name, Duration::from_secs(3)).await?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line?.as_deref() {
                    None | Some("/quit") => break,
                    Some("/users") => session.request_user_list().await?,
                    Some("") => {},
                    Some(text) => session.send_chat(text).await?,
                }
            },
            notices = session.recv() => {
                let Some(notices) = notices? else {
                    tracing::warn!("Server closed the connection");
                    return Ok(());
                };
                for notice in notices {
                    let line = match notice {
                        ServerNotice::Chat(text) => text,
                        ServerNotice::FileAvailable { filename, size } => {
                            format!("* {filename} ({size} bytes) is available for download")
                        },
                        ServerNotice::UserList(entries) => {
                            let names: Vec<String> = entries
                                .into_iter()
                                .map(|e| {
                                    if e.name.is_empty() {
                                        format!("?@{}", e.address)
                                    } else {
                                        e.name
                                    }
                                })
                                .collect();
                            format!("* online: {}", names.join(", "))
                        },
                    };
                    stdout.write_all(format!("{line}\n").as_bytes()).await?;
                    stdout.flush().await?;
                }
            },
        }
    }

    session.leave().await?;
    Ok(())
}
