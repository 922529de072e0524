//! Parley relay server binary.
//!
//! # Usage
//!
//! ```bash
//! # Serve files from the current directory on the default port
//! parley-server
//!
//! # Custom address and storage directory
//! parley-server --bind 127.0.0.1:7000 --files-dir /srv/parley
//! ```

use std::path::PathBuf;

use clap::Parser;
use parley_server::{DEFAULT_BIND_ADDRESS, DEFAULT_OUTBOUND_QUEUE_CAPACITY, Server, ServerConfig};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Parley chat relay server
#[derive(Parser, Debug)]
#[command(name = "parley-server")]
#[command(about = "Multi-user chat relay with file upload and download")]
#[command(version)]
struct Args {
    /// Address to bind to
    #[arg(short, long, default_value = DEFAULT_BIND_ADDRESS)]
    bind: String,

    /// Directory uploads are written to and downloads are served from
    #[arg(short, long, default_value = ".")]
    files_dir: PathBuf,

    /// Messages buffered per connection before broadcasts to it are dropped
    #[arg(long, default_value_t = DEFAULT_OUTBOUND_QUEUE_CAPACITY)]
    queue_capacity: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("Parley server starting");
    tracing::info!("Binding to {}", args.bind);
    tracing::info!("Storing files in {}", args.files_dir.display());

    let config = ServerConfig {
        bind_address: args.bind,
        files_dir: args.files_dir,
        outbound_queue_capacity: args.queue_capacity,
        ..ServerConfig::default()
    };

    let server = Server::bind(config).await?;

    tracing::info!("Server listening on {}", server.local_addr()?);

    server.run().await?;

    Ok(())
}
