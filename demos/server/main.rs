use std::path::PathBuf;
use std::process::exit;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use poolfs::config::{StoreConfig, DEFAULT_CACHE_CAPACITY};
use poolfs::{Error, LowFacade as _, ROOT_OBJECT};

/// Serve an object pool to remote clients.
#[derive(Parser)]
struct Args {
    /// Optional TOML file tuning the handle cache.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Address to listen on.
    listen_addr: String,
    /// Directory backing the pool.
    backing_store: PathBuf,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cache_capacity = match &args.config {
        Some(path) => match StoreConfig::from_toml_file(path) {
            Ok(config) => config.cache_capacity,
            Err(err) => {
                eprintln!("Config fail: {err}");
                exit(2);
            }
        },
        None => DEFAULT_CACHE_CAPACITY,
    };
    let config = StoreConfig { prefix: args.backing_store, cache_capacity };

    let fs = config.open();
    if let Err(err) = fs.mkdir(&ROOT_OBJECT) {
        if !matches!(err, Error::AlreadyExists) {
            eprintln!("Root init fail: {err}");
            exit(1);
        }
    }

    let listener = match TcpListener::bind(&args.listen_addr).await {
        Ok(listener) => listener,
        Err(err) => {
            eprintln!("Listen fail: {err}");
            exit(1);
        }
    };

    if let Err(err) = poolfs::handle_forever(listener, Arc::new(fs)).await {
        eprintln!("Serve fail: {err}");
        exit(1);
    }
}
