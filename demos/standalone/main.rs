use std::path::PathBuf;
use std::process::exit;

use clap::Parser;

use poolfs::config::{StoreConfig, DEFAULT_CACHE_CAPACITY};
use poolfs::fuse::FuseFs;
use poolfs::{Error, LowFacade as _, ROOT_OBJECT};

/// Mount a local object pool.
#[derive(Parser)]
struct Args {
    /// Print debugging messages.
    #[arg(long)]
    debug: bool,
    /// Optional TOML file tuning the handle cache.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Where to mount the pool.
    mountpoint: PathBuf,
    /// Directory backing the pool.
    backing_store: PathBuf,
}

fn init_tracing(debug: bool) {
    let default = if debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .init();
}

fn main() {
    let args = Args::parse();
    init_tracing(args.debug);

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

    println!("Mounting pool at {}", args.mountpoint.display());
    if let Err(err) = FuseFs::new(fs, ROOT_OBJECT).mount(&args.mountpoint) {
        eprintln!("Mount fail: {err}");
        exit(1);
    }
}
