use std::path::PathBuf;
use std::process::exit;

use clap::Parser;

use poolfs::client::RemoteFacade;
use poolfs::fuse::FuseFs;
use poolfs::ROOT_OBJECT;

/// Mount a remote object pool.
#[derive(Parser)]
struct Args {
    /// Print debugging messages.
    #[arg(long)]
    debug: bool,
    /// Where to mount the pool.
    mountpoint: PathBuf,
    /// Address of the serving pool.
    dial_addr: String,
}

fn main() {
    let args = Args::parse();
    let default = if args.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .init();

    let facade = match RemoteFacade::dial(&args.dial_addr) {
        Ok(facade) => facade,
        Err(err) => {
            eprintln!("Dial fail: {err}");
            exit(3);
        }
    };

    println!("Mounting remote pool at {}", args.mountpoint.display());
    if let Err(err) = FuseFs::new(facade, ROOT_OBJECT).mount(&args.mountpoint) {
        eprintln!("Mount fail: {err}");
        exit(1);
    }
}
