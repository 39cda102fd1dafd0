//! regfs binary
//!
//! Projects the configured backing store under a virtualization root until Enter is
//! pressed or stdin closes.
//!
//! ## Usage
//!
//! ```bash
//! REGFS_HIVE=/srv/hive regfs /mnt/registry
//! ```

use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use clap::Parser;
use regfs_kit::{
    BackingStore, DirBootstrap, DirStore, Dispatcher, MapStore, ProviderConfig, Result, VirtualizationInstance,
};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Project a registry-like store onto a directory.
#[derive(Parser, Debug)]
#[command(name = "regfs", version, about)]
struct Cli {
    /// Virtualization root; created if missing.
    root: PathBuf,
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr))
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        // --help and --version are not failures
        Err(err) if !err.use_stderr() => err.exit(),
        Err(err) => {
            let _ = err.print();
            process::exit(-1);
        }
    };

    if let Err(err) = run(&cli.root) {
        error!("failed to start virtualization: {err:#}");
        process::exit(-1);
    }
}

fn run(root: &Path) -> Result<()> {
    let config = ProviderConfig::from_env()?;
    info!(
        read_only = config.read_only,
        block_content_modification = config.block_content_modification,
        "loaded configuration"
    );

    match &config.hive {
        Some(hive) => {
            info!(hive = %hive.display(), "serving directory store");
            serve(root, DirStore::new(hive)?, &config)
        }
        None => {
            info!("serving empty in-memory store");
            serve(root, MapStore::new(), &config)
        }
    }
}

fn serve<S: BackingStore + 'static>(root: &Path, store: S, config: &ProviderConfig) -> Result<()> {
    let provider = Arc::new(Dispatcher::new(store, config.policy()));
    let instance = VirtualizationInstance::start(root, &DirBootstrap::new(), provider)?;

    println!("Projecting {}, press Enter to stop.", root.display());
    wait_for_stop(io::stdin().lock());

    instance.stop();
    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
enum StopReason {
    Operator,
    EndOfInput,
    InputError,
}

/// Blocks until a line, EOF or a read error arrives on `input`.
fn wait_for_stop<R: BufRead>(mut input: R) -> StopReason {
    let mut line = String::new();
    match input.read_line(&mut line) {
        Ok(0) => {
            info!("stdin closed, stopping");
            StopReason::EndOfInput
        }
        Ok(_) => {
            info!("stop requested");
            StopReason::Operator
        }
        Err(e) => {
            warn!(error = %e, "unable to read stdin, stopping");
            StopReason::InputError
        }
    }
}
