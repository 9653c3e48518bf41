use anyhow::{Context, Result};
use clap::ArgMatches;
use log::{LevelFilter, debug};
use std::path::PathBuf;
use std::process::exit;

use wlsync::adb::{AdbBackend, AdbClient};
use wlsync::cli;
use wlsync::config::{Config, Transport};
use wlsync::file::FileBackend;
use wlsync::nm::NmBackend;
use wlsync::reconcile::{Reconciler, Side};
use wlsync::store::NetworkStore;

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

/// Config file values with command line flags applied on top.
fn resolve_config(args: &ArgMatches) -> Result<Config> {
    let mut config = Config::new()?;

    if let Some(path) = args.get_one::<PathBuf>("file") {
        config.store_path = Some(path.clone());
    }
    if let Some(serial) = args.get_one::<String>("serial") {
        config.adb.serial = Some(serial.clone());
        config.transport = Transport::Adb;
    }
    if let Some(transport) = args.get_one::<String>("transport") {
        config.transport = transport
            .parse()
            .with_context(|| format!("Unknown transport {transport}"))?;
    }
    Ok(config)
}

fn system_store(config: &Config) -> NetworkStore {
    match config.transport {
        Transport::Nm => NetworkStore::new(Box::new(NmBackend::new(config.source_name()))),
        Transport::Adb => {
            let client = AdbClient::new(config.adb.binary.clone(), config.adb.serial.clone());
            NetworkStore::new(Box::new(AdbBackend::new(client)))
        }
    }
}

async fn run(args: &ArgMatches) -> Result<()> {
    let config = resolve_config(args)?;
    debug!("{config:?}");

    let file = NetworkStore::new(Box::new(FileBackend::new(config.store_path()?)));
    let mut reconciler = Reconciler::new(file, system_store(&config), std::io::stdout());

    match args.subcommand() {
        Some(("import", _)) => reconciler.import().await,
        Some(("export", _)) => reconciler.export().await,
        Some(("update", _)) => reconciler.update().await,
        Some(("show", _)) => reconciler.show().await,
        Some(("dedup", sub)) => {
            let side: Side = sub
                .get_one::<String>("side")
                .context("Missing side")?
                .parse()?;
            reconciler.dedup(side).await
        }
        _ => Ok(()),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = cli::cli().get_matches();
    init_logging(args.get_count("verbose"));

    if let Err(err) = run(&args).await {
        eprintln!("Error: {err:?}");
        exit(1);
    }
}
