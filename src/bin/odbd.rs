//! odbd: the ODB daemon.
//!
//! Scans a drum root, binds the IPC channel and serves until Ctrl-C.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use odb::config::DaemonConfig;
use odb::transport::local::start_server;
use odb::utils::logging::init_logging;
use tracing::{error, info, Level};

#[derive(Parser)]
#[command(name = "odbd")]
#[command(about = "Local key-value database daemon")]
#[command(version)]
struct Cli {
    /// Directory whose subdirectories are the drums
    drum_root: PathBuf,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// IPC socket path
    #[arg(short, long)]
    socket: Option<PathBuf>,

    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn load_config(cli: &Cli) -> odb::Result<DaemonConfig> {
    let mut config = match &cli.config {
        Some(path) => DaemonConfig::from_file(path)?,
        None => DaemonConfig::default(),
    };
    config.apply_env();

    config.storage.drum_root = cli.drum_root.clone();
    if let Some(socket) = &cli.socket {
        config.server.socket_path = socket.clone();
    }
    match cli.verbose {
        0 => {}
        1 => config.logging.log_level = Level::DEBUG,
        _ => config.logging.log_level = Level::TRACE,
    }

    config.validate_strict()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("fatal: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_logging(&config.logging) {
        eprintln!("fatal: {e}");
        return ExitCode::FAILURE;
    }

    info!(
        root = %config.storage.drum_root.display(),
        persist = config.storage.persist,
        "Starting {}",
        config.logging.app_name
    );

    match start_server(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Daemon stopped");
            eprintln!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}
