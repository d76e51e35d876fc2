//! Local IPC entry points: run the daemon, or connect to one.

use std::path::Path;

use tokio::net::UnixStream;
use tokio::sync::mpsc;
use tokio_util::codec::Framed;
use tracing::{info, instrument};

use crate::config::{DaemonConfig, MAX_PAYLOAD_SIZE};
use crate::core::codec::PacketCodec;
use crate::error::{constants, OdbError, Result};
use crate::transport::multiplexer::Daemon;

/// Start the daemon and serve until CTRL+C
#[instrument(skip(config), fields(socket_path = %config.server.socket_path.display()))]
pub async fn start_server(config: DaemonConfig) -> Result<()> {
    // Create internal shutdown channel
    let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);

    // Set up ctrl-c handler that sends to our internal shutdown channel
    tokio::spawn(async move {
        if let Ok(()) = tokio::signal::ctrl_c().await {
            info!("Received CTRL+C signal, shutting down");
            let _ = shutdown_tx.send(()).await;
        }
    });

    start_server_with_shutdown(config, shutdown_rx).await
}

/// Start the daemon with an external shutdown channel.
///
/// Dropping every sender of `shutdown_rx` also stops the daemon.
pub async fn start_server_with_shutdown(
    config: DaemonConfig,
    shutdown_rx: mpsc::Receiver<()>,
) -> Result<()> {
    Daemon::open(config)?.run(shutdown_rx).await
}

/// Connect to a daemon listening at `path`
#[instrument(skip(path), fields(socket_path = %path.as_ref().display()))]
pub async fn connect<P: AsRef<Path>>(path: P) -> Result<Framed<UnixStream, PacketCodec>> {
    connect_with_limit(path, MAX_PAYLOAD_SIZE).await
}

/// Connect with a custom payload ceiling for replies
pub async fn connect_with_limit<P: AsRef<Path>>(
    path: P,
    max_payload: usize,
) -> Result<Framed<UnixStream, PacketCodec>> {
    let stream = UnixStream::connect(path.as_ref()).await.map_err(|e| {
        if matches!(
            e.kind(),
            std::io::ErrorKind::NotFound | std::io::ErrorKind::ConnectionRefused
        ) {
            OdbError::ConfigError(format!(
                "{} at {}",
                constants::ERR_DAEMON_NOT_RUNNING,
                path.as_ref().display()
            ))
        } else {
            OdbError::Io(e)
        }
    })?;
    Ok(Framed::new(stream, PacketCodec::new(max_payload)))
}
