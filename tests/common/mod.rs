//! Shared harness: a daemon running on a throwaway drum root.

#![allow(dead_code, clippy::expect_used, clippy::unwrap_used)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use odb::config::DaemonConfig;
use odb::error::Result;
use odb::service::Client;
use odb::transport::Daemon;
use odb::utils::{Metrics, MetricsSnapshot};
use tempfile::TempDir;
use tokio::net::UnixStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Temporary root holding one directory per drum
pub fn drum_root(drums: &[&str]) -> TempDir {
    let root = tempfile::tempdir().expect("tempdir");
    for drum in drums {
        std::fs::create_dir(root.path().join(drum)).expect("create drum");
    }
    root
}

/// Defaults tuned for tests: socket inside the root, short ticks
pub fn test_config(root: &Path) -> DaemonConfig {
    DaemonConfig::default_with_overrides(|config| {
        config.storage.drum_root = root.to_path_buf();
        config.server.socket_path = root.join(".odb.sock");
        config.server.poll_interval = Duration::from_millis(50);
        config.server.write_timeout = Duration::from_secs(1);
        config.server.shutdown_timeout = Duration::from_secs(2);
    })
}

pub struct TestDaemon {
    pub socket: PathBuf,
    pub metrics: Arc<Metrics>,
    shutdown: mpsc::Sender<()>,
    handle: JoinHandle<Result<()>>,
}

impl TestDaemon {
    pub async fn start(config: DaemonConfig) -> Self {
        let daemon = Daemon::open(config).expect("daemon starts");
        let socket = daemon.socket_path().to_path_buf();
        let metrics = daemon.metrics();
        let (shutdown, shutdown_rx) = mpsc::channel(1);
        let handle = tokio::spawn(daemon.run(shutdown_rx));
        Self {
            socket,
            metrics,
            shutdown,
            handle,
        }
    }

    pub async fn client(&self) -> Client {
        Client::connect(&self.socket).await.expect("client connects")
    }

    pub async fn raw(&self) -> UnixStream {
        UnixStream::connect(&self.socket).await.expect("raw connect")
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Poll the daemon's counters until `pred` holds
    pub async fn wait_until<F>(&self, pred: F)
    where
        F: Fn(&MetricsSnapshot) -> bool,
    {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while !pred(&self.metrics.snapshot()) {
            assert!(
                tokio::time::Instant::now() < deadline,
                "condition not reached: {:?}",
                self.metrics.snapshot()
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    pub async fn stop(self) -> Result<()> {
        let _ = self.shutdown.send(()).await;
        self.handle.await.expect("daemon task panicked")
    }
}
