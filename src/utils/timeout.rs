//! Timeout constants and an async timeout wrapper.

use crate::error::{OdbError, Result};
use std::future::Future;
use std::time::Duration;

/// Default timeout for client requests and connection attempts
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Readiness wait bound; housekeeping runs at least this often
pub const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Upper bound on writing a single reply to a client
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Time allowed for a graceful shutdown
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Run `fut` to completion or fail with [`OdbError::Timeout`].
pub async fn with_timeout<F, T>(duration: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(duration, fut).await {
        Ok(result) => result,
        Err(_) => Err(OdbError::Timeout),
    }
}
