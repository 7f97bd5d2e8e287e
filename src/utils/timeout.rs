//! Async timeout wrappers and the shared timing constants.

use std::future::Future;
use std::time::Duration;

use crate::error::{Result, SwitchboardError};

/// Default deadline for request/response routing between modules.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(1);

/// Default idle timeout for session reads.
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// How long the stopping phase may take before the watchdog forces exit.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(60);

/// Run a future with a deadline, mapping expiry to a timeout error.
pub async fn with_timeout_error<F, T>(fut: F, duration: Duration) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(duration, fut).await {
        Ok(result) => result,
        Err(_) => Err(SwitchboardError::RequestTimeout),
    }
}
