//! Cancellation and timeout helpers.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::auth::AuthError;

/// Run `future` unless `cancel` fires first.
pub async fn with_cancel<T>(
    cancel: &CancellationToken,
    what: &str,
    future: impl Future<Output = Result<T, AuthError>>,
) -> Result<T, AuthError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(AuthError::Cancelled(format!("{what} cancelled"))),
        result = future => result,
    }
}

/// Wrap a future with an optional timeout; elapsing counts as cancellation.
pub async fn with_timeout<T>(
    duration: Option<Duration>,
    future: impl Future<Output = Result<T, AuthError>>,
) -> Result<T, AuthError> {
    let Some(duration) = duration else {
        return future.await;
    };
    match tokio::time::timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(AuthError::Cancelled(format!(
            "timed out after {}ms",
            duration.as_millis()
        ))),
    }
}
