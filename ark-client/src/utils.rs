use crate::Error;
use std::future::Future;
use std::time::Duration;

pub(crate) async fn sleep(duration: Duration) {
    tokio::time::sleep(duration).await;
}

/// Runs `operation`, failing with [`Error::ad_hoc`] if it doesn't complete within `timeout`.
pub(crate) async fn timeout_op<F, O>(timeout: Duration, operation: F) -> Result<O, Error>
where
    F: Future<Output = O>,
{
    tokio::time::timeout(timeout, operation)
        .await
        .map_err(|_| Error::ad_hoc(format!("operation timed out after {timeout:?}")))
}
