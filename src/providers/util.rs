use crate::providers::RETRY_DELAY;
use anyhow::Error;
use std::future::Future;
use tracing::debug;

/// Runs an upstream request and retries it once after a short pause.
///
/// The upstreams here are free public endpoints that drop the occasional
/// connection; a single retry absorbs that without stretching an
/// aggregation call, since each attempt still carries its own timeout.
pub async fn with_retry<F, Fut, T>(mut operation: F) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, reqwest::Error>>,
{
    match operation().await {
        Ok(val) => Ok(val),
        Err(err) => {
            debug!("Request failed: {}. Retrying once...", err);
            tokio::time::sleep(RETRY_DELAY).await;
            operation().await.map_err(Error::from)
        }
    }
}
