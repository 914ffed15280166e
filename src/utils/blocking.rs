use std::time::Duration;

use anyhow::{anyhow, Context, Result};

/// Runs a blocking device or vision call on the blocking pool, giving up
/// after `limit`.
///
/// A timed-out job keeps running on its worker thread; only the caller
/// stops waiting for it.
pub async fn run_blocking<T, F>(what: &str, limit: Duration, job: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    match tokio::time::timeout(limit, tokio::task::spawn_blocking(job)).await {
        Ok(joined) => joined.with_context(|| format!("{what} worker join failed"))?,
        Err(_) => Err(anyhow!("{what} timed out after {}s", limit.as_secs())),
    }
}
