use crate::{OrchestratorError, Result};
use std::time::Duration;

/// Run a blocking adapter call on the blocking pool and wait at most `timeout` for it.
///
/// On timeout the call keeps running in the background and its result is discarded; the
/// caller treats the cycle as "no new data". Callers guard the adapter with `try_lock` so a
/// stalled call makes later cycles skip instead of queueing more threads behind it.
pub async fn bounded_call<T, F>(adapter: &'static str, timeout: Duration, call: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    let task = tokio::task::spawn_blocking(call);
    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join)) => Err(OrchestratorError::AdapterPanicked {
            adapter,
            reason: join.to_string(),
        }),
        Err(_) => Err(OrchestratorError::AdapterTimeout { adapter, timeout }),
    }
}
