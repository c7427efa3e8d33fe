use std::{future::Future, time::Duration};

use tokio::time::{sleep, timeout};

/// Poll `predicate` at a fixed interval until it holds or the timeout
/// elapses. Returns whether the predicate held.
///
/// This is the single retry-with-timeout primitive behind readiness probes,
/// acceptance observation and log assertions; callers translate `false` into
/// their own error type.
pub async fn wait_until<F, Fut>(mut predicate: F, interval: Duration, deadline: Duration) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    timeout(deadline, async {
        loop {
            if predicate().await {
                return;
            }
            sleep(interval).await;
        }
    })
    .await
    .is_ok()
}
