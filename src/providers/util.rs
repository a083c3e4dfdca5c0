use anyhow::Error;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

// All upstream APIs (Open-Meteo, Juhe, DingTalk, NewsData) get the same
// policy: one initial attempt plus up to three retries, half a second apart.
const RETRY_ATTEMPTS: usize = 3;
const RETRY_DELAY: Duration = Duration::from_millis(500);

/// Retries a fallible async request against an upstream API.
///
/// Returns the first success, or the last error once the attempts are
/// exhausted.
pub async fn with_retry<F, Fut, T, E>(mut operation: F) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Into<Error>,
{
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(val) => return Ok(val),
            Err(err) => {
                let err = err.into();
                if attempt > RETRY_ATTEMPTS {
                    return Err(err);
                }
                debug!(
                    "Attempt {}/{} failed: {}. Retrying...",
                    attempt, RETRY_ATTEMPTS, err
                );
                attempt += 1;
                tokio::time::sleep(RETRY_DELAY).await;
            }
        }
    }
}
