use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::error::{FetchError, Result};

/// Execute an operation up to `attempts` times.
///
/// Only retryable error kinds are re-attempted, with a fixed delay between
/// attempts; anything else propagates immediately. When the final attempt
/// still fails retryably, the error is wrapped into a fetching error with
/// the original failure preserved as cause.
pub async fn retry<T, F, Fut>(
    operation: &str,
    attempts: u32,
    delay: Duration,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = attempts.max(1);

    for attempt in 1..=attempts {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < attempts => {
                warn!(
                    "Attempt {}/{} of {} failed: {}, retrying",
                    attempt, attempts, operation, e
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) if e.is_retryable() => {
                return Err(FetchError::fetching_caused_by(
                    format!("{operation} failed after {attempts} attempts"),
                    e,
                ));
            }
            Err(e) => return Err(e),
        }
    }

    unreachable!("retry loop always returns")
}
