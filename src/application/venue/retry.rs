//! Bounded retry for venue calls.

use std::future::Future;

use tracing::debug;

use crate::error::VenueError;
use crate::port::VenueResult;

/// Run `op` up to `attempts` times.
///
/// An error is retried only while `is_retryable` accepts it and attempts
/// remain; the last error is returned otherwise.
pub async fn call_with_retry<T, F, Fut, P>(
    attempts: u32,
    is_retryable: P,
    mut op: F,
) -> VenueResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = VenueResult<T>>,
    P: Fn(&VenueError) -> bool,
{
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < attempts && is_retryable(&e) => {
                debug!(attempt, max_attempts = attempts, error = %e, "Retrying venue call");
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
