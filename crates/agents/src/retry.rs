// SPDX-License-Identifier: MIT

//! Retry helper for do-agent transport calls (spec.md §4.5: "a do-agent
//! transport failure is retried a small fixed number of times before the
//! want transitions to failed").

use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Attempts allowed for a single do-agent dispatch, including the first try.
pub const MAX_ATTEMPTS: u32 = 3;
const BASE_BACKOFF: Duration = Duration::from_millis(100);

/// Run `op` up to [`MAX_ATTEMPTS`] times with doubling backoff between
/// attempts, returning the first success or the last error.
pub async fn with_retry<T, E, F, Fut>(context: &str, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < MAX_ATTEMPTS => {
                warn!(context, attempt, %err, "agent transport call failed, retrying");
                tokio::time::sleep(BASE_BACKOFF * 2u32.pow(attempt - 1)).await;
            }
            Err(err) => return Err(err),
        }
    }
}
