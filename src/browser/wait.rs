//! Polling loop shared by the query operations.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use tokio::time::{Instant, sleep};

use crate::error::Result;

// ============================================================================
// Constants
// ============================================================================

/// Fixed pause between query attempts.
pub const POLL_INTERVAL: Duration = Duration::from_millis(500);

// ============================================================================
// poll_until
// ============================================================================

/// Repeats an attempt until it yields a value or the timeout elapses.
///
/// The first attempt runs immediately, so a zero timeout still means
/// exactly one try. Between attempts the loop sleeps for `interval`.
/// Resolving with `Ok(None)` after the deadline is the caller's cue to
/// report "not found" however its operation defines that; errors from
/// the attempt abort the loop at once.
pub async fn poll_until<T, F, Fut>(timeout: Duration, interval: Duration, mut attempt: F) -> Result<Option<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    let deadline = Instant::now() + timeout;

    loop {
        if let Some(found) = attempt().await? {
            return Ok(Some(found));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        sleep(interval).await;
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use crate::error::Error;

    #[tokio::test(start_paused = true)]
    async fn test_zero_timeout_attempts_exactly_once() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&attempts);

        let found: Option<u32> = poll_until(Duration::ZERO, POLL_INTERVAL, move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(None)
            }
        })
        .await
        .expect("poll");

        assert!(found.is_none());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_at_fixed_interval_until_deadline() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&attempts);

        let started = Instant::now();
        let found: Option<u32> = poll_until(Duration::from_secs(1), POLL_INTERVAL, move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(None)
            }
        })
        .await
        .expect("poll");

        // Attempts at 0ms, 500ms, and 1000ms, then the deadline stops it.
        assert!(found.is_none());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        assert_eq!(started.elapsed(), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolves_as_soon_as_attempt_yields() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&attempts);

        let found = poll_until(Duration::from_secs(30), POLL_INTERVAL, move || {
            let counter = Arc::clone(&counter);
            async move {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                Ok((n == 3).then_some("hit"))
            }
        })
        .await
        .expect("poll");

        assert_eq!(found, Some("hit"));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_error_aborts_immediately() {
        let err = poll_until::<u32, _, _>(Duration::from_secs(30), POLL_INTERVAL, || async {
            Err(Error::connection("socket gone"))
        })
        .await
        .unwrap_err();

        assert!(err.is_connection_error());
    }
}
