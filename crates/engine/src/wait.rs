//! Bounded waits
//!
//! [`await_condition`] is the only place the engine suspends on page state.
//! The extractor uses it for element presence, the interactive driver for
//! state-flag transitions; each passes its own bound.

use std::future::Future;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::time::sleep;

use crate::error::HarnessError;

/// How long to wait and how often to re-check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitBound {
    pub timeout: Duration,
    pub poll: Duration,
}

impl WaitBound {
    pub fn new(timeout: Duration, poll: Duration) -> Self {
        Self { timeout, poll }
    }

    pub fn from_millis(timeout_ms: u64, poll_ms: u64) -> Self {
        Self::new(Duration::from_millis(timeout_ms), Duration::from_millis(poll_ms.max(1)))
    }
}

/// The condition held
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Found {
    pub waited: Duration,
}

#[derive(Error, Debug)]
pub enum WaitError {
    #[error("timed out after {}ms", .waited.as_millis())]
    TimedOut { waited: Duration },

    #[error(transparent)]
    Session(#[from] HarnessError),
}

/// Poll `predicate` until it returns `true` or `bound.timeout` elapses.
///
/// The predicate is always evaluated at least once, so a zero timeout is a
/// single immediate check.
pub async fn await_condition<F, Fut>(bound: WaitBound, mut predicate: F) -> Result<Found, WaitError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, HarnessError>>,
{
    let start = Instant::now();
    loop {
        if predicate().await? {
            return Ok(Found {
                waited: start.elapsed(),
            });
        }

        let waited = start.elapsed();
        if waited >= bound.timeout {
            return Err(WaitError::TimedOut { waited });
        }
        sleep(bound.poll.min(bound.timeout - waited)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_condition_true_immediately() {
        let found = await_condition(WaitBound::from_millis(0, 10), || async { Ok(true) })
            .await
            .unwrap();
        assert!(found.waited < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_condition_becomes_true_after_polls() {
        let calls = AtomicUsize::new(0);
        let calls_ref = &calls;
        let result = await_condition(WaitBound::from_millis(1_000, 5), move || async move {
            Ok(calls_ref.fetch_add(1, Ordering::SeqCst) >= 3)
        })
        .await;
        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_condition_times_out() {
        let result = await_condition(WaitBound::from_millis(30, 5), || async { Ok(false) }).await;
        match result {
            Err(WaitError::TimedOut { waited }) => assert!(waited >= Duration::from_millis(30)),
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_session_error_is_surfaced() {
        let result = await_condition(WaitBound::from_millis(100, 5), || async {
            Err(HarnessError::Bridge("bridge exited".into()))
        })
        .await;
        assert!(matches!(result, Err(WaitError::Session(HarnessError::Bridge(_)))));
    }
}
