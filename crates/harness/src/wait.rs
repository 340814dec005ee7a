//! Bounded polling with backoff
//!
//! UI transitions (redirects, MFA challenges, consent screens) complete at
//! variable, server-dependent latency, so every visibility/text/ticket wait
//! in the harness is built on one generic bounded-retry loop over a
//! predicate instead of fixed sleeps. Exceeding the bound is a hard
//! [`HarnessError::Timeout`], never a silent retry.

use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio::time::Instant;

use crate::error::{HarnessError, HarnessResult};

/// First poll interval
const POLL_INITIAL: Duration = Duration::from_millis(50);

/// Ceiling for the backed-off poll interval
const POLL_MAX: Duration = Duration::from_millis(500);

/// Poll `probe` against `subject` until it yields a value or `timeout`
/// elapses.
///
/// The probe returns `Ok(Some(value))` when the awaited condition holds,
/// `Ok(None)` to keep polling, or `Err` to abort immediately. The interval
/// between polls grows by half each round, capped at 500ms, and a final
/// probe always runs at the deadline. `what` names the awaited condition in
/// the timeout error.
pub async fn poll_until<S, T>(
    subject: &mut S,
    what: &str,
    timeout: Duration,
    mut probe: impl for<'a> FnMut(&'a mut S) -> BoxFuture<'a, HarnessResult<Option<T>>>,
) -> HarnessResult<T> {
    let deadline = Instant::now() + timeout;
    let mut interval = POLL_INITIAL;

    loop {
        if let Some(value) = probe(&mut *subject).await? {
            return Ok(value);
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(HarnessError::Timeout {
                what: what.to_string(),
                timeout,
            });
        }

        tokio::time::sleep(interval.min(deadline - now)).await;
        interval = (interval * 3 / 2).min(POLL_MAX);
    }
}

/// Fixed pause for diagnostic stability only.
///
/// Scenarios may insert this before a screenshot or log point so the capture
/// shows a settled page. Correctness must never depend on it; waits that
/// guard scenario logic go through [`poll_until`]. Any remaining use of this
/// in a scenario marks a condition nobody has identified yet, i.e. a known
/// source of flakiness.
pub async fn settle(duration: Duration) {
    tokio::time::sleep(duration).await;
}
