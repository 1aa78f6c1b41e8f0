//! Deadline-bounded polling.

use std::time::{Duration, Instant};

/// Poll `predicate` until it returns true or `max_wait` elapses, sleeping
/// `interval` between polls.
///
/// The predicate runs at least once, so a zero `max_wait` still gives it a
/// single shot. Returns whether the predicate ever returned true.
pub async fn wait_for<F>(mut predicate: F, max_wait: Duration, interval: Duration) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + max_wait;
    loop {
        if predicate() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(interval).await;
    }
}
