//! Retry loop: run a closure until success or policy says stop.

use super::classify::classify;
use super::error::RunError;
use super::policy::{RetryDecision, RetryPolicy};

/// Runs `f` until it succeeds or the retry policy says to stop.
/// `f` receives the 1-based attempt number. On retryable failure, sleeps for
/// the backoff duration then tries again; the last error is returned.
pub fn run_with_retry<F>(policy: &RetryPolicy, mut f: F) -> Result<(), RunError>
where
    F: FnMut(u32) -> Result<(), RunError>,
{
    let mut attempt = 1u32;
    loop {
        match f(attempt) {
            Ok(()) => return Ok(()),
            Err(e) => match policy.decide(attempt, classify(&e)) {
                RetryDecision::NoRetry => return Err(e),
                RetryDecision::RetryAfter(d) => {
                    tracing::debug!(attempt, delay = ?d, error = %e, "retrying backup command");
                    std::thread::sleep(d);
                    attempt += 1;
                }
            },
        }
    }
}
