//! Retry and backoff policy for backup commands.
//!
//! Retrying a failed backup is the job runner's business, never the
//! scheduler's: a worker invokes the runner once per accepted job and the
//! runner decides here whether to try again.

mod classify;
mod error;
mod policy;
mod run;

pub use classify::classify;
pub use error::RunError;
pub use policy::{ErrorKind, RetryDecision, RetryPolicy};
pub use run::run_with_retry;
