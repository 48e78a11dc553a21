//! Classify runner errors into retry policy error kinds.

use super::error::RunError;
use super::policy::ErrorKind;

/// Classify a run error for retry decisions.
///
/// A command that ran and failed (non-zero exit, killed, timed out) may
/// succeed on the next attempt; failing to start it at all will not.
pub fn classify(e: &RunError) -> ErrorKind {
    match e {
        RunError::ExitStatus { .. } | RunError::Timeout(_) => ErrorKind::Transient,
        RunError::Spawn(_) | RunError::Wait(_) | RunError::Other(_) => ErrorKind::Permanent,
    }
}
