//! Error type reported by a job runner for one backup attempt.

use std::time::Duration;

use thiserror::Error;

/// Failure of a single backup attempt.
#[derive(Debug, Error)]
pub enum RunError {
    /// The backup command could not be started (missing shell, permissions).
    #[error("failed to start backup command: {0}")]
    Spawn(#[source] std::io::Error),
    /// Waiting on (or killing) the child process failed.
    #[error("failed to wait for backup command: {0}")]
    Wait(#[source] std::io::Error),
    /// The command exited unsuccessfully. `code` is `None` when killed by a signal.
    #[error("backup command exited with {}", describe_code(.code))]
    ExitStatus { code: Option<i32> },
    /// The command ran longer than the configured timeout and was killed.
    #[error("backup command timed out after {0:?}")]
    Timeout(Duration),
    /// Any other runner-specific failure.
    #[error("{0}")]
    Other(String),
}

fn describe_code(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("status {c}"),
        None => "signal".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_exit_status() {
        let e = RunError::ExitStatus { code: Some(23) };
        assert_eq!(e.to_string(), "backup command exited with status 23");
        let e = RunError::ExitStatus { code: None };
        assert_eq!(e.to_string(), "backup command exited with signal");
    }
}
