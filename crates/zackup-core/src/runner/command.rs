//! Job runner that shells out to a configured backup command.

use std::io;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant, SystemTime};

use super::metrics::MetricsRegistry;
use super::JobRunner;
use crate::config::ZackupConfig;
use crate::job::Job;
use crate::retry::{run_with_retry, RetryPolicy, RunError};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Runs `sh -c <command>` per job, with `{host}` replaced by the job's host.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    default_command: String,
    timeout: Option<Duration>,
    retry: RetryPolicy,
    metrics: MetricsRegistry,
}

impl CommandRunner {
    pub fn new(default_command: impl Into<String>) -> Self {
        Self {
            default_command: default_command.into(),
            timeout: None,
            retry: RetryPolicy::no_retry(),
            metrics: MetricsRegistry::new(),
        }
    }

    /// Runner with the command, timeout and retry policy from `cfg`.
    pub fn from_config(cfg: &ZackupConfig, metrics: MetricsRegistry) -> Self {
        let retry = cfg
            .retry
            .as_ref()
            .map(RetryPolicy::from)
            .unwrap_or_default();
        Self::new(cfg.command.clone())
            .with_timeout(cfg.command_timeout())
            .with_retry(retry)
            .with_metrics(metrics)
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_metrics(mut self, metrics: MetricsRegistry) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> &MetricsRegistry {
        &self.metrics
    }

    /// Command line for `job` after `{host}` substitution.
    pub fn command_line(&self, job: &Job) -> String {
        job.command
            .as_deref()
            .unwrap_or(&self.default_command)
            .replace("{host}", &job.host)
    }

    fn run_once(&self, line: &str) -> Result<(), RunError> {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(line).stdin(Stdio::null());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            // Own group, so a timeout reaches everything the shell started.
            cmd.process_group(0);
        }
        let mut child = cmd.spawn().map_err(RunError::Spawn)?;

        let status = match self.timeout {
            None => child.wait().map_err(RunError::Wait)?,
            Some(limit) => wait_with_timeout(&mut child, limit)?,
        };
        if status.success() {
            Ok(())
        } else {
            Err(RunError::ExitStatus {
                code: status.code(),
            })
        }
    }
}

/// Poll `child` until it exits or `limit` elapses; on timeout kill its process
/// group and reap it.
fn wait_with_timeout(child: &mut Child, limit: Duration) -> Result<ExitStatus, RunError> {
    let deadline = Instant::now() + limit;
    loop {
        if let Some(status) = child.try_wait().map_err(RunError::Wait)? {
            return Ok(status);
        }
        let now = Instant::now();
        if now >= deadline {
            kill_tree(child).map_err(RunError::Wait)?;
            child.wait().map_err(RunError::Wait)?;
            return Err(RunError::Timeout(limit));
        }
        thread::sleep(POLL_INTERVAL.min(deadline - now));
    }
}

/// SIGKILL the child's process group (the child is its leader).
#[cfg(unix)]
fn kill_tree(child: &mut Child) -> io::Result<()> {
    let pgid = child.id() as libc::pid_t;
    let r = unsafe { libc::kill(-pgid, libc::SIGKILL) };
    if r == 0 {
        return Ok(());
    }
    let err = io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::ESRCH) {
        // Group already gone; the leader may still need reaping.
        return Ok(());
    }
    tracing::debug!(pid = pgid, error = %err, "killing process group failed, killing child only");
    child.kill()
}

#[cfg(not(unix))]
fn kill_tree(child: &mut Child) -> io::Result<()> {
    child.kill()
}

impl JobRunner for CommandRunner {
    fn perform(&self, job: &Job) -> Result<(), RunError> {
        let line = self.command_line(job);
        let started = Instant::now();
        self.metrics.record_start(&job.host, SystemTime::now());

        let result = run_with_retry(&self.retry, |attempt| {
            tracing::debug!(host = %job.host, attempt, command = %line, "running backup command");
            self.run_once(&line)
        });

        match &result {
            Ok(()) => {
                self.metrics
                    .record_success(&job.host, SystemTime::now(), started.elapsed());
            }
            Err(_) => self.metrics.record_failure(&job.host, SystemTime::now()),
        }
        result
    }
}
