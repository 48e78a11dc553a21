//! Backup job: one requested run for a single host.

/// One requested backup run.
///
/// The host name is the identity used for duplicate suppression; two jobs
/// for the same host are never run concurrently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    /// Host identifier (e.g. `db1.example.com`).
    pub host: String,
    /// Command line to run for this host. When `None`, the runner's default applies.
    pub command: Option<String>,
}

impl Job {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            command: None,
        }
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }
}
