use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::job::Job;
use crate::queue::{SchedulerConfig, DEFAULT_BACKLOG};

/// Retry policy parameters for backup commands (optional section in config.toml).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts per backup (including the first).
    pub max_attempts: u32,
    /// Base delay in seconds for exponential backoff.
    pub base_delay_secs: f64,
    /// Maximum backoff delay in seconds.
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_secs: 5.0,
            max_delay_secs: 300,
        }
    }
}

/// One backup target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostConfig {
    /// Host identifier; also substituted for `{host}` in the command.
    pub name: String,
    /// Per-host command override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
}

/// Global configuration loaded from `~/.config/zackup/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZackupConfig {
    /// Number of hosts backed up in parallel. Clamped to [1, 255].
    #[serde(default = "default_parallel")]
    pub parallel: i64,
    /// Capacity of the pending-job queue; producers block when it is full.
    #[serde(default = "default_backlog")]
    pub backlog: usize,
    /// Seconds after a finished run during which new requests for that host are suppressed.
    #[serde(default = "default_duplicate_window_secs")]
    pub duplicate_window_secs: u64,
    /// Default backup command, run via `sh -c`; `{host}` is replaced by the host name.
    #[serde(default = "default_command")]
    pub command: String,
    /// Optional per-attempt timeout for the backup command.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command_timeout_secs: Option<u64>,
    /// Period of `zackup serve` in seconds.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Optional retry policy; if missing, built-in defaults are used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryConfig>,
    #[serde(default)]
    pub hosts: Vec<HostConfig>,
}

fn default_parallel() -> i64 {
    4
}

fn default_backlog() -> usize {
    DEFAULT_BACKLOG
}

fn default_duplicate_window_secs() -> u64 {
    5 * 60
}

fn default_command() -> String {
    "rsync -a --delete --numeric-ids root@{host}:/ /srv/backup/{host}/".to_string()
}

fn default_interval_secs() -> u64 {
    24 * 60 * 60
}

impl Default for ZackupConfig {
    fn default() -> Self {
        Self {
            parallel: default_parallel(),
            backlog: default_backlog(),
            duplicate_window_secs: default_duplicate_window_secs(),
            command: default_command(),
            command_timeout_secs: None,
            interval_secs: default_interval_secs(),
            retry: None,
            hosts: Vec::new(),
        }
    }
}

impl ZackupConfig {
    /// Parse and validate a config document.
    pub fn from_toml(data: &str) -> Result<Self> {
        let cfg: ZackupConfig = toml::from_str(data)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject empty or duplicate host names.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for host in &self.hosts {
            if host.name.trim().is_empty() {
                bail!("host entry with empty name");
            }
            if !seen.insert(host.name.as_str()) {
                bail!("duplicate host in config: {}", host.name);
            }
        }
        Ok(())
    }

    pub fn duplicate_window(&self) -> Duration {
        Duration::from_secs(self.duplicate_window_secs)
    }

    pub fn command_timeout(&self) -> Option<Duration> {
        self.command_timeout_secs.map(Duration::from_secs)
    }

    /// Scheduler parameters derived from this config.
    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            pool_size: self.parallel,
            backlog: self.backlog,
            duplicate_window: self.duplicate_window(),
        }
    }

    pub fn host(&self, name: &str) -> Option<&HostConfig> {
        self.hosts.iter().find(|h| h.name == name)
    }

    /// Effective command for a host (override or global default).
    pub fn command_for<'a>(&'a self, host: &'a HostConfig) -> &'a str {
        host.command.as_deref().unwrap_or(&self.command)
    }

    fn job_for(&self, host: &HostConfig) -> Job {
        Job::new(host.name.clone()).with_command(self.command_for(host))
    }

    /// One job per configured host, in config order.
    pub fn jobs(&self) -> Vec<Job> {
        self.hosts.iter().map(|h| self.job_for(h)).collect()
    }

    /// Jobs for the named hosts, or for all hosts when `names` is empty.
    pub fn select_jobs(&self, names: &[String]) -> Result<Vec<Job>> {
        if names.is_empty() {
            return Ok(self.jobs());
        }
        names
            .iter()
            .map(|name| {
                self.host(name)
                    .map(|h| self.job_for(h))
                    .with_context(|| format!("unknown host: {name}"))
            })
            .collect()
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("zackup")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from the given file.
pub fn load_from_path(path: &Path) -> Result<ZackupConfig> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    ZackupConfig::from_toml(&data).with_context(|| format!("parsing config {}", path.display()))
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<ZackupConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = ZackupConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    load_from_path(&path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = ZackupConfig::default();
        assert_eq!(cfg.parallel, 4);
        assert_eq!(cfg.backlog, 16);
        assert_eq!(cfg.duplicate_window(), Duration::from_secs(300));
        assert!(cfg.hosts.is_empty());
        assert!(cfg.retry.is_none());
    }

    #[test]
    fn config_toml_roundtrip() {
        let mut cfg = ZackupConfig::default();
        cfg.hosts.push(HostConfig {
            name: "a.example.com".into(),
            command: Some("echo {host}".into()),
        });
        cfg.retry = Some(RetryConfig::default());
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed = ZackupConfig::from_toml(&toml).unwrap();
        assert_eq!(parsed, cfg);
    }

    #[test]
    fn config_toml_custom_values() {
        let toml = r#"
            parallel = 8
            backlog = 4
            duplicate_window_secs = 60
            command = "backup {host}"
            command_timeout_secs = 120

            [retry]
            max_attempts = 2
            base_delay_secs = 0.5
            max_delay_secs = 15

            [[hosts]]
            name = "db1"

            [[hosts]]
            name = "web1"
            command = "special {host}"
        "#;
        let cfg = ZackupConfig::from_toml(toml).unwrap();
        assert_eq!(cfg.parallel, 8);
        assert_eq!(cfg.backlog, 4);
        assert_eq!(cfg.command_timeout(), Some(Duration::from_secs(120)));
        let sched = cfg.scheduler_config();
        assert_eq!(sched.pool_size, 8);
        assert_eq!(sched.duplicate_window, Duration::from_secs(60));
        let retry = cfg.retry.as_ref().unwrap();
        assert_eq!(retry.max_attempts, 2);

        let jobs = cfg.jobs();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].command.as_deref(), Some("backup {host}"));
        assert_eq!(jobs[1].command.as_deref(), Some("special {host}"));
    }

    #[test]
    fn missing_fields_use_defaults() {
        let cfg = ZackupConfig::from_toml("[[hosts]]\nname = \"a\"\n").unwrap();
        assert_eq!(cfg.parallel, 4);
        assert_eq!(cfg.interval_secs, 86_400);
        assert_eq!(cfg.hosts.len(), 1);
    }

    #[test]
    fn duplicate_host_is_rejected() {
        let toml = r#"
            [[hosts]]
            name = "a"
            [[hosts]]
            name = "a"
        "#;
        let err = ZackupConfig::from_toml(toml).unwrap_err();
        assert!(err.to_string().contains("duplicate host"));
    }

    #[test]
    fn select_jobs_filters_and_rejects_unknown() {
        let cfg = ZackupConfig::from_toml(
            "[[hosts]]\nname = \"a\"\n[[hosts]]\nname = \"b\"\n",
        )
        .unwrap();
        let jobs = cfg.select_jobs(&["b".to_string()]).unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].host, "b");
        assert_eq!(cfg.select_jobs(&[]).unwrap().len(), 2);
        assert!(cfg.select_jobs(&["nope".to_string()]).is_err());
    }

    #[test]
    fn load_from_path_reads_file() {
        let f = tempfile::NamedTempFile::new().unwrap();
        fs::write(f.path(), "parallel = 2\n[[hosts]]\nname = \"x\"\n").unwrap();
        let cfg = load_from_path(f.path()).unwrap();
        assert_eq!(cfg.parallel, 2);
        assert_eq!(cfg.host("x").map(|h| h.name.as_str()), Some("x"));
    }
}
