//! Per-host backup outcomes, readable without touching the queue.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, SystemTime};

/// Result of the last finished run for a host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Running,
    Succeeded,
    Failed,
}

/// What we know about one host's backups.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostMetrics {
    pub host: String,
    pub started_at: Option<SystemTime>,
    pub succeeded_at: Option<SystemTime>,
    pub failed_at: Option<SystemTime>,
    /// Wall time of the last successful run (retries included).
    pub success_duration: Option<Duration>,
    pub runs: u32,
    pub failures: u32,
}

impl HostMetrics {
    fn new(host: &str) -> Self {
        Self {
            host: host.to_string(),
            ..Self::default()
        }
    }

    /// Outcome of the most recent run, `None` if the host never ran.
    pub fn outcome(&self) -> Option<Outcome> {
        let started = self.started_at?;
        let finished = match (self.succeeded_at, self.failed_at) {
            (Some(s), Some(f)) => Some(if s >= f {
                (s, Outcome::Succeeded)
            } else {
                (f, Outcome::Failed)
            }),
            (Some(s), None) => Some((s, Outcome::Succeeded)),
            (None, Some(f)) => Some((f, Outcome::Failed)),
            (None, None) => None,
        };
        match finished {
            Some((at, outcome)) if at >= started => Some(outcome),
            _ => Some(Outcome::Running),
        }
    }
}

/// Shared registry of [`HostMetrics`], cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct MetricsRegistry {
    hosts: Arc<RwLock<HashMap<String, HostMetrics>>>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn update(&self, host: &str, f: impl FnOnce(&mut HostMetrics)) {
        let mut hosts = self.hosts.write().unwrap_or_else(PoisonError::into_inner);
        let entry = hosts
            .entry(host.to_string())
            .or_insert_with(|| HostMetrics::new(host));
        f(entry);
    }

    pub fn record_start(&self, host: &str, at: SystemTime) {
        self.update(host, |m| {
            m.started_at = Some(at);
            m.runs = m.runs.saturating_add(1);
        });
    }

    pub fn record_success(&self, host: &str, at: SystemTime, duration: Duration) {
        self.update(host, |m| {
            m.succeeded_at = Some(at);
            m.success_duration = Some(duration);
        });
    }

    pub fn record_failure(&self, host: &str, at: SystemTime) {
        self.update(host, |m| {
            m.failed_at = Some(at);
            m.failures = m.failures.saturating_add(1);
        });
    }

    pub fn get(&self, host: &str) -> Option<HostMetrics> {
        self.hosts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(host)
            .cloned()
    }

    /// All hosts, sorted by name.
    pub fn snapshot(&self) -> Vec<HostMetrics> {
        let mut all: Vec<HostMetrics> = self
            .hosts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        all.sort_by(|a, b| a.host.cmp(&b.host));
        all
    }
}
