//! `zackup serve` – enqueue every host once per interval until interrupted.
//!
//! SIGHUP reloads the config: new host lists and commands apply from the next
//! round and the pool is resized to the new `parallel`. Timeout and retry
//! settings keep their startup values.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};
use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use zackup_core::config::ZackupConfig;
use zackup_core::queue::Scheduler;
use zackup_core::runner::{CommandRunner, JobRunner, MetricsRegistry};

use super::run::print_summary;
use crate::cli::load_config;

fn ticker(period_secs: u64, start: Instant) -> Interval {
    let period = Duration::from_secs(period_secs.max(1));
    let mut ticker = time::interval_at(start, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

/// Result of handling one SIGHUP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Reload {
    Applied { interval_changed: bool },
    Kept,
}

/// Switch to a freshly loaded config. The pool is resized to the new
/// `parallel` unless it was pinned on the command line. A load or resize
/// failure keeps the running config and pool size.
pub(super) fn apply_reload<R: JobRunner + 'static>(
    scheduler: &Scheduler<R>,
    cfg: &mut ZackupConfig,
    loaded: Result<ZackupConfig>,
    parallel: Option<i64>,
) -> Reload {
    let new_cfg = match loaded {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!("config reload failed, keeping previous: {:#}", e);
            return Reload::Kept;
        }
    };
    if let Err(e) = scheduler.resize(parallel.unwrap_or(new_cfg.parallel)) {
        tracing::warn!("config reload failed, keeping previous: {:#}", e);
        return Reload::Kept;
    }
    let interval_changed = new_cfg.interval_secs != cfg.interval_secs;
    *cfg = new_cfg;
    tracing::info!(
        hosts = cfg.hosts.len(),
        pool = scheduler.size(),
        "config reloaded"
    );
    Reload::Applied { interval_changed }
}

pub async fn run_serve(
    mut cfg: ZackupConfig,
    config_path: Option<&Path>,
    parallel: Option<i64>,
) -> Result<()> {
    let metrics = MetricsRegistry::new();
    let runner = CommandRunner::from_config(&cfg, metrics.clone());
    let mut sched_cfg = cfg.scheduler_config();
    if let Some(n) = parallel {
        sched_cfg.pool_size = n;
    }
    let scheduler = Arc::new(Scheduler::with_config(sched_cfg, runner)?);

    let mut hangup = signal(SignalKind::hangup()).context("installing SIGHUP handler")?;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut rounds = ticker(cfg.interval_secs, Instant::now());

    tracing::info!(
        hosts = cfg.hosts.len(),
        interval_secs = cfg.interval_secs,
        pool = scheduler.size(),
        "serving"
    );

    loop {
        tokio::select! {
            _ = rounds.tick() => {
                let jobs = cfg.jobs();
                tracing::info!(hosts = jobs.len(), "enqueueing scheduled backups");
                let sched = Arc::clone(&scheduler);
                tokio::task::spawn_blocking(move || {
                    for job in jobs {
                        sched.enqueue(job);
                    }
                })
                .await
                .context("enqueue task")?;
            }
            _ = hangup.recv() => {
                let loaded = load_config(config_path);
                let reload = apply_reload(&scheduler, &mut cfg, loaded, parallel);
                if matches!(reload, Reload::Applied { interval_changed: true }) {
                    let period = Duration::from_secs(cfg.interval_secs.max(1));
                    rounds = ticker(cfg.interval_secs, Instant::now() + period);
                }
            }
            res = &mut ctrl_c => {
                res.context("waiting for Ctrl-C")?;
                tracing::info!(stats = ?scheduler.stats(), "interrupted, waiting for running backups");
                break;
            }
        }
    }

    tokio::task::spawn_blocking(move || {
        scheduler.wait();
        match Arc::try_unwrap(scheduler) {
            Ok(s) => s.shutdown(),
            Err(_) => tracing::warn!("scheduler still shared at exit; workers not joined"),
        }
    })
    .await
    .context("shutdown task")?;

    print_summary(&metrics.snapshot());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use zackup_core::job::Job;
    use zackup_core::retry::RunError;

    fn noop(_: &Job) -> Result<(), RunError> {
        Ok(())
    }

    fn write_config(dir: &Path, body: &str) -> std::path::PathBuf {
        let path = dir.join("config.toml");
        fs::write(&path, body).unwrap();
        path
    }

    fn initial_config() -> ZackupConfig {
        ZackupConfig::from_toml("parallel = 2\ninterval_secs = 60\n[[hosts]]\nname = \"a\"\n")
            .unwrap()
    }

    #[test]
    fn reload_resizes_pool_and_replaces_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            dir.path(),
            "parallel = 5\ninterval_secs = 60\n[[hosts]]\nname = \"a\"\n[[hosts]]\nname = \"b\"\n",
        );
        let scheduler = Scheduler::new(2, noop).unwrap();
        let mut cfg = initial_config();

        let reload = apply_reload(&scheduler, &mut cfg, load_config(Some(&path)), None);
        assert_eq!(reload, Reload::Applied { interval_changed: false });
        assert_eq!(scheduler.size(), 5);
        assert_eq!(cfg.parallel, 5);
        assert_eq!(cfg.hosts.len(), 2);

        // A new interval is reported so the ticker can be rebuilt.
        let path = write_config(dir.path(), "parallel = 0\ninterval_secs = 120\n");
        let reload = apply_reload(&scheduler, &mut cfg, load_config(Some(&path)), None);
        assert_eq!(reload, Reload::Applied { interval_changed: true });
        assert_eq!(scheduler.size(), 1);
        assert_eq!(cfg.interval_secs, 120);
        scheduler.shutdown();
    }

    #[test]
    fn reload_keeps_parallel_pinned_on_command_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), "parallel = 8\n");
        let scheduler = Scheduler::new(3, noop).unwrap();
        let mut cfg = initial_config();

        let reload = apply_reload(&scheduler, &mut cfg, load_config(Some(&path)), Some(3));
        assert!(matches!(reload, Reload::Applied { .. }));
        assert_eq!(scheduler.size(), 3);
        assert_eq!(cfg.parallel, 8);
        scheduler.shutdown();
    }

    #[test]
    fn failed_reload_keeps_previous_config_and_pool() {
        let dir = tempfile::tempdir().unwrap();
        let scheduler = Scheduler::new(2, noop).unwrap();
        let mut cfg = initial_config();
        let before = cfg.clone();

        // Duplicate host names fail validation.
        let broken = write_config(
            dir.path(),
            "parallel = 6\n[[hosts]]\nname = \"a\"\n[[hosts]]\nname = \"a\"\n",
        );
        let reload = apply_reload(&scheduler, &mut cfg, load_config(Some(&broken)), None);
        assert_eq!(reload, Reload::Kept);

        let missing = dir.path().join("missing.toml");
        let reload = apply_reload(&scheduler, &mut cfg, load_config(Some(&missing)), None);
        assert_eq!(reload, Reload::Kept);

        assert_eq!(cfg, before);
        assert_eq!(scheduler.size(), 2);
        scheduler.shutdown();
    }
}
