//! `zackup run` – back up hosts once, wait for completion, print a summary.

use anyhow::{bail, Context, Result};
use zackup_core::config::ZackupConfig;
use zackup_core::queue::{QueueStats, Scheduler};
use zackup_core::runner::{CommandRunner, HostMetrics, MetricsRegistry, Outcome};

pub async fn run_once(cfg: &ZackupConfig, hosts: &[String], parallel: Option<i64>) -> Result<()> {
    let jobs = cfg.select_jobs(hosts)?;
    if jobs.is_empty() {
        println!("no hosts to back up");
        return Ok(());
    }

    let metrics = MetricsRegistry::new();
    let runner = CommandRunner::from_config(cfg, metrics.clone());
    let mut sched_cfg = cfg.scheduler_config();
    if let Some(n) = parallel {
        sched_cfg.pool_size = n;
    }

    let count = jobs.len();
    let stats = tokio::task::spawn_blocking(move || -> Result<QueueStats> {
        let scheduler = Scheduler::with_config(sched_cfg, runner)?;
        for job in jobs {
            scheduler.enqueue(job);
        }
        scheduler.wait();
        let stats = scheduler.stats();
        scheduler.shutdown();
        Ok(stats)
    })
    .await
    .context("scheduler task")??;

    tracing::info!(
        jobs = count,
        executed = stats.executed,
        suppressed = stats.suppressed,
        "backup run complete"
    );

    let snapshot = metrics.snapshot();
    print_summary(&snapshot);

    let failed = snapshot
        .iter()
        .filter(|m| m.outcome() == Some(Outcome::Failed))
        .count();
    if failed > 0 {
        bail!("{} of {} backup(s) failed", failed, count);
    }
    Ok(())
}

fn outcome_label(m: &HostMetrics) -> &'static str {
    match m.outcome() {
        Some(Outcome::Succeeded) => "ok",
        Some(Outcome::Failed) => "FAILED",
        Some(Outcome::Running) => "running",
        None => "-",
    }
}

/// One line per host: name, last outcome, duration of the last success.
pub(super) fn print_summary(hosts: &[HostMetrics]) {
    for m in hosts {
        let duration = m
            .success_duration
            .map(|d| format!("{:.1}s", d.as_secs_f64()))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<32} {:<8} {:>10}  runs={} failures={}",
            m.host,
            outcome_label(m),
            duration,
            m.runs,
            m.failures
        );
    }
}
