//! Backup job queue.
//!
//! A fixed-capacity FIFO feeds a resizable pool of worker threads. Before a
//! worker hands a job to the runner it consults the duplicate tracker, so a
//! host is never backed up twice at the same time nor again shortly after a
//! finished run. Different hosts run in parallel up to the pool size.
//!
//! Locking: one mutex guards the worker handles and the tracker. The FIFO is
//! a bounded channel with its own synchronization, so `enqueue` never
//! contends with `resize` or the duplicate check.

mod stats;
mod tracker;
mod wait_group;
mod worker;

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, Sender};

use crate::job::Job;
use crate::runner::JobRunner;
use wait_group::{DoneGuard, WaitGroup};
use worker::WorkerHandle;

pub use stats::QueueStats;
pub use tracker::{DuplicateTracker, LastSeenEntry, DEFAULT_DUPLICATE_WINDOW};

/// Upper bound on the pool size. Backups are bound by network and disk I/O
/// long before this many run at once; it only guards against misconfiguration.
pub const MAX_POOL_SIZE: usize = 255;

/// Default capacity of the pending-job queue.
pub const DEFAULT_BACKLOG: usize = 16;

/// Clamp a requested pool size to `[1, MAX_POOL_SIZE]`.
pub fn clamp_pool_size(size: i64) -> usize {
    size.clamp(1, MAX_POOL_SIZE as i64) as usize
}

/// Construction parameters for [`Scheduler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Initial number of workers (clamped).
    pub pool_size: i64,
    /// Capacity of the pending-job queue.
    pub backlog: usize,
    /// Suppression window after a host's last finished run.
    pub duplicate_window: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            pool_size: 1,
            backlog: DEFAULT_BACKLOG,
            duplicate_window: DEFAULT_DUPLICATE_WINDOW,
        }
    }
}

/// State guarded by the pool lock.
#[derive(Debug)]
struct Pool {
    /// Oldest first.
    workers: Vec<WorkerHandle>,
    tracker: DuplicateTracker,
}

/// State shared between the scheduler and its worker threads.
pub(crate) struct Shared<R> {
    runner: R,
    pool: Mutex<Pool>,
    jobs_rx: Receiver<Job>,
    /// Enqueued jobs not yet run or suppressed.
    in_flight: WaitGroup,
    /// Worker threads that have not left their loop yet.
    live_workers: WaitGroup,
    next_worker_id: AtomicU64,
    executed: AtomicU64,
    suppressed: AtomicU64,
}

impl<R: JobRunner> Shared<R> {
    fn lock_pool(&self) -> MutexGuard<'_, Pool> {
        self.pool.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Duplicate check, run, record finish. Always releases the job from `in_flight`.
    fn process(&self, job: Job) {
        let _done = DoneGuard(&self.in_flight);

        let perform = self.lock_pool().tracker.should_run(&job.host, Instant::now());
        if !perform {
            self.suppressed.fetch_add(1, Ordering::Relaxed);
            tracing::info!(host = %job.host, "duplicate job");
            return;
        }

        tracing::info!(host = %job.host, "starting backup");
        match panic::catch_unwind(AssertUnwindSafe(|| self.runner.perform(&job))) {
            Ok(Ok(())) => tracing::info!(host = %job.host, "backup finished"),
            Ok(Err(e)) => tracing::warn!(host = %job.host, error = %e, "backup failed"),
            Err(_) => tracing::error!(host = %job.host, "job runner panicked"),
        }
        self.lock_pool().tracker.finish(&job.host, Instant::now());
        self.executed.fetch_add(1, Ordering::Relaxed);
    }
}

/// Spawn workers until `workers` holds `target` handles. On error the handles
/// added by this call are dropped again, which stops their workers, so the
/// pool is left at its previous size.
fn grow_pool<F>(workers: &mut Vec<WorkerHandle>, target: usize, mut spawn: F) -> Result<()>
where
    F: FnMut() -> Result<WorkerHandle>,
{
    let before = workers.len();
    while workers.len() < target {
        match spawn() {
            Ok(handle) => workers.push(handle),
            Err(e) => {
                workers.truncate(before);
                return Err(e);
            }
        }
    }
    Ok(())
}

/// Bounded-concurrency backup scheduler.
///
/// Owns the pending queue, the worker pool and the duplicate tracker. Create
/// one per process and share it by reference (or `Arc`).
pub struct Scheduler<R: JobRunner + 'static> {
    shared: Arc<Shared<R>>,
    jobs_tx: Sender<Job>,
}

impl<R: JobRunner + 'static> Scheduler<R> {
    /// Start `size` workers (clamped to `[1, MAX_POOL_SIZE]`) with the default
    /// backlog and duplicate window.
    pub fn new(size: i64, runner: R) -> Result<Self> {
        Self::with_config(
            SchedulerConfig {
                pool_size: size,
                ..SchedulerConfig::default()
            },
            runner,
        )
    }

    pub fn with_config(cfg: SchedulerConfig, runner: R) -> Result<Self> {
        let size = clamp_pool_size(cfg.pool_size);
        let (jobs_tx, jobs_rx) = crossbeam_channel::bounded(cfg.backlog.max(1));
        let shared = Arc::new(Shared {
            runner,
            pool: Mutex::new(Pool {
                workers: Vec::with_capacity(MAX_POOL_SIZE),
                tracker: DuplicateTracker::new(cfg.duplicate_window),
            }),
            jobs_rx,
            in_flight: WaitGroup::new(),
            live_workers: WaitGroup::new(),
            next_worker_id: AtomicU64::new(0),
            executed: AtomicU64::new(0),
            suppressed: AtomicU64::new(0),
        });

        let scheduler = Self { shared, jobs_tx };
        {
            let mut pool = scheduler.shared.lock_pool();
            grow_pool(&mut pool.workers, size, || {
                worker::spawn(Arc::clone(&scheduler.shared))
            })
            .context("starting worker pool")?;
        }
        tracing::debug!(
            size,
            backlog = cfg.backlog.max(1),
            window = ?cfg.duplicate_window,
            "scheduler started"
        );
        Ok(scheduler)
    }

    /// Add a job. Blocks while the queue is full; jobs are never dropped.
    pub fn enqueue(&self, job: Job) {
        self.shared.in_flight.add(1);
        if let Err(e) = self.jobs_tx.send(job) {
            // Only possible when every receiver is gone, which `Shared` prevents.
            self.shared.in_flight.done();
            let job = e.into_inner();
            tracing::error!(host = %job.host, "job queue closed");
        }
    }

    /// Change the number of workers (clamped to `[1, MAX_POOL_SIZE]`).
    ///
    /// Shrinking retires the oldest workers; each finishes its current job
    /// before exiting. The handle count equals the new size on return. If a
    /// worker cannot be started the pool keeps its previous size.
    pub fn resize(&self, new_size: i64) -> Result<()> {
        let new_size = clamp_pool_size(new_size);
        let mut pool = self.shared.lock_pool();
        let current = pool.workers.len();

        if current > new_size {
            let retired: Vec<WorkerHandle> = pool.workers.drain(..current - new_size).collect();
            tracing::info!(
                from = current,
                to = new_size,
                retired = ?retired.iter().map(WorkerHandle::id).collect::<Vec<_>>(),
                "shrinking worker pool"
            );
        } else if current < new_size {
            tracing::info!(from = current, to = new_size, "growing worker pool");
            if let Err(e) = grow_pool(&mut pool.workers, new_size, || {
                worker::spawn(Arc::clone(&self.shared))
            }) {
                tracing::warn!(size = current, error = %e, "growing worker pool failed");
                return Err(e.context(format!("resizing worker pool to {new_size}")));
            }
        }
        Ok(())
    }

    /// Block until every enqueued job has run or been suppressed.
    /// Jobs enqueued while waiting extend the wait.
    pub fn wait(&self) {
        self.shared.in_flight.wait();
    }

    /// Current number of workers.
    pub fn size(&self) -> usize {
        self.shared.lock_pool().workers.len()
    }

    /// Snapshot of queue counters.
    pub fn stats(&self) -> QueueStats {
        let (pool_size, hosts_tracked, running_hosts) = {
            let pool = self.shared.lock_pool();
            (pool.workers.len(), pool.tracker.len(), pool.tracker.running())
        };
        QueueStats {
            pool_size,
            pending: self.jobs_tx.len(),
            in_flight: self.shared.in_flight.count(),
            hosts_tracked,
            running_hosts,
            executed: self.shared.executed.load(Ordering::Relaxed),
            suppressed: self.shared.suppressed.load(Ordering::Relaxed),
        }
    }

    /// Last start/finish recorded for `host`.
    pub fn last_seen(&self, host: &str) -> Option<LastSeenEntry> {
        self.shared.lock_pool().tracker.get(host).copied()
    }

    /// Stop every worker and block until all of them (including ones retired
    /// by earlier shrinks) have exited. Call `wait` first to let queued jobs
    /// run; anything still queued afterwards is discarded.
    pub fn shutdown(self) {
        self.stop_workers();
        self.shared.live_workers.wait();

        let mut discarded = 0usize;
        for job in self.shared.jobs_rx.try_iter() {
            tracing::debug!(host = %job.host, "discarding queued job");
            self.shared.in_flight.done();
            discarded += 1;
        }
        if discarded > 0 {
            tracing::warn!(discarded, "discarded queued jobs at shutdown");
        }
        tracing::debug!("scheduler stopped");
    }

    fn stop_workers(&self) {
        let mut pool = self.shared.lock_pool();
        pool.workers.clear();
    }
}

impl<R: JobRunner + 'static> Drop for Scheduler<R> {
    fn drop(&mut self) {
        self.stop_workers();
    }
}

#[cfg(test)]
mod tests;
