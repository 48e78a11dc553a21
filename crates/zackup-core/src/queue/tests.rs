//! Pool sizing tests for the scheduler.

use super::*;
use crate::retry::RunError;

fn noop(_: &Job) -> Result<(), RunError> {
    Ok(())
}

#[test]
fn clamp_pool_size_bounds() {
    assert_eq!(clamp_pool_size(-5), 1);
    assert_eq!(clamp_pool_size(0), 1);
    assert_eq!(clamp_pool_size(1), 1);
    assert_eq!(clamp_pool_size(17), 17);
    assert_eq!(clamp_pool_size(255), 255);
    assert_eq!(clamp_pool_size(1000), MAX_POOL_SIZE);
}

#[test]
fn new_clamps_pool_size() {
    for (requested, expected) in [(-5, 1), (0, 1), (3, 3), (1000, 255)] {
        let s = Scheduler::new(requested, noop).unwrap();
        assert_eq!(s.size(), expected, "requested {requested}");
        s.shutdown();
    }
}

#[test]
fn resize_applies_clamped_size_immediately() {
    let s = Scheduler::new(4, noop).unwrap();
    s.resize(2).unwrap();
    assert_eq!(s.size(), 2);
    s.resize(10).unwrap();
    assert_eq!(s.size(), 10);
    s.resize(10).unwrap();
    assert_eq!(s.size(), 10);
    s.resize(0).unwrap();
    assert_eq!(s.size(), 1);
    s.resize(-3).unwrap();
    assert_eq!(s.size(), 1);
    s.resize(1000).unwrap();
    assert_eq!(s.size(), MAX_POOL_SIZE);
    s.shutdown();
}

#[test]
fn shrink_retires_oldest_workers() {
    let s = Scheduler::new(3, noop).unwrap();
    s.resize(1).unwrap();
    assert_eq!(worker_ids(&s), vec![2]);
    s.resize(2).unwrap();
    assert_eq!(worker_ids(&s), vec![2, 3]);
    s.shutdown();
}

fn worker_ids<R: JobRunner + 'static>(s: &Scheduler<R>) -> Vec<u64> {
    s.shared.lock_pool().workers.iter().map(WorkerHandle::id).collect()
}

#[test]
fn failed_growth_keeps_previous_pool() {
    let s = Scheduler::new(2, noop).unwrap();
    {
        let mut pool = s.shared.lock_pool();
        let mut calls = 0;
        let err = grow_pool(&mut pool.workers, 6, || {
            calls += 1;
            if calls == 3 {
                anyhow::bail!("thread limit reached");
            }
            worker::spawn(Arc::clone(&s.shared))
        })
        .unwrap_err();
        assert_eq!(err.to_string(), "thread limit reached");
        assert_eq!(pool.workers.len(), 2);
    }
    assert_eq!(worker_ids(&s), vec![0, 1]);

    // The two workers started before the failure were stopped again.
    let shared = Arc::clone(&s.shared);
    assert!(wait_for_live_workers(&shared, 2));

    s.resize(3).unwrap();
    assert_eq!(worker_ids(&s), vec![0, 1, 4]);
    s.shutdown();
    assert_eq!(shared.live_workers.count(), 0);
}

fn wait_for_live_workers<R>(shared: &Shared<R>, n: usize) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if shared.live_workers.count() == n {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    false
}

#[test]
fn shutdown_waits_for_retired_workers() {
    let s = Scheduler::new(5, noop).unwrap();
    s.resize(1).unwrap();
    let shared = Arc::clone(&s.shared);
    s.shutdown();
    assert_eq!(shared.live_workers.count(), 0);
}

#[test]
fn default_config_uses_documented_values() {
    let cfg = SchedulerConfig::default();
    assert_eq!(cfg.pool_size, 1);
    assert_eq!(cfg.backlog, 16);
    assert_eq!(cfg.duplicate_window, Duration::from_secs(300));
}
