//! Read-only snapshot of queue state for status output and metrics consumers.

/// Counters describing the scheduler at one point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueStats {
    /// Number of workers.
    pub pool_size: usize,
    /// Jobs sitting in the queue, not yet claimed by a worker.
    pub pending: usize,
    /// Jobs enqueued but not yet run or suppressed (includes `pending`).
    pub in_flight: usize,
    /// Hosts the duplicate tracker has seen.
    pub hosts_tracked: usize,
    /// Hosts with a backup in progress.
    pub running_hosts: usize,
    /// Jobs handed to the runner since start.
    pub executed: u64,
    /// Jobs suppressed as duplicates since start.
    pub suppressed: u64,
}

impl QueueStats {
    /// No job is queued or running.
    pub fn is_idle(&self) -> bool {
        self.in_flight == 0
    }
}
