//! Per-host duplicate detection.
//!
//! Tracks when the last run for each host started and finished so the queue
//! can refuse to start a host that is still running or finished only a short
//! while ago. All access happens under the scheduler's pool lock, which makes
//! the check and the recording of the new start time one indivisible step.

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Default span after a finished run during which the host is not run again.
pub const DEFAULT_DUPLICATE_WINDOW: Duration = Duration::from_secs(5 * 60);

/// Start and finish of the most recent run for one host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LastSeenEntry {
    pub start: Instant,
    /// `None` until the first run for the host completes.
    pub finish: Option<Instant>,
}

impl LastSeenEntry {
    fn started(now: Instant) -> Self {
        Self {
            start: now,
            finish: None,
        }
    }

    /// A run has started and has not recorded its finish yet.
    pub fn is_active(&self) -> bool {
        match self.finish {
            None => true,
            Some(finish) => self.start > finish,
        }
    }

    /// `now` is no later than `finish + window`.
    pub fn finished_recently(&self, now: Instant, window: Duration) -> bool {
        match self.finish {
            None => false,
            Some(finish) => finish.checked_add(window).map_or(true, |until| now <= until),
        }
    }

    /// Either active or recently finished; a new run must be suppressed.
    pub fn is_recent(&self, now: Instant, window: Duration) -> bool {
        self.is_active() || self.finished_recently(now, window)
    }
}

/// Map from host to its last run, plus the suppression window.
#[derive(Debug, Clone)]
pub struct DuplicateTracker {
    entries: HashMap<String, LastSeenEntry>,
    window: Duration,
}

impl Default for DuplicateTracker {
    fn default() -> Self {
        Self::new(DEFAULT_DUPLICATE_WINDOW)
    }
}

impl DuplicateTracker {
    pub fn new(window: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            window,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Decide whether a run for `host` may start at `now`, and if so mark it started.
    ///
    /// Returns `false` while the host is active (no timeout applies: a run that
    /// never records its finish keeps the host suppressed) or within the
    /// window after its last finish.
    pub fn should_run(&mut self, host: &str, now: Instant) -> bool {
        match self.entries.get_mut(host) {
            None => {
                self.entries
                    .insert(host.to_string(), LastSeenEntry::started(now));
                true
            }
            Some(entry) if !entry.is_recent(now, self.window) => {
                entry.start = now;
                true
            }
            Some(_) => false,
        }
    }

    /// Record that the current run for `host` completed at `now`.
    pub fn finish(&mut self, host: &str, now: Instant) {
        if let Some(entry) = self.entries.get_mut(host) {
            entry.finish = Some(now);
        }
    }

    pub fn get(&self, host: &str) -> Option<&LastSeenEntry> {
        self.entries.get(host)
    }

    /// Number of hosts seen so far.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of hosts with a run in progress.
    pub fn running(&self) -> usize {
        self.entries.values().filter(|e| e.is_active()).count()
    }
}
