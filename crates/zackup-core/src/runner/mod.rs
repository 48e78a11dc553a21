//! Job runners: the code that actually backs up one host.
//!
//! The queue calls [`JobRunner::perform`] once per accepted job, from
//! whichever worker thread claimed it. The result is only logged there;
//! outcome details travel through [`MetricsRegistry`] instead.

mod command;
mod metrics;

pub use command::CommandRunner;
pub use metrics::{HostMetrics, MetricsRegistry, Outcome};

use crate::job::Job;
use crate::retry::RunError;

/// Performs the backup for one job.
pub trait JobRunner: Send + Sync {
    fn perform(&self, job: &Job) -> Result<(), RunError>;
}

impl<F> JobRunner for F
where
    F: Fn(&Job) -> Result<(), RunError> + Send + Sync,
{
    fn perform(&self, job: &Job) -> Result<(), RunError> {
        self(job)
    }
}
