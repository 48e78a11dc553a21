//! Worker threads: pull jobs from the shared queue until told to stop.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;

use anyhow::{Context, Result};
use crossbeam_channel::{select, Receiver, Sender, TryRecvError};

use super::wait_group::DoneGuard;
use super::Shared;
use crate::job::Job;
use crate::runner::JobRunner;

/// The pool's reference to one live worker.
///
/// Dropping the handle closes the worker's shutdown channel; the worker
/// notices between jobs and exits. A job already in progress runs to the end.
#[derive(Debug)]
pub(crate) struct WorkerHandle {
    id: u64,
    _quit: Sender<()>,
}

impl WorkerHandle {
    pub(crate) fn id(&self) -> u64 {
        self.id
    }
}

/// Start one worker thread and return its handle.
pub(crate) fn spawn<R: JobRunner + 'static>(shared: Arc<Shared<R>>) -> Result<WorkerHandle> {
    let id = shared.next_worker_id.fetch_add(1, Ordering::Relaxed);
    let (quit_tx, quit_rx) = crossbeam_channel::bounded::<()>(0);
    let jobs = shared.jobs_rx.clone();

    shared.live_workers.add(1);
    let thread_shared = Arc::clone(&shared);
    let spawned = thread::Builder::new()
        .name(format!("zackup-worker-{id}"))
        .spawn(move || run(id, &thread_shared, &jobs, &quit_rx));

    match spawned {
        Ok(_) => Ok(WorkerHandle { id, _quit: quit_tx }),
        Err(e) => {
            shared.live_workers.done();
            Err(e).with_context(|| format!("spawning worker {id}"))
        }
    }
}

fn run<R: JobRunner>(
    id: u64,
    shared: &Shared<R>,
    jobs: &Receiver<Job>,
    quit: &Receiver<()>,
) {
    let _stopped = DoneGuard(&shared.live_workers);
    tracing::debug!(worker = id, "worker started");
    loop {
        // A retired worker must not claim another job, even if one is ready.
        if !matches!(quit.try_recv(), Err(TryRecvError::Empty)) {
            break;
        }
        select! {
            recv(jobs) -> msg => match msg {
                Ok(job) => shared.process(job),
                Err(_) => break,
            },
            // Closed when the handle is dropped; no value is ever sent.
            recv(quit) -> _ => break,
        }
    }
    tracing::debug!(worker = id, "worker stopped");
}
