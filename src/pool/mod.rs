//! Bounded worker pool for recognition jobs.
//!
//! # Admission
//!
//! ```text
//! submit() ──try_send──▶ [ single slot ] ──▶ worker 1..N ──▶ recognize_within()
//!    │                                                            │
//!    └─ slot occupied → false, immediately                        ▼
//!                                                       job.callback(outcome)
//! ```
//!
//! The admission queue holds exactly one job.  [`WorkerPool::submit`] never
//! waits: if the slot is taken it returns `false`.  Only one session is ever
//! outstanding, so the coordinator's own busy gate normally prevents this;
//! the slot is a second, independent guard.
//!
//! Callbacks run on a worker task and must not touch coordinator state;
//! they hand the outcome to a mailbox.

pub mod deadline;

pub use deadline::{recognize_within, Deadline, DeadlineEnd};

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::recognize::{RecognizeError, Recognizer};
use crate::select::Region;

/// Capacity of the admission queue.
const ADMISSION_SLOTS: usize = 1;

/// Outcome of one job, as delivered to its callback.
pub type JobOutcome = Result<String, RecognizeError>;

/// Completion callback, invoked exactly once from a worker task.
pub type JobCallback = Box<dyn FnOnce(JobOutcome) + Send + 'static>;

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

/// One unit of pool work.
pub struct Job {
    deadline: Deadline,
    region: Region,
    callback: JobCallback,
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("region", &self.region)
            .field("budget", &self.deadline.budget())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// WorkerPool
// ---------------------------------------------------------------------------

/// Fixed set of worker tasks behind a single-slot admission queue.
///
/// Must be created from within a tokio runtime.
pub struct WorkerPool {
    admission: Option<mpsc::Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `workers` workers (at least one) sharing `recognizer`.
    pub fn new(workers: usize, recognizer: Arc<dyn Recognizer>) -> Self {
        let (tx, rx) = mpsc::channel::<Job>(ADMISSION_SLOTS);
        let rx = Arc::new(Mutex::new(rx));
        let count = workers.max(1);

        let workers = (0..count)
            .map(|id| {
                let rx = Arc::clone(&rx);
                let recognizer = Arc::clone(&recognizer);
                tokio::spawn(worker_loop(id, rx, recognizer))
            })
            .collect();

        log::debug!("pool: started {count} worker(s)");
        Self {
            admission: Some(tx),
            workers,
        }
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Try to place a job in the admission slot.
    ///
    /// Returns `false` without waiting when the slot is occupied or the pool
    /// is closed; the callback is dropped uncalled in that case.
    pub fn submit<F>(&self, deadline: Deadline, region: Region, callback: F) -> bool
    where
        F: FnOnce(JobOutcome) + Send + 'static,
    {
        let Some(admission) = &self.admission else {
            log::warn!("pool: submit after close rejected");
            return false;
        };

        let job = Job {
            deadline,
            region,
            callback: Box::new(callback),
        };

        match admission.try_send(job) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(job)) => {
                log::debug!("pool: admission slot occupied, rejecting {job:?}");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                log::warn!("pool: all workers have exited, rejecting job");
                false
            }
        }
    }

    /// Stop accepting work, let queued and in-flight jobs finish, then return.
    pub async fn close(mut self) {
        self.admission.take();
        for handle in self.workers.drain(..) {
            if let Err(e) = handle.await {
                log::warn!("pool: worker ended abnormally: {e}");
            }
        }
        log::debug!("pool: closed");
    }

    /// Stop accepting work without waiting.  In-flight jobs are abandoned:
    /// they keep running and their callbacks still fire, but nobody waits.
    pub fn abandon(mut self) {
        self.admission.take();
        let running = self.workers.iter().filter(|h| !h.is_finished()).count();
        log::debug!("pool: abandoned with {running} worker(s) still running");
    }
}

async fn worker_loop(
    id: usize,
    rx: Arc<Mutex<mpsc::Receiver<Job>>>,
    recognizer: Arc<dyn Recognizer>,
) {
    loop {
        // Only one idle worker waits on the queue at a time; the rest wait
        // on the lock.
        let job = { rx.lock().await.recv().await };
        let Some(job) = job else { break };

        log::debug!("pool[{id}]: running {job:?}");
        let outcome = recognize_within(Arc::clone(&recognizer), job.region, &job.deadline).await;
        (job.callback)(outcome);
    }
    log::debug!("pool[{id}]: exiting");
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
