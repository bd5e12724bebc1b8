//! Update Scheduler
//!
//! The scheduler batches deferred work. Component render effects and
//! post-flush watchers do not run when their dependencies change; they queue
//! a job instead, and the queue is drained once at the next flush.
//!
//! # Algorithm
//!
//! 1. `queue_job(id, job)` inserts the job unless a job with the same ID is
//!    already pending. Re-queueing keeps the original position.
//! 2. The first job queued after a flush asks the host for a flush via the
//!    installed requester (if any). Later jobs in the same burst do not.
//! 3. `flush_jobs()` drains the queue in insertion order. Jobs queued while
//!    flushing are drained in a following round, up to a fixed cap, so a job
//!    that keeps re-queueing itself cannot spin forever.
//!
//! Several synchronous mutations before the flush therefore collapse into a
//! single run of each job, which reads the latest state.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use tracing::{debug, warn};

/// Rounds a single flush may take before it gives up.
pub const MAX_FLUSH_ROUNDS: usize = 100;

/// Identifier used to de-duplicate queued jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobId(u64);

impl JobId {
    /// Generate a new unique job ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

/// A unit of deferred work.
pub type Job = Rc<dyn Fn()>;

/// Pending jobs plus flush state.
#[derive(Default)]
pub struct UpdateScheduler {
    queue: RefCell<IndexMap<JobId, Job>>,
    flush_requested: Cell<bool>,
    flushing: Cell<bool>,
    requester: RefCell<Option<Rc<dyn Fn()>>>,
}

thread_local! {
    static SCHEDULER: UpdateScheduler = UpdateScheduler::default();
}

struct FlushGuard<'a>(&'a UpdateScheduler);

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        self.0.flushing.set(false);
    }
}

impl UpdateScheduler {
    fn queue(&self, id: JobId, job: Job) {
        let inserted = {
            let mut queue = self.queue.borrow_mut();
            if queue.contains_key(&id) {
                false
            } else {
                queue.insert(id, job);
                true
            }
        };
        if !inserted || self.flushing.get() || self.flush_requested.replace(true) {
            return;
        }
        let requester = self.requester.borrow().clone();
        if let Some(request) = requester {
            request();
        }
    }

    fn flush(&self) -> usize {
        if self.flushing.replace(true) {
            return 0;
        }
        let _guard = FlushGuard(self);
        self.flush_requested.set(false);

        let mut ran = 0;
        for round in 0.. {
            let batch = std::mem::take(&mut *self.queue.borrow_mut());
            if batch.is_empty() {
                break;
            }
            if round == MAX_FLUSH_ROUNDS {
                warn!(
                    pending = batch.len(),
                    "maximum flush rounds exceeded; dropping pending jobs"
                );
                break;
            }
            for (_, job) in batch {
                job();
                ran += 1;
            }
        }
        debug!(jobs = ran, "flushed job queue");
        ran
    }
}

/// Queue a job for the next flush. A job whose ID is already pending is not
/// queued twice.
pub fn queue_job(id: JobId, job: Job) {
    SCHEDULER.with(|s| s.queue(id, job));
}

/// Run every pending job now. Returns the number of jobs run.
pub fn flush_jobs() -> usize {
    SCHEDULER.with(UpdateScheduler::flush)
}

/// Whether any job is waiting for a flush.
pub fn has_pending_jobs() -> bool {
    SCHEDULER.with(|s| !s.queue.borrow().is_empty())
}

/// Install the host primitive that schedules a flush, e.g. a closure that
/// spawns `flush_jobs` on a tokio `LocalSet`. It is called once per burst.
pub fn set_flush_requester(requester: impl Fn() + 'static) {
    SCHEDULER.with(|s| *s.requester.borrow_mut() = Some(Rc::new(requester)));
}

/// Remove the flush requester. Jobs then wait for an explicit flush.
pub fn clear_flush_requester() {
    SCHEDULER.with(|s| *s.requester.borrow_mut() = None);
}

/// Yield to the executor once, then flush pending jobs.
pub async fn next_tick() {
    tokio::task::yield_now().await;
    flush_jobs();
}
