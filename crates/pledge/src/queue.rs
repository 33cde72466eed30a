//! FIFO deferred-job queue.
//!
//! Reactions never run inline. Settling a promise or chaining onto a settled
//! one only *enqueues* jobs; they run when the host drains the queue. Jobs
//! scheduled earlier always run before jobs scheduled later, including jobs
//! enqueued while a drain is in progress.

use std::cell::RefCell;
use std::collections::VecDeque;

use tracing::{debug, warn};

use crate::config::RuntimeConfig;
use crate::error::PledgeError;

/// A unit of deferred work.
pub type Job = Box<dyn FnOnce()>;

/// Single-threaded FIFO queue of deferred jobs.
pub struct JobQueue {
    jobs: RefCell<VecDeque<Job>>,
    max_jobs_per_drain: Option<usize>,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::with_config(&RuntimeConfig::default())
    }

    pub fn with_config(config: &RuntimeConfig) -> Self {
        Self {
            jobs: RefCell::new(VecDeque::with_capacity(config.initial_queue_capacity)),
            max_jobs_per_drain: config.max_jobs_per_drain,
        }
    }

    /// Append a job to the back of the queue.
    pub fn schedule(&self, job: Job) {
        self.jobs.borrow_mut().push_back(job);
    }

    /// Run the oldest queued job. Returns `false` if the queue was empty.
    pub fn run_one(&self) -> bool {
        // The queue borrow must end before the job runs; jobs enqueue more jobs.
        let job = self.jobs.borrow_mut().pop_front();
        match job {
            Some(job) => {
                job();
                true
            }
            None => false,
        }
    }

    /// Run jobs until the queue is empty.
    ///
    /// Returns the number of jobs run. With a configured
    /// `max_jobs_per_drain`, stops after that many jobs and returns
    /// [`PledgeError::DrainBudgetExceeded`] if work is still queued; the
    /// remaining jobs stay queued for the next drain.
    pub fn run_until_idle(&self) -> Result<usize, PledgeError> {
        let mut ran = 0;
        loop {
            if let Some(limit) = self.max_jobs_per_drain {
                if ran >= limit && !self.is_empty() {
                    warn!(limit, pending = self.len(), "drain budget exhausted");
                    return Err(PledgeError::DrainBudgetExceeded { limit });
                }
            }
            if !self.run_one() {
                break;
            }
            ran += 1;
        }
        if ran > 0 {
            debug!(jobs = ran, "job queue drained");
        }
        Ok(ran)
    }

    pub fn len(&self) -> usize {
        self.jobs.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.borrow().is_empty()
    }
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new()
    }
}
