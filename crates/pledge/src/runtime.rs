//! The runtime: owner of the job queue every promise schedules onto.
//!
//! Promise construction and the combinators (`resolve`, `reject`, `race`,
//! `all`, `all_settled`, `deferred`) are methods on [`Runtime`]; they live in
//! the modules that implement them.

use std::fmt;
use std::rc::Rc;

use crate::config::RuntimeConfig;
use crate::error::{PledgeError, Reason};
use crate::promise::Promise;
use crate::queue::{Job, JobQueue};

/// Handle to a single-threaded job queue. Cheap to clone; clones share the queue.
#[derive(Clone)]
pub struct Runtime {
    queue: Rc<JobQueue>,
}

impl Runtime {
    /// Create a runtime with default configuration.
    pub fn new() -> Self {
        Self {
            queue: Rc::new(JobQueue::new()),
        }
    }

    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Run queued jobs until none remain. See [`JobQueue::run_until_idle`].
    pub fn run_until_idle(&self) -> Result<usize, PledgeError> {
        self.queue.run_until_idle()
    }

    /// Run the oldest queued job, if any.
    pub fn run_one(&self) -> bool {
        self.queue.run_one()
    }

    pub fn pending_jobs(&self) -> usize {
        self.queue.len()
    }

    /// Drive the queue one job at a time until `promise` settles.
    ///
    /// Not subject to the drain budget. If the queue empties while the
    /// promise is still pending the result is a [`PledgeError::Stalled`] reason.
    pub fn block_on<T: Clone + 'static>(&self, promise: &Promise<T>) -> Result<T, Reason> {
        loop {
            if let Some(outcome) = promise.outcome() {
                return outcome;
            }
            if !self.queue.run_one() {
                return Err(PledgeError::Stalled.into());
            }
        }
    }

    /// Whether both handles share one job queue.
    pub fn ptr_eq(&self, other: &Runtime) -> bool {
        Rc::ptr_eq(&self.queue, &other.queue)
    }

    pub(crate) fn enqueue(&self, job: Job) {
        self.queue.schedule(job);
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("pending_jobs", &self.queue.len())
            .finish()
    }
}

/// Builder for configuring a [`Runtime`].
#[derive(Debug, Default)]
pub struct RuntimeBuilder {
    config: RuntimeConfig,
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole configuration.
    pub fn with_config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Cap the number of jobs a single drain may run.
    pub fn max_jobs_per_drain(mut self, limit: usize) -> Self {
        self.config.max_jobs_per_drain = Some(limit);
        self
    }

    /// Build the runtime, validating the configuration.
    pub fn build(self) -> Result<Runtime, PledgeError> {
        self.config.validate()?;
        Ok(Runtime {
            queue: Rc::new(JobQueue::with_config(&self.config)),
        })
    }
}
