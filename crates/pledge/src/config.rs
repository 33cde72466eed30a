//! Runtime configuration.

use serde::{Deserialize, Serialize};

use crate::error::PledgeError;

/// Default number of job slots reserved up front.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Settings for a [`Runtime`](crate::Runtime) and its job queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Upper bound on jobs run by a single `run_until_idle` call.
    /// `None` drains without limit.
    pub max_jobs_per_drain: Option<usize>,
    /// Job slots reserved when the queue is created.
    pub initial_queue_capacity: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_jobs_per_drain: None,
            initial_queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl RuntimeConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(input: &str) -> Result<Self, PledgeError> {
        let config: Self = serde_json::from_str(input).map_err(|e| PledgeError::Config {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would make the queue unable to progress.
    pub fn validate(&self) -> Result<(), PledgeError> {
        if self.max_jobs_per_drain == Some(0) {
            return Err(PledgeError::Config {
                message: "max_jobs_per_drain must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
