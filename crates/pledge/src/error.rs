//! Error types for pledge.
//!
//! Two layers:
//! - [`PledgeError`] is the closed taxonomy of failures the library itself produces.
//! - [`Reason`] is what a rejected promise carries. Any error a handler returns,
//!   including a [`PledgeError`], becomes a `Reason`.

use std::fmt;
use std::rc::Rc;

use thiserror::Error;

/// Failures produced by the library.
///
/// Apart from [`PledgeError::ConstructorArgument`] and [`PledgeError::Config`],
/// these never escape as `Err` from a call. They reach user code as the
/// [`Reason`] of a rejected promise instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PledgeError {
    /// A promise was constructed without a starter procedure.
    #[error("promise starter must be a callable procedure")]
    ConstructorArgument,

    /// A promise was resolved with itself.
    #[error("promise cannot be resolved with itself")]
    CyclicResolution,

    /// Reading the `then` capability of a foreign thenable failed.
    #[error("failed to read `then` capability: {message}")]
    PropertyAccess {
        /// Description of the failed read.
        message: String,
    },

    /// The job queue ran dry while the awaited promise was still pending.
    #[error("job queue is idle but the promise is still pending")]
    Stalled,

    /// Every handle to a pending promise was dropped before it settled.
    #[error("promise was dropped before it settled")]
    Abandoned,

    /// A single drain ran the configured maximum number of jobs.
    #[error("drain budget of {limit} jobs exhausted with work still queued")]
    DrainBudgetExceeded {
        /// The configured per-drain job limit.
        limit: usize,
    },

    /// A configuration value is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },
}

/// The reason a promise was rejected.
///
/// Cheap to clone: every rejection reaction registered on a promise receives
/// the same underlying error.
#[derive(Clone)]
pub struct Reason(Rc<anyhow::Error>);

impl Reason {
    /// Wrap any error as a rejection reason.
    pub fn new<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self(Rc::new(anyhow::Error::new(error)))
    }

    /// Build a reason from a plain message, e.g. `Reason::msg("x")`.
    pub fn msg<M>(message: M) -> Self
    where
        M: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        Self(Rc::new(anyhow::Error::msg(message)))
    }

    /// Recover the concrete error behind this reason.
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        self.0.downcast_ref::<E>()
    }

    /// The taxonomy error behind this reason, if the library produced it.
    pub fn as_pledge_error(&self) -> Option<&PledgeError> {
        self.downcast_ref::<PledgeError>()
    }

    /// Whether both reasons are the very same rejection.
    pub fn ptr_eq(&self, other: &Reason) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Borrow the underlying error.
    pub fn error(&self) -> &anyhow::Error {
        &self.0
    }
}

impl fmt::Debug for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Reason").field(&self.0.to_string()).finish()
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl From<anyhow::Error> for Reason {
    fn from(error: anyhow::Error) -> Self {
        Self(Rc::new(error))
    }
}

impl From<PledgeError> for Reason {
    fn from(error: PledgeError) -> Self {
        Self::new(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_reason_displays_message() {
        let reason = Reason::msg("x");
        assert_eq!(reason.to_string(), "x");
        assert!(reason.as_pledge_error().is_none());
    }

    #[test]
    fn test_pledge_error_survives_as_reason() {
        let reason: Reason = PledgeError::CyclicResolution.into();
        assert_eq!(
            reason.as_pledge_error(),
            Some(&PledgeError::CyclicResolution)
        );
        assert_eq!(reason.to_string(), "promise cannot be resolved with itself");
    }

    #[test]
    fn test_clones_share_identity() {
        let reason = Reason::from(anyhow::anyhow!("boom"));
        let copy = reason.clone();
        assert!(reason.ptr_eq(&copy));
        assert!(!reason.ptr_eq(&Reason::msg("boom")));
    }
}
