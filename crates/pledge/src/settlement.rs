//! Promise states and per-item outcome descriptors.

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

use crate::error::Reason;

/// Where a promise is in its lifecycle.
///
/// `Pending` moves to `Fulfilled` or `Rejected` exactly once and never back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum State {
    Pending,
    Fulfilled,
    Rejected,
}

impl State {
    /// Whether the promise has left `Pending`.
    pub fn is_settled(self) -> bool {
        !matches!(self, State::Pending)
    }
}

/// The final outcome of one input of [`Runtime::all_settled`](crate::Runtime::all_settled).
#[derive(Debug, Clone)]
pub enum Settlement<T> {
    /// The input fulfilled with `value`.
    Fulfilled { value: T },
    /// The input rejected with `reason`.
    Rejected { reason: Reason },
}

impl<T> Settlement<T> {
    pub fn status(&self) -> State {
        match self {
            Settlement::Fulfilled { .. } => State::Fulfilled,
            Settlement::Rejected { .. } => State::Rejected,
        }
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Settlement::Fulfilled { value } => Some(value),
            Settlement::Rejected { .. } => None,
        }
    }

    pub fn reason(&self) -> Option<&Reason> {
        match self {
            Settlement::Fulfilled { .. } => None,
            Settlement::Rejected { reason } => Some(reason),
        }
    }

    /// Convert back into a `Result`.
    pub fn into_result(self) -> Result<T, Reason> {
        match self {
            Settlement::Fulfilled { value } => Ok(value),
            Settlement::Rejected { reason } => Err(reason),
        }
    }
}

impl<T> From<Result<T, Reason>> for Settlement<T> {
    fn from(outcome: Result<T, Reason>) -> Self {
        match outcome {
            Ok(value) => Settlement::Fulfilled { value },
            Err(reason) => Settlement::Rejected { reason },
        }
    }
}

// Rendered as `{"status": "Fulfilled", "value": ..}` or
// `{"status": "Rejected", "reason": "<message>"}`.
impl<T: Serialize> Serialize for Settlement<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Settlement", 2)?;
        state.serialize_field("status", &self.status())?;
        match self {
            Settlement::Fulfilled { value } => state.serialize_field("value", value)?,
            Settlement::Rejected { reason } => {
                state.serialize_field("reason", &reason.to_string())?
            }
        }
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_settlement_serializes_with_status_tag() {
        let fulfilled: Settlement<i32> = Ok(1).into();
        let rejected: Settlement<i32> = Err(Reason::msg("e")).into();

        assert_eq!(
            serde_json::to_value(&fulfilled).unwrap(),
            json!({"status": "Fulfilled", "value": 1})
        );
        assert_eq!(
            serde_json::to_value(&rejected).unwrap(),
            json!({"status": "Rejected", "reason": "e"})
        );
    }

    #[test]
    fn test_pending_is_not_settled() {
        assert!(!State::Pending.is_settled());
        assert!(State::Fulfilled.is_settled());
        assert!(State::Rejected.is_settled());
    }
}
