//! Ordered log of handler invocations.

use std::cell::RefCell;
use std::fmt::Display;
use std::rc::Rc;

use pledge::{Reason, Resolution};

/// Shared, ordered event log. Clones append to the same log.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    events: Rc<RefCell<Vec<String>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, event: impl Into<String>) {
        self.events.borrow_mut().push(event.into());
    }

    /// Snapshot of everything recorded so far.
    pub fn events(&self) -> Vec<String> {
        self.events.borrow().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.events.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }

    /// A fulfillment handler that records `tag:value` and passes the value on.
    pub fn on_fulfilled<T>(&self, tag: &str) -> impl FnOnce(T) -> Result<Resolution<T>, Reason> + 'static
    where
        T: Display + 'static,
    {
        let recorder = self.clone();
        let tag = tag.to_string();
        move |value| {
            recorder.record(format!("{tag}:{value}"));
            Ok(Resolution::Value(value))
        }
    }

    /// A rejection handler that records `tag!reason` and re-raises.
    pub fn on_rejected<T>(&self, tag: &str) -> impl FnOnce(Reason) -> Result<Resolution<T>, Reason> + 'static
    where
        T: 'static,
    {
        let recorder = self.clone();
        let tag = tag.to_string();
        move |reason| {
            recorder.record(format!("{tag}!{reason}"));
            Err(reason)
        }
    }
}
