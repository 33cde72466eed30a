//! Conformance adapter over a [`Runtime`].

use pledge::{Deferred, PledgeError, Promise, Reason, Runtime};

/// The entry points a promise conformance suite expects.
///
/// Every promise the adapter creates shares one runtime, so a single
/// [`Adapter::drain`] advances all of them.
#[derive(Debug, Clone, Default)]
pub struct Adapter {
    runtime: Runtime,
}

impl Adapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_runtime(runtime: Runtime) -> Self {
        Self { runtime }
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// A promise fulfilled with `value`.
    pub fn resolved<T: Clone + 'static>(&self, value: T) -> Promise<T> {
        self.runtime.resolve_value(value)
    }

    /// A promise rejected with `reason`.
    pub fn rejected<T: Clone + 'static>(&self, reason: impl Into<Reason>) -> Promise<T> {
        self.runtime.reject(reason)
    }

    /// A pending promise plus its settlement capabilities.
    pub fn deferred<T: Clone + 'static>(&self) -> Deferred<T> {
        self.runtime.deferred()
    }

    /// Run every queued job, returning how many ran.
    pub fn drain(&self) -> Result<usize, PledgeError> {
        self.runtime.run_until_idle()
    }
}
