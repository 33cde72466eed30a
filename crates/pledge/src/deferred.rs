//! Deferred factory: a pending promise plus the capabilities that settle it.
//!
//! Exists for conformance adapters and tests that need to control when a
//! promise settles, independently of a starter procedure.

use crate::promise::Promise;
use crate::resolution::{self, Reject, Resolve};
use crate::runtime::Runtime;

/// A pending promise with its resolve/reject pair exposed.
#[derive(Debug)]
pub struct Deferred<T> {
    pub promise: Promise<T>,
    pub resolve: Resolve<T>,
    pub reject: Reject<T>,
}

impl Runtime {
    /// Create a pending promise together with its settlement capabilities.
    pub fn deferred<T: Clone + 'static>(&self) -> Deferred<T> {
        let promise = Promise::pending(self);
        let (resolve, reject) = resolution::resolving_functions(&promise);
        Deferred {
            promise,
            resolve,
            reject,
        }
    }
}
