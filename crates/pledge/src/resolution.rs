//! The resolution procedure.
//!
//! Turns whatever a promise is resolved with into a definitive settlement:
//!
//! - the promise itself: rejected with [`PledgeError::CyclicResolution`]
//! - another [`Promise`]: its eventual outcome is adopted
//! - a foreign [`Thenable`]: its `then` capability is read once; if callable
//!   it is invoked in a deferred job with a fresh, call-once guarded
//!   [`Resolve`]/[`Reject`] pair feeding back into this procedure
//! - a plain value: fulfilled directly
//!
//! Every adoption step runs as a job, so arbitrarily deep chains of nested
//! promises and thenables grow the queue, never the call stack.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use tracing::{debug, warn};

use crate::error::{PledgeError, Reason};
use crate::promise::Promise;

/// What a promise gets resolved with, classified once per resolution.
pub enum Resolution<T> {
    /// A plain value; fulfills directly.
    Value(T),
    /// A promise of this library; its outcome is adopted.
    Promise(Promise<T>),
    /// A foreign object that may expose a `then` capability.
    Thenable(Rc<dyn Thenable<T>>),
}

impl<T> Resolution<T> {
    /// Wrap a foreign object for adoption.
    pub fn thenable<O: Thenable<T> + 'static>(object: O) -> Self {
        Resolution::Thenable(Rc::new(object))
    }
}

impl<T> From<Promise<T>> for Resolution<T> {
    fn from(promise: Promise<T>) -> Self {
        Resolution::Promise(promise)
    }
}

impl<T: fmt::Debug> fmt::Debug for Resolution<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Resolution::Promise(promise) => f.debug_tuple("Promise").field(promise).finish(),
            Resolution::Thenable(_) => f.write_str("Thenable(..)"),
        }
    }
}

/// The `then` capability of a foreign thenable, once invoked.
pub type ThenFn<T> = Box<dyn FnOnce(Resolve<T>, Reject<T>) -> Result<(), Reason>>;

/// Result of reading a foreign object's `then` capability.
pub enum Then<T> {
    /// A callable `then`. The closure owns whatever receiver it needs.
    Callable(ThenFn<T>),
    /// No callable `then`; the object fulfills as this plain value.
    NotCallable(T),
}

/// A foreign deferred value, adopted through its `then` capability.
///
/// This is the interoperability boundary: anything implementing `Thenable`
/// can be returned from a handler or passed to the combinators, and its
/// outcome is adopted regardless of its concrete kind. Implementations are
/// not trusted: calling both callbacks, calling one twice, or failing after
/// calling one are all tolerated, and only the first call has effect.
pub trait Thenable<T> {
    /// Read the `then` capability. An `Err` rejects the promise being
    /// resolved with that reason.
    fn then(self: Rc<Self>) -> Result<Then<T>, Reason>;
}

/// Build a thenable from a closure standing in for its `then` method.
pub fn from_fn<T, F>(then: F) -> Resolution<T>
where
    T: 'static,
    F: Fn(Resolve<T>, Reject<T>) -> Result<(), Reason> + 'static,
{
    Resolution::thenable(FnThenable { then })
}

struct FnThenable<F> {
    then: F,
}

impl<T, F> Thenable<T> for FnThenable<F>
where
    T: 'static,
    F: Fn(Resolve<T>, Reject<T>) -> Result<(), Reason> + 'static,
{
    fn then(self: Rc<Self>) -> Result<Then<T>, Reason> {
        Ok(Then::Callable(Box::new(move |resolve, reject| {
            (self.then)(resolve, reject)
        })))
    }
}

struct Guard<T> {
    target: Promise<T>,
    called: Cell<bool>,
}

impl<T> Guard<T> {
    /// First caller wins; every later call on either side is a no-op.
    fn claim(&self) -> bool {
        !self.called.replace(true)
    }
}

/// The resolving half of a resolve/reject pair.
pub struct Resolve<T> {
    guard: Rc<Guard<T>>,
}

/// The rejecting half of a resolve/reject pair.
pub struct Reject<T> {
    guard: Rc<Guard<T>>,
}

impl<T> Clone for Resolve<T> {
    fn clone(&self) -> Self {
        Self {
            guard: Rc::clone(&self.guard),
        }
    }
}

impl<T> Clone for Reject<T> {
    fn clone(&self) -> Self {
        Self {
            guard: Rc::clone(&self.guard),
        }
    }
}

impl<T: Clone + 'static> Resolve<T> {
    /// Resolve with anything: a value, a promise, or a foreign thenable.
    pub fn resolve(&self, resolution: Resolution<T>) {
        if self.guard.claim() {
            resolve_into(&self.guard.target, resolution);
        }
    }

    /// Resolve with a plain value.
    pub fn fulfill(&self, value: T) {
        self.resolve(Resolution::Value(value));
    }

    /// Whether either half of the pair has been used.
    pub fn is_spent(&self) -> bool {
        self.guard.called.get()
    }
}

impl<T: Clone + 'static> Reject<T> {
    pub fn reject(&self, reason: impl Into<Reason>) {
        if self.guard.claim() {
            self.guard.target.reject_with(reason.into());
        }
    }

    /// Whether either half of the pair has been used.
    pub fn is_spent(&self) -> bool {
        self.guard.called.get()
    }
}

impl<T> fmt::Debug for Resolve<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolve")
            .field("spent", &self.guard.called.get())
            .finish()
    }
}

impl<T> fmt::Debug for Reject<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reject")
            .field("spent", &self.guard.called.get())
            .finish()
    }
}

/// A fresh resolve/reject pair for `target`, sharing one call-once guard.
pub(crate) fn resolving_functions<T>(target: &Promise<T>) -> (Resolve<T>, Reject<T>) {
    let guard = Rc::new(Guard {
        target: target.clone(),
        called: Cell::new(false),
    });
    (
        Resolve {
            guard: Rc::clone(&guard),
        },
        Reject { guard },
    )
}

/// Run the resolution procedure for `target`.
///
/// Has no effect once `target` has settled.
pub(crate) fn resolve_into<T: Clone + 'static>(target: &Promise<T>, resolution: Resolution<T>) {
    if !target.is_pending() {
        return;
    }
    match resolution {
        Resolution::Value(value) => target.fulfill(value),
        Resolution::Promise(source) if source.ptr_eq(target) => {
            warn!(promise = %target.id(), "promise resolved with itself");
            target.reject_with(PledgeError::CyclicResolution.into());
        }
        Resolution::Promise(source) => {
            debug!(promise = %target.id(), source = %source.id(), "adopting promise");
            let fulfilled = target.clone();
            let rejected = target.clone();
            source.subscribe(
                Box::new(move |value: T| fulfilled.fulfill(value)),
                Box::new(move |reason: Reason| rejected.reject_with(reason)),
            );
        }
        Resolution::Thenable(object) => match object.then() {
            Err(reason) => {
                debug!(promise = %target.id(), error = %reason, "reading `then` failed");
                target.reject_with(reason);
            }
            Ok(Then::NotCallable(value)) => target.fulfill(value),
            Ok(Then::Callable(then)) => {
                let (resolve, reject) = resolving_functions(target);
                let id = target.id();
                target.runtime().enqueue(Box::new(move || {
                    if let Err(reason) = then(resolve, reject.clone()) {
                        debug!(promise = %id, error = %reason, "foreign `then` failed");
                        reject.reject(reason);
                    }
                }));
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::Runtime;
    use crate::settlement::State;

    struct Plain(i32);

    impl Thenable<i32> for Plain {
        fn then(self: Rc<Self>) -> Result<Then<i32>, Reason> {
            Ok(Then::NotCallable(self.0))
        }
    }

    struct BrokenGetter;

    impl Thenable<i32> for BrokenGetter {
        fn then(self: Rc<Self>) -> Result<Then<i32>, Reason> {
            Err(PledgeError::PropertyAccess {
                message: "getter threw".to_string(),
            }
            .into())
        }
    }

    #[test]
    fn test_self_resolution_is_cyclic_error() {
        let rt = Runtime::new();
        let deferred = rt.deferred::<i32>();
        deferred.resolve.resolve(deferred.promise.clone().into());

        assert_eq!(deferred.promise.state(), State::Rejected);
        let reason = deferred.promise.outcome().unwrap().unwrap_err();
        assert_eq!(reason.as_pledge_error(), Some(&PledgeError::CyclicResolution));
    }

    #[test]
    fn test_adopting_a_promise_takes_a_job() {
        let rt = Runtime::new();
        let source = rt.resolve_value(5);
        let target = rt.deferred::<i32>();
        target.resolve.resolve(source.into());

        assert!(target.promise.is_pending());
        rt.run_until_idle().unwrap();
        assert_eq!(target.promise.outcome().unwrap().unwrap(), 5);
    }

    #[test]
    fn test_adopts_rejection() {
        let rt = Runtime::new();
        let target = rt.deferred::<i32>();
        target
            .resolve
            .resolve(rt.reject::<i32>(Reason::msg("inner")).into());

        assert_eq!(rt.block_on(&target.promise).unwrap_err().to_string(), "inner");
    }

    #[test]
    fn test_non_callable_then_fulfills_with_object() {
        let rt = Runtime::new();
        let p = rt.resolve(Resolution::thenable(Plain(11)));
        assert_eq!(p.outcome().unwrap().unwrap(), 11);
    }

    #[test]
    fn test_throwing_then_getter_rejects() {
        let rt = Runtime::new();
        let p = rt.resolve(Resolution::thenable(BrokenGetter));

        let reason = p.outcome().unwrap().unwrap_err();
        assert!(matches!(
            reason.as_pledge_error(),
            Some(PledgeError::PropertyAccess { .. })
        ));
    }

    #[test]
    fn test_callable_then_is_invoked_in_a_job() {
        let rt = Runtime::new();
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        let p = rt.resolve(from_fn(move |resolve: Resolve<i32>, _| {
            counter.set(counter.get() + 1);
            resolve.fulfill(8);
            Ok(())
        }));

        assert_eq!(calls.get(), 0);
        assert!(p.is_pending());
        assert_eq!(rt.block_on(&p).unwrap(), 8);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_first_thenable_call_wins() {
        let rt = Runtime::new();
        let p = rt.resolve(from_fn(|resolve: Resolve<i32>, reject: Reject<i32>| {
            resolve.fulfill(1);
            reject.reject(Reason::msg("ignored"));
            resolve.fulfill(2);
            Err(Reason::msg("also ignored"))
        }));

        assert_eq!(rt.block_on(&p).unwrap(), 1);
    }

    #[test]
    fn test_then_failure_before_any_call_rejects() {
        let rt = Runtime::new();
        let p = rt.resolve(from_fn(|_: Resolve<i32>, _: Reject<i32>| {
            Err(Reason::msg("then threw"))
        }));

        assert_eq!(rt.block_on(&p).unwrap_err().to_string(), "then threw");
    }

    #[test]
    fn test_nested_thenables_do_not_grow_the_stack() {
        fn nest(depth: u32) -> Resolution<u32> {
            if depth == 0 {
                return Resolution::Value(0);
            }
            from_fn(move |resolve: Resolve<u32>, _| {
                resolve.resolve(nest(depth - 1));
                Ok(())
            })
        }

        let rt = Runtime::new();
        let p = rt.resolve(nest(50_000));
        assert_eq!(rt.block_on(&p).unwrap(), 0);
    }

    #[test]
    fn test_resolve_after_settlement_is_ignored() {
        let rt = Runtime::new();
        let p = rt.resolve_value(1);
        resolve_into(&p, Resolution::Value(2));
        assert_eq!(p.outcome().unwrap().unwrap(), 1);
    }
}
