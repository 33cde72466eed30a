//! Combinators: `resolve`, `reject`, `race`, `all`, `all_settled`.
//!
//! All of them are built on the same pieces as chaining: a pending promise,
//! its guarded resolve/reject pair, and reactions on each input.
//!
//! Inputs are expected to belong to the runtime the combinator is called on.
//! A promise from another runtime schedules its reactions on its own queue,
//! so the result only progresses while that other runtime is drained too.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::Reason;
use crate::promise::Promise;
use crate::resolution::{self, Resolution};
use crate::runtime::Runtime;
use crate::settlement::Settlement;
use tracing::warn;

/// Slots for an order-preserving gather over `remaining` inputs.
struct Gather<V> {
    slots: Vec<Option<V>>,
    remaining: usize,
}

impl<V> Gather<V> {
    fn new(len: usize) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self {
            slots: std::iter::repeat_with(|| None).take(len).collect(),
            remaining: len,
        }))
    }

    /// Fill `index`; returns every slot once the last one is filled.
    fn fill(&mut self, index: usize, value: V) -> Option<Vec<V>> {
        if self.slots[index].replace(value).is_none() {
            self.remaining -= 1;
        }
        if self.remaining > 0 {
            return None;
        }
        Some(self.slots.drain(..).flatten().collect())
    }
}

impl Runtime {
    /// Normalize anything into a promise of this runtime's kind.
    ///
    /// A [`Resolution::Promise`] comes back unchanged. Anything else goes
    /// through the full resolution procedure on a new promise, so foreign
    /// thenables are adopted and plain values fulfill directly.
    ///
    /// A promise created on another runtime is returned unchanged as well and
    /// keeps reacting on that runtime's queue; drain both runtimes, or build
    /// every input on one runtime.
    pub fn resolve<T: Clone + 'static>(&self, value: Resolution<T>) -> Promise<T> {
        match value {
            Resolution::Promise(promise) => {
                if !promise.runtime().ptr_eq(self) {
                    warn!(promise = %promise.id(), "promise belongs to another runtime");
                }
                promise
            }
            other => {
                let promise = Promise::pending(self);
                resolution::resolve_into(&promise, other);
                promise
            }
        }
    }

    /// A promise already fulfilled with `value`.
    pub fn resolve_value<T: Clone + 'static>(&self, value: T) -> Promise<T> {
        self.resolve(Resolution::Value(value))
    }

    /// A promise already rejected with `reason`.
    pub fn reject<T: Clone + 'static>(&self, reason: impl Into<Reason>) -> Promise<T> {
        let promise = Promise::pending(self);
        promise.reject_with(reason.into());
        promise
    }

    /// Settle like whichever input settles first. Never settles for no inputs.
    pub fn race<T, I>(&self, items: I) -> Promise<T>
    where
        T: Clone + 'static,
        I: IntoIterator,
        I::Item: Into<Resolution<T>>,
    {
        let deferred = self.deferred::<T>();
        for item in items {
            let resolve = deferred.resolve.clone();
            let reject = deferred.reject.clone();
            self.resolve(item.into()).subscribe(
                Box::new(move |value: T| resolve.fulfill(value)),
                Box::new(move |reason: Reason| reject.reject(reason)),
            );
        }
        deferred.promise
    }

    /// Fulfill with every input's value, in input order, once all fulfill.
    ///
    /// Rejects with the first rejection reason observed; later outcomes are
    /// ignored. No inputs fulfills with an empty `Vec`.
    pub fn all<T, I>(&self, items: I) -> Promise<Vec<T>>
    where
        T: Clone + 'static,
        I: IntoIterator,
        I::Item: Into<Resolution<T>>,
    {
        let items: Vec<Promise<T>> = items
            .into_iter()
            .map(|item| self.resolve(item.into()))
            .collect();
        let deferred = self.deferred::<Vec<T>>();
        if items.is_empty() {
            deferred.resolve.fulfill(Vec::new());
            return deferred.promise;
        }

        let gather = Gather::new(items.len());
        for (index, item) in items.iter().enumerate() {
            let gather = Rc::clone(&gather);
            let resolve = deferred.resolve.clone();
            let reject = deferred.reject.clone();
            item.subscribe(
                Box::new(move |value: T| {
                    let done = gather.borrow_mut().fill(index, value);
                    if let Some(values) = done {
                        resolve.fulfill(values);
                    }
                }),
                Box::new(move |reason: Reason| reject.reject(reason)),
            );
        }
        deferred.promise
    }

    /// Fulfill with one [`Settlement`] per input, in input order, once every
    /// input has settled. Never rejects.
    pub fn all_settled<T, I>(&self, items: I) -> Promise<Vec<Settlement<T>>>
    where
        T: Clone + 'static,
        I: IntoIterator,
        I::Item: Into<Resolution<T>>,
    {
        let items: Vec<Promise<T>> = items
            .into_iter()
            .map(|item| self.resolve(item.into()))
            .collect();
        let deferred = self.deferred::<Vec<Settlement<T>>>();
        if items.is_empty() {
            deferred.resolve.fulfill(Vec::new());
            return deferred.promise;
        }

        let gather = Gather::new(items.len());
        for (index, item) in items.iter().enumerate() {
            let on_fulfilled = {
                let gather = Rc::clone(&gather);
                let resolve = deferred.resolve.clone();
                move |value: T| {
                    let done = gather
                        .borrow_mut()
                        .fill(index, Settlement::Fulfilled { value });
                    if let Some(outcomes) = done {
                        resolve.fulfill(outcomes);
                    }
                }
            };
            let on_rejected = {
                let gather = Rc::clone(&gather);
                let resolve = deferred.resolve.clone();
                move |reason: Reason| {
                    let done = gather
                        .borrow_mut()
                        .fill(index, Settlement::Rejected { reason });
                    if let Some(outcomes) = done {
                        resolve.fulfill(outcomes);
                    }
                }
            };
            item.subscribe(Box::new(on_fulfilled), Box::new(on_rejected));
        }
        deferred.promise
    }
}
