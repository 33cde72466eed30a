//! The promise handle: construction, inspection and chaining.

use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};

use futures::channel::oneshot;
use futures::FutureExt;
use tracing::trace;

use crate::cell::{FulfillReaction, RejectReaction, SettleCell};
use crate::error::{PledgeError, Reason};
use crate::resolution::{self, Reject, Resolution, Resolve};
use crate::runtime::Runtime;
use crate::settlement::State;

static NEXT_PROMISE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique promise identifier, used in logs and `Debug` output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PromiseId(u64);

impl PromiseId {
    fn next() -> Self {
        Self(NEXT_PROMISE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PromiseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "promise#{}", self.0)
    }
}

/// A value that is not known yet.
///
/// A promise starts `Pending` and settles exactly once, to `Fulfilled` with a
/// `T` or `Rejected` with a [`Reason`]. Handlers attached with [`then`],
/// [`and_then`], [`catch`] and [`finally`] always run later, as jobs on the
/// promise's [`Runtime`], never inside the call that attaches them.
///
/// Cloning yields another handle to the same promise.
///
/// [`then`]: Promise::then
/// [`and_then`]: Promise::and_then
/// [`catch`]: Promise::catch
/// [`finally`]: Promise::finally
pub struct Promise<T> {
    inner: Rc<Inner<T>>,
}

struct Inner<T> {
    id: PromiseId,
    runtime: Runtime,
    cell: RefCell<SettleCell<T>>,
}

impl<T> Clone for Promise<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cell = self.inner.cell.borrow();
        f.debug_struct("Promise")
            .field("id", &self.inner.id)
            .field("state", &cell.state())
            .field("pending_reactions", &cell.pending_reactions())
            .finish()
    }
}

impl Runtime {
    /// Construct a promise from a starter procedure.
    ///
    /// The starter runs synchronously, exactly once, before this returns. It
    /// receives the resolve/reject pair; whichever is called first wins. An
    /// `Err` returned by the starter rejects the promise unless it was
    /// already resolved.
    ///
    /// ```ignore
    /// let p = rt.promise(|resolve, _reject| {
    ///     resolve.fulfill(42);
    ///     Ok(())
    /// });
    /// ```
    pub fn promise<T, S>(&self, starter: S) -> Promise<T>
    where
        T: Clone + 'static,
        S: FnOnce(Resolve<T>, Reject<T>) -> Result<(), Reason>,
    {
        let promise = Promise::pending(self);
        let (resolve, reject) = resolution::resolving_functions(&promise);
        if let Err(reason) = starter(resolve, reject.clone()) {
            reject.reject(reason);
        }
        promise
    }

    /// Like [`Runtime::promise`] for callers forwarding a starter that may
    /// be absent. A missing starter fails before any promise exists.
    pub fn try_promise<T, S>(&self, starter: Option<S>) -> Result<Promise<T>, PledgeError>
    where
        T: Clone + 'static,
        S: FnOnce(Resolve<T>, Reject<T>) -> Result<(), Reason>,
    {
        let starter = starter.ok_or(PledgeError::ConstructorArgument)?;
        Ok(self.promise(starter))
    }
}

impl<T: Clone + 'static> Promise<T> {
    pub(crate) fn pending(runtime: &Runtime) -> Self {
        Self {
            inner: Rc::new(Inner {
                id: PromiseId::next(),
                runtime: runtime.clone(),
                cell: RefCell::new(SettleCell::new()),
            }),
        }
    }

    pub fn id(&self) -> PromiseId {
        self.inner.id
    }

    pub fn state(&self) -> State {
        self.inner.cell.borrow().state()
    }

    pub fn is_pending(&self) -> bool {
        self.state() == State::Pending
    }

    /// The settled outcome, or `None` while pending.
    pub fn outcome(&self) -> Option<Result<T, Reason>> {
        self.inner.cell.borrow().outcome()
    }

    /// The runtime this promise schedules its reactions on.
    pub fn runtime(&self) -> &Runtime {
        &self.inner.runtime
    }

    /// Whether both handles refer to the same promise.
    pub fn ptr_eq(&self, other: &Promise<T>) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn fulfill(&self, value: T) {
        self.settle(Ok(value));
    }

    pub(crate) fn reject_with(&self, reason: Reason) {
        self.settle(Err(reason));
    }

    fn settle(&self, outcome: Result<T, Reason>) {
        let state = match outcome {
            Ok(_) => State::Fulfilled,
            Err(_) => State::Rejected,
        };
        let jobs = self.inner.cell.borrow_mut().settle(outcome);
        match jobs {
            Some(jobs) => {
                trace!(promise = %self.id(), ?state, reactions = jobs.len(), "settled");
                for job in jobs {
                    self.inner.runtime.enqueue(job);
                }
            }
            None => trace!(promise = %self.id(), ?state, "ignored settlement of settled promise"),
        }
    }

    /// Register a raw reaction pair. Either fires later as a job, never inline.
    pub(crate) fn subscribe(&self, on_fulfilled: FulfillReaction<T>, on_rejected: RejectReaction) {
        let ready = self
            .inner
            .cell
            .borrow_mut()
            .subscribe(on_fulfilled, on_rejected);
        if let Some(job) = ready {
            self.inner.runtime.enqueue(job);
        }
    }

    /// Settle this promise from a handler's return: an `Ok` goes through the
    /// resolution procedure, an `Err` rejects.
    pub(crate) fn settle_from(&self, returned: Result<Resolution<T>, Reason>) {
        match returned {
            Ok(resolution) => resolution::resolve_into(self, resolution),
            Err(reason) => self.reject_with(reason),
        }
    }

    /// Chain both outcomes into a new promise.
    ///
    /// Exactly one of the handlers runs, as a deferred job, once this promise
    /// settles. Its return value resolves the returned promise; an `Err`
    /// rejects it.
    pub fn then<U, F, R>(&self, on_fulfilled: F, on_rejected: R) -> Promise<U>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> Result<Resolution<U>, Reason> + 'static,
        R: FnOnce(Reason) -> Result<Resolution<U>, Reason> + 'static,
    {
        let child = Promise::pending(&self.inner.runtime);
        let fulfilled_child = child.clone();
        let rejected_child = child.clone();
        self.subscribe(
            Box::new(move |value: T| fulfilled_child.settle_from(on_fulfilled(value))),
            Box::new(move |reason: Reason| rejected_child.settle_from(on_rejected(reason))),
        );
        child
    }

    /// Chain the fulfillment branch only; a rejection passes through unchanged.
    pub fn and_then<U, F>(&self, on_fulfilled: F) -> Promise<U>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> Result<Resolution<U>, Reason> + 'static,
    {
        self.then(on_fulfilled, Err)
    }

    /// Chain the rejection branch only; a fulfillment passes through unchanged.
    pub fn catch<R>(&self, on_rejected: R) -> Promise<T>
    where
        R: FnOnce(Reason) -> Result<Resolution<T>, Reason> + 'static,
    {
        self.then(|value| Ok(Resolution::Value(value)), on_rejected)
    }

    /// Run `on_finally` once this promise settles either way.
    ///
    /// The outcome passes through unchanged unless `on_finally` fails, in
    /// which case its error becomes the rejection reason. The next promise
    /// does not wait on anything `on_finally` starts.
    pub fn finally<F>(&self, on_finally: F) -> Promise<T>
    where
        F: FnOnce() -> Result<(), Reason> + 'static,
    {
        let slot = Rc::new(RefCell::new(Some(on_finally)));
        let rejected_slot = Rc::clone(&slot);
        self.then(
            move |value| {
                run_finally(&slot)?;
                Ok(Resolution::Value(value))
            },
            move |reason| {
                run_finally(&rejected_slot)?;
                Err(reason)
            },
        )
    }

    /// A future that completes with this promise's outcome.
    ///
    /// The future only makes progress while something drains the runtime's
    /// job queue. If every handle to a pending promise is dropped it
    /// completes with a [`PledgeError::Abandoned`] reason.
    pub fn settled(&self) -> Settled<T> {
        let (tx, rx) = oneshot::channel::<Result<T, Reason>>();
        let tx: Rc<OutcomeSender<T>> = Rc::new(RefCell::new(Some(tx)));
        let rejected_tx = Rc::clone(&tx);
        self.subscribe(
            Box::new(move |value: T| send_outcome(&tx, Ok(value))),
            Box::new(move |reason: Reason| send_outcome(&rejected_tx, Err(reason))),
        );
        Settled { rx }
    }
}

fn run_finally<F>(slot: &RefCell<Option<F>>) -> Result<(), Reason>
where
    F: FnOnce() -> Result<(), Reason>,
{
    let on_finally = slot.borrow_mut().take();
    match on_finally {
        Some(on_finally) => on_finally(),
        None => Ok(()),
    }
}

type OutcomeSender<T> = RefCell<Option<oneshot::Sender<Result<T, Reason>>>>;

fn send_outcome<T>(tx: &OutcomeSender<T>, outcome: Result<T, Reason>) {
    let sender = tx.borrow_mut().take();
    if let Some(sender) = sender {
        // The receiver may be gone; nobody is waiting then.
        let _ = sender.send(outcome);
    }
}

/// Future returned by [`Promise::settled`].
pub struct Settled<T> {
    rx: oneshot::Receiver<Result<T, Reason>>,
}

impl<T> Future for Settled<T> {
    type Output = Result<T, Reason>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.rx.poll_unpin(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            Poll::Ready(Err(oneshot::Canceled)) => Poll::Ready(Err(PledgeError::Abandoned.into())),
            Poll::Pending => Poll::Pending,
        }
    }
}
