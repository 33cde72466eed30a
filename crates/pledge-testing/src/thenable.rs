//! A foreign thenable whose behavior is scripted step by step.

use std::cell::Cell;
use std::rc::Rc;

use anyhow::anyhow;
use pledge::{PledgeError, Reason, Reject, Resolution, Resolve, Runtime, Then, Thenable};
use tracing::debug;

/// One action the thenable takes when its `then` is invoked.
#[derive(Debug, Clone)]
pub enum Step<T> {
    /// Call the resolve callback with a plain value.
    Fulfill(T),
    /// Call the resolve callback with a promise to adopt.
    Adopt(pledge::Promise<T>),
    /// Call the reject callback with a message.
    Reject(String),
    /// Stop and fail the `then` call itself with a message.
    Fail(String),
}

/// How reading the `then` capability behaves.
#[derive(Debug, Clone)]
pub enum Getter<T> {
    /// `then` is callable and runs the script.
    Callable,
    /// Reading `then` fails.
    Throws(String),
    /// `then` is present but not callable; the object itself is a plain value.
    NotCallable(T),
}

struct Script<T> {
    getter: Getter<T>,
    steps: Vec<Step<T>>,
    delay_on: Option<Runtime>,
    reads: Rc<Cell<usize>>,
    calls: Rc<Cell<usize>>,
}

/// A foreign thenable double.
///
/// ```ignore
/// let misbehaving = ScriptedThenable::new()
///     .fulfill(1)
///     .reject("ignored")
///     .fail("also ignored");
/// let p = rt.resolve(misbehaving.resolution());
/// ```
pub struct ScriptedThenable<T> {
    script: Script<T>,
}

impl<T: Clone + 'static> Default for ScriptedThenable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + 'static> ScriptedThenable<T> {
    pub fn new() -> Self {
        Self {
            script: Script {
                getter: Getter::Callable,
                steps: Vec::new(),
                delay_on: None,
                reads: Rc::new(Cell::new(0)),
                calls: Rc::new(Cell::new(0)),
            },
        }
    }

    pub fn getter(mut self, getter: Getter<T>) -> Self {
        self.script.getter = getter;
        self
    }

    pub fn step(mut self, step: Step<T>) -> Self {
        self.script.steps.push(step);
        self
    }

    pub fn fulfill(self, value: T) -> Self {
        self.step(Step::Fulfill(value))
    }

    pub fn adopt(self, promise: pledge::Promise<T>) -> Self {
        self.step(Step::Adopt(promise))
    }

    pub fn reject(self, message: impl Into<String>) -> Self {
        self.step(Step::Reject(message.into()))
    }

    pub fn fail(self, message: impl Into<String>) -> Self {
        self.step(Step::Fail(message.into()))
    }

    /// Run the script in a later job on `runtime` instead of inside `then`.
    pub fn delayed_on(mut self, runtime: &Runtime) -> Self {
        self.script.delay_on = Some(runtime.clone());
        self
    }

    /// Counter of how often `then` was read.
    pub fn reads(&self) -> Rc<Cell<usize>> {
        Rc::clone(&self.script.reads)
    }

    /// Counter of how often `then` was invoked.
    pub fn calls(&self) -> Rc<Cell<usize>> {
        Rc::clone(&self.script.calls)
    }

    /// Wrap for adoption through the resolution procedure.
    pub fn resolution(self) -> Resolution<T> {
        Resolution::thenable(self)
    }
}

fn run_steps<T: Clone + 'static>(
    steps: &[Step<T>],
    resolve: &Resolve<T>,
    reject: &Reject<T>,
) -> Result<(), Reason> {
    for step in steps {
        match step {
            Step::Fulfill(value) => resolve.fulfill(value.clone()),
            Step::Adopt(promise) => resolve.resolve(Resolution::Promise(promise.clone())),
            Step::Reject(message) => reject.reject(anyhow!("{message}")),
            Step::Fail(message) => return Err(anyhow!("{message}").into()),
        }
    }
    Ok(())
}

impl<T: Clone + 'static> Thenable<T> for ScriptedThenable<T> {
    fn then(self: Rc<Self>) -> Result<Then<T>, Reason> {
        self.script.reads.set(self.script.reads.get() + 1);
        match &self.script.getter {
            Getter::Throws(message) => {
                return Err(PledgeError::PropertyAccess {
                    message: message.clone(),
                }
                .into())
            }
            Getter::NotCallable(value) => return Ok(Then::NotCallable(value.clone())),
            Getter::Callable => {}
        }

        Ok(Then::Callable(Box::new(move |resolve: Resolve<T>, reject: Reject<T>| {
            let script = &self.script;
            script.calls.set(script.calls.get() + 1);
            debug!(
                steps = script.steps.len(),
                delayed = script.delay_on.is_some(),
                "scripted then invoked"
            );
            match &script.delay_on {
                None => run_steps(&script.steps, &resolve, &reject),
                Some(runtime) => {
                    let steps = script.steps.clone();
                    runtime.resolve_value(()).and_then(move |()| {
                        // A failure after the fact has nowhere to go but the callbacks.
                        if let Err(reason) = run_steps(&steps, &resolve, &reject) {
                            reject.reject(reason);
                        }
                        Ok(Resolution::Value(()))
                    });
                    Ok(())
                }
            }
        })))
    }
}
