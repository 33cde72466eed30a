//! The settlement cell: state, result and pending reactions of one promise.

use std::any::Any;
use std::cell::RefCell;

use smallvec::SmallVec;

use crate::error::Reason;
use crate::queue::Job;
use crate::settlement::State;

pub(crate) type FulfillReaction<T> = Box<dyn Reaction<T>>;
pub(crate) type RejectReaction = Box<dyn Reaction<Reason>>;

/// A one-shot callback that can also be handed off as an opaque value, so a
/// cell can release it without knowing what it captures.
pub(crate) trait Reaction<A> {
    fn call(self: Box<Self>, arg: A);

    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<A, F> Reaction<A> for F
where
    F: FnOnce(A) + 'static,
{
    fn call(self: Box<Self>, arg: A) {
        (*self)(arg)
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

type Reactions<R> = SmallVec<[R; 2]>;

/// Reactions live only inside `Pending`, so settling drops every closure the
/// cell held: fired ones move into jobs, the losing branch is discarded.
pub(crate) enum SettleCell<T> {
    Pending {
        fulfill_reactions: Reactions<FulfillReaction<T>>,
        reject_reactions: Reactions<RejectReaction>,
    },
    Fulfilled(T),
    Rejected(Reason),
}

impl<T> SettleCell<T> {
    pub(crate) fn new() -> Self {
        SettleCell::Pending {
            fulfill_reactions: SmallVec::new(),
            reject_reactions: SmallVec::new(),
        }
    }

    pub(crate) fn state(&self) -> State {
        match self {
            SettleCell::Pending { .. } => State::Pending,
            SettleCell::Fulfilled(_) => State::Fulfilled,
            SettleCell::Rejected(_) => State::Rejected,
        }
    }

    pub(crate) fn pending_reactions(&self) -> usize {
        match self {
            SettleCell::Pending {
                fulfill_reactions, ..
            } => fulfill_reactions.len(),
            _ => 0,
        }
    }
}

impl<T: Clone + 'static> SettleCell<T> {
    pub(crate) fn outcome(&self) -> Option<Result<T, Reason>> {
        match self {
            SettleCell::Pending { .. } => None,
            SettleCell::Fulfilled(value) => Some(Ok(value.clone())),
            SettleCell::Rejected(reason) => Some(Err(reason.clone())),
        }
    }

    /// Fix the outcome. Returns the jobs for the reactions that must fire,
    /// in registration order, or `None` if the cell had already settled.
    pub(crate) fn settle(&mut self, outcome: Result<T, Reason>) -> Option<SmallVec<[Job; 2]>> {
        let SettleCell::Pending {
            fulfill_reactions,
            reject_reactions,
        } = self
        else {
            return None;
        };
        let fulfill_reactions = std::mem::take(fulfill_reactions);
        let reject_reactions = std::mem::take(reject_reactions);

        let jobs: SmallVec<[Job; 2]> = match outcome {
            Ok(value) => {
                *self = SettleCell::Fulfilled(value.clone());
                drop(reject_reactions);
                fulfill_reactions
                    .into_iter()
                    .map(|reaction| {
                        let value = value.clone();
                        Box::new(move || reaction.call(value)) as Job
                    })
                    .collect()
            }
            Err(reason) => {
                *self = SettleCell::Rejected(reason.clone());
                drop(fulfill_reactions);
                reject_reactions
                    .into_iter()
                    .map(|reaction| {
                        let reason = reason.clone();
                        Box::new(move || reaction.call(reason)) as Job
                    })
                    .collect()
            }
        };
        Some(jobs)
    }

    /// Register a reaction pair. While pending both are queued; once settled
    /// the matching one comes back as a ready job and the other is dropped.
    pub(crate) fn subscribe(
        &mut self,
        on_fulfilled: FulfillReaction<T>,
        on_rejected: RejectReaction,
    ) -> Option<Job> {
        match self {
            SettleCell::Pending {
                fulfill_reactions,
                reject_reactions,
            } => {
                fulfill_reactions.push(on_fulfilled);
                reject_reactions.push(on_rejected);
                None
            }
            SettleCell::Fulfilled(value) => {
                let value = value.clone();
                Some(Box::new(move || on_fulfilled.call(value)))
            }
            SettleCell::Rejected(reason) => {
                let reason = reason.clone();
                Some(Box::new(move || on_rejected.call(reason)))
            }
        }
    }
}

// A pending reaction usually owns the next promise in a chain, whose cell
// owns the reaction after that. Dropping such a chain link by link would
// recurse once per link, so released reactions are parked here and dropped
// in a loop by the outermost release.
thread_local! {
    static RELEASED: RefCell<Option<Vec<Box<dyn Any>>>> = const { RefCell::new(None) };
}

impl<T> Drop for SettleCell<T> {
    fn drop(&mut self) {
        let SettleCell::Pending {
            fulfill_reactions,
            reject_reactions,
        } = self
        else {
            return;
        };
        if fulfill_reactions.is_empty() && reject_reactions.is_empty() {
            return;
        }
        let reactions: Vec<Box<dyn Any>> = fulfill_reactions
            .drain(..)
            .map(|reaction| reaction.into_any())
            .chain(reject_reactions.drain(..).map(|reaction| reaction.into_any()))
            .collect();
        release(reactions);
    }
}

fn release(mut reactions: Vec<Box<dyn Any>>) {
    let nested = RELEASED.try_with(|slot| {
        let mut slot = slot.borrow_mut();
        if let Some(parked) = slot.as_mut() {
            parked.append(&mut reactions);
            return true;
        }
        *slot = Some(Vec::new());
        false
    });
    match nested {
        Ok(true) => {}
        Ok(false) => {
            drop(reactions);
            while let Some(reaction) = RELEASED
                .try_with(|slot| slot.borrow_mut().as_mut().and_then(Vec::pop))
                .ok()
                .flatten()
            {
                drop(reaction);
            }
            let _ = RELEASED.try_with(|slot| slot.borrow_mut().take());
        }
        // Thread-local storage is gone during thread teardown; drop in place.
        Err(_) => drop(reactions),
    }
}
