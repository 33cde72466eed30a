//! # Pledge
//!
//! A single-threaded deferred value: a promise that settles exactly once and
//! runs its reactions as deferred jobs, never inline.
//!
//! ## Core Concepts
//!
//! - [`Promise`] = a value not known yet (`Pending`, then `Fulfilled` or `Rejected`)
//! - [`Resolution`] = what a promise is resolved with: a value, another promise,
//!   or a foreign [`Thenable`]
//! - [`Runtime`] = the FIFO job queue every reaction is scheduled onto
//!
//! The key principle: **settle once, react later**. The first settlement wins,
//! and nothing a promise triggers runs inside the call that triggered it.
//!
//! ## Architecture
//!
//! ```text
//! Runtime::promise(starter) ─► Resolve / Reject (call-once pair)
//!     │                              │
//!     │                              ▼
//!     │                     resolution procedure
//!     │                      ├─ itself   ─► Rejected(CyclicResolution)
//!     │                      ├─ Promise  ─► adopt via reaction
//!     │                      ├─ Thenable ─► call `then` in a job
//!     │                      └─ value    ─► Fulfilled
//!     ▼                              │
//! SettleCell ◄───────────────────────┘
//!     │ settle: drain matching reactions
//!     ▼
//! JobQueue (FIFO) ─► run_until_idle() ─► handler ─► child promise
//!                                                    (then / catch / finally)
//! ```
//!
//! ## Key Invariants
//!
//! 1. **Settle once** - `state` and outcome never change after leaving `Pending`
//! 2. **Never inline** - handlers run as jobs, even on already-settled promises
//! 3. **Registration order** - reactions on one promise fire in the order attached
//! 4. **FIFO jobs** - a job scheduled earlier runs before one scheduled later
//! 5. **First call wins** - each resolve/reject pair honors only its first use
//! 6. **Queue, not stack** - nested adoption grows the job queue, not the call stack
//!
//! ## Example
//!
//! ```ignore
//! use pledge::{resolved, Reason, Runtime};
//!
//! let rt = Runtime::new();
//!
//! let answer = rt
//!     .promise(|resolve, _reject| {
//!         resolve.fulfill(20);
//!         Ok(())
//!     })
//!     .and_then(|v| resolved!(v + 1))
//!     .and_then(|v| resolved!(v * 2))
//!     .finally(|| Ok(()));
//!
//! // Nothing has run yet; drive the queue.
//! assert!(answer.is_pending());
//! rt.run_until_idle()?;
//! assert_eq!(answer.outcome().unwrap()?, 42);
//!
//! let all = rt.all(vec![rt.resolve_value(1), rt.reject(Reason::msg("x"))]);
//! assert_eq!(rt.block_on(&all).unwrap_err().to_string(), "x");
//! ```
//!
//! ## What This Is Not
//!
//! Pledge is **not**:
//! - A multi-threaded executor
//! - A cancellation or timeout mechanism
//! - An unhandled-rejection tracker
//!
//! Hosts decide when to drain the queue. [`Promise::settled`] bridges into
//! async Rust for hosts that already run an executor.

// Core modules
mod macros;

mod cell;
mod combinators;
mod config;
mod deferred;
mod error;
mod promise;
mod queue;
mod resolution;
mod runtime;
mod settlement;

// Thenable helpers
pub mod thenable {
    //! Building foreign thenables from closures.
    pub use crate::resolution::from_fn;
}

// Ordering tests (test-only)
#[cfg(test)]
mod ordering_tests;

// Re-export the promise handle
pub use promise::{Promise, PromiseId, Settled};

// Re-export resolution types
pub use resolution::{Reject, Resolution, Resolve, Then, ThenFn, Thenable};

// Re-export states and outcome descriptors
pub use settlement::{Settlement, State};

// Re-export error types
pub use error::{PledgeError, Reason};

// Re-export runtime types
pub use config::{RuntimeConfig, DEFAULT_QUEUE_CAPACITY};
pub use deferred::Deferred;
pub use queue::{Job, JobQueue};
pub use runtime::{Runtime, RuntimeBuilder};
