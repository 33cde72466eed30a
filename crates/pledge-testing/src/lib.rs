//! # Pledge Testing
//!
//! Test doubles and harness helpers for code built on `pledge`.
//!
//! - [`Adapter`] exposes the `resolved` / `rejected` / `deferred` shape that
//!   promise conformance suites drive.
//! - [`ScriptedThenable`] is a foreign thenable that misbehaves on cue:
//!   calling back twice, calling both callbacks, failing after calling back,
//!   or failing while its `then` is read.
//! - [`Recorder`] logs handler invocations so tests can assert ordering.

mod adapter;
mod recorder;
mod thenable;

pub use adapter::Adapter;
pub use recorder::Recorder;
pub use thenable::{Getter, ScriptedThenable, Step};
