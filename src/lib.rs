//! A minimal single-shot deferred/promise primitive.
//!
//! A [`Deferred`] is a mutable future value: the producer that created it may
//! [`resolve`](Deferred::resolve) or [`reject`](Deferred::reject) it exactly
//! once. Consumers get the read-only [`Promise`] view and chain continuations
//! with `then`/`done`/`fail`, before or after settlement.
//!
//! Continuations run synchronously, on the stack of whichever call settles
//! the deferred (or registers on an already-settled one). There is no hidden
//! task queue and no deferral to a later tick.
//!
//! ```
//! use deferred_lite::{Deferred, Step};
//!
//! let deferred = Deferred::new();
//! let chained = deferred
//!     .promise()
//!     .then(Some(Box::new(|v: &i32| Step::Value(v + 1))), None);
//! deferred.resolve(41);
//! assert!(chained.is_resolved());
//! ```
//!
//! # Known limitations
//!
//! - Chains settle re-entrantly: resolving inside a callback runs the nested
//!   chain on the same stack, so very long synchronous chains grow the call
//!   stack with chain length.
//! - A panic inside a callback unwinds out of the `resolve`/`reject` (or
//!   [`timer::run`]) call that triggered it, and later continuations queued
//!   for that same settlement do not run. Callbacks that need isolation must
//!   catch on their own.
//! - A rejected chain with no terminal `fail` handler is simply a permanently
//!   rejected deferred; nothing reports it.
//!
//! The handle types are `!Send`: the crate assumes a single logical thread
//! and takes no locks.

pub mod deferred;
pub mod promise;
pub mod timer;

pub use deferred::{Callback, Deferred, Step};
pub use promise::Promise;
pub use timer::sleep;

use thiserror::Error as ThisError;

/// The capability of being chained: anything that can accept a fulfillment
/// and a rejection continuation.
///
/// A structural "is it promise-like" capability rather than a concrete type
/// check: a callback may hand back any `Thenable` via [`Step::Chain`], not
/// just this crate's [`Promise`], and the downstream deferred follows its
/// outcome.
pub trait Thenable<T> {
    /// Registers continuations to run when the value settles.
    fn when(&self, on_fulfilled: Callback<T>, on_rejected: Callback<T>);
}

#[derive(Debug, ThisError, PartialEq, Eq)]
pub enum Error {
    /// [`timer::run`] was called from inside a firing timer callback.
    #[error("timer queue is already running on this thread")]
    TimerRunning,
}

/// True iff a callback's [`Step`] carries a chainable value.
pub fn is_promise<T>(step: &Step<T>) -> bool {
    matches!(step, Step::Chain(_))
}

/// Returns a promise already resolved with `value`.
///
/// # Examples
///
/// ```
/// use deferred_lite::ok;
///
/// assert!(ok("OK").is_resolved());
/// ```
pub fn ok<T: Clone + 'static>(value: T) -> Promise<T> {
    Deferred::new().resolve(value).promise()
}

/// Returns a promise already rejected with `err`.
///
/// # Examples
///
/// ```
/// use deferred_lite::ng;
///
/// assert!(ng("NG").is_rejected());
/// ```
pub fn ng<T: Clone + 'static>(err: T) -> Promise<T> {
    Deferred::new().reject(err).promise()
}
