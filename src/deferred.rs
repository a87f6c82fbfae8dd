use std::cell::RefCell;
use std::fmt;
use std::mem;
use std::rc::Rc;
use std::task::Waker;

use log::{debug, trace};

use crate::promise::Promise;
use crate::Thenable;

/// A continuation callback. Receives the settled slot value by reference and
/// reports what the downstream deferred should do next as a [`Step`].
pub type Callback<T> = Box<dyn FnOnce(&T) -> Step<T>>;

/// Outcome of a continuation callback.
///
/// Mirrors the three things a chained handler can hand back: nothing (the
/// upstream value flows through unchanged), a replacement value, or another
/// chainable value whose eventual outcome the downstream deferred follows.
pub enum Step<T> {
    /// No transform; the upstream value passes through unchanged.
    Done,
    /// Settle the downstream deferred with this value instead.
    Value(T),
    /// The handler produced another chainable value; the downstream deferred
    /// settles to its eventual outcome, not to the chainable itself.
    Chain(Box<dyn Thenable<T>>),
}

impl<T> Step<T> {
    /// Wraps any [`Thenable`] for chaining, including ones foreign to this crate.
    pub fn chain(thenable: impl Thenable<T> + 'static) -> Self {
        Step::Chain(Box::new(thenable))
    }
}

impl<T> fmt::Debug for Step<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Step::Done => "Step::Done",
            Step::Value(_) => "Step::Value",
            Step::Chain(_) => "Step::Chain",
        })
    }
}

/// A settled outcome. `None` in [`Inner::settled`] is the unresolved state.
#[derive(Clone)]
pub(crate) enum Settled<T> {
    Resolved(T),
    Rejected(T),
}

struct Continuation<T> {
    on_fulfilled: Option<Callback<T>>,
    on_rejected: Option<Callback<T>>,
    downstream: Deferred<T>,
}

struct Inner<T> {
    settled: Option<Settled<T>>,
    callbacks: Vec<Continuation<T>>,
    wakers: Vec<Waker>,
}

/// The producer-side handle: a single-shot future value that can be resolved
/// or rejected exactly once.
///
/// Cloning a `Deferred` clones the handle, not the state; every clone settles
/// the same underlying slot. Hand consumers the [`Promise`] view from
/// [`promise`](Deferred::promise) instead of a `Deferred` so they cannot
/// settle it themselves.
///
/// All continuation callbacks run synchronously inside the `resolve`/`reject`
/// call that triggers them (or inside `then` itself when registering on an
/// already-settled deferred). The handle is `!Send`; this type assumes a
/// single logical thread.
///
/// # Examples
///
/// ```
/// use deferred_lite::{Deferred, Step};
///
/// let deferred = Deferred::new();
/// let doubled = deferred.then(Some(Box::new(|v: &i32| Step::Value(v * 2))), None);
/// deferred.resolve(21);
/// assert!(doubled.is_resolved());
/// ```
pub struct Deferred<T> {
    pub(crate) inner: Rc<RefCell<Inner<T>>>,
}

impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Default for Deferred<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Deferred")
            .field(
                "state",
                &match inner.settled {
                    None => "unresolved",
                    Some(Settled::Resolved(_)) => "resolved",
                    Some(Settled::Rejected(_)) => "rejected",
                },
            )
            .field("callbacks", &inner.callbacks.len())
            .finish()
    }
}

impl<T> Deferred<T> {
    /// Creates an unresolved deferred with no continuations.
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                settled: None,
                callbacks: Vec::new(),
                wakers: Vec::new(),
            })),
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self.inner.borrow().settled, Some(Settled::Resolved(_)))
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self.inner.borrow().settled, Some(Settled::Rejected(_)))
    }

    /// Returns the read-only view of this deferred.
    pub fn promise(&self) -> Promise<T> {
        Promise::new(self)
    }
}

impl<T: Clone + 'static> Deferred<T> {
    /// Settles the deferred as resolved and runs every queued continuation in
    /// registration order, on the caller's stack.
    ///
    /// A no-op on an already-settled deferred.
    ///
    /// # Examples
    ///
    /// ```
    /// use deferred_lite::Deferred;
    ///
    /// let deferred = Deferred::new();
    /// deferred.resolve("ready");
    /// deferred.reject("too late"); // ignored
    /// assert!(deferred.is_resolved());
    /// ```
    pub fn resolve(&self, value: T) -> &Self {
        self.settle(Settled::Resolved(value))
    }

    /// Settles the deferred as rejected. Same queue-draining and idempotence
    /// rules as [`resolve`](Deferred::resolve).
    pub fn reject(&self, err: T) -> &Self {
        self.settle(Settled::Rejected(err))
    }

    /// Registers a continuation and returns the [`Promise`] view of the fresh
    /// downstream deferred it feeds.
    ///
    /// Registering on an already-settled deferred serves the continuation
    /// immediately, through the same dispatch rules used at settlement time.
    /// The returned promise never grants resolve/reject power over the
    /// downstream.
    ///
    /// # Examples
    ///
    /// ```
    /// use deferred_lite::{ok, Step};
    ///
    /// // Late registration still fires: `ok` is already resolved here.
    /// let next = ok(1).then(Some(Box::new(|v: &i32| Step::Value(v + 1))), None);
    /// assert!(next.is_resolved());
    /// ```
    pub fn then(
        &self,
        on_fulfilled: Option<Callback<T>>,
        on_rejected: Option<Callback<T>>,
    ) -> Promise<T> {
        let downstream = Deferred::new();
        let continuation = Continuation {
            on_fulfilled,
            on_rejected,
            downstream: downstream.clone(),
        };
        let late = {
            let mut inner = self.inner.borrow_mut();
            match inner.settled.clone() {
                Some(outcome) => Some((outcome, continuation)),
                None => {
                    inner.callbacks.push(continuation);
                    None
                }
            }
        };
        if let Some((outcome, continuation)) = late {
            run_continuation(&outcome, continuation);
        }
        downstream.promise()
    }

    /// Alias for [`then`](Deferred::then).
    pub fn done(
        &self,
        on_fulfilled: Option<Callback<T>>,
        on_rejected: Option<Callback<T>>,
    ) -> Promise<T> {
        self.then(on_fulfilled, on_rejected)
    }

    /// Registers a rejection handler only: `then(None, on_rejected)`.
    pub fn fail(&self, on_rejected: Option<Callback<T>>) -> Promise<T> {
        self.then(None, on_rejected)
    }

    /// Stores a waker to wake at settlement, or returns the outcome if
    /// already settled. Backs the `Future` impl on [`Promise`].
    pub(crate) fn poll_outcome(&self, waker: &Waker) -> Option<Settled<T>> {
        let mut inner = self.inner.borrow_mut();
        match &inner.settled {
            Some(outcome) => Some(outcome.clone()),
            None => {
                inner.wakers.push(waker.clone());
                None
            }
        }
    }

    fn settle(&self, outcome: Settled<T>) -> &Self {
        let (continuations, wakers) = {
            let mut inner = self.inner.borrow_mut();
            if inner.settled.is_some() {
                debug!("settlement ignored: deferred already settled");
                return self;
            }
            trace!(
                "deferred {}",
                match &outcome {
                    Settled::Resolved(_) => "resolved",
                    Settled::Rejected(_) => "rejected",
                }
            );
            inner.settled = Some(outcome.clone());
            (mem::take(&mut inner.callbacks), mem::take(&mut inner.wakers))
        };
        // The borrow is released before any user callback runs, so callbacks
        // may re-enter then/resolve/reject on this same deferred.
        for continuation in continuations {
            run_continuation(&outcome, continuation);
        }
        for waker in wakers {
            waker.wake();
        }
        self
    }
}

impl<T: Clone + 'static> Thenable<T> for Deferred<T> {
    fn when(&self, on_fulfilled: Callback<T>, on_rejected: Callback<T>) {
        self.then(Some(on_fulfilled), Some(on_rejected));
    }
}

/// Serves one continuation against a settled outcome. Shared by the
/// settlement loop and the late-registration path so both honour the same
/// transform, passthrough and chaining rules.
fn run_continuation<T: Clone + 'static>(outcome: &Settled<T>, continuation: Continuation<T>) {
    let downstream = continuation.downstream;
    match outcome {
        Settled::Resolved(value) => match continuation.on_fulfilled {
            Some(callback) => match callback(value) {
                Step::Done => {
                    downstream.resolve(value.clone());
                }
                Step::Value(produced) => {
                    downstream.resolve(produced);
                }
                Step::Chain(inner) => follow(inner, downstream),
            },
            None => {
                downstream.resolve(value.clone());
            }
        },
        Settled::Rejected(err) => match continuation.on_rejected {
            Some(callback) => match callback(err) {
                Step::Done => {
                    downstream.reject(err.clone());
                }
                // A handler that produced a replacement value converts the
                // failure into success downstream.
                Step::Value(produced) => {
                    downstream.resolve(produced);
                }
                Step::Chain(inner) => follow(inner, downstream),
            },
            None => {
                downstream.reject(err.clone());
            }
        },
    }
}

/// Chains `downstream` to the outcome of a thenable returned by a callback.
fn follow<T: Clone + 'static>(inner: Box<dyn Thenable<T>>, downstream: Deferred<T>) {
    let resolved = downstream.clone();
    inner.when(
        Box::new(move |value: &T| {
            resolved.resolve(value.clone());
            Step::Done
        }),
        Box::new(move |err: &T| {
            downstream.reject(err.clone());
            Step::Done
        }),
    );
}
