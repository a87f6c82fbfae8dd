use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::deferred::{Callback, Deferred, Settled};
use crate::Thenable;

/// The consumer-side view of a [`Deferred`]: it can observe and chain, never
/// settle. Cloning a `Promise` yields another view of the same slot; views
/// share ownership of the state with the deferred that created them.
///
/// A promise is also a [`Future`] yielding `Result<T, T>`, so settled values
/// can be awaited from a single-threaded executor.
///
/// # Examples
///
/// ```
/// use deferred_lite::Deferred;
///
/// let deferred = Deferred::new();
/// let promise = deferred.promise();
/// deferred.resolve("🍓");
/// assert!(promise.is_resolved());
/// ```
pub struct Promise<T> {
    deferred: Deferred<T>,
}

impl<T> Clone for Promise<T> {
    fn clone(&self) -> Self {
        Self {
            deferred: self.deferred.clone(),
        }
    }
}

impl<T> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Promise").field(&self.deferred).finish()
    }
}

impl<T> Promise<T> {
    /// Wraps a deferred in its read-only view. Only a `Deferred` can back a
    /// promise, so an invalid-argument case cannot arise.
    pub fn new(deferred: &Deferred<T>) -> Self {
        Self {
            deferred: deferred.clone(),
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.deferred.is_resolved()
    }

    pub fn is_rejected(&self) -> bool {
        self.deferred.is_rejected()
    }
}

impl<T: Clone + 'static> Promise<T> {
    /// See [`Deferred::then`].
    pub fn then(
        &self,
        on_fulfilled: Option<Callback<T>>,
        on_rejected: Option<Callback<T>>,
    ) -> Promise<T> {
        self.deferred.then(on_fulfilled, on_rejected)
    }

    /// Alias for [`then`](Promise::then).
    pub fn done(
        &self,
        on_fulfilled: Option<Callback<T>>,
        on_rejected: Option<Callback<T>>,
    ) -> Promise<T> {
        self.deferred.done(on_fulfilled, on_rejected)
    }

    /// Registers a rejection handler only.
    ///
    /// # Examples
    ///
    /// ```
    /// use deferred_lite::{ng, Step};
    ///
    /// let recovered = ng(String::from("boom"))
    ///     .fail(Some(Box::new(|e: &String| Step::Value(format!("saw {e}")))));
    /// assert!(recovered.is_resolved());
    /// ```
    pub fn fail(&self, on_rejected: Option<Callback<T>>) -> Promise<T> {
        self.deferred.fail(on_rejected)
    }
}

impl<T: Clone + 'static> Thenable<T> for Promise<T> {
    fn when(&self, on_fulfilled: Callback<T>, on_rejected: Callback<T>) {
        self.deferred.when(on_fulfilled, on_rejected);
    }
}

impl<T: Clone + 'static> Future for Promise<T> {
    type Output = Result<T, T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.deferred.poll_outcome(cx.waker()) {
            Some(Settled::Resolved(value)) => Poll::Ready(Ok(value)),
            Some(Settled::Rejected(err)) => Poll::Ready(Err(err)),
            None => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use futures::executor::block_on;

    use super::Promise;
    use crate::deferred::{Deferred, Step};
    use crate::{ng, ok};

    #[test]
    fn promise_delegates_state_queries() {
        let deferred: Deferred<i32> = Deferred::new();
        let promise = Promise::new(&deferred);
        assert!(!promise.is_resolved());
        deferred.resolve(1);
        assert!(promise.is_resolved());
        assert!(!promise.is_rejected());
    }

    #[test]
    fn every_view_observes_the_same_slot() {
        let deferred: Deferred<i32> = Deferred::new();
        let first = deferred.promise();
        let second = first.clone();
        deferred.reject(0);
        assert!(first.is_rejected());
        assert!(second.is_rejected());
    }

    #[test]
    fn then_on_promise_chains_through_the_deferred() {
        let seen = Rc::new(RefCell::new(None));
        let deferred: Deferred<String> = Deferred::new();
        let sink = seen.clone();
        deferred.promise().then(
            Some(Box::new(move |v: &String| {
                *sink.borrow_mut() = Some(v.clone());
                Step::Done
            })),
            None,
        );
        deferred.resolve("through the view".to_string());
        assert_eq!(seen.borrow().as_deref(), Some("through the view"));
    }

    #[test]
    fn settled_promises_block_on_immediately() {
        assert_eq!(block_on(ok(5)), Ok(5));
        assert_eq!(block_on(ng("x")), Err("x"));
    }

    #[test]
    fn fail_on_promise_recovers() {
        let recovered = ng("NG").fail(Some(Box::new(|_: &&str| Step::Value("OK"))));
        assert!(recovered.is_resolved());
    }
}
