//! Single-shot timers for the current thread.
//!
//! The queue is thread-local and explicitly driven: producers call [`sleep`]
//! or [`schedule`], then someone on the same thread calls [`run`] to drain
//! the queue. Callbacks fire on the driving thread, in due-then-registration
//! order, and may schedule further timers that join the same drain.

use std::cell::{Cell, RefCell};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::thread;
use std::time::{Duration, Instant};

use log::trace;

use crate::deferred::Deferred;
use crate::promise::Promise;
use crate::Error;

struct Timer {
    due: Instant,
    seq: u64,
    fire: Box<dyn FnOnce()>,
}

// BinaryHeap is a max-heap; order timers so the earliest due (and among equals
// the earliest scheduled) is the greatest.
impl Ord for Timer {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Timer {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Timer {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for Timer {}

thread_local! {
    static TIMERS: RefCell<BinaryHeap<Timer>> = RefCell::new(BinaryHeap::new());
    static NEXT_SEQ: Cell<u64> = const { Cell::new(0) };
    static RUNNING: Cell<bool> = const { Cell::new(false) };
}

/// Schedules `fire` to run on this thread once `delay` has elapsed, the next
/// time the queue is driven.
pub fn schedule(delay: Duration, fire: impl FnOnce() + 'static) {
    let seq = NEXT_SEQ.with(|next| {
        let seq = next.get();
        next.set(seq + 1);
        seq
    });
    TIMERS.with(|timers| {
        timers.borrow_mut().push(Timer {
            due: Instant::now() + delay,
            seq,
            fire: Box::new(fire),
        })
    });
}

/// Returns a promise that resolves with `T::default()` after `ms`
/// milliseconds. Never rejects.
///
/// # Examples
///
/// ```
/// use deferred_lite::timer;
///
/// let woke = timer::sleep::<()>(1);
/// timer::run().unwrap();
/// assert!(woke.is_resolved());
/// ```
pub fn sleep<T: Clone + Default + 'static>(ms: u64) -> Promise<T> {
    let deferred = Deferred::new();
    let promise = deferred.promise();
    schedule(Duration::from_millis(ms), move || {
        deferred.resolve(T::default());
    });
    promise
}

/// Number of timers waiting on this thread's queue.
pub fn pending() -> usize {
    TIMERS.with(|timers| timers.borrow().len())
}

/// Drives this thread's timer queue until it is empty, sleeping up to each
/// deadline and firing callbacks in order.
///
/// Returns [`Error::TimerRunning`] when called from inside a firing callback;
/// the queue is already being drained and nesting the drive loop would
/// re-enter the thread-local queue. A panic inside a callback unwinds out of
/// `run` (nothing is caught on the callback's behalf); remaining timers stay
/// queued for a later drive.
pub fn run() -> Result<(), Error> {
    if RUNNING.with(|running| running.replace(true)) {
        return Err(Error::TimerRunning);
    }
    let _guard = RunGuard;
    loop {
        let Some(timer) = TIMERS.with(|timers| timers.borrow_mut().pop()) else {
            break;
        };
        let now = Instant::now();
        if timer.due > now {
            thread::sleep(timer.due - now);
        }
        trace!("timer {} fired", timer.seq);
        (timer.fire)();
    }
    Ok(())
}

struct RunGuard;

impl Drop for RunGuard {
    fn drop(&mut self) {
        RUNNING.with(|running| running.set(false));
    }
}
