//! Promise: a cold, cancelable, memoizing single-result computation.
//!
//! A promise does nothing until the first `when_complete`. That call runs the
//! task body exactly once; the result is then cached and handed to every
//! callback, including ones registered later.
//!
//! ```
//! use pledge_core::{Outcome, Promise};
//!
//! let doubled = Promise::<i32, String>::of_success(2).map(|v| v * 2);
//! doubled.when_complete(|outcome| assert_eq!(outcome, Outcome::Success(4)));
//! ```

mod aggregate;
mod combinators;
mod core;
pub(crate) mod delay;
mod future;
mod scheduling;
mod subscriber;

use std::fmt;
use std::sync::Arc;

pub use self::aggregate::{all, all2, all3, all4, any};
pub use self::future::PromiseFuture;
pub use self::subscriber::Subscriber;

use self::core::PromiseCore;
use crate::domain::{Outcome, PromiseId, PromiseStatus};

/// Bound shared by promise values and errors.
///
/// Results are cached and cloned out to each callback, and promises move
/// freely between threads.
pub trait Payload: Clone + Send + Sync + 'static {}

impl<V: Clone + Send + Sync + 'static> Payload for V {}

/// Handle to a promise. Clones refer to the same promise.
pub struct Promise<T, E> {
    core: Arc<PromiseCore<T, E>>,
}

impl<T, E> Clone for Promise<T, E> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<T: Payload, E: Payload> Promise<T, E> {
    /// Create a promise around a task body. Nothing runs yet.
    ///
    /// The task must eventually call exactly one of `resolve`, `reject` or
    /// `complete` on the subscriber, or the promise never completes.
    pub fn new<F>(task: F) -> Self
    where
        F: FnOnce(Subscriber<T, E>) + Send + 'static,
    {
        Self {
            core: Arc::new(PromiseCore::idle(Box::new(task))),
        }
    }

    /// An already completed promise.
    pub fn of(outcome: Outcome<T, E>) -> Self {
        Self {
            core: Arc::new(PromiseCore::complete(outcome)),
        }
    }

    pub fn of_success(value: T) -> Self {
        Self::of(Outcome::Success(value))
    }

    pub fn of_error(error: E) -> Self {
        Self::of(Outcome::Error(error))
    }

    pub fn from_result(result: Result<T, E>) -> Self {
        Self::of(result.into())
    }

    /// A promise that never completes.
    pub fn never() -> Self {
        Self::new(|_| {})
    }

    pub fn id(&self) -> PromiseId {
        self.core.id()
    }

    pub fn status(&self) -> PromiseStatus {
        self.core.status()
    }

    /// The cached outcome, if the promise has completed.
    pub fn peek(&self) -> Option<Outcome<T, E>> {
        self.core.peek()
    }

    pub fn is_cancelled(&self) -> bool {
        self.status() == PromiseStatus::Cancelled
    }

    /// Subscribe to the outcome, starting the task on the first subscription.
    ///
    /// The callback runs exactly once if the promise completes: right away if
    /// it already has, otherwise on the thread that reports the result. It
    /// never runs for a cancelled promise.
    ///
    /// If a callback panics, the remaining callbacks still receive the
    /// outcome and the panic then propagates to the thread that reported it.
    pub fn when_complete<F>(&self, callback: F) -> &Self
    where
        F: FnOnce(Outcome<T, E>) + Send + 'static,
    {
        self.core.subscribe(Box::new(callback));
        self
    }

    /// Start the task without observing the outcome.
    pub fn start(&self) -> &Self {
        self.when_complete(|_| {})
    }

    /// Cancel the promise.
    ///
    /// No-op once complete or cancelled. Otherwise no callback fires after
    /// this returns, and the running task's cancel hook (if any) is invoked
    /// on this thread.
    pub fn cancel(&self) {
        self.core.cancel();
    }

    /// Subscribe and feed the outcome into `sub`, wiring cancellation of the
    /// outer task back to this promise.
    pub(crate) fn forward_to(&self, sub: Subscriber<T, E>) {
        let upstream = self.clone();
        sub.on_cancel(move || upstream.cancel());
        self.when_complete(move |outcome| sub.complete(outcome));
    }
}

impl<T, E> fmt::Debug for Promise<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise").field("id", &self.core.id()).finish()
    }
}
