//! Monadic composition.
//!
//! Everything here is built on `bind`. A bound promise is itself cold: it
//! subscribes upstream only when someone subscribes to it.

use super::{Payload, Promise};
use crate::domain::Outcome;

impl<T: Payload, E: Payload> Promise<T, E> {
    /// Feed this promise's outcome into `transform` and continue with the
    /// promise it returns.
    ///
    /// Cancelling the result cancels upstream while it is pending, and the
    /// downstream promise once `transform` has produced it. The switch goes
    /// through the subscriber's cancel hook, so a cancel that races the switch
    /// still reaches the downstream promise.
    pub fn bind<U, F, B>(&self, transform: B) -> Promise<U, F>
    where
        U: Payload,
        F: Payload,
        B: FnOnce(Outcome<T, E>) -> Promise<U, F> + Send + 'static,
    {
        let upstream = self.clone();
        Promise::new(move |sub| {
            let pending = upstream.clone();
            sub.on_cancel(move || pending.cancel());

            upstream.when_complete(move |outcome| {
                let downstream = transform(outcome);
                // Installs the new target, or cancels it right away if the
                // outer promise was cancelled in the meantime.
                downstream.forward_to(sub);
            });
        })
    }

    pub fn map<U, M>(&self, transform: M) -> Promise<U, E>
    where
        U: Payload,
        M: FnOnce(T) -> U + Send + 'static,
    {
        self.bind(move |outcome| Promise::of(outcome.map(transform)))
    }

    /// Chain another promise on success. Errors pass through and `transform`
    /// is never called for them.
    pub fn then<U, M>(&self, transform: M) -> Promise<U, E>
    where
        U: Payload,
        M: FnOnce(T) -> Promise<U, E> + Send + 'static,
    {
        self.bind(move |outcome| match outcome {
            Outcome::Success(value) => transform(value),
            Outcome::Error(error) => Promise::of_error(error),
        })
    }

    pub fn map_error<F, M>(&self, transform: M) -> Promise<T, F>
    where
        F: Payload,
        M: FnOnce(E) -> F + Send + 'static,
    {
        self.bind(move |outcome| Promise::of(outcome.map_error(transform)))
    }

    /// Recover from an error with another promise. Successes pass through.
    pub fn error_then<F, M>(&self, transform: M) -> Promise<T, F>
    where
        F: Payload,
        M: FnOnce(E) -> Promise<T, F> + Send + 'static,
    {
        self.bind(move |outcome| match outcome {
            Outcome::Success(value) => Promise::of_success(value),
            Outcome::Error(error) => transform(error),
        })
    }

    /// Run `action` when the task starts, before subscribing upstream.
    pub fn on_start<A>(&self, action: A) -> Promise<T, E>
    where
        A: FnOnce() + Send + 'static,
    {
        let upstream = self.clone();
        Promise::new(move |sub| {
            action();
            upstream.forward_to(sub);
        })
    }

    /// Observe the success value; the outcome passes through unchanged.
    pub fn on_resolve<A>(&self, action: A) -> Promise<T, E>
    where
        A: FnOnce(&T) + Send + 'static,
    {
        self.bind(move |outcome| {
            if let Outcome::Success(value) = &outcome {
                action(value);
            }
            Promise::of(outcome)
        })
    }

    /// Observe the error; the outcome passes through unchanged.
    pub fn on_reject<A>(&self, action: A) -> Promise<T, E>
    where
        A: FnOnce(&E) + Send + 'static,
    {
        self.bind(move |outcome| {
            if let Outcome::Error(error) = &outcome {
                action(error);
            }
            Promise::of(outcome)
        })
    }

    /// Turn an error into permanent silence.
    ///
    /// The returned promise never completes if this one fails, so no callback
    /// ever fires. It does not resolve to a default.
    ///
    /// On error the subscriber is dropped rather than parked on a pending
    /// promise, so nothing keeps this chain alive once its handles are gone.
    pub fn ignore_error(&self) -> Promise<T, E> {
        let upstream = self.clone();
        Promise::new(move |sub| {
            {
                let upstream = upstream.clone();
                sub.on_cancel(move || upstream.cancel());
            }
            upstream.when_complete(move |outcome| match outcome {
                Outcome::Success(value) => sub.resolve(value),
                Outcome::Error(_) => {
                    tracing::trace!(promise = %sub.id(), "error ignored");
                }
            });
        })
    }
}
