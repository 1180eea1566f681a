//! Retry engine: runs attempts one after another until the handler says stop.
//!
//! Attempt `n + 1` is only generated after attempt `n` completed and the
//! handler asked for another one, so attempts never overlap. The cancel hook
//! of the retry promise always points at whatever is live: the running
//! attempt, or the delay before the next one.
//!
//! Attempts that complete while they are being subscribed are handled by a
//! loop on the subscribing thread, so a long run of immediate retries does
//! not grow the stack.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use super::{RetryHandler, RetryPolicy};
use crate::domain::Outcome;
use crate::ports::Scheduler;
use crate::promise::delay::Delay;
use crate::promise::{Payload, Promise, Subscriber};

struct RetryRun<T, E, S: ?Sized, H, G> {
    scheduler: Arc<S>,
    handler: H,
    generator: G,
    sub: Subscriber<T, E>,
}

/// Decides who handles an attempt's outcome: the thread that subscribed
/// (when the attempt finished during `when_complete`) or the callback.
struct Handoff<T, E> {
    outcome: OnceLock<Outcome<T, E>>,
    claimed: AtomicBool,
}

impl<T, E> Handoff<T, E> {
    /// The second caller wins and takes over the outcome.
    fn second(&self) -> bool {
        self.claimed.swap(true, Ordering::AcqRel)
    }
}

impl<T, E, S, H, G> RetryRun<T, E, S, H, G>
where
    T: Payload,
    E: Payload,
    S: Scheduler + ?Sized + 'static,
    H: RetryHandler<T, E> + 'static,
    G: Fn() -> Promise<T, E> + Send + Sync + 'static,
{
    fn run(self: Arc<Self>, mut n: u32) {
        loop {
            if self.sub.is_cancelled() {
                tracing::debug!(promise = %self.sub.id(), attempt = n, "retry cancelled before attempt");
                return;
            }

            let attempt = (self.generator)();
            tracing::trace!(promise = %self.sub.id(), attempt = n, task = %attempt.id(), "starting attempt");
            {
                let attempt = attempt.clone();
                self.sub.on_cancel(move || attempt.cancel());
            }

            let handoff = Arc::new(Handoff {
                outcome: OnceLock::new(),
                claimed: AtomicBool::new(false),
            });
            {
                let (run, handoff) = (Arc::clone(&self), Arc::clone(&handoff));
                attempt.when_complete(move |outcome| {
                    let _ = handoff.outcome.set(outcome);
                    if handoff.second()
                        && let Some(outcome) = handoff.outcome.get().cloned()
                        && let Some(next) = run.decide(n, outcome)
                    {
                        run.run(next);
                    }
                });
            }

            // Still pending: the callback carries on from here.
            if !handoff.second() {
                return;
            }
            let Some(outcome) = handoff.outcome.get().cloned() else {
                return;
            };
            match self.decide(n, outcome) {
                Some(next) => n = next,
                None => return,
            }
        }
    }

    /// Act on the handler's verdict. Returns the next attempt index when it
    /// should start right away.
    fn decide(self: &Arc<Self>, n: u32, outcome: Outcome<T, E>) -> Option<u32> {
        let policy = self.handler.next(n, &outcome);
        tracing::debug!(
            promise = %self.sub.id(),
            attempt = n,
            outcome = ?outcome.kind(),
            policy = ?policy,
            "retry decision"
        );

        match policy {
            RetryPolicy::Cancel => {
                self.sub.complete(outcome);
                None
            }
            RetryPolicy::Immediately => Some(n + 1),
            RetryPolicy::WithDelay(delay) => {
                let run = Arc::clone(self);
                Delay::arm(&self.sub, &*self.scheduler, delay, move || run.run(n + 1));
                None
            }
        }
    }
}

impl<T: Payload, E: Payload> Promise<T, E> {
    /// Build a promise that keeps calling `generator` for fresh attempts
    /// until `handler` returns [`RetryPolicy::Cancel`], then delivers the
    /// last attempt's outcome.
    ///
    /// Delays between attempts are waited on `scheduler`. Cancelling the
    /// returned promise cancels the live attempt or delay and no further
    /// attempt is generated.
    ///
    /// ```
    /// use std::sync::Arc;
    /// use std::time::Duration;
    /// use pledge_core::{DefaultRetryHandler, ManualScheduler, Outcome, Promise};
    ///
    /// let scheduler = Arc::new(ManualScheduler::new());
    /// let p = Promise::<u32, String>::retry(
    ///     scheduler.clone(),
    ///     DefaultRetryHandler::with_delay(Duration::from_secs(1), 2),
    ///     || Promise::of_error("down".to_string()),
    /// );
    /// p.start();
    /// scheduler.advance(Duration::from_secs(2));
    /// assert_eq!(p.peek(), Some(Outcome::Error("down".to_string())));
    /// ```
    pub fn retry<S, H, G>(scheduler: Arc<S>, handler: H, generator: G) -> Promise<T, E>
    where
        S: Scheduler + ?Sized + 'static,
        H: RetryHandler<T, E> + 'static,
        G: Fn() -> Promise<T, E> + Send + Sync + 'static,
    {
        Promise::new(move |sub| {
            let run = Arc::new(RetryRun {
                scheduler,
                handler,
                generator,
                sub,
            });
            run.run(0);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PromiseStatus;
    use crate::impls::{InlineExecutor, ManualScheduler};
    use crate::retry::DefaultRetryHandler;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn failing(attempts: &Arc<AtomicU32>) -> impl Fn() -> Promise<u32, String> + Send + Sync + 'static {
        let attempts = Arc::clone(attempts);
        move || {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            Promise::of_error(format!("failure {n}"))
        }
    }

    fn record(p: &Promise<u32, String>) -> Arc<Mutex<Vec<Outcome<u32, String>>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        p.when_complete(move |o| sink.lock().unwrap().push(o));
        seen
    }

    #[test]
    fn always_failing_task_runs_max_attempts_plus_one() {
        let scheduler = Arc::new(ManualScheduler::new());
        let attempts = Arc::new(AtomicU32::new(0));
        let p = Promise::retry(
            Arc::clone(&scheduler),
            DefaultRetryHandler::with_delay(Duration::from_millis(10), 4),
            failing(&attempts),
        );
        let seen = record(&p);

        scheduler.advance(Duration::from_secs(1));

        assert_eq!(attempts.load(Ordering::SeqCst), 5);
        assert_eq!(*seen.lock().unwrap(), vec![Outcome::Error("failure 4".to_string())]);
    }

    #[test]
    fn backoff_requests_growing_delays() {
        let scheduler = Arc::new(ManualScheduler::new());
        let attempts = Arc::new(AtomicU32::new(0));
        let p = Promise::retry(
            Arc::clone(&scheduler),
            DefaultRetryHandler::with_backoff(Duration::from_millis(100), 2.0, 4),
            failing(&attempts),
        );
        p.start();

        scheduler.advance(Duration::from_secs(10));

        assert_eq!(
            scheduler.requested_delays(),
            vec![
                Duration::from_millis(100),
                Duration::from_millis(200),
                Duration::from_millis(400),
                Duration::from_millis(800),
            ]
        );
        assert_eq!(attempts.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn success_on_first_attempt_is_delivered() {
        let scheduler = Arc::new(ManualScheduler::new());
        let p = Promise::retry(
            Arc::clone(&scheduler),
            DefaultRetryHandler::with_delay(Duration::from_secs(1), 3),
            || Promise::<u32, String>::of_success(9),
        );

        assert_eq!(*record(&p).lock().unwrap(), vec![Outcome::Success(9)]);
        assert!(scheduler.requested_delays().is_empty());
    }

    #[test]
    fn eventually_succeeds_after_failures() {
        let scheduler = Arc::new(ManualScheduler::new());
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&attempts);
        let p = Promise::retry(
            Arc::clone(&scheduler),
            DefaultRetryHandler::with_delay(Duration::from_millis(50), 5),
            move || {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Promise::of_error("not yet".to_string())
                } else {
                    Promise::of_success(7)
                }
            },
        );
        let seen = record(&p);

        scheduler.advance(Duration::from_millis(100));

        assert_eq!(*seen.lock().unwrap(), vec![Outcome::Success(7)]);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn cancel_during_delay_stops_further_attempts() {
        let scheduler = Arc::new(ManualScheduler::new());
        let attempts = Arc::new(AtomicU32::new(0));
        let p = Promise::retry(
            Arc::clone(&scheduler),
            DefaultRetryHandler::with_delay(Duration::from_secs(1), 10),
            failing(&attempts),
        );
        let seen = record(&p);

        scheduler.advance(Duration::from_secs(2));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        assert_eq!(scheduler.pending_timers(), 1);

        p.cancel();
        scheduler.advance(Duration::from_secs(60));

        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        assert_eq!(scheduler.pending_timers(), 0);
        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(p.status(), PromiseStatus::Cancelled);
    }

    #[test]
    fn cancel_during_attempt_cancels_the_attempt() {
        let scheduler = Arc::new(ManualScheduler::new());
        let live: Arc<Mutex<Vec<Promise<u32, String>>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&live);
        let p = Promise::retry(
            Arc::clone(&scheduler),
            DefaultRetryHandler::with_delay(Duration::from_secs(1), 10),
            move || {
                let attempt = Promise::<u32, String>::never();
                sink.lock().unwrap().push(attempt.clone());
                attempt
            },
        );
        p.start();

        p.cancel();

        let live = live.lock().unwrap();
        assert_eq!(live.len(), 1);
        assert!(live[0].is_cancelled());
    }

    #[test]
    fn immediate_policy_skips_the_scheduler() {
        let attempts = Arc::new(AtomicU32::new(0));
        let handler = |n: u32, o: &Outcome<u32, String>| {
            if o.is_error() && n < 2 {
                RetryPolicy::Immediately
            } else {
                RetryPolicy::Cancel
            }
        };
        let scheduler = Arc::new(ManualScheduler::new());
        let p = Promise::retry(Arc::clone(&scheduler), handler, failing(&attempts));

        assert_eq!(*record(&p).lock().unwrap(), vec![Outcome::Error("failure 2".to_string())]);
        assert!(scheduler.requested_delays().is_empty());
    }

    #[test]
    fn long_run_of_immediate_retries_does_not_grow_the_stack() {
        let scheduler = Arc::new(ManualScheduler::new());
        let attempts = Arc::new(AtomicU32::new(0));
        let p = Promise::retry(
            Arc::clone(&scheduler),
            DefaultRetryHandler::with_delay(Duration::ZERO, 20_000),
            failing(&attempts),
        );

        assert_eq!(*record(&p).lock().unwrap(), vec![Outcome::Error("failure 20000".to_string())]);
        assert_eq!(attempts.load(Ordering::SeqCst), 20_001);
        assert!(scheduler.requested_delays().is_empty());
    }

    #[test]
    fn immediate_retries_resume_after_an_async_attempt() {
        let scheduler = Arc::new(ManualScheduler::new());
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&attempts);
        let runner = Arc::clone(&scheduler);
        let p = Promise::retry(
            Arc::clone(&scheduler),
            DefaultRetryHandler::with_delay(Duration::ZERO, 5_000),
            move || {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                let attempt = Promise::<u32, String>::of_error(format!("failure {n}"));
                // One attempt in the middle completes on the executor.
                if n == 10 {
                    attempt.complete_on(Arc::clone(&runner))
                } else {
                    attempt
                }
            },
        );
        let seen = record(&p);
        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(attempts.load(Ordering::SeqCst), 11);

        scheduler.run_ready();

        assert_eq!(*seen.lock().unwrap(), vec![Outcome::Error("failure 5000".to_string())]);
        assert_eq!(attempts.load(Ordering::SeqCst), 5_001);
    }

    #[test]
    fn attempts_are_sequential_with_async_tasks() {
        let executor = Arc::new(InlineExecutor);
        let scheduler = Arc::new(ManualScheduler::new());
        let in_flight = Arc::new(AtomicU32::new(0));
        let overlap = Arc::new(AtomicU32::new(0));
        let (flight, max_seen) = (Arc::clone(&in_flight), Arc::clone(&overlap));
        let p = Promise::retry(
            Arc::clone(&scheduler),
            DefaultRetryHandler::with_delay(Duration::from_millis(10), 3),
            move || {
                let (flight, max_seen) = (Arc::clone(&flight), Arc::clone(&max_seen));
                Promise::<u32, String>::new(move |sub| {
                    let now = flight.fetch_add(1, Ordering::SeqCst) + 1;
                    max_seen.fetch_max(now, Ordering::SeqCst);
                    flight.fetch_sub(1, Ordering::SeqCst);
                    sub.reject("again".into());
                })
                .start_on(Arc::clone(&executor))
            },
        );
        let seen = record(&p);

        scheduler.advance(Duration::from_secs(1));

        assert_eq!(overlap.load(Ordering::SeqCst), 1);
        assert_eq!(*seen.lock().unwrap(), vec![Outcome::Error("again".to_string())]);
    }
}
