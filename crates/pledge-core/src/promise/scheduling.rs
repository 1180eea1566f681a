//! Scheduling adapters: move the start or the delivery of a promise onto an
//! executor, optionally after a timer.

use std::sync::Arc;
use std::time::Duration;

use super::delay::Delay;
use super::{Payload, Promise, any};
use crate::ports::{Executor, Scheduler};

impl<T: Payload, E: Payload> Promise<T, E> {
    /// Start this promise's task from work submitted to `executor`.
    ///
    /// If the returned promise is cancelled before the work runs, the work
    /// does nothing and this promise is cancelled before it ever starts.
    pub fn start_on<X>(&self, executor: Arc<X>) -> Promise<T, E>
    where
        X: Executor + ?Sized + 'static,
    {
        let upstream = self.clone();
        Promise::new(move |sub| {
            {
                let upstream = upstream.clone();
                sub.on_cancel(move || upstream.cancel());
            }
            executor.execute(Box::new(move || {
                if sub.is_cancelled() {
                    return;
                }
                upstream.forward_to(sub);
            }));
        })
    }

    /// Deliver this promise's outcome through work submitted to `executor`
    /// instead of inline. Cancelling while the delivery is queued drops it.
    pub fn complete_on<X>(&self, executor: Arc<X>) -> Promise<T, E>
    where
        X: Executor + ?Sized + 'static,
    {
        let upstream = self.clone();
        Promise::new(move |sub| {
            {
                let upstream = upstream.clone();
                sub.on_cancel(move || upstream.cancel());
            }
            upstream.when_complete(move |outcome| {
                executor.execute(Box::new(move || {
                    if !sub.is_cancelled() {
                        sub.complete(outcome);
                    }
                }));
            });
        })
    }

    /// Start this promise only after `delay` has elapsed on `scheduler`.
    ///
    /// A zero delay is the same as [`Promise::start_on`]. Cancelling during
    /// the wait cancels the timer and the task never starts.
    pub fn delay_start<S>(&self, delay: Duration, scheduler: Arc<S>) -> Promise<T, E>
    where
        S: Scheduler + ?Sized + 'static,
    {
        if delay.is_zero() {
            return self.start_on(scheduler);
        }
        let upstream = self.clone();
        Promise::new(move |sub| {
            let target = sub.clone();
            Delay::arm(&sub, &*scheduler, delay, move || upstream.forward_to(target));
        })
    }

    /// Deliver this promise's outcome only after `delay` has elapsed,
    /// counted from the moment the outcome is available.
    ///
    /// A zero delay is the same as [`Promise::complete_on`]. Cancelling
    /// during the wait cancels the timer and drops the outcome.
    pub fn delay_complete<S>(&self, delay: Duration, scheduler: Arc<S>) -> Promise<T, E>
    where
        S: Scheduler + ?Sized + 'static,
    {
        if delay.is_zero() {
            return self.complete_on(scheduler);
        }
        let upstream = self.clone();
        Promise::new(move |sub| {
            {
                let upstream = upstream.clone();
                sub.on_cancel(move || upstream.cancel());
            }
            upstream.when_complete(move |outcome| {
                let target = sub.clone();
                Delay::arm(&sub, &*scheduler, delay, move || target.complete(outcome));
            });
        })
    }

    /// Race this promise against a timer that fails with `on_timeout()`.
    ///
    /// Whichever side loses is cancelled.
    pub fn timeout<S, M>(&self, after: Duration, scheduler: Arc<S>, on_timeout: M) -> Promise<T, E>
    where
        S: Scheduler + ?Sized + 'static,
        M: FnOnce() -> E + Send + 'static,
    {
        let timer = Promise::new(move |sub| sub.reject(on_timeout())).delay_start(after, scheduler);
        any([self.clone(), timer])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Outcome, PromiseStatus};
    use crate::impls::ManualScheduler;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting(runs: &Arc<AtomicUsize>) -> Promise<u32, String> {
        let runs = Arc::clone(runs);
        Promise::new(move |sub| {
            runs.fetch_add(1, Ordering::SeqCst);
            sub.resolve(1);
        })
    }

    fn record<T: Payload, E: Payload>(p: &Promise<T, E>) -> Arc<Mutex<Vec<Outcome<T, E>>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        p.when_complete(move |o| sink.lock().unwrap().push(o));
        seen
    }

    #[test]
    fn start_on_defers_task_to_executor() {
        let scheduler = Arc::new(ManualScheduler::new());
        let runs = Arc::new(AtomicUsize::new(0));
        let p = counting(&runs).start_on(Arc::clone(&scheduler));
        let seen = record(&p);

        assert_eq!(runs.load(Ordering::SeqCst), 0);
        scheduler.run_ready();

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(*seen.lock().unwrap(), vec![Outcome::Success(1)]);
    }

    #[test]
    fn start_on_cancelled_before_work_runs_never_starts() {
        let scheduler = Arc::new(ManualScheduler::new());
        let runs = Arc::new(AtomicUsize::new(0));
        let inner = counting(&runs);
        let p = inner.start_on(Arc::clone(&scheduler));
        let seen = record(&p);

        p.cancel();
        scheduler.run_ready();

        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert!(inner.is_cancelled());
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn complete_on_redispatches_delivery() {
        let scheduler = Arc::new(ManualScheduler::new());
        let p = Promise::<u32, String>::of_success(3).complete_on(Arc::clone(&scheduler));
        let seen = record(&p);

        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(scheduler.run_ready(), 1);
        assert_eq!(*seen.lock().unwrap(), vec![Outcome::Success(3)]);
    }

    #[test]
    fn complete_on_cancel_while_pending_suppresses_delivery() {
        let scheduler = Arc::new(ManualScheduler::new());
        let p = Promise::<u32, String>::of_success(3).complete_on(Arc::clone(&scheduler));
        let seen = record(&p);

        p.cancel();
        scheduler.run_ready();

        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(p.status(), PromiseStatus::Cancelled);
    }

    #[test]
    fn delay_start_waits_for_requested_delay() {
        let scheduler = Arc::new(ManualScheduler::new());
        let runs = Arc::new(AtomicUsize::new(0));
        let p = counting(&runs).delay_start(Duration::from_millis(500), Arc::clone(&scheduler));
        let seen = record(&p);

        assert_eq!(scheduler.requested_delays(), vec![Duration::from_millis(500)]);
        scheduler.advance(Duration::from_millis(499));
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        scheduler.advance(Duration::from_millis(1));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(*seen.lock().unwrap(), vec![Outcome::Success(1)]);
    }

    #[test]
    fn delay_start_zero_behaves_like_start_on() {
        let scheduler = Arc::new(ManualScheduler::new());
        let runs = Arc::new(AtomicUsize::new(0));
        let p = counting(&runs).delay_start(Duration::ZERO, Arc::clone(&scheduler));
        p.start();

        assert!(scheduler.requested_delays().is_empty());
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        scheduler.run_ready();
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn delay_start_cancel_during_wait_cancels_timer() {
        let scheduler = Arc::new(ManualScheduler::new());
        let runs = Arc::new(AtomicUsize::new(0));
        let p = counting(&runs).delay_start(Duration::from_secs(1), Arc::clone(&scheduler));
        p.start();
        assert_eq!(scheduler.pending_timers(), 1);

        p.cancel();

        assert_eq!(scheduler.pending_timers(), 0);
        scheduler.advance(Duration::from_secs(5));
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn delay_complete_holds_the_outcome() {
        let scheduler = Arc::new(ManualScheduler::new());
        let p = Promise::<u32, String>::of_error("late".into())
            .delay_complete(Duration::from_millis(200), Arc::clone(&scheduler));
        let seen = record(&p);

        assert_eq!(scheduler.requested_delays(), vec![Duration::from_millis(200)]);
        assert!(seen.lock().unwrap().is_empty());
        scheduler.advance(Duration::from_millis(200));
        assert_eq!(*seen.lock().unwrap(), vec![Outcome::Error("late".to_string())]);
    }

    #[test]
    fn delay_complete_cancel_during_wait_drops_outcome() {
        let scheduler = Arc::new(ManualScheduler::new());
        let p = Promise::<u32, String>::of_success(1)
            .delay_complete(Duration::from_millis(200), Arc::clone(&scheduler));
        let seen = record(&p);

        p.cancel();
        scheduler.advance(Duration::from_secs(1));

        assert_eq!(scheduler.pending_timers(), 0);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn timeout_fires_when_work_is_too_slow() {
        let scheduler = Arc::new(ManualScheduler::new());
        let slow = Promise::<u32, String>::never();
        let p = slow.timeout(Duration::from_secs(2), Arc::clone(&scheduler), || "timed out".into());
        let seen = record(&p);

        scheduler.advance(Duration::from_secs(2));

        assert_eq!(*seen.lock().unwrap(), vec![Outcome::Error("timed out".to_string())]);
        assert!(slow.is_cancelled());
    }

    #[test]
    fn timeout_is_cancelled_when_work_wins() {
        let scheduler = Arc::new(ManualScheduler::new());
        let p = Promise::<u32, String>::of_success(8)
            .timeout(Duration::from_secs(2), Arc::clone(&scheduler), || "timed out".into());
        let seen = record(&p);

        assert_eq!(*seen.lock().unwrap(), vec![Outcome::Success(8)]);
        assert_eq!(scheduler.pending_timers(), 0);
    }
}
