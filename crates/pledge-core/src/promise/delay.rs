//! Cancelable timer wait used by the delay adapters and by retry.
//!
//! Phases: Waiting -> Fired, or Waiting -> Cancelled. Only one of the two
//! transitions ever succeeds, so the delayed action and the timer
//! cancellation never both happen.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use super::{Payload, Subscriber};
use crate::ports::{Scheduler, TimerHandle};

const WAITING: u8 = 0;
const FIRED: u8 = 1;
const CANCELLED: u8 = 2;

pub(crate) struct Delay {
    phase: AtomicU8,
    timer: OnceLock<Box<dyn TimerHandle>>,
}

impl Delay {
    /// Run `fire` after `delay` unless `sub` is cancelled first.
    ///
    /// The cancel hook is installed before the timer is scheduled, so a timer
    /// that fires immediately can still replace it with its own hook.
    pub(crate) fn arm<T, E, S, A>(sub: &Subscriber<T, E>, scheduler: &S, delay: Duration, fire: A)
    where
        T: Payload,
        E: Payload,
        S: Scheduler + ?Sized,
        A: FnOnce() + Send + 'static,
    {
        let this = Arc::new(Delay {
            phase: AtomicU8::new(WAITING),
            timer: OnceLock::new(),
        });

        {
            let this = Arc::clone(&this);
            sub.on_cancel(move || this.cancel());
        }

        let handle = {
            let this = Arc::clone(&this);
            scheduler.schedule(
                delay,
                Box::new(move || {
                    if this.transition(FIRED) {
                        fire();
                    }
                }),
            )
        };
        let _ = this.timer.set(handle);

        // A cancel that landed before the handle was stored had nothing to cancel.
        if this.phase.load(Ordering::Acquire) == CANCELLED {
            this.cancel_timer();
        }
    }

    fn transition(&self, to: u8) -> bool {
        self.phase
            .compare_exchange(WAITING, to, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn cancel(&self) {
        if self.transition(CANCELLED) {
            tracing::trace!("delay cancelled while waiting");
            self.cancel_timer();
        }
    }

    fn cancel_timer(&self) {
        if let Some(timer) = self.timer.get() {
            timer.cancel();
        }
    }
}
