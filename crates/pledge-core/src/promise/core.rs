//! The promise state machine.
//!
//! One `ArcSwap` slot holds an immutable `State`. Every transition reads the
//! current state, builds the next one and publishes it with compare-and-swap,
//! retrying from the read when another thread got there first.
//!
//! Values that must be consumed exactly once (the task body, callbacks, the
//! cancel hook) sit in a `OnceSlot` shared by the states that reference them.
//! Only the thread whose CAS moved the machine out of a state takes them.

use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};
use std::ptr;
use std::sync::Arc;
use std::sync::atomic::{AtomicPtr, Ordering};

use arc_swap::ArcSwap;

use super::Subscriber;
use crate::domain::{Outcome, PromiseId, PromiseStatus};

pub(crate) type Task<T, E> = Box<dyn FnOnce(Subscriber<T, E>) + Send + 'static>;
pub(crate) type Callback<T, E> = Box<dyn FnOnce(Outcome<T, E>) + Send + 'static>;
pub(crate) type CancelHook = Box<dyn FnOnce() + Send + 'static>;

/// A value that can be taken out through a shared reference, at most once.
pub(crate) struct OnceSlot<V> {
    ptr: AtomicPtr<V>,
    _owns: PhantomData<Box<V>>,
}

impl<V> OnceSlot<V> {
    pub(crate) fn new(value: V) -> Self {
        Self {
            ptr: AtomicPtr::new(Box::into_raw(Box::new(value))),
            _owns: PhantomData,
        }
    }

    pub(crate) fn take(&self) -> Option<V> {
        let raw = self.ptr.swap(ptr::null_mut(), Ordering::AcqRel);
        if raw.is_null() {
            return None;
        }
        // SAFETY: `raw` came from `Box::into_raw` in `new`, and the swap above
        // left null behind, so no other caller can observe this pointer again.
        Some(*unsafe { Box::from_raw(raw) })
    }
}

impl<V> Drop for OnceSlot<V> {
    fn drop(&mut self) {
        let raw = *self.ptr.get_mut();
        if !raw.is_null() {
            // SAFETY: never taken, so we still own the allocation.
            drop(unsafe { Box::from_raw(raw) });
        }
    }
}

// SAFETY: `take` moves the value to whichever thread calls it, which is sound
// whenever `V` itself may be sent across threads. The value is never shared.
unsafe impl<V: Send> Sync for OnceSlot<V> {}

struct CallbackNode<T, E> {
    callback: Arc<OnceSlot<Callback<T, E>>>,
    next: CallbackList<T, E>,
}

/// Persistent stack of callbacks. Pushing shares the tail with the old state.
pub(crate) struct CallbackList<T, E>(Option<Arc<CallbackNode<T, E>>>);

impl<T, E> Clone for CallbackList<T, E> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T, E> CallbackList<T, E> {
    fn empty() -> Self {
        Self(None)
    }

    fn push(&self, callback: Arc<OnceSlot<Callback<T, E>>>) -> Self {
        Self(Some(Arc::new(CallbackNode {
            callback,
            next: self.clone(),
        })))
    }

    /// Callbacks in registration order.
    fn in_order(&self) -> Vec<Arc<OnceSlot<Callback<T, E>>>> {
        let mut out = Vec::new();
        let mut cursor = self.0.as_ref();
        while let Some(node) = cursor {
            out.push(Arc::clone(&node.callback));
            cursor = node.next.0.as_ref();
        }
        out.reverse();
        out
    }
}

pub(crate) enum State<T, E> {
    Idle {
        task: Arc<OnceSlot<Task<T, E>>>,
    },
    InProgress {
        callbacks: CallbackList<T, E>,
        cancel_hook: Option<Arc<OnceSlot<CancelHook>>>,
    },
    Complete(Outcome<T, E>),
    Cancelled,
}

impl<T, E> State<T, E> {
    fn status(&self) -> PromiseStatus {
        match self {
            State::Idle { .. } => PromiseStatus::Idle,
            State::InProgress { .. } => PromiseStatus::InProgress,
            State::Complete(_) => PromiseStatus::Complete,
            State::Cancelled => PromiseStatus::Cancelled,
        }
    }
}

/// What happened to a completion attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Completion {
    Delivered,
    AlreadyComplete,
    Cancelled,
}

pub(crate) struct PromiseCore<T, E> {
    id: PromiseId,
    state: ArcSwap<State<T, E>>,
}

impl<T, E> PromiseCore<T, E> {
    pub(crate) fn id(&self) -> PromiseId {
        self.id
    }
}

impl<T, E> PromiseCore<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub(crate) fn idle(task: Task<T, E>) -> Self {
        Self::with_state(State::Idle {
            task: Arc::new(OnceSlot::new(task)),
        })
    }

    pub(crate) fn complete(outcome: Outcome<T, E>) -> Self {
        Self::with_state(State::Complete(outcome))
    }

    fn with_state(state: State<T, E>) -> Self {
        Self {
            id: PromiseId::next(),
            state: ArcSwap::from_pointee(state),
        }
    }

    pub(crate) fn status(&self) -> PromiseStatus {
        self.state.load().status()
    }

    pub(crate) fn peek(&self) -> Option<Outcome<T, E>> {
        match &**self.state.load() {
            State::Complete(outcome) => Some(outcome.clone()),
            _ => None,
        }
    }

    fn publish(&self, current: &Arc<State<T, E>>, next: Arc<State<T, E>>) -> bool {
        let previous = self.state.compare_and_swap(current, next);
        Arc::ptr_eq(&*previous, current)
    }

    /// Register a callback, starting the task if this is the first one.
    pub(crate) fn subscribe(self: &Arc<Self>, callback: Callback<T, E>) {
        let callback = Arc::new(OnceSlot::new(callback));
        loop {
            let current = self.state.load_full();
            let (next, task) = match &*current {
                State::Idle { task } => (
                    State::InProgress {
                        callbacks: CallbackList::empty().push(Arc::clone(&callback)),
                        cancel_hook: None,
                    },
                    Some(Arc::clone(task)),
                ),
                State::InProgress {
                    callbacks,
                    cancel_hook,
                } => (
                    State::InProgress {
                        callbacks: callbacks.push(Arc::clone(&callback)),
                        cancel_hook: cancel_hook.clone(),
                    },
                    None,
                ),
                State::Complete(outcome) => {
                    if let Some(callback) = callback.take() {
                        callback(outcome.clone());
                    }
                    return;
                }
                State::Cancelled => return,
            };

            if self.publish(&current, Arc::new(next)) {
                if let Some(task) = task.and_then(|slot| slot.take()) {
                    tracing::trace!(promise = %self.id, "task started");
                    task(Subscriber::new(Arc::clone(self)));
                }
                return;
            }
        }
    }

    /// Move from InProgress to Complete and deliver to every waiting callback.
    pub(crate) fn complete_with(&self, outcome: Outcome<T, E>) -> Completion {
        let complete = Arc::new(State::Complete(outcome));
        loop {
            let current = self.state.load_full();
            match &*current {
                State::InProgress { callbacks, .. } => {
                    if !self.publish(&current, Arc::clone(&complete)) {
                        continue;
                    }
                    tracing::trace!(promise = %self.id, "completed");
                    if let State::Complete(outcome) = &*complete {
                        deliver(callbacks, outcome);
                    }
                    return Completion::Delivered;
                }
                State::Complete(_) => return Completion::AlreadyComplete,
                State::Cancelled => return Completion::Cancelled,
                State::Idle { .. } => {
                    unreachable!("a subscriber only exists once the task has started")
                }
            }
        }
    }

    pub(crate) fn cancel(&self) {
        let cancelled = Arc::new(State::Cancelled);
        loop {
            let current = self.state.load_full();
            if matches!(&*current, State::Complete(_) | State::Cancelled) {
                return;
            }
            if !self.publish(&current, Arc::clone(&cancelled)) {
                continue;
            }
            tracing::trace!(promise = %self.id, "cancelled");
            if let State::InProgress {
                cancel_hook: Some(hook),
                ..
            } = &*current
                && let Some(hook) = hook.take()
            {
                tracing::trace!(promise = %self.id, "running cancel hook");
                hook();
            }
            return;
        }
    }

    /// Replace the cancel hook of the running task.
    ///
    /// A hook registered after cancellation runs right away; one registered
    /// after completion is dropped.
    pub(crate) fn set_cancel_hook(&self, hook: CancelHook) {
        let hook = Arc::new(OnceSlot::new(hook));
        loop {
            let current = self.state.load_full();
            match &*current {
                State::InProgress { callbacks, .. } => {
                    let next = State::InProgress {
                        callbacks: callbacks.clone(),
                        cancel_hook: Some(Arc::clone(&hook)),
                    };
                    if self.publish(&current, Arc::new(next)) {
                        return;
                    }
                }
                State::Cancelled => {
                    if let Some(hook) = hook.take() {
                        tracing::trace!(promise = %self.id, "running late cancel hook");
                        hook();
                    }
                    return;
                }
                State::Complete(_) => return,
                State::Idle { .. } => {
                    unreachable!("a subscriber only exists once the task has started")
                }
            }
        }
    }
}

/// Hand `outcome` to every waiting callback.
///
/// A panicking callback does not starve the ones after it: the first panic
/// is resumed once every callback has run.
fn deliver<T: Clone, E: Clone>(callbacks: &CallbackList<T, E>, outcome: &Outcome<T, E>) {
    let mut first_panic = None;
    for slot in callbacks.in_order() {
        if let Some(callback) = slot.take() {
            let outcome = outcome.clone();
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(move || callback(outcome)))
                && first_panic.is_none()
            {
                first_panic = Some(payload);
            }
        }
    }
    if let Some(payload) = first_panic {
        panic::resume_unwind(payload);
    }
}
