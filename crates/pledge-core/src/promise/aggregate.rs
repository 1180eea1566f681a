//! Aggregation: wait for all children, or race them.
//!
//! Children are subscribed together when the aggregate starts. The first
//! terminal event (the last success for `all`, any error for `all`, anything
//! for `any`) settles the aggregate and cancels the remaining children.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use super::{Payload, Promise, Subscriber};
use crate::domain::Outcome;

type Assemble<R> = Box<dyn Fn() -> Option<R> + Send + Sync>;
type CancelParts = Arc<dyn Fn() + Send + Sync>;

/// Shared bookkeeping of one `all`-style aggregate.
struct Join<R, E> {
    remaining: AtomicUsize,
    settled: AtomicBool,
    sub: Subscriber<R, E>,
    cancel_parts: CancelParts,
    assemble: Assemble<R>,
}

impl<R: Payload, E: Payload> Join<R, E> {
    fn start(
        parts: usize,
        sub: Subscriber<R, E>,
        cancel_parts: CancelParts,
        assemble: Assemble<R>,
    ) -> Arc<Self> {
        let on_cancel = Arc::clone(&cancel_parts);
        sub.on_cancel(move || on_cancel());
        Arc::new(Self {
            remaining: AtomicUsize::new(parts),
            settled: AtomicBool::new(false),
            sub,
            cancel_parts,
            assemble,
        })
    }

    fn settle(&self) -> bool {
        !self.settled.swap(true, Ordering::AcqRel)
    }

    fn arrived(&self) {
        if self.remaining.fetch_sub(1, Ordering::AcqRel) == 1
            && self.settle()
            && let Some(values) = (self.assemble)()
        {
            self.sub.resolve(values);
        }
    }

    fn failed(&self, error: E) {
        if self.settle() {
            (self.cancel_parts)();
            self.sub.reject(error);
        }
    }
}

/// Subscribe one part, storing its value in `slot`.
fn join_part<X: Payload, R: Payload, E: Payload>(
    join: &Arc<Join<R, E>>,
    part: &Promise<X, E>,
    slot: Arc<OnceLock<X>>,
) {
    let join = Arc::clone(join);
    part.when_complete(move |outcome| match outcome {
        Outcome::Success(value) => {
            let _ = slot.set(value);
            join.arrived();
        }
        Outcome::Error(error) => join.failed(error),
    });
}

fn cancel_all<T: Payload, E: Payload>(promises: &[Promise<T, E>]) {
    for promise in promises {
        promise.cancel();
    }
}

/// Resolve with every child's value in input order, or with the first error.
///
/// An empty input resolves to an empty vector.
pub fn all<T, E, I>(promises: I) -> Promise<Vec<T>, E>
where
    T: Payload,
    E: Payload,
    I: IntoIterator<Item = Promise<T, E>>,
{
    let children: Arc<[Promise<T, E>]> = promises.into_iter().collect();
    Promise::new(move |sub| {
        if children.is_empty() {
            sub.resolve(Vec::new());
            return;
        }

        let slots: Vec<Arc<OnceLock<T>>> =
            children.iter().map(|_| Arc::new(OnceLock::new())).collect();
        let cancel_parts: CancelParts = {
            let children = Arc::clone(&children);
            Arc::new(move || cancel_all(&children))
        };
        let assemble: Assemble<Vec<T>> = {
            let slots = slots.clone();
            Box::new(move || slots.iter().map(|slot| slot.get().cloned()).collect())
        };

        let join = Join::start(children.len(), sub, cancel_parts, assemble);
        for (child, slot) in children.iter().zip(slots) {
            join_part(&join, child, slot);
        }
    })
}

/// Resolve with whichever child completes first, success or error.
///
/// An empty input never completes.
pub fn any<T, E, I>(promises: I) -> Promise<T, E>
where
    T: Payload,
    E: Payload,
    I: IntoIterator<Item = Promise<T, E>>,
{
    let children: Arc<[Promise<T, E>]> = promises.into_iter().collect();
    Promise::new(move |sub| {
        if children.is_empty() {
            tracing::debug!(promise = %sub.id(), "any() over no promises never completes");
            return;
        }

        {
            let children = Arc::clone(&children);
            sub.on_cancel(move || cancel_all(&children));
        }
        let settled = Arc::new(AtomicBool::new(false));
        for child in children.iter() {
            let (sub, settled, siblings) =
                (sub.clone(), Arc::clone(&settled), Arc::clone(&children));
            child.when_complete(move |outcome| {
                if !settled.swap(true, Ordering::AcqRel) {
                    cancel_all(&siblings);
                    sub.complete(outcome);
                }
            });
        }
    })
}

/// `all` over two differently typed promises.
pub fn all2<A, B, E>(a: Promise<A, E>, b: Promise<B, E>) -> Promise<(A, B), E>
where
    A: Payload,
    B: Payload,
    E: Payload,
{
    Promise::new(move |sub| {
        let (sa, sb) = (Arc::new(OnceLock::<A>::new()), Arc::new(OnceLock::<B>::new()));
        let cancel_parts: CancelParts = {
            let (a, b) = (a.clone(), b.clone());
            Arc::new(move || {
                a.cancel();
                b.cancel();
            })
        };
        let assemble: Assemble<(A, B)> = {
            let (sa, sb) = (Arc::clone(&sa), Arc::clone(&sb));
            Box::new(move || Some((sa.get()?.clone(), sb.get()?.clone())))
        };

        let join = Join::start(2, sub, cancel_parts, assemble);
        join_part(&join, &a, sa);
        join_part(&join, &b, sb);
    })
}

/// `all` over three differently typed promises.
pub fn all3<A, B, C, E>(
    a: Promise<A, E>,
    b: Promise<B, E>,
    c: Promise<C, E>,
) -> Promise<(A, B, C), E>
where
    A: Payload,
    B: Payload,
    C: Payload,
    E: Payload,
{
    Promise::new(move |sub| {
        let (sa, sb, sc) = (
            Arc::new(OnceLock::<A>::new()),
            Arc::new(OnceLock::<B>::new()),
            Arc::new(OnceLock::<C>::new()),
        );
        let cancel_parts: CancelParts = {
            let (a, b, c) = (a.clone(), b.clone(), c.clone());
            Arc::new(move || {
                a.cancel();
                b.cancel();
                c.cancel();
            })
        };
        let assemble: Assemble<(A, B, C)> = {
            let (sa, sb, sc) = (Arc::clone(&sa), Arc::clone(&sb), Arc::clone(&sc));
            Box::new(move || Some((sa.get()?.clone(), sb.get()?.clone(), sc.get()?.clone())))
        };

        let join = Join::start(3, sub, cancel_parts, assemble);
        join_part(&join, &a, sa);
        join_part(&join, &b, sb);
        join_part(&join, &c, sc);
    })
}

/// `all` over four differently typed promises.
pub fn all4<A, B, C, D, E>(
    a: Promise<A, E>,
    b: Promise<B, E>,
    c: Promise<C, E>,
    d: Promise<D, E>,
) -> Promise<(A, B, C, D), E>
where
    A: Payload,
    B: Payload,
    C: Payload,
    D: Payload,
    E: Payload,
{
    Promise::new(move |sub| {
        let (sa, sb, sc, sd) = (
            Arc::new(OnceLock::<A>::new()),
            Arc::new(OnceLock::<B>::new()),
            Arc::new(OnceLock::<C>::new()),
            Arc::new(OnceLock::<D>::new()),
        );
        let cancel_parts: CancelParts = {
            let (a, b, c, d) = (a.clone(), b.clone(), c.clone(), d.clone());
            Arc::new(move || {
                a.cancel();
                b.cancel();
                c.cancel();
                d.cancel();
            })
        };
        let assemble: Assemble<(A, B, C, D)> = {
            let (sa, sb, sc, sd) = (
                Arc::clone(&sa),
                Arc::clone(&sb),
                Arc::clone(&sc),
                Arc::clone(&sd),
            );
            Box::new(move || {
                Some((
                    sa.get()?.clone(),
                    sb.get()?.clone(),
                    sc.get()?.clone(),
                    sd.get()?.clone(),
                ))
            })
        };

        let join = Join::start(4, sub, cancel_parts, assemble);
        join_part(&join, &a, sa);
        join_part(&join, &b, sb);
        join_part(&join, &c, sc);
        join_part(&join, &d, sd);
    })
}

impl<T: Payload, E: Payload> Promise<T, E> {
    /// Pair this promise with another; see [`all2`].
    pub fn zip<U: Payload>(&self, other: &Promise<U, E>) -> Promise<(T, U), E> {
        all2(self.clone(), other.clone())
    }
}
