//! Bridge from callbacks to `async`/`await` and to blocking callers.
//!
//! Awaiting subscribes like any other callback. If the promise is cancelled
//! the callback is dropped unfired, which closes the channel and surfaces as
//! `PledgeError::Cancelled`. Dropping the future does not cancel the promise.

use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use super::{Payload, Promise};
use crate::domain::Outcome;
use crate::error::PledgeError;

/// Future returned by awaiting a [`Promise`].
#[derive(Debug)]
pub struct PromiseFuture<T, E> {
    rx: oneshot::Receiver<Outcome<T, E>>,
}

impl<T, E> Future for PromiseFuture<T, E> {
    type Output = Result<Outcome<T, E>, PledgeError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.get_mut().rx)
            .poll(cx)
            .map(|received| received.map_err(|_| PledgeError::Cancelled))
    }
}

impl<T: Payload, E: Payload> Promise<T, E> {
    fn subscribe_channel(&self) -> oneshot::Receiver<Outcome<T, E>> {
        let (tx, rx) = oneshot::channel();
        self.when_complete(move |outcome| {
            let _ = tx.send(outcome);
        });
        rx
    }

    /// Block the current thread until the promise completes.
    ///
    /// # Panics
    /// When called from inside an async runtime; `.await` the promise there.
    pub fn wait(&self) -> Result<Outcome<T, E>, PledgeError> {
        self.subscribe_channel()
            .blocking_recv()
            .map_err(|_| PledgeError::Cancelled)
    }
}

impl<T: Payload, E: Payload> IntoFuture for Promise<T, E> {
    type Output = Result<Outcome<T, E>, PledgeError>;
    type IntoFuture = PromiseFuture<T, E>;

    fn into_future(self) -> Self::IntoFuture {
        PromiseFuture {
            rx: self.subscribe_channel(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::TokioScheduler;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn await_yields_outcome() {
        let p = Promise::<u32, String>::of_success(2).map(|v| v + 40);
        assert_eq!(p.await.unwrap(), Outcome::Success(42));
    }

    #[tokio::test]
    async fn await_on_delayed_promise() {
        let scheduler = Arc::new(TokioScheduler::current());
        let p = Promise::<u32, String>::of_error("slow".into())
            .delay_complete(Duration::from_millis(20), scheduler);
        assert_eq!(p.await.unwrap(), Outcome::Error("slow".to_string()));
    }

    #[tokio::test]
    async fn await_on_cancelled_promise_reports_cancelled() {
        let p = Promise::<u32, String>::never();
        let fut = p.clone().into_future();
        p.cancel();
        assert!(matches!(fut.await, Err(PledgeError::Cancelled)));
    }

    #[test]
    fn wait_blocks_until_another_thread_resolves() {
        let p = Promise::<u32, String>::new(|sub| {
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(20));
                sub.resolve(5);
            });
        });
        assert_eq!(p.wait().unwrap(), Outcome::Success(5));
    }
}
