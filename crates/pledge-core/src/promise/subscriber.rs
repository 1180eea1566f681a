//! Subscriber - task 本体に渡される capability
//!
//! task は `Subscriber` を通してのみ promise に触れます。
//! - `resolve` / `reject` / `complete`: 結果の報告（ちょうど 1 回）
//! - `on_cancel`: キャンセル時に呼ばれる hook の登録（最後に登録したものが有効）
//!
//! # 学習ポイント
//! - 2 回目の報告は契約違反なので panic する（Result には変換しない）
//! - キャンセル済みの promise への最初の報告は黙って捨てる

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::core::{Completion, PromiseCore};
use crate::domain::{Outcome, PromiseId};

/// Capability handed to a running task.
///
/// Clones share the same "already reported" flag, so a task may hand copies
/// to several callbacks and still report only once overall.
pub struct Subscriber<T, E> {
    core: Arc<PromiseCore<T, E>>,
    reported: Arc<AtomicBool>,
}

impl<T, E> Clone for Subscriber<T, E> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
            reported: Arc::clone(&self.reported),
        }
    }
}

impl<T, E> Subscriber<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(core: Arc<PromiseCore<T, E>>) -> Self {
        Self {
            core,
            reported: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn id(&self) -> PromiseId {
        self.core.id()
    }

    /// Report the success value.
    ///
    /// # Panics
    /// If this task already reported.
    pub fn resolve(&self, value: T) {
        self.complete(Outcome::Success(value));
    }

    /// Report the error.
    ///
    /// # Panics
    /// If this task already reported.
    pub fn reject(&self, error: E) {
        self.complete(Outcome::Error(error));
    }

    /// Report an outcome.
    ///
    /// # Panics
    /// If this task already reported.
    pub fn complete(&self, outcome: Outcome<T, E>) {
        if self.reported.swap(true, Ordering::AcqRel) {
            panic!(
                "{} reported more than once; a task must report exactly once",
                self.core.id()
            );
        }
        match self.core.complete_with(outcome) {
            Completion::Delivered => {}
            Completion::Cancelled => {
                tracing::debug!(promise = %self.core.id(), "dropping result of cancelled promise");
            }
            Completion::AlreadyComplete => panic!(
                "{} reported more than once; a task must report exactly once",
                self.core.id()
            ),
        }
    }

    /// Register the action to run if the promise is cancelled while running.
    ///
    /// Replaces any previously registered hook. If the promise is already
    /// cancelled the hook runs immediately on this thread.
    pub fn on_cancel(&self, hook: impl FnOnce() + Send + 'static) {
        self.core.set_cancel_hook(Box::new(hook));
    }

    pub fn is_cancelled(&self) -> bool {
        self.core.status() == crate::domain::PromiseStatus::Cancelled
    }
}

impl<T, E> fmt::Debug for Subscriber<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriber")
            .field("promise", &self.core.id())
            .field("reported", &self.reported.load(Ordering::Acquire))
            .finish()
    }
}
