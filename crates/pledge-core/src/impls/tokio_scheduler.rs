//! TokioScheduler - tokio ランタイム上の Executor + Scheduler
//!
//! # 実装詳細
//! - execute: `Handle::spawn` で作業単位をタスクとして投入
//! - schedule: `tokio::time::sleep` の後に実行するタスクを spawn し、
//!   キャンセルは `AbortHandle::abort` で行う
//!
//! 作業単位はブロックしない前提（callback 駆動）なので `spawn_blocking` は使いません。

use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::AbortHandle;

use crate::ports::{Executor, Scheduler, TimerHandle, Work};

/// Executor and timer backed by a tokio runtime.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    handle: Handle,
}

impl TokioScheduler {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Use the runtime of the calling context.
    ///
    /// # Panics
    /// When called outside of a tokio runtime.
    pub fn current() -> Self {
        Self::new(Handle::current())
    }
}

impl Executor for TokioScheduler {
    fn execute(&self, work: Work) {
        self.handle.spawn(async move { work() });
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, work: Work) -> Box<dyn TimerHandle> {
        let task = self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            work();
        });
        Box::new(TokioTimer(task.abort_handle()))
    }
}

struct TokioTimer(AbortHandle);

impl TimerHandle for TokioTimer {
    fn cancel(&self) {
        self.0.abort();
    }
}
