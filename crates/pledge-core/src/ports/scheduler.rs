//! Scheduler port - 遅延実行とタイマー
//!
//! `delay_start` / `delay_complete` / retry のバックオフ待ちで使います。
//! テストでは `ManualScheduler` に差し替えて、要求された遅延値を検証できます。

use std::time::Duration;

use super::Executor;

/// Cancelable handle for a scheduled unit of work.
///
/// `cancel` must be idempotent, and a cancel that lands before the timer
/// fires must keep the work from running.
pub trait TimerHandle: Send + Sync {
    fn cancel(&self);
}

/// Scheduler は遅延付きで作業単位を実行する
///
/// `Executor` を継承しているので、遅延ゼロの場合はそのまま `execute` に流せる。
pub trait Scheduler: Executor {
    fn schedule(&self, delay: Duration, work: super::Work) -> Box<dyn TimerHandle>;
}
