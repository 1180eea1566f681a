//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **InlineExecutor**: 呼び出したスレッドでそのまま実行する
//! - **TokioScheduler**: tokio ランタイム上で実行・遅延実行する（本番用）
//! - **ManualScheduler**: 仮想時間で動く Executor + Scheduler（テスト・シミュレーション用）

pub mod inline;
pub mod manual;
pub mod tokio_scheduler;

// 主要な型を再エクスポート
pub use self::inline::InlineExecutor;
pub use self::manual::ManualScheduler;
pub use self::tokio_scheduler::TokioScheduler;
