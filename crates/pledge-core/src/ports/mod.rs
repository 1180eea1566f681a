//! Ports - 抽象化レイヤー
//!
//! promise のコアはスレッドプールもタイマーも所有しません。
//! 実行基盤への依存はこのモジュールの trait だけを通して行います。
//!
//! # 設計原則
//! - Executor: 引数なしの作業単位を非同期に実行する
//! - Scheduler: 遅延付きで作業単位を実行し、キャンセル可能なハンドルを返す
//! - 実装（tokio / 仮想時間）は `impls` に置く

pub mod executor;
pub mod scheduler;

// 主要な trait を再エクスポート
pub use self::executor::{Executor, Work};
pub use self::scheduler::{Scheduler, TimerHandle};
