//! pledge-core
//!
//! Lock-free, cold, cancelable, memoizing single-result promises.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, outcome, state）
//! - **ports**: 実行基盤の抽象化（Executor, Scheduler, TimerHandle）
//! - **impls**: ports の実装（InlineExecutor, TokioScheduler, ManualScheduler）
//! - **promise**: Promise 本体、コンビネータ、集約、スケジューリング、async ブリッジ
//! - **retry**: リトライ方針とリトライエンジン
//! - **error**: ライブラリ自身のエラー型
//!
//! ```
//! use pledge_core::{Outcome, Promise, all};
//!
//! let total = all([Promise::<u32, String>::of_success(1), Promise::of_success(2)])
//!     .map(|values| values.iter().sum::<u32>());
//! assert_eq!(total.start().peek(), Some(Outcome::Success(3)));
//! ```

pub mod domain;
pub mod error;
pub mod impls;
pub mod ports;
pub mod promise;
pub mod retry;

pub use domain::{Outcome, OutcomeKind, PromiseId, PromiseStatus};
pub use error::PledgeError;
pub use impls::{InlineExecutor, ManualScheduler, TokioScheduler};
pub use ports::{Executor, Scheduler, TimerHandle, Work};
pub use promise::{Payload, Promise, PromiseFuture, Subscriber, all, all2, all3, all4, any};
pub use retry::{DefaultRetryHandler, RetryConfig, RetryHandler, RetryPolicy};
