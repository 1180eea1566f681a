//! Retry - 失敗した attempt を方針に従って再生成する
//!
//! # 構成
//! - **policy**: `RetryPolicy`（次の行動）と `RetryHandler`（判断ロジックの trait）
//! - **handler**: `DefaultRetryHandler`（固定遅延 / 指数バックオフ + 最大回数）と `RetryConfig`
//! - **engine**: `Promise::retry`（attempt を逐次実行し、キャンセルを伝播する）

mod engine;
pub mod handler;
pub mod policy;

pub use self::handler::{DefaultRetryHandler, RetryConfig};
pub use self::policy::{RetryHandler, RetryPolicy};
