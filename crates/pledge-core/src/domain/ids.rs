//! Domain identifiers.
//!
//! # PromiseId
//! プロセス内で一意な連番 ID です。
//! ログ（tracing のフィールド）と `Debug` 出力で promise を区別するために使います。
//!
//! ## 特性
//! - **単調増加**: 生成順に大きくなる
//! - **ロック不要**: `AtomicU64::fetch_add` のみで採番する
//! - **永続化しない**: promise はメモリ上にしか存在しないので、プロセスを跨いだ一意性は不要

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_PROMISE_ID: AtomicU64 = AtomicU64::new(1);

/// PromiseId は promise ごとに割り当てられる ID
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PromiseId(u64);

impl PromiseId {
    /// 次の ID を採番
    pub(crate) fn next() -> Self {
        Self(NEXT_PROMISE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// テスト用: 任意の値から作成
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for PromiseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "promise-{}", self.0)
    }
}
