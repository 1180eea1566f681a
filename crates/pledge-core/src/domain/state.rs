//! State - promise の状態
//!
//! 内部の状態（task 本体や callback を保持するもの）は `promise::core` にあり、
//! ここには外から観測するための軽量なスナップショットだけを置きます。

use serde::{Deserialize, Serialize};

/// PromiseStatus は promise の状態を表現
///
/// # 状態遷移
/// - Idle -> InProgress -> Complete
/// - Idle / InProgress -> Cancelled
///
/// Complete と Cancelled は終端状態で、以降は遷移しない。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromiseStatus {
    /// 未開始（最初の subscribe を待っている）
    Idle,
    /// task 実行中
    InProgress,
    /// 結果が確定済み
    Complete,
    /// キャンセル済み（結果は配送されない）
    Cancelled,
}

impl PromiseStatus {
    /// Is this a terminal state (no further transitions)?
    pub fn is_terminal(self) -> bool {
        matches!(self, PromiseStatus::Complete | PromiseStatus::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::idle(PromiseStatus::Idle, false)]
    #[case::in_progress(PromiseStatus::InProgress, false)]
    #[case::complete(PromiseStatus::Complete, true)]
    #[case::cancelled(PromiseStatus::Cancelled, true)]
    fn terminal_states(#[case] status: PromiseStatus, #[case] terminal: bool) {
        assert_eq!(status.is_terminal(), terminal);
    }

    #[test]
    fn serializes_snake_case() {
        let s = serde_json::to_string(&PromiseStatus::InProgress).unwrap();
        assert_eq!(s, "\"in_progress\"");
    }
}
