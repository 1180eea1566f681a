//! Executor port - 作業単位の実行
//!
//! `start_on` / `complete_on` が task の開始や結果の配送を載せ替える先です。

/// A zero-argument unit of work.
pub type Work = Box<dyn FnOnce() + Send + 'static>;

/// Executor は作業単位を受け取り、非同期に実行する
///
/// # 契約
/// - `execute` は呼び出し元をブロックしない（インライン実行する実装は例外として許容）
/// - 投入順での実行は保証しなくてよい
///
/// # Thread Safety
/// - `Send + Sync` を要求（複数スレッドから投入される）
pub trait Executor: Send + Sync {
    fn execute(&self, work: Work);
}
