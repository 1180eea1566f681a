//! InlineExecutor - 呼び出し元スレッドで即時実行する Executor

use crate::ports::{Executor, Work};

/// Runs every unit of work immediately on the submitting thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineExecutor;

impl Executor for InlineExecutor {
    fn execute(&self, work: Work) {
        work();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Outcome;
    use crate::promise::Promise;
    use std::sync::{Arc, Mutex};

    #[test]
    fn start_on_inline_runs_synchronously() {
        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);
        Promise::<u32, String>::of_success(1)
            .start_on(Arc::new(InlineExecutor))
            .when_complete(move |o| *sink.lock().unwrap() = Some(o));
        assert_eq!(*seen.lock().unwrap(), Some(Outcome::Success(1)));
    }
}
