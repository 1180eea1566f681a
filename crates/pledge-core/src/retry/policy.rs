//! Retry policy: what to do after an attempt completed.

use std::time::Duration;

use crate::domain::Outcome;

/// The next action after an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPolicy {
    /// Stop and deliver the last outcome, success or error.
    Cancel,

    /// Start the next attempt right away.
    Immediately,

    /// Start the next attempt after a delay.
    WithDelay(Duration),
}

/// Decides the next action based on the attempt index and its outcome.
///
/// Handlers are pure functions: given the attempt that just finished, they
/// return the next action without side effects. The retry engine executes
/// the decision.
///
/// Any `Fn(u32, &Outcome<T, E>) -> RetryPolicy` closure is a handler.
pub trait RetryHandler<T, E>: Send + Sync {
    /// # Arguments
    /// * `attempt` - Index of the attempt that just completed (0 for the first).
    /// * `outcome` - Its outcome.
    fn next(&self, attempt: u32, outcome: &Outcome<T, E>) -> RetryPolicy;
}

impl<T, E, F> RetryHandler<T, E> for F
where
    F: Fn(u32, &Outcome<T, E>) -> RetryPolicy + Send + Sync,
{
    fn next(&self, attempt: u32, outcome: &Outcome<T, E>) -> RetryPolicy {
        self(attempt, outcome)
    }
}
