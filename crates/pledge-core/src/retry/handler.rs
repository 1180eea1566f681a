//! Default retry handler: fixed or exponential backoff with an attempt cap.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::{RetryHandler, RetryPolicy};
use crate::domain::Outcome;
use crate::error::PledgeError;

/// Retry settings that can be loaded from configuration.
///
/// ```
/// use pledge_core::RetryConfig;
///
/// let config = RetryConfig::from_json(r#"{"base_delay_ms": 250, "max_attempts": 3}"#).unwrap();
/// assert_eq!(config.backoff_multiplier, 2.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Delay before the first retry, in milliseconds.
    pub base_delay_ms: u64,

    /// Growth factor applied per attempt. 1.0 means a fixed delay.
    pub backoff_multiplier: f64,

    /// Retries allowed after the first attempt.
    pub max_attempts: u32,

    /// Extra random delay, as a fraction of the computed delay (0.0 - 1.0).
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 2_000,
            backoff_multiplier: 2.0,
            max_attempts: 5,
            jitter: 0.0,
        }
    }
}

impl RetryConfig {
    pub fn from_json(json: &str) -> Result<Self, PledgeError> {
        let config: RetryConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), PledgeError> {
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(PledgeError::InvalidConfig(format!(
                "backoff_multiplier must be a finite value >= 1.0, got {}",
                self.backoff_multiplier
            )));
        }
        if !(0.0..=1.0).contains(&self.jitter) {
            return Err(PledgeError::InvalidConfig(format!(
                "jitter must be within 0.0..=1.0, got {}",
                self.jitter
            )));
        }
        Ok(())
    }
}

type Predicate<V> = Arc<dyn Fn(&V) -> bool + Send + Sync>;

/// Which outcomes are worth another attempt.
enum RetryCondition<T, E> {
    AnyError,
    ErrorIf(Predicate<E>),
    SuccessIf(Predicate<T>),
}

impl<T, E> Clone for RetryCondition<T, E> {
    fn clone(&self) -> Self {
        match self {
            RetryCondition::AnyError => RetryCondition::AnyError,
            RetryCondition::ErrorIf(p) => RetryCondition::ErrorIf(Arc::clone(p)),
            RetryCondition::SuccessIf(p) => RetryCondition::SuccessIf(Arc::clone(p)),
        }
    }
}

impl<T, E> RetryCondition<T, E> {
    fn matches(&self, outcome: &Outcome<T, E>) -> bool {
        match (self, outcome) {
            (RetryCondition::AnyError, Outcome::Error(_)) => true,
            (RetryCondition::ErrorIf(pred), Outcome::Error(error)) => pred(error),
            (RetryCondition::SuccessIf(pred), Outcome::Success(value)) => pred(value),
            _ => false,
        }
    }
}

/// Default handler.
///
/// Implements attempt-based retry with exponential backoff:
/// - Cancel once `max_attempts` retries have been made
/// - Cancel when the outcome does not match the retry condition
/// - Otherwise retry after `max(base, base * multiplier^attempt)`
///
/// Example with base_delay=2s, multiplier=2.0:
/// - after attempt 0 (first failure): 2s
/// - after attempt 1: 4s
/// - after attempt 2: 8s
pub struct DefaultRetryHandler<T, E> {
    base_delay: Duration,
    multiplier: f64,
    max_attempts: u32,
    jitter: f64,
    condition: RetryCondition<T, E>,
}

impl<T, E> Clone for DefaultRetryHandler<T, E> {
    fn clone(&self) -> Self {
        Self {
            base_delay: self.base_delay,
            multiplier: self.multiplier,
            max_attempts: self.max_attempts,
            jitter: self.jitter,
            condition: self.condition.clone(),
        }
    }
}

impl<T, E> DefaultRetryHandler<T, E> {
    /// Retry errors after a fixed delay, at most `max_attempts` times.
    pub fn with_delay(delay: Duration, max_attempts: u32) -> Self {
        Self::with_backoff(delay, 1.0, max_attempts)
    }

    /// Retry errors with exponential backoff, at most `max_attempts` times.
    pub fn with_backoff(base_delay: Duration, multiplier: f64, max_attempts: u32) -> Self {
        Self {
            base_delay,
            multiplier,
            max_attempts,
            jitter: 0.0,
            condition: RetryCondition::AnyError,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Result<Self, PledgeError> {
        config.validate()?;
        Ok(Self::with_backoff(
            Duration::from_millis(config.base_delay_ms),
            config.backoff_multiplier,
            config.max_attempts,
        )
        .with_jitter(config.jitter))
    }

    /// Add up to `fraction * delay` of random extra delay to each retry.
    pub fn with_jitter(mut self, fraction: f64) -> Self {
        self.jitter = fraction.clamp(0.0, 1.0);
        self
    }

    /// Retry only errors for which `predicate` holds.
    pub fn retry_error_if(mut self, predicate: impl Fn(&E) -> bool + Send + Sync + 'static) -> Self {
        self.condition = RetryCondition::ErrorIf(Arc::new(predicate));
        self
    }

    /// Retry successes for which `predicate` holds (polling), never errors.
    pub fn retry_success_if(
        mut self,
        predicate: impl Fn(&T) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.condition = RetryCondition::SuccessIf(Arc::new(predicate));
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before the retry that follows attempt `attempt`, without jitter.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let secs = self.base_delay.as_secs_f64() * self.multiplier.powi(exponent);
        let scaled = Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX);
        scaled.max(self.base_delay)
    }

    fn jittered(&self, delay: Duration) -> Duration {
        if self.jitter <= 0.0 || delay.is_zero() {
            return delay;
        }
        let extra = rand::thread_rng().gen_range(0.0..=self.jitter);
        delay.saturating_add(delay.mul_f64(extra))
    }
}

impl<T, E> RetryHandler<T, E> for DefaultRetryHandler<T, E>
where
    T: Send + Sync,
    E: Send + Sync,
{
    fn next(&self, attempt: u32, outcome: &Outcome<T, E>) -> RetryPolicy {
        if attempt >= self.max_attempts || !self.condition.matches(outcome) {
            return RetryPolicy::Cancel;
        }
        let delay = self.jittered(self.delay_for_attempt(attempt));
        if delay.is_zero() {
            RetryPolicy::Immediately
        } else {
            RetryPolicy::WithDelay(delay)
        }
    }
}

impl<T, E> fmt::Debug for DefaultRetryHandler<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefaultRetryHandler")
            .field("base_delay", &self.base_delay)
            .field("multiplier", &self.multiplier)
            .field("max_attempts", &self.max_attempts)
            .field("jitter", &self.jitter)
            .finish()
    }
}
