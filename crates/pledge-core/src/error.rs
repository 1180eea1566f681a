use thiserror::Error;

/// Errors raised by pledge itself.
///
/// Domain failures never show up here: they travel as `Outcome::Error(E)`
/// with the caller's own `E`.
#[derive(Debug, Error)]
pub enum PledgeError {
    #[error("promise was cancelled before it delivered a result")]
    Cancelled,

    #[error("invalid retry configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to parse retry configuration: {0}")]
    ConfigParse(#[from] serde_json::Error),
}
