//! Outcome model: the single result a promise delivers.
//!
//! An `Outcome` is immutable once built. Every subscriber of a completed
//! promise receives its own clone of the same value.

use serde::{Deserialize, Serialize};

/// Classification of an outcome, without the payload.
///
/// Serialized as SCREAMING_SNAKE_CASE: SUCCESS / ERROR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutcomeKind {
    Success,
    Error,
}

/// Completed result of a promise: exactly one success value or one error.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome<T, E> {
    Success(T),
    Error(E),
}

impl<T, E> Outcome<T, E> {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            Outcome::Success(_) => OutcomeKind::Success,
            Outcome::Error(_) => OutcomeKind::Error,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Outcome::Error(_))
    }

    pub fn success(self) -> Option<T> {
        match self {
            Outcome::Success(value) => Some(value),
            Outcome::Error(_) => None,
        }
    }

    pub fn error(self) -> Option<E> {
        match self {
            Outcome::Success(_) => None,
            Outcome::Error(error) => Some(error),
        }
    }

    pub fn as_ref(&self) -> Outcome<&T, &E> {
        match self {
            Outcome::Success(value) => Outcome::Success(value),
            Outcome::Error(error) => Outcome::Error(error),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U, E> {
        match self {
            Outcome::Success(value) => Outcome::Success(f(value)),
            Outcome::Error(error) => Outcome::Error(error),
        }
    }

    pub fn map_error<F>(self, f: impl FnOnce(E) -> F) -> Outcome<T, F> {
        match self {
            Outcome::Success(value) => Outcome::Success(value),
            Outcome::Error(error) => Outcome::Error(f(error)),
        }
    }

    pub fn into_result(self) -> Result<T, E> {
        self.into()
    }
}

impl<T, E> From<Result<T, E>> for Outcome<T, E> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Outcome::Success(value),
            Err(error) => Outcome::Error(error),
        }
    }
}

impl<T, E> From<Outcome<T, E>> for Result<T, E> {
    fn from(outcome: Outcome<T, E>) -> Self {
        match outcome {
            Outcome::Success(value) => Ok(value),
            Outcome::Error(error) => Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_kind_serializes_as_required_names() {
        let s = serde_json::to_string(&OutcomeKind::Success).unwrap();
        assert_eq!(s, "\"SUCCESS\"");

        let s = serde_json::to_string(&OutcomeKind::Error).unwrap();
        assert_eq!(s, "\"ERROR\"");
    }

    #[test]
    fn outcome_is_tagged_enum() {
        let o: Outcome<u32, String> = Outcome::Error("boom".to_string());
        let v = serde_json::to_value(&o).unwrap();
        // Example shape: {"kind":"ERROR","value":"boom"}
        assert_eq!(v["kind"], "ERROR");
        assert_eq!(v["value"], "boom");
    }

    #[test]
    fn converts_from_and_into_result() {
        let ok: Outcome<u32, String> = Ok(3).into();
        assert_eq!(ok, Outcome::Success(3));
        assert_eq!(ok.kind(), OutcomeKind::Success);

        let err: Result<u32, String> = Outcome::Error("e".to_string()).into_result();
        assert_eq!(err, Err("e".to_string()));
    }

    #[test]
    fn map_leaves_error_untouched() {
        let o: Outcome<u32, &str> = Outcome::Error("e");
        assert_eq!(o.map(|v| v * 2), Outcome::Error("e"));

        let o: Outcome<u32, &str> = Outcome::Success(2);
        assert_eq!(o.clone().map(|v| v * 2), Outcome::Success(4));
        assert_eq!(o.map_error(str::len), Outcome::Success(2));
    }
}
