//! Error types for wrapped calls

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tower::BoxError;

/// Result type alias for wrapped calls
pub type Result<T> = std::result::Result<T, CallError>;

/// Main error type surfaced by the wrapper stack.
///
/// A caller of the outermost wrapper sees either a normal result or exactly
/// one of these variants; no layer swallows an error or substitutes a
/// default.
#[derive(Debug, Error)]
pub enum CallError {
    /// An argument could not be folded into an invocation key
    #[error("unhashable argument {argument}: {reason}")]
    UnhashableArgument { argument: String, reason: String },

    /// The wrapped callable itself failed
    #[error("computation failed: {source}")]
    Computation {
        #[source]
        source: BoxError,
    },

    /// The retry budget ran out; carries the final attempt's error
    #[error("retries exhausted after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: usize,
        #[source]
        source: Box<CallError>,
    },

    /// The per-call deadline elapsed before the callable completed
    #[error("deadline of {limit:?} exceeded")]
    DeadlineExceeded { limit: Duration },
}

impl CallError {
    /// Wrap a callable's own failure into the taxonomy.
    pub fn computation(source: impl Into<BoxError>) -> Self {
        Self::Computation {
            source: source.into(),
        }
    }

    /// The category of this error, used by retry configuration.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CallError::UnhashableArgument { .. } => ErrorKind::UnhashableArgument,
            CallError::Computation { .. } => ErrorKind::Computation,
            CallError::RetriesExhausted { .. } => ErrorKind::RetriesExhausted,
            CallError::DeadlineExceeded { .. } => ErrorKind::DeadlineExceeded,
        }
    }
}

/// Error categories.
///
/// Retry policies hold a set of these to decide which failures are
/// transient. `UnhashableArgument` is never treated as transient regardless
/// of configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    UnhashableArgument,
    Computation,
    RetriesExhausted,
    DeadlineExceeded,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CallError::computation("connection reset");
        assert_eq!(err.to_string(), "computation failed: connection reset");

        let err = CallError::DeadlineExceeded {
            limit: Duration::from_secs(2),
        };
        assert_eq!(err.to_string(), "deadline of 2s exceeded");
    }

    #[test]
    fn test_kind_classification() {
        assert_eq!(
            CallError::computation("boom").kind(),
            ErrorKind::Computation
        );
        assert_eq!(
            CallError::UnhashableArgument {
                argument: "#0".to_string(),
                reason: "opaque value".to_string(),
            }
            .kind(),
            ErrorKind::UnhashableArgument
        );
    }

    #[test]
    fn test_retries_exhausted_preserves_source() {
        let err = CallError::RetriesExhausted {
            attempts: 3,
            source: Box::new(CallError::computation("flaky")),
        };
        assert!(err.to_string().contains("after 3 attempts"));
        assert!(matches!(
            err,
            CallError::RetriesExhausted { attempts: 3, .. }
        ));
    }

    #[test]
    fn test_result_type() {
        fn example_function() -> Result<String> {
            Ok("success".to_string())
        }

        assert_eq!(example_function().unwrap(), "success");
    }
}
