//! Evaluation error types.
//!
//! Every failure of one evaluation maps to exactly one [`FailureKind`]. The
//! engine folds errors into failed [`EvaluationResult`](crate::model::EvaluationResult)s
//! using that kind, so callers can tell a timeout from a dropped connection
//! without string matching.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while evaluating one recording.
#[derive(Debug, Error)]
pub enum EvalError {
    /// Signing inputs were missing or unusable.
    #[error("authentication failed: {0}")]
    AuthFailure(String),

    /// The connection could not be opened or was lost mid-session.
    #[error("transport failure: {0}")]
    TransportFailure(String),

    /// No terminal message arrived before the result deadline.
    #[error("timed out waiting for evaluation result after {}ms", .0.as_millis())]
    TimeoutFailure(Duration),

    /// The returned markup could not be decoded.
    #[error("markup decode failed: {0}")]
    DecodeFailure(#[from] DecodeError),

    /// The engine completed the exchange but rejected the recording.
    #[error("engine rejected evaluation (code {code}): {message}")]
    EngineRejection { code: i64, message: String },

    /// The request itself cannot be evaluated.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl EvalError {
    /// The tag recorded on a failed result.
    pub fn kind(&self) -> FailureKind {
        match self {
            EvalError::AuthFailure(_) => FailureKind::Auth,
            EvalError::TransportFailure(_) => FailureKind::Transport,
            EvalError::TimeoutFailure(_) => FailureKind::Timeout,
            EvalError::DecodeFailure(_) => FailureKind::Decode,
            EvalError::EngineRejection { .. } => FailureKind::EngineRejection,
            EvalError::InvalidRequest(_) => FailureKind::InvalidRequest,
        }
    }

    /// Returns `true` if retrying the same request cannot succeed.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            EvalError::AuthFailure(_) | EvalError::InvalidRequest(_) | EvalError::DecodeFailure(_)
        )
    }
}

/// Serializable tag for a failed evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Auth,
    Transport,
    Timeout,
    Decode,
    EngineRejection,
    InvalidRequest,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::Auth => "auth",
            FailureKind::Transport => "transport",
            FailureKind::Timeout => "timeout",
            FailureKind::Decode => "decode",
            FailureKind::EngineRejection => "engine_rejection",
            FailureKind::InvalidRequest => "invalid_request",
        };
        f.write_str(s)
    }
}

/// Errors raised by the markup decoder.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The document is not well-formed XML.
    #[error("malformed markup: {0}")]
    Malformed(String),

    /// A numeric attribute held something that is not a number.
    #[error("attribute `{attribute}` on <{element}> is not numeric: {value:?}")]
    InvalidNumber {
        element: String,
        attribute: String,
        value: String,
    },

    /// An error code outside the closed taxonomy.
    #[error("unknown error code {code} on <{element}>")]
    UnknownErrorCode { element: String, code: u32 },
}
