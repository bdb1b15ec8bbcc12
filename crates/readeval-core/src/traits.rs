//! Core trait for speech evaluation backends.
//!
//! Implemented by the remote engine client and the mock evaluator in the
//! `readeval-ise` crate.

use async_trait::async_trait;

use crate::error::EvalError;
use crate::model::{EvaluationRequest, EvaluationResult};

/// A backend that scores one recording against a target text.
#[async_trait]
pub trait SpeechEvaluator: Send + Sync {
    /// Human-readable backend name (e.g. "ise").
    fn name(&self) -> &str;

    /// Evaluate raw audio against the request's target text.
    ///
    /// A returned `Ok` result is always successful; every failure is an
    /// [`EvalError`] so the caller can fold it into a tagged result.
    async fn evaluate(
        &self,
        audio: &[u8],
        request: &EvaluationRequest,
    ) -> Result<EvaluationResult, EvalError>;
}
