//! Remote engine client.

use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use tracing::instrument;

use readeval_core::error::EvalError;
use readeval_core::markup::MarkupDecoder;
use readeval_core::model::{EvaluationRequest, EvaluationResult};
use readeval_core::traits::SpeechEvaluator;

use crate::frame::FrameScheduler;
use crate::signer::Signer;
use crate::transport::TransportSession;
use crate::waiter::ResultWaiter;

/// Evaluates recordings against the streaming engine, one WebSocket session
/// per call.
#[derive(Debug, Clone)]
pub struct IseClient {
    signer: Signer,
    scheduler: FrameScheduler,
    waiter: ResultWaiter,
}

impl IseClient {
    pub fn new(signer: Signer) -> Self {
        Self {
            signer,
            scheduler: FrameScheduler::default(),
            waiter: ResultWaiter::default(),
        }
    }

    pub fn with_scheduler(mut self, scheduler: FrameScheduler) -> Self {
        self.scheduler = scheduler;
        self
    }

    pub fn with_waiter(mut self, waiter: ResultWaiter) -> Self {
        self.waiter = waiter;
        self
    }

    pub fn signer(&self) -> &Signer {
        &self.signer
    }
}

#[async_trait]
impl SpeechEvaluator for IseClient {
    fn name(&self) -> &str {
        "ise"
    }

    #[instrument(skip(self, audio, request), fields(category = %request.category, bytes = audio.len()))]
    async fn evaluate(
        &self,
        audio: &[u8],
        request: &EvaluationRequest,
    ) -> Result<EvaluationResult, EvalError> {
        request.validate()?;
        if audio.is_empty() {
            return Err(EvalError::InvalidRequest("audio is empty".into()));
        }

        let start = Instant::now();
        let url = self.signer.signed_url(Utc::now())?;

        let mut session = TransportSession::new()
            .with_scheduler(self.scheduler)
            .with_waiter(self.waiter);
        let markup = session
            .run(&url, self.signer.app_id(), request, audio, |percent| {
                tracing::trace!(percent, "streaming audio");
            })
            .await?;

        let utterance = MarkupDecoder::new(request.category).decode(&markup)?;
        if let Some(rejection) = utterance.rejection() {
            tracing::warn!(except_info = ?utterance.except_info, "engine rejected the recording");
            return Err(rejection);
        }
        tracing::info!(
            total = utterance.scores.total,
            characters = utterance.characters.len(),
            latency_ms = start.elapsed().as_millis() as u64,
            "evaluation completed"
        );

        Ok(EvaluationResult::completed(markup, utterance))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signer::{Credentials, Endpoint};

    fn client() -> IseClient {
        let endpoint = Endpoint::parse("ws://127.0.0.1:9/v2/open-ise", None, None).unwrap();
        let signer = Signer::new(
            Credentials {
                app_id: "app".into(),
                api_key: "key".into(),
                api_secret: "secret".into(),
            },
            endpoint,
        )
        .unwrap();
        IseClient::new(signer)
    }

    #[tokio::test]
    async fn empty_audio_is_rejected_before_connecting() {
        let err = client()
            .evaluate(&[], &EvaluationRequest::syllables("的"))
            .await
            .unwrap_err();
        assert!(matches!(err, EvalError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn empty_text_is_rejected_before_connecting() {
        let err = client()
            .evaluate(&[0u8; 1280], &EvaluationRequest::syllables("  "))
            .await
            .unwrap_err();
        assert!(matches!(err, EvalError::InvalidRequest(_)));
        assert!(err.is_permanent());
    }
}
