//! Mock evaluator for offline runs and tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use readeval_core::error::EvalError;
use readeval_core::markup::MarkupDecoder;
use readeval_core::model::{EvaluationRequest, EvaluationResult};
use readeval_core::traits::SpeechEvaluator;

/// Recordings shorter than this are treated as unusable.
pub const MIN_AUDIO_BYTES: usize = 1000;

const DEFAULT_MOCK_SCORE: f64 = 90.0;

/// An evaluator that never touches the network.
///
/// Returns canned markup when the request text contains one of the
/// registered keys, otherwise a fixed markup if one was set, otherwise
/// markup synthesized from the target text with every character read
/// correctly.
pub struct MockEvaluator {
    /// Map of text substring → markup.
    responses: HashMap<String, String>,
    fixed_markup: Option<String>,
    score: f64,
    call_count: AtomicU32,
    last_request: Mutex<Option<EvaluationRequest>>,
}

impl Default for MockEvaluator {
    fn default() -> Self {
        Self::new(HashMap::new())
    }
}

impl MockEvaluator {
    pub fn new(responses: HashMap<String, String>) -> Self {
        Self {
            responses,
            fixed_markup: None,
            score: DEFAULT_MOCK_SCORE,
            call_count: AtomicU32::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// A mock that always returns the same markup.
    pub fn with_fixed_markup(markup: &str) -> Self {
        Self {
            fixed_markup: Some(markup.to_string()),
            ..Self::default()
        }
    }

    /// Utterance scores used in synthesized markup.
    pub fn with_score(mut self, score: f64) -> Self {
        self.score = score;
        self
    }

    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    pub fn last_request(&self) -> Option<EvaluationRequest> {
        self.last_request
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    fn markup_for(&self, request: &EvaluationRequest) -> String {
        self.responses
            .iter()
            .find(|(key, _)| request.text.contains(key.as_str()))
            .map(|(_, markup)| markup.clone())
            .or_else(|| self.fixed_markup.clone())
            .unwrap_or_else(|| synthesize_markup(request, self.score))
    }
}

#[async_trait]
impl SpeechEvaluator for MockEvaluator {
    fn name(&self) -> &str {
        "mock"
    }

    async fn evaluate(
        &self,
        audio: &[u8],
        request: &EvaluationRequest,
    ) -> Result<EvaluationResult, EvalError> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut last) = self.last_request.lock() {
            *last = Some(request.clone());
        }

        request.validate()?;
        if audio.len() < MIN_AUDIO_BYTES {
            return Err(EvalError::InvalidRequest(format!(
                "audio too short to evaluate: {} bytes",
                audio.len()
            )));
        }

        let markup = self.markup_for(request);
        let utterance = MarkupDecoder::new(request.category).decode(&markup)?;
        if let Some(rejection) = utterance.rejection() {
            return Err(rejection);
        }
        Ok(EvaluationResult::completed(markup, utterance))
    }
}

/// All-correct markup with one 300 ms entry per whitespace-separated token.
pub fn synthesize_markup(request: &EvaluationRequest, score: f64) -> String {
    const UNITS: usize = 30;

    let root = request.category.element_name();
    let tokens: Vec<&str> = request.text.split_whitespace().collect();
    let mut body = String::new();

    for (i, token) in tokens.iter().enumerate() {
        let glyph = escape(token);
        let beg = i * UNITS;
        let end = beg + UNITS;
        body.push_str(&format!(
            r#"<sentence beg_pos="{beg}" content="{glyph}" end_pos="{end}" time_len="{UNITS}"><word beg_pos="{beg}" content="{glyph}" end_pos="{end}" symbol="{glyph}" time_len="{UNITS}"><syll beg_pos="{beg}" content="{glyph}" dp_message="0" end_pos="{end}" rec_node_type="paper" symbol="{glyph}" time_len="{UNITS}"><phone beg_pos="{beg}" content="{glyph}" dp_message="0" end_pos="{end}" is_yun="1" perr_level_msg="1" perr_msg="0" rec_node_type="paper" time_len="{UNITS}"/></syll></word></sentence>"#
        ));
    }

    format!(
        r#"<?xml version="1.0" ?><xml_result><{root}><rec_paper><{root} content="{content}" except_info="0" fluency_score="{score:.6}" integrity_score="{score:.6}" is_rejected="false" phone_score="{score:.6}" time_len="{len}" tone_score="{score:.6}" total_score="{score:.6}">{body}</{root}></rec_paper></{root}></xml_result>"#,
        content = escape(&tokens.concat()),
        len = tokens.len() * UNITS,
    )
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use readeval_core::error::FailureKind;
    use readeval_core::model::Category;

    const AUDIO: [u8; 1280] = [0u8; 1280];

    #[tokio::test]
    async fn synthesized_result_marks_everything_correct() {
        let evaluator = MockEvaluator::default();
        let result = evaluator
            .evaluate(&AUDIO, &EvaluationRequest::syllables("的 一 了"))
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.scores.total, 90.0);
        let utterance = result.utterance.unwrap();
        let glyphs: Vec<_> = utterance.characters.iter().map(|c| c.glyph.as_str()).collect();
        assert_eq!(glyphs, ["的", "一", "了"]);
        assert!(utterance.characters.iter().all(|c| c.is_correct()));
        assert_eq!(utterance.total_duration_ms(), 900);
        assert_eq!(evaluator.call_count(), 1);
    }

    #[tokio::test]
    async fn canned_markup_by_text() {
        let mut responses = HashMap::new();
        responses.insert(
            "了".to_string(),
            include_str!("../../readeval-core/tests/fixtures/read_syllable.xml").to_string(),
        );
        let evaluator = MockEvaluator::new(responses);

        let result = evaluator
            .evaluate(&AUDIO, &EvaluationRequest::syllables("的 一 了"))
            .await
            .unwrap();
        assert!((result.scores.total - 86.4).abs() < 1e-9);

        let other = evaluator
            .evaluate(&AUDIO, &EvaluationRequest::syllables("我 是"))
            .await
            .unwrap();
        assert_eq!(other.scores.total, 90.0);
        assert_eq!(evaluator.last_request().unwrap().text, "我 是");
    }

    #[tokio::test]
    async fn fixed_markup_and_score() {
        let evaluator = MockEvaluator::with_fixed_markup(
            r#"<xml_result><rec_paper><read_word total_score="42"/></rec_paper></xml_result>"#,
        );
        let request = EvaluationRequest::new(Category::ReadWord, "朋友");
        let result = evaluator.evaluate(&AUDIO, &request).await.unwrap();
        assert_eq!(result.scores.total, 42.0);

        let scored = MockEvaluator::default().with_score(55.0);
        let result = scored.evaluate(&AUDIO, &request).await.unwrap();
        assert_eq!(result.scores.total, 55.0);
        assert_eq!(result.utterance.unwrap().characters[0].glyph, "朋友");
    }

    #[tokio::test]
    async fn short_audio_is_rejected() {
        let evaluator = MockEvaluator::default();
        let err = evaluator
            .evaluate(&[0u8; 999], &EvaluationRequest::syllables("的"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::InvalidRequest);
        assert_eq!(evaluator.call_count(), 1);
    }

    #[tokio::test]
    async fn rejected_markup_is_an_engine_rejection() {
        let evaluator = MockEvaluator::with_fixed_markup(
            r#"<xml_result><rec_paper><read_syllable is_rejected="true" except_info="28676" total_score="0"/></rec_paper></xml_result>"#,
        );
        let err = evaluator
            .evaluate(&AUDIO, &EvaluationRequest::syllables("的"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::EngineRejection);
    }

    #[test]
    fn markup_escapes_special_characters() {
        let markup = synthesize_markup(&EvaluationRequest::syllables("< &"), 80.0);
        let utterance = MarkupDecoder::new(Category::ReadSyllable).decode(&markup).unwrap();
        let glyphs: Vec<_> = utterance.characters.iter().map(|c| c.glyph.as_str()).collect();
        assert_eq!(glyphs, ["<", "&"]);
    }
}
