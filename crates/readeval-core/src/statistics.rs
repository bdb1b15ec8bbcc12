//! Utterance rollups, error histograms and cross-recording aggregates.

use serde::{Deserialize, Serialize};

use crate::model::EvaluationResult;
use crate::tree::Utterance;

/// Character counts and timing for one decoded utterance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct UtteranceStats {
    pub total: usize,
    pub read: usize,
    pub correct: usize,
    pub missed: usize,
    /// `correct / total * 100`, 0 when there are no characters.
    pub accuracy_rate: f64,
    /// `read / total * 100`, 0 when there are no characters.
    pub completion_rate: f64,
    pub speech_ms: u64,
    pub silence_ms: u64,
    pub total_ms: u64,
}

impl UtteranceStats {
    pub fn compute(utterance: &Utterance) -> Self {
        let total = utterance.characters.len();
        let read = utterance.characters.iter().filter(|c| c.is_read()).count();
        let correct = utterance
            .characters
            .iter()
            .filter(|c| c.is_correct())
            .count();

        Self {
            total,
            read,
            correct,
            missed: total - read,
            accuracy_rate: percentage(correct, total),
            completion_rate: percentage(read, total),
            speech_ms: utterance.speech_duration_ms(),
            silence_ms: utterance.silence_duration_ms(),
            total_ms: utterance.total_duration_ms(),
        }
    }

    /// Share of the recording spent on target speech, 0–100.
    pub fn speech_ratio(&self) -> f64 {
        if self.total_ms == 0 {
            return 0.0;
        }
        (self.speech_ms as f64 / self.total_ms as f64 * 100.0).min(100.0)
    }
}

fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

/// One histogram bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorCount {
    pub description: String,
    pub count: usize,
}

/// Count errors by description, most frequent first.
///
/// Each unread character counts once as "missed". A wrong syllable of a read
/// character counts once under its own error when it carries one, otherwise
/// each of its wrong content phones counts. Ties are ordered by description.
pub fn error_histogram(utterance: &Utterance) -> Vec<ErrorCount> {
    let mut counts: Vec<ErrorCount> = Vec::new();
    let mut bump = |description: String| {
        match counts.iter_mut().find(|e| e.description == description) {
            Some(entry) => entry.count += 1,
            None => counts.push(ErrorCount {
                description,
                count: 1,
            }),
        }
    };

    for character in &utterance.characters {
        if !character.is_read() {
            bump("missed".to_string());
            continue;
        }
        if character.is_correct() {
            continue;
        }
        for syllable in character.content_syllables().filter(|s| !s.is_correct()) {
            match syllable.error_description() {
                Some(desc) => bump(desc.to_string()),
                None => {
                    for desc in syllable.phones.iter().filter_map(|p| p.error_description()) {
                        bump(desc.to_string());
                    }
                }
            }
        }
    }

    counts.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.description.cmp(&b.description))
    });
    counts
}

/// Grade band for a total score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreBand {
    Excellent,
    Good,
    Fair,
    Pass,
    Fail,
}

impl ScoreBand {
    pub const ALL: [ScoreBand; 5] = [
        ScoreBand::Excellent,
        ScoreBand::Good,
        ScoreBand::Fair,
        ScoreBand::Pass,
        ScoreBand::Fail,
    ];

    pub fn of(score: f64) -> Self {
        if score >= 90.0 {
            ScoreBand::Excellent
        } else if score >= 80.0 {
            ScoreBand::Good
        } else if score >= 70.0 {
            ScoreBand::Fair
        } else if score >= 60.0 {
            ScoreBand::Pass
        } else {
            ScoreBand::Fail
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ScoreBand::Excellent => "excellent (90-100)",
            ScoreBand::Good => "good (80-89)",
            ScoreBand::Fair => "fair (70-79)",
            ScoreBand::Pass => "pass (60-69)",
            ScoreBand::Fail => "fail (0-59)",
        }
    }
}

/// Averages across several evaluated recordings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateStats {
    /// Recordings that produced a decoded tree.
    pub evaluated: usize,
    pub failed: usize,
    pub avg_total_score: f64,
    pub avg_accuracy_rate: f64,
    pub avg_completion_rate: f64,
    /// Count per band, in [`ScoreBand::ALL`] order.
    pub bands: Vec<(ScoreBand, usize)>,
}

/// Aggregate successful results; failed ones are only counted.
pub fn compute_aggregate_stats(results: &[EvaluationResult]) -> AggregateStats {
    let decoded: Vec<(&EvaluationResult, UtteranceStats)> = results
        .iter()
        .filter(|r| r.success)
        .filter_map(|r| r.utterance.as_ref().map(|u| (r, UtteranceStats::compute(u))))
        .collect();

    let n = decoded.len();
    let mean = |values: Vec<f64>| -> f64 {
        if n == 0 {
            0.0
        } else {
            values.iter().sum::<f64>() / n as f64
        }
    };

    let bands = ScoreBand::ALL
        .iter()
        .map(|band| {
            let count = decoded
                .iter()
                .filter(|(r, _)| ScoreBand::of(r.scores.total) == *band)
                .count();
            (*band, count)
        })
        .collect();

    AggregateStats {
        evaluated: n,
        failed: results.iter().filter(|r| !r.success).count(),
        avg_total_score: mean(decoded.iter().map(|(r, _)| r.scores.total).collect()),
        avg_accuracy_rate: mean(decoded.iter().map(|(_, s)| s.accuracy_rate).collect()),
        avg_completion_rate: mean(decoded.iter().map(|(_, s)| s.completion_rate).collect()),
        bands,
    }
}
