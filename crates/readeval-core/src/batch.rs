//! Mapping one recording's result back onto the characters it answers for.
//!
//! When a child reads several target characters in a single recording, the
//! engine scores the concatenated text once. [`BatchCoordinator::map`] turns
//! that single result into one verdict per requested character.
//!
//! A requested character is correct when its glyph is among the correctly
//! read glyphs of the decoded utterance. Membership is by glyph, not by
//! position, so a glyph requested twice gets the same verdict both times.

use serde::{Deserialize, Serialize};

use crate::model::EvaluationResult;
use crate::reference::LiteracyGroup;

/// Total score at or above which a character counts as correct when the
/// engine returned scores but no per-character detail.
pub const DEFAULT_PASS_THRESHOLD: f64 = 60.0;

/// Verdict for one requested character.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterVerdict {
    pub character: String,
    pub is_correct: bool,
    /// Utterance total score scaled to 0–1; 0 for failed evaluations.
    pub confidence: f64,
    pub message: String,
}

#[derive(Debug, Clone, Copy)]
pub struct BatchCoordinator {
    pass_threshold: f64,
}

impl Default for BatchCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchCoordinator {
    pub fn new() -> Self {
        Self {
            pass_threshold: DEFAULT_PASS_THRESHOLD,
        }
    }

    pub fn with_pass_threshold(mut self, threshold: f64) -> Self {
        self.pass_threshold = threshold;
        self
    }

    pub fn pass_threshold(&self) -> f64 {
        self.pass_threshold
    }

    /// One verdict per requested character, in request order.
    pub fn map(&self, result: &EvaluationResult, characters: &[String]) -> Vec<CharacterVerdict> {
        if !result.success {
            return characters
                .iter()
                .map(|c| CharacterVerdict {
                    character: c.clone(),
                    is_correct: false,
                    confidence: 0.0,
                    message: result.message.clone(),
                })
                .collect();
        }

        let confidence = (result.scores.total / 100.0).clamp(0.0, 1.0);

        let decoded = result
            .utterance
            .as_ref()
            .filter(|u| !u.characters.is_empty());

        let verdict_for: Box<dyn Fn(&str) -> bool + '_> = match decoded {
            Some(utterance) => {
                let correct = utterance.correct_glyphs();
                Box::new(move |c: &str| correct.contains(c))
            }
            None => {
                tracing::debug!(
                    threshold = self.pass_threshold,
                    total = result.scores.total,
                    "no character detail, falling back to total score"
                );
                let passed = result.scores.total >= self.pass_threshold;
                Box::new(move |_: &str| passed)
            }
        };

        characters
            .iter()
            .map(|c| CharacterVerdict {
                character: c.clone(),
                is_correct: verdict_for(c.as_str()),
                confidence,
                message: result.message.clone(),
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Literacy group scoring
// ---------------------------------------------------------------------------

/// Correct-count and weighted score for one literacy group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupScore {
    pub group_id: String,
    pub coefficient: f64,
    pub total_characters: usize,
    pub correct_characters: usize,
    /// `correct_characters * coefficient`.
    pub score: f64,
}

impl GroupScore {
    /// Score a group from the verdicts of its characters. Verdicts for
    /// characters outside the group are ignored.
    pub fn compute(group: &LiteracyGroup, verdicts: &[CharacterVerdict]) -> Self {
        let correct_characters = group
            .characters
            .iter()
            .filter(|c| {
                verdicts
                    .iter()
                    .any(|v| v.is_correct && v.character == **c)
            })
            .count();

        Self {
            group_id: group.id.clone(),
            coefficient: group.coefficient,
            total_characters: group.characters.len(),
            correct_characters,
            score: correct_characters as f64 * group.coefficient,
        }
    }
}

/// Literacy test outcome across all groups.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LiteracyScore {
    pub groups: Vec<GroupScore>,
    pub total_score: f64,
}

impl LiteracyScore {
    pub fn from_groups(groups: Vec<GroupScore>) -> Self {
        let total_score = groups.iter().map(|g| g.score).sum();
        Self {
            groups,
            total_score,
        }
    }
}
