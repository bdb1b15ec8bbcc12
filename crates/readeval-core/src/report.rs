//! Audit records with JSON persistence.
//!
//! An [`AuditRecord`] bundles everything the caller stores for one
//! evaluation: what was asked, the raw engine markup, and the derived
//! per-character diagnostics.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::diagnostics::{character_diagnostics, CharacterDiagnostic};
use crate::model::{EvaluationRequest, EvaluationResult};
use crate::statistics::{error_histogram, ErrorCount, UtteranceStats};

/// Persisted artifact of one evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub request: EvaluationRequest,
    pub result: EvaluationResult,
    /// Absent when the evaluation failed.
    #[serde(default)]
    pub statistics: Option<UtteranceStats>,
    #[serde(default)]
    pub error_histogram: Vec<ErrorCount>,
    #[serde(default)]
    pub characters: Vec<CharacterDiagnostic>,
}

impl AuditRecord {
    /// Derive diagnostics from a result and wrap everything for storage.
    pub fn new(request: EvaluationRequest, result: EvaluationResult) -> Self {
        let (statistics, histogram, characters) = match &result.utterance {
            Some(utterance) => (
                Some(UtteranceStats::compute(utterance)),
                error_histogram(utterance),
                character_diagnostics(utterance),
            ),
            None => (None, Vec::new(), Vec::new()),
        };

        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            request,
            result,
            statistics,
            error_histogram: histogram,
            characters,
        }
    }

    /// Save the record as JSON to a file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize audit record")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write audit record to {}", path.display()))?;
        Ok(())
    }

    /// Load a record from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read audit record from {}", path.display()))?;
        let record: AuditRecord =
            serde_json::from_str(&content).context("failed to parse audit record JSON")?;
        Ok(record)
    }
}
