//! JSON batch reports.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

use readeval_core::report::AuditRecord;
use readeval_core::statistics::{compute_aggregate_stats, AggregateStats};

/// Several audit records plus their aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub records: Vec<AuditRecord>,
    pub aggregate: AggregateStats,
}

impl BatchReport {
    pub fn new(records: Vec<AuditRecord>) -> Self {
        let results: Vec<_> = records.iter().map(|r| r.result.clone()).collect();
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            aggregate: compute_aggregate_stats(&results),
            records,
        }
    }
}

pub fn generate_json(report: &BatchReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize batch report")
}

/// Write a batch report to a file.
pub fn write_json_report(report: &BatchReport, path: &Path) -> Result<()> {
    let json = generate_json(report)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, json)
        .with_context(|| format!("failed to write JSON report to {}", path.display()))?;
    Ok(())
}
