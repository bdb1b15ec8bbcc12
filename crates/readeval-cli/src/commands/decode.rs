//! The `readeval decode` command.

use std::path::PathBuf;

use anyhow::{Context, Result};

use readeval_core::markup::MarkupDecoder;
use readeval_core::model::{Category, EvaluationRequest, EvaluationResult};
use readeval_core::report::AuditRecord;
use readeval_report::{generate_csv, generate_summary};

pub fn execute(markup_path: PathBuf, category: String, format: String) -> Result<()> {
    let category: Category = category.parse().map_err(anyhow::Error::msg)?;
    let markup = std::fs::read_to_string(&markup_path)
        .with_context(|| format!("failed to read markup: {}", markup_path.display()))?;

    let utterance = MarkupDecoder::new(category)
        .decode(&markup)
        .with_context(|| format!("failed to decode {}", markup_path.display()))?;

    let text = utterance
        .characters
        .iter()
        .map(|c| c.glyph.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    let record = AuditRecord::new(
        EvaluationRequest::new(category, text),
        EvaluationResult::completed(markup, utterance),
    );

    match format.as_str() {
        "text" => print!("{}", generate_summary(&record)),
        "csv" => print!("{}", generate_csv(&record)),
        "json" => println!("{}", serde_json::to_string_pretty(&record)?),
        other => anyhow::bail!("unknown format: {other} (expected text, json or csv)"),
    }
    Ok(())
}
