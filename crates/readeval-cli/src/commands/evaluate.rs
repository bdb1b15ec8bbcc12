//! The `readeval evaluate` command.

use std::path::PathBuf;

use anyhow::Result;

use readeval_core::model::{Category, EvaluationRequest};
use readeval_core::report::AuditRecord;
use readeval_ise::config::load_config_from;
use readeval_report::{generate_summary, write_csv_report, write_summary_report};

use crate::audio::load_recording;

#[allow(clippy::too_many_arguments)]
pub async fn execute(
    audio_path: PathBuf,
    text: String,
    category: String,
    output: Option<PathBuf>,
    format: Option<String>,
    config_path: Option<PathBuf>,
    mock: bool,
) -> Result<()> {
    let category: Category = category.parse().map_err(anyhow::Error::msg)?;
    anyhow::ensure!(!text.trim().is_empty(), "--text must not be empty");

    let mut config = load_config_from(config_path.as_deref())?;
    let recording = load_recording(&audio_path)?;
    if let Some(rate) = recording.sample_rate {
        config.evaluation.sample_rate = rate;
    }

    let formats: Vec<String> = match format.as_deref() {
        None => Vec::new(),
        Some("all") => vec!["csv".into(), "text".into()],
        Some(list) => list.split(',').map(|s| s.trim().to_string()).collect(),
    };
    if let Some(unknown) = formats.iter().find(|f| !matches!(f.as_str(), "csv" | "text")) {
        anyhow::bail!("unknown format: {unknown} (expected csv, text or all)");
    }

    let engine = super::build_engine(&config, mock)?;
    let profile = config.evaluation.profile();

    eprintln!(
        "Evaluating {} ({} bytes) as {category}",
        audio_path.display(),
        recording.pcm.len()
    );
    let result = engine
        .evaluate(&recording.pcm, &text, category, profile.clone())
        .await;

    let mut request = EvaluationRequest::new(category, text)
        .with_profile(profile)
        .with_sample_rate(config.evaluation.sample_rate);
    request.audio_format = config.evaluation.audio_format.clone();
    let record = AuditRecord::new(request, result);

    print!("{}", generate_summary(&record));

    let output = output.unwrap_or(config.output_dir);
    let stamp = super::timestamp();

    let path = output.join(format!("audit-{stamp}.json"));
    record.save_json(&path)?;
    eprintln!("\nAudit record saved to: {}", path.display());

    for fmt in &formats {
        match fmt.as_str() {
            "csv" => {
                let path = output.join(format!("characters-{stamp}.csv"));
                write_csv_report(&record, &path)?;
                eprintln!("CSV export: {}", path.display());
            }
            _ => {
                let path = output.join(format!("summary-{stamp}.txt"));
                write_summary_report(&record, &path)?;
                eprintln!("Summary report: {}", path.display());
            }
        }
    }

    if !record.result.success {
        anyhow::bail!("evaluation failed: {}", record.result.message);
    }
    Ok(())
}
