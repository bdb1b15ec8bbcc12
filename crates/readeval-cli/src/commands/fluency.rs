//! The `readeval fluency` command.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use comfy_table::{Cell, Table};

use readeval_core::engine::{correct_in_row, JobOutcome, ProgressReporter, RowRecording};
use readeval_core::model::EvaluationRequest;
use readeval_core::reference::{load_reference, CharacterRow, ReferenceSet};
use readeval_core::report::AuditRecord;
use readeval_ise::config::load_config_from;
use readeval_report::{generate_batch_summary, write_json_report, BatchReport};

use crate::audio::load_recording;

/// Console progress reporter.
struct ConsoleReporter;

impl ProgressReporter for ConsoleReporter {
    fn on_job_start(&self, job_id: &str) {
        eprintln!("  Starting: {job_id}");
    }

    fn on_job_complete(&self, outcome: &JobOutcome) {
        let status = if outcome.result.success {
            format!("score {:.1}", outcome.result.scores.total)
        } else {
            format!("FAIL {}", outcome.result.message)
        };
        eprintln!(
            "  Done: {} [{}] ({}ms)",
            outcome.job_id, status, outcome.duration_ms
        );
    }

    fn on_phase_complete(&self, total: usize, succeeded: usize, failed: usize, elapsed: Duration) {
        eprintln!(
            "\nComplete: {succeeded}/{total} succeeded, {failed} failed ({:.1}s)",
            elapsed.as_secs_f64()
        );
    }
}

pub async fn execute(
    recordings_dir: PathBuf,
    reference_path: Option<PathBuf>,
    output: Option<PathBuf>,
    config_path: Option<PathBuf>,
    mock: bool,
) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let reference = match &reference_path {
        Some(path) => load_reference(path)?,
        None => config.reference_set()?,
    };

    let recordings = scan_recordings(&recordings_dir)?;
    anyhow::ensure!(
        !recordings.is_empty(),
        "no round<R>-row<N> recordings found in {}",
        recordings_dir.display()
    );
    eprintln!(
        "Fluency test: {} recording(s) against {} ({} rows)",
        recordings.len(),
        reference.name,
        reference.rows.len()
    );

    let rates: HashMap<String, u32> = recordings
        .iter()
        .filter_map(|r| r.sample_rate.map(|rate| (r.job_id(), rate)))
        .collect();

    let engine = super::build_engine(&config, mock)?;
    let summary = engine
        .run_fluency(&reference, recordings, &ConsoleReporter)
        .await;

    let mut table = Table::new();
    table.set_header(vec!["Recording", "Score", "Correct", "Status"]);
    for outcome in &summary.phase.outcomes {
        let row_len = row_for(&outcome.job_id, &reference).map_or(0, |row| row.len());
        table.add_row(vec![
            Cell::new(&outcome.job_id),
            Cell::new(format!("{:.1}", outcome.result.scores.total)),
            Cell::new(format!("{}/{row_len}", correct_in_row(&outcome.result, row_len))),
            Cell::new(if outcome.result.success {
                "ok".to_string()
            } else {
                outcome.result.message.clone()
            }),
        ]);
    }
    println!("{table}");
    println!("Round 1 correct: {}", summary.round1_correct);
    println!("Round 2 correct: {}", summary.round2_correct);
    println!("Average: {:.1}", summary.average_score);

    let records: Vec<AuditRecord> = summary
        .phase
        .outcomes
        .iter()
        .map(|outcome| {
            let text = row_for(&outcome.job_id, &reference)
                .map(|row| row.text())
                .unwrap_or_default();
            let request = EvaluationRequest::syllables(text)
                .with_profile(config.evaluation.profile())
                .with_sample_rate(
                    rates
                        .get(&outcome.job_id)
                        .copied()
                        .unwrap_or(config.evaluation.sample_rate),
                );
            AuditRecord::new(request, outcome.result.clone())
        })
        .collect();
    print!("{}", generate_batch_summary(&records));

    let output = output.unwrap_or(config.output_dir);
    let stamp = super::timestamp();
    std::fs::create_dir_all(&output)?;

    let path = output.join(format!("fluency-{stamp}.json"));
    std::fs::write(&path, serde_json::to_string_pretty(&summary)?)?;
    eprintln!("\nResults saved to: {}", path.display());

    let path = output.join(format!("rows-{stamp}.json"));
    write_json_report(&BatchReport::new(records), &path)?;
    eprintln!("Audit records: {}", path.display());

    Ok(())
}

/// Collect `round<R>-row<N>.{pcm,raw,wav}` files, ordered by round then row.
fn scan_recordings(dir: &Path) -> Result<Vec<RowRecording>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read recordings directory: {}", dir.display()))?;

    let mut found = Vec::new();
    for entry in entries {
        let path = entry?.path();
        let Some((round, row)) = parse_recording_name(&path) else {
            tracing::debug!("skipping {}", path.display());
            continue;
        };
        found.push((round, row, path));
    }
    found.sort_by_key(|(round, row, _)| (*round, *row));

    found
        .into_iter()
        .map(|(round, row, path)| {
            let recording = load_recording(&path)?;
            Ok(RowRecording {
                round,
                row_index: row - 1,
                audio: Arc::from(recording.pcm),
                sample_rate: recording.sample_rate,
            })
        })
        .collect()
}

fn parse_recording_name(path: &Path) -> Option<(u8, usize)> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    if !matches!(ext.as_str(), "pcm" | "raw" | "wav") {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    let (round, row) = stem.strip_prefix("round")?.split_once("-row")?;
    let round: u8 = round.parse().ok()?;
    let row: usize = row.parse().ok()?;
    (row >= 1).then_some((round, row))
}

/// Sheet row a `round<R>-row<N>` job id refers to.
fn row_for<'a>(job_id: &str, reference: &'a ReferenceSet) -> Option<&'a CharacterRow> {
    job_id
        .split_once("-row")
        .and_then(|(_, n)| n.parse::<usize>().ok())
        .and_then(|n| n.checked_sub(1))
        .and_then(|i| reference.row(i))
}
