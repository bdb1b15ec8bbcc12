//! Plain-text summary reports.

use anyhow::{Context, Result};
use std::fmt::Write as _;
use std::path::Path;

use readeval_core::report::AuditRecord;
use readeval_core::statistics::compute_aggregate_stats;

const RULE: &str = "------------------------------------------------------------";

fn heading(out: &mut String, title: &str) {
    let _ = writeln!(out, "\n{title}\n{RULE}");
}

/// Scores, statistics, error histogram and one line per character.
pub fn generate_summary(record: &AuditRecord) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "readeval evaluation report");
    let _ = writeln!(out, "{}", "=".repeat(RULE.len()));
    let _ = writeln!(out, "Record:   {}", record.id);
    let _ = writeln!(out, "Created:  {}", record.created_at.format("%Y-%m-%d %H:%M:%S UTC"));
    let _ = writeln!(out, "Category: {}", record.request.category);
    let _ = writeln!(out, "Text:     {}", record.request.text);

    let result = &record.result;
    if !result.success {
        let kind = result
            .failure
            .map(|k| k.to_string())
            .unwrap_or_else(|| "unknown".into());
        let _ = writeln!(out, "Outcome:  failed ({kind}): {}", result.message);
        return out;
    }
    let _ = writeln!(out, "Outcome:  success");

    let s = &result.scores;
    heading(&mut out, "Scores");
    let _ = writeln!(out, "total     {:6.2} | phone   {:6.2}", s.total, s.phone);
    let _ = writeln!(out, "tone      {:6.2} | fluency {:6.2}", s.tone, s.fluency);
    let _ = writeln!(out, "integrity {:6.2}", s.integrity);

    if let Some(utterance) = &result.utterance {
        if utterance.is_rejected {
            let _ = writeln!(out, "engine flagged the recording as rejected");
        }
        if let Some(info) = &utterance.except_info {
            let _ = writeln!(out, "exception info: {info}");
        }
    }

    if let Some(stats) = &record.statistics {
        heading(&mut out, "Statistics");
        let _ = writeln!(
            out,
            "characters {:3} | read {:3} | correct {:3} | missed {:3}",
            stats.total, stats.read, stats.correct, stats.missed
        );
        let _ = writeln!(
            out,
            "accuracy {:5.1}% | completion {:5.1}%",
            stats.accuracy_rate, stats.completion_rate
        );
        let _ = writeln!(
            out,
            "total {}ms | speech {}ms | silence {}ms | speech ratio {:.1}%",
            stats.total_ms,
            stats.speech_ms,
            stats.silence_ms,
            stats.speech_ratio()
        );
    }

    if !record.error_histogram.is_empty() {
        heading(&mut out, "Errors");
        for bucket in &record.error_histogram {
            let _ = writeln!(out, "{}: {}", bucket.description, bucket.count);
        }
    }

    if !record.characters.is_empty() {
        heading(&mut out, "Characters");
        for (i, c) in record.characters.iter().enumerate() {
            let mark = if c.is_correct {
                "ok"
            } else if c.is_read {
                "!!"
            } else {
                "--"
            };
            let _ = writeln!(
                out,
                "{:3}. {} [{}] {mark} {} | {}ms (speech {}ms, silence {}ms)",
                i + 1,
                c.character,
                c.expected_reading,
                c.status,
                c.duration_ms,
                c.speech_ms,
                c.silence_ms
            );
            if !c.actual_reading.is_empty() && c.actual_reading != c.expected_reading {
                let _ = writeln!(out, "     read as {}", c.actual_reading);
            }
        }
    }

    out
}

/// Aggregate over several records: averages and score bands.
pub fn generate_batch_summary(records: &[AuditRecord]) -> String {
    let results: Vec<_> = records.iter().map(|r| r.result.clone()).collect();
    let stats = compute_aggregate_stats(&results);

    let mut out = String::new();
    let _ = writeln!(out, "readeval batch summary");
    let _ = writeln!(out, "{}", "=".repeat(RULE.len()));
    let _ = writeln!(
        out,
        "recordings {} | evaluated {} | failed {}",
        records.len(),
        stats.evaluated,
        stats.failed
    );
    let _ = writeln!(out, "average total score {:.2}", stats.avg_total_score);
    let _ = writeln!(
        out,
        "average accuracy {:.1}% | average completion {:.1}%",
        stats.avg_accuracy_rate, stats.avg_completion_rate
    );

    heading(&mut out, "Score bands");
    for (band, count) in &stats.bands {
        let _ = writeln!(out, "{:<20} {count}", band.label());
    }

    out
}

/// Write a single-record summary to a file.
pub fn write_summary_report(record: &AuditRecord, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, generate_summary(record))
        .with_context(|| format!("failed to write summary to {}", path.display()))?;
    Ok(())
}
