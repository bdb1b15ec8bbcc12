//! Per-character CSV export.

use anyhow::{Context, Result};
use std::path::Path;

use readeval_core::report::AuditRecord;

const HEADER: [&str; 12] = [
    "index",
    "character",
    "expected_reading",
    "actual_reading",
    "read_status",
    "correctness",
    "duration_ms",
    "speech_ms",
    "silence_ms",
    "status",
    "begin_ms",
    "end_ms",
];

/// Quote a field when it contains a delimiter, quote or line break.
fn csv_field(s: &str) -> String {
    if s.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

/// One row per decoded character, numbered from 1.
pub fn generate_csv(record: &AuditRecord) -> String {
    let mut out = HEADER.join(",");
    out.push('\n');

    for (i, c) in record.characters.iter().enumerate() {
        let fields = [
            (i + 1).to_string(),
            csv_field(&c.character),
            csv_field(&c.expected_reading),
            csv_field(&c.actual_reading),
            if c.is_read { "read" } else { "missed" }.to_string(),
            if c.is_correct { "correct" } else { "incorrect" }.to_string(),
            c.duration_ms.to_string(),
            c.speech_ms.to_string(),
            c.silence_ms.to_string(),
            csv_field(&c.status),
            c.begin_ms.to_string(),
            c.end_ms.to_string(),
        ];
        out.push_str(&fields.join(","));
        out.push('\n');
    }

    out
}

/// Write the CSV export to a file.
pub fn write_csv_report(record: &AuditRecord, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, generate_csv(record))
        .with_context(|| format!("failed to write CSV report to {}", path.display()))?;
    Ok(())
}
