//! readeval-report: report generation for evaluation audit records.
//!
//! Writers for JSON batch reports, per-character CSV exports and plain-text
//! summaries.

pub mod csv;
pub mod json;
pub mod summary;

pub use csv::{generate_csv, write_csv_report};
pub use json::{write_json_report, BatchReport};
pub use summary::{generate_batch_summary, generate_summary, write_summary_report};
