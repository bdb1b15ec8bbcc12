//! The `readeval validate` command.

use std::path::PathBuf;

use anyhow::Result;

use readeval_core::reference::{load_reference, validate_reference, ReferenceSet};

pub fn execute(reference_path: Option<PathBuf>) -> Result<()> {
    let set = match &reference_path {
        Some(path) => load_reference(path)?,
        None => ReferenceSet::builtin()?,
    };

    println!(
        "Reference set: {} ({} rows, {} groups)",
        set.name,
        set.rows.len(),
        set.groups.len()
    );

    let warnings = validate_reference(&set);
    for w in &warnings {
        println!("  [{}] WARNING: {}", w.location, w.message);
    }

    if warnings.is_empty() {
        println!("Reference set valid.");
    } else {
        println!("\n{} warning(s) found.", warnings.len());
    }

    Ok(())
}
