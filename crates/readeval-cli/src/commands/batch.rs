//! The `readeval batch` command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use comfy_table::{Cell, Table};

use readeval_core::batch::{CharacterVerdict, GroupScore, LiteracyScore};
use readeval_core::reference::{load_reference, LiteracyGroup};
use readeval_ise::config::load_config_from;

use crate::audio::load_recording;

pub async fn execute(
    audio: Vec<PathBuf>,
    characters: Option<String>,
    groups: Vec<String>,
    reference_path: Option<PathBuf>,
    config_path: Option<PathBuf>,
    mock: bool,
) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;

    if let Some(list) = characters {
        anyhow::ensure!(
            audio.len() == 1,
            "--characters takes exactly one recording, got {}",
            audio.len()
        );
        let characters: Vec<String> = list
            .split(',')
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();
        anyhow::ensure!(!characters.is_empty(), "--characters is empty");

        let engine = super::build_engine(&config, mock)?;
        let recording = load_recording(&audio[0])?;
        let rate = recording.sample_rate.unwrap_or(config.evaluation.sample_rate);
        let verdicts = engine
            .evaluate_batch_at(&recording.pcm, rate, &characters)
            .await;
        print_verdicts(&verdicts);
        return Ok(());
    }

    anyhow::ensure!(!groups.is_empty(), "pass --characters or at least one --group");
    anyhow::ensure!(
        groups.len() == audio.len(),
        "{} group(s) but {} recording(s); pass one --audio per --group",
        groups.len(),
        audio.len()
    );

    let reference = match &reference_path {
        Some(path) => load_reference(path)?,
        None => config.reference_set()?,
    };
    let selected: Vec<&LiteracyGroup> = groups
        .iter()
        .map(|id| {
            reference
                .group(id)
                .with_context(|| format!("unknown literacy group: {id}"))
        })
        .collect::<Result<_>>()?;

    let engine = super::build_engine(&config, mock)?;
    let mut scores = Vec::with_capacity(selected.len());
    for (group, path) in selected.into_iter().zip(&audio) {
        let recording = load_recording(path)?;
        eprintln!("Group {}: {} characters", group.id, group.characters.len());
        let rate = recording.sample_rate.unwrap_or(config.evaluation.sample_rate);
        let verdicts = engine
            .evaluate_batch_at(&recording.pcm, rate, &group.characters)
            .await;
        print_verdicts(&verdicts);
        scores.push(GroupScore::compute(group, &verdicts));
    }

    let literacy = LiteracyScore::from_groups(scores);
    let mut table = Table::new();
    table.set_header(vec!["Group", "Correct", "Coefficient", "Score"]);
    for g in &literacy.groups {
        table.add_row(vec![
            Cell::new(&g.group_id),
            Cell::new(format!("{}/{}", g.correct_characters, g.total_characters)),
            Cell::new(format!("{:.2}", g.coefficient)),
            Cell::new(format!("{:.2}", g.score)),
        ]);
    }
    println!("\n{table}");
    println!("Literacy score: {:.2}", literacy.total_score);

    Ok(())
}

fn print_verdicts(verdicts: &[CharacterVerdict]) {
    let mut table = Table::new();
    table.set_header(vec!["Character", "Correct", "Confidence", "Note"]);
    for v in verdicts {
        table.add_row(vec![
            Cell::new(&v.character),
            Cell::new(if v.is_correct { "yes" } else { "no" }),
            Cell::new(format!("{:.2}", v.confidence)),
            Cell::new(&v.message),
        ]);
    }
    println!("{table}");
}
