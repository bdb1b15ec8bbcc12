//! Loading recordings from disk.

use std::path::Path;

use anyhow::{Context, Result};

/// Engine-ready audio: 16-bit little-endian mono PCM.
pub struct Recording {
    pub pcm: Vec<u8>,
    /// Set when the file header declared one.
    pub sample_rate: Option<u32>,
}

/// Read a `.wav` file through its header, anything else as raw PCM.
pub fn load_recording(path: &Path) -> Result<Recording> {
    let is_wav = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("wav"));

    if !is_wav {
        let pcm = std::fs::read(path)
            .with_context(|| format!("failed to read audio: {}", path.display()))?;
        return Ok(Recording {
            pcm,
            sample_rate: None,
        });
    }

    let mut reader = hound::WavReader::open(path)
        .with_context(|| format!("failed to open WAV file: {}", path.display()))?;
    let spec = reader.spec();
    anyhow::ensure!(
        spec.sample_format == hound::SampleFormat::Int && spec.bits_per_sample == 16,
        "{}: only 16-bit integer WAV is supported",
        path.display()
    );

    let samples: Vec<i16> = reader
        .samples::<i16>()
        .collect::<std::result::Result<Vec<_>, _>>()
        .with_context(|| format!("failed to read WAV samples: {}", path.display()))?;

    let channels = usize::from(spec.channels.max(1));
    let pcm = samples
        .chunks(channels)
        .map(|frame| {
            let sum: i32 = frame.iter().map(|&s| i32::from(s)).sum();
            (sum / frame.len() as i32) as i16
        })
        .flat_map(i16::to_le_bytes)
        .collect();

    Ok(Recording {
        pcm,
        sample_rate: Some(spec.sample_rate),
    })
}
