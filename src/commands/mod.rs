//! Command handlers for the callscope CLI.
//!
//! Each submodule handles a specific CLI command or command group.
//! The main dispatch logic remains in main.rs.

pub mod analyze;
pub mod chunk;
pub mod completions;
pub mod config;

use anyhow::{bail, Context, Result};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use callscope::analyzer::Transcript;
use callscope::Config;

/// Extensions accepted as transcripts.
const TRANSCRIPT_EXTENSIONS: &[&str] = &["txt", "md"];

/// Load the config from `--config` or the default location.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    Config::load_or_default(path)
}

/// Read one transcript file; the file stem becomes the call id.
pub fn load_transcript(path: &Path) -> Result<Transcript> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();
    if !TRANSCRIPT_EXTENSIONS.contains(&extension.as_str()) {
        bail!(
            "Unsupported transcript {:?}: expected one of .{}",
            path,
            TRANSCRIPT_EXTENSIONS.join(", .")
        );
    }

    let call_id = path
        .file_stem()
        .and_then(|s| s.to_str())
        .with_context(|| format!("Transcript {:?} has no usable file name", path))?
        .to_string();
    let text =
        fs::read_to_string(path).with_context(|| format!("Failed to read transcript {:?}", path))?;

    Ok(Transcript::new(call_id, text))
}

/// Read every transcript of an engagement.
///
/// Files sharing a stem are told apart by their parent directory
/// (`a/call.txt` becomes `a/call`). Ids that still collide are an error,
/// raised before any analysis runs.
pub fn load_transcripts(paths: &[PathBuf]) -> Result<Vec<Transcript>> {
    let mut transcripts = paths
        .iter()
        .map(|path| load_transcript(path))
        .collect::<Result<Vec<_>>>()?;

    let mut stem_counts: HashMap<String, usize> = HashMap::new();
    for transcript in &transcripts {
        *stem_counts.entry(transcript.call_id.clone()).or_insert(0) += 1;
    }
    for (transcript, path) in transcripts.iter_mut().zip(paths) {
        if stem_counts[&transcript.call_id] < 2 {
            continue;
        }
        if let Some(parent) = path
            .parent()
            .and_then(|p| p.file_name())
            .and_then(|n| n.to_str())
        {
            transcript.call_id = format!("{}/{}", parent, transcript.call_id);
        }
    }

    let mut seen: HashMap<&str, &Path> = HashMap::new();
    for (transcript, path) in transcripts.iter().zip(paths) {
        if let Some(previous) = seen.insert(transcript.call_id.as_str(), path.as_path()) {
            bail!(
                "Transcripts {:?} and {:?} both map to call id '{}'; rename one of them",
                previous,
                path,
                transcript.call_id
            );
        }
    }
    Ok(transcripts)
}
