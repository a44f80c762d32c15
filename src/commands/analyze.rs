//! Analyze command handler
//!
//! Uses the AnalyzerService facade to run one engagement:
//! 1. Load config and apply CLI overrides
//! 2. Build the model backend
//! 3. Read every transcript
//! 4. Analyze calls in parallel and aggregate
//! 5. Write the JSON result

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};

use callscope::analyzer::{create_backend, AnalyzeOptions, AnalyzerService, CancellationToken};
use callscope::config::BackendKind;

use super::{load_config, load_transcripts};

/// Flags of the `analyze` subcommand.
pub struct AnalyzeArgs<'a> {
    pub config: Option<&'a Path>,
    pub files: &'a [PathBuf],
    pub output: Option<&'a Path>,
    pub workers: Option<usize>,
    pub deadline_secs: Option<u64>,
    pub backend: Option<BackendKind>,
    pub quiet: bool,
}

/// Analyze the transcripts of one engagement.
#[cfg(not(tarpaulin_include))]
pub fn handle(args: AnalyzeArgs<'_>) -> Result<()> {
    let mut config = load_config(args.config)?;
    if let Some(kind) = args.backend {
        config.backend.kind = kind;
    }
    if let Some(workers) = args.workers {
        config.analysis.workers = Some(workers);
    }

    let transcripts = load_transcripts(args.files)?;

    let backend = create_backend(&config.backend).context("Failed to set up the model backend")?;
    let service = AnalyzerService::new(config.analysis, backend)?;

    let cancel = match args.deadline_secs {
        Some(secs) => CancellationToken::with_deadline(Duration::from_secs(secs)),
        None => CancellationToken::new(),
    };
    let handler_token = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        tracing::warn!("Interrupted, finishing without further retries");
        handler_token.cancel();
    }) {
        tracing::warn!(error = %e, "Could not install Ctrl-C handler");
    }

    let options = AnalyzeOptions::default().cancel_token(cancel);
    let run = service.analyze_engagement(transcripts, &options, |completed, total| {
        tracing::info!(completed, total, "Call finished");
    })?;

    let json = serde_json::to_string_pretty(&run).context("Failed to serialize analysis")?;
    match args.output {
        Some(path) => {
            fs::write(path, json).with_context(|| format!("Failed to write {:?}", path))?;
            if !args.quiet {
                eprintln!("Wrote engagement report to {}", path.display());
            }
        }
        None => println!("{}", json),
    }

    if !args.quiet {
        eprint!("{}", run.usage.format_summary());
    }
    Ok(())
}
