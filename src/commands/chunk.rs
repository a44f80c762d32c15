//! Chunk command handler
//!
//! Previews how a transcript is split without calling a model.

use std::path::Path;

use anyhow::Result;

use callscope::analyzer::{ChunkCalculator, TokenBudget, TokenEstimator, TranscriptChunk};

use super::{load_config, load_transcript};

/// Print the chunk boundaries of one transcript.
#[cfg(not(tarpaulin_include))]
pub fn handle(
    config_path: Option<&Path>,
    file: &Path,
    max_tokens: Option<usize>,
    overlap: Option<usize>,
) -> Result<()> {
    let config = load_config(config_path)?;
    let transcript = load_transcript(file)?;

    let budget = TokenBudget::for_model(
        config.analysis.context_window,
        config.analysis.max_output_tokens as usize,
    );
    let max_tokens = budget.chunk_budget(max_tokens.unwrap_or(config.analysis.max_tokens_per_chunk));
    let overlap = overlap.unwrap_or(config.analysis.chunk_overlap_chars);

    let calculator = ChunkCalculator::new(TokenEstimator::default());
    let chunks = calculator.chunk(&transcript.text, max_tokens, overlap)?;

    println!(
        "{}: {} chunk{} (max {} tokens, {} chars overlap)",
        transcript.call_id,
        chunks.len(),
        if chunks.len() == 1 { "" } else { "s" },
        max_tokens,
        overlap
    );
    for line in describe_chunks(&chunks) {
        println!("{}", line);
    }
    Ok(())
}

/// One line per chunk: position, byte range, overlap and token estimate.
pub fn describe_chunks(chunks: &[TranscriptChunk]) -> Vec<String> {
    let total = chunks.len();
    chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| {
            let overlap = if i > 0 {
                chunk.overlap_with(&chunks[i - 1])
            } else {
                0
            };
            format!(
                "  [{}/{}] bytes {}..{}  overlap {}  ~{} tokens{}",
                chunk.sequence_index + 1,
                total,
                chunk.start_offset,
                chunk.end_offset,
                overlap,
                chunk.estimated_tokens,
                if chunk.is_final { "  (final)" } else { "" }
            )
        })
        .collect()
}
