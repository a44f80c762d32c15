//! Token budget and chunking for transcripts that exceed one model call.
//!
//! # Design
//!
//! - `TokenBudget` defines the model's context limits with safety margins
//! - `ChunkCalculator` divides a transcript into overlapping chunks
//! - `TranscriptChunk` is one slice of the transcript, addressed by byte offsets
//! - Overlap carries the tail of the previous chunk into the next one so
//!   names and pronouns resolve across the cut
//!
//! Chunk boundaries prefer paragraph breaks, then sentence ends, then line
//! breaks, then any whitespace, and only cut mid-word when nothing else fits.

use crate::analyzer::types::TokenEstimator;
use serde::Serialize;
use thiserror::Error;

/// Token budget configuration for a model.
///
/// Defines the maximum tokens the model can handle and reserves space
/// for the prompt template and expected output.
#[derive(Debug, Clone)]
pub struct TokenBudget {
    /// Context window of the model
    pub max_input_tokens: usize,
    /// Tokens reserved for the prompt template
    pub reserved_for_prompt: usize,
    /// Tokens reserved for the structured output
    pub reserved_for_output: usize,
    /// Safety margin as percentage (0.0 - 1.0)
    safety_margin_pct: f64,
}

impl TokenBudget {
    /// Create a new token budget with custom parameters.
    pub fn new(
        max_input_tokens: usize,
        reserved_for_prompt: usize,
        reserved_for_output: usize,
        safety_margin_pct: f64,
    ) -> Self {
        Self {
            max_input_tokens,
            reserved_for_prompt,
            reserved_for_output,
            safety_margin_pct,
        }
    }

    /// Budget for a model with the given context window and output allowance.
    pub fn for_model(context_window: usize, max_output_tokens: usize) -> Self {
        Self::new(context_window, 2_000, max_output_tokens, 0.15)
    }

    /// Calculate tokens available for transcript content.
    ///
    /// Subtracts reserved tokens and applies safety margin.
    pub fn available_for_content(&self) -> usize {
        let reserved = self.reserved_for_prompt + self.reserved_for_output;
        let usable = self.max_input_tokens.saturating_sub(reserved);
        (usable as f64 * (1.0 - self.safety_margin_pct)) as usize
    }

    /// Effective per-chunk budget: the configured size, capped by the window.
    pub fn chunk_budget(&self, configured_max: usize) -> usize {
        configured_max.min(self.available_for_content())
    }

    /// Whether a fully rendered prompt plus its output allowance fits the window.
    pub fn fits(&self, prompt_tokens: usize) -> bool {
        prompt_tokens + self.reserved_for_output <= self.max_input_tokens
    }
}

impl Default for TokenBudget {
    fn default() -> Self {
        Self::for_model(200_000, 4_000)
    }
}

/// Invalid chunking parameters. Always a caller misconfiguration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChunkingError {
    #[error("max_tokens must be greater than zero")]
    ZeroTokenBudget,

    #[error("overlap of {overlap_chars} chars must be smaller than the {char_budget}-char budget implied by max_tokens")]
    OverlapTooLarge {
        overlap_chars: usize,
        char_budget: usize,
    },
}

/// One slice of a transcript sized to fit a single model request.
///
/// Offsets are byte offsets into the original text and always sit on
/// char boundaries. `text` is exactly `original[start_offset..end_offset]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranscriptChunk {
    pub sequence_index: usize,
    pub text: String,
    pub start_offset: usize,
    pub end_offset: usize,
    pub estimated_tokens: usize,
    pub is_final: bool,
}

impl TranscriptChunk {
    /// Length of the chunk in bytes.
    pub fn len(&self) -> usize {
        self.end_offset - self.start_offset
    }

    pub fn is_empty(&self) -> bool {
        self.start_offset == self.end_offset
    }

    /// Bytes shared with the previous chunk.
    pub fn overlap_with(&self, previous: &TranscriptChunk) -> usize {
        previous.end_offset.saturating_sub(self.start_offset)
    }
}

/// Calculator for dividing transcripts into chunks.
#[derive(Debug, Clone, Default)]
pub struct ChunkCalculator {
    estimator: TokenEstimator,
}

impl ChunkCalculator {
    /// Create a new chunk calculator.
    pub fn new(estimator: TokenEstimator) -> Self {
        Self { estimator }
    }

    pub fn estimator(&self) -> &TokenEstimator {
        &self.estimator
    }

    /// Split `text` into chunks of at most `max_tokens` estimated tokens.
    ///
    /// Each chunk after the first begins `overlap_chars` characters before
    /// the previous chunk's end. Empty input produces no chunks.
    pub fn chunk(
        &self,
        text: &str,
        max_tokens: usize,
        overlap_chars: usize,
    ) -> Result<Vec<TranscriptChunk>, ChunkingError> {
        if max_tokens == 0 {
            return Err(ChunkingError::ZeroTokenBudget);
        }
        let char_budget = self.estimator.chars_for_tokens(max_tokens);
        if char_budget == 0 {
            return Err(ChunkingError::ZeroTokenBudget);
        }
        if overlap_chars >= char_budget {
            return Err(ChunkingError::OverlapTooLarge {
                overlap_chars,
                char_budget,
            });
        }

        if text.is_empty() {
            return Ok(Vec::new());
        }

        // Single chunk if content fits
        let total_tokens = self.estimator.estimate(text);
        if total_tokens <= max_tokens {
            return Ok(vec![TranscriptChunk {
                sequence_index: 0,
                text: text.to_string(),
                start_offset: 0,
                end_offset: text.len(),
                estimated_tokens: total_tokens,
                is_final: true,
            }]);
        }

        let mut chunks: Vec<TranscriptChunk> = Vec::new();
        let mut start = 0;

        loop {
            let end = self.next_end(text, start, max_tokens, char_budget, overlap_chars);
            let slice = &text[start..end];
            let is_final = end >= text.len();

            chunks.push(TranscriptChunk {
                sequence_index: chunks.len(),
                text: slice.to_string(),
                start_offset: start,
                end_offset: end,
                estimated_tokens: self.estimator.estimate(slice),
                is_final,
            });

            if is_final {
                break;
            }
            start = retreat_chars(text, end, overlap_chars);
        }

        Ok(chunks)
    }

    /// Pick the end of the chunk starting at `start`.
    ///
    /// The result is always past `overlap_chars + 1` characters from `start`,
    /// so the next chunk's start moves strictly forward.
    fn next_end(
        &self,
        text: &str,
        start: usize,
        max_tokens: usize,
        char_budget: usize,
        overlap_chars: usize,
    ) -> usize {
        let floor = overlap_chars + 1;
        let mut budget = char_budget;

        loop {
            let hard_end = advance_chars(text, start, budget);
            let end = if hard_end >= text.len() {
                text.len()
            } else {
                let lower = advance_chars(text, start, floor.max(budget / 2));
                find_boundary(text, lower, hard_end).unwrap_or(hard_end)
            };

            // Word-dense text can blow the token budget before the char budget.
            if self.estimator.estimate(&text[start..end]) <= max_tokens || budget <= floor {
                return end;
            }
            budget = (budget * 9 / 10).max(floor);
        }
    }
}

/// Rebuild the original text from its chunks by dropping each overlap.
pub fn reconstruct(chunks: &[TranscriptChunk]) -> String {
    let mut out = String::new();
    let mut covered: usize = 0;
    for chunk in chunks {
        let skip = covered.saturating_sub(chunk.start_offset);
        out.push_str(&chunk.text[skip..]);
        covered = chunk.end_offset;
    }
    out
}

/// Byte offset `n` characters after `from`, or the end of the text.
fn advance_chars(text: &str, from: usize, n: usize) -> usize {
    text[from..]
        .char_indices()
        .nth(n)
        .map(|(idx, _)| from + idx)
        .unwrap_or(text.len())
}

/// Byte offset `n` characters before `to`, or zero.
fn retreat_chars(text: &str, to: usize, n: usize) -> usize {
    if n == 0 {
        return to;
    }
    text[..to]
        .char_indices()
        .rev()
        .nth(n - 1)
        .map(|(idx, _)| idx)
        .unwrap_or(0)
}

/// Best split point in `text[lower..upper]`, as an absolute byte offset.
fn find_boundary(text: &str, lower: usize, upper: usize) -> Option<usize> {
    if lower >= upper {
        return None;
    }
    let window = &text[lower..upper];

    if let Some(pos) = window.rfind("\n\n") {
        return Some(lower + pos + 2);
    }

    let mut sentence_end = None;
    let mut chars = window.char_indices().peekable();
    while let Some((_, c)) = chars.next() {
        if matches!(c, '.' | '?' | '!') {
            if let Some(&(next_idx, next)) = chars.peek() {
                if next.is_whitespace() {
                    sentence_end = Some(next_idx + next.len_utf8());
                }
            }
        }
    }
    if let Some(pos) = sentence_end {
        return Some(lower + pos);
    }

    if let Some(pos) = window.rfind('\n') {
        return Some(lower + pos + 1);
    }

    window
        .char_indices()
        .rev()
        .find(|(_, c)| c.is_whitespace())
        .map(|(idx, c)| lower + idx + c.len_utf8())
}
