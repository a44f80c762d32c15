//! Analysis configuration consumed by the analyzer.
//!
//! These are pure data containers (serde structs + validation) with no
//! analyzer-specific dependencies, so they live in the config module.

use serde::{Deserialize, Serialize};

/// Characters per token assumed when checking the overlap against the chunk size.
const CHARS_PER_TOKEN: usize = 4;

/// Tuning for chunking, retries, rate limiting and model requests.
///
/// Every field has a default so a partial `[analysis]` table is enough.
/// CLI flags take priority over config, which overrides defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Model tried first for every task
    #[serde(default = "default_primary_model")]
    pub primary_model: String,
    /// Model used once the primary exhausts its retries
    #[serde(default = "default_fallback_model")]
    pub fallback_model: String,
    #[serde(default = "default_max_tokens_per_chunk")]
    pub max_tokens_per_chunk: usize,
    /// Characters of the previous chunk repeated at the start of the next
    #[serde(default = "default_chunk_overlap_chars")]
    pub chunk_overlap_chars: usize,
    #[serde(default = "default_base_retry_delay_ms")]
    pub base_retry_delay_ms: u64,
    /// Retries per model after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Shared token budget across all concurrent transcripts
    #[serde(default = "default_rate_limit_tokens_per_minute")]
    pub rate_limit_tokens_per_minute: usize,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Context window of the models, in tokens
    #[serde(default = "default_context_window")]
    pub context_window: usize,
    /// Number of transcripts analyzed in parallel (None = auto-scale)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,
}

pub fn default_primary_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}

pub fn default_fallback_model() -> String {
    "claude-3-7-sonnet-20250219".to_string()
}

pub fn default_max_tokens_per_chunk() -> usize {
    8_000
}

pub fn default_chunk_overlap_chars() -> usize {
    500
}

pub fn default_base_retry_delay_ms() -> u64 {
    5_000
}

pub fn default_max_retries() -> u32 {
    3
}

pub fn default_max_delay_ms() -> u64 {
    60_000
}

pub fn default_rate_limit_tokens_per_minute() -> usize {
    40_000
}

pub fn default_max_output_tokens() -> u32 {
    4_000
}

pub fn default_temperature() -> f32 {
    0.3
}

pub fn default_context_window() -> usize {
    200_000
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            primary_model: default_primary_model(),
            fallback_model: default_fallback_model(),
            max_tokens_per_chunk: default_max_tokens_per_chunk(),
            chunk_overlap_chars: default_chunk_overlap_chars(),
            base_retry_delay_ms: default_base_retry_delay_ms(),
            max_retries: default_max_retries(),
            max_delay_ms: default_max_delay_ms(),
            rate_limit_tokens_per_minute: default_rate_limit_tokens_per_minute(),
            max_output_tokens: default_max_output_tokens(),
            temperature: default_temperature(),
            context_window: default_context_window(),
            workers: None,
        }
    }
}

impl AnalysisConfig {
    /// Validate configuration values.
    ///
    /// Returns `Ok(())` if all values are within acceptable bounds,
    /// or an error describing the first invalid value found.
    pub fn validate(&self) -> Result<(), String> {
        if self.primary_model.trim().is_empty() {
            return Err("analysis.primary_model must not be empty".to_string());
        }
        if self.fallback_model.trim().is_empty() {
            return Err("analysis.fallback_model must not be empty".to_string());
        }
        if self.max_tokens_per_chunk < 100 {
            return Err(format!(
                "analysis.max_tokens_per_chunk {} is below minimum (100)",
                self.max_tokens_per_chunk
            ));
        }
        let char_budget = self.max_tokens_per_chunk * CHARS_PER_TOKEN;
        if self.chunk_overlap_chars >= char_budget {
            return Err(format!(
                "analysis.chunk_overlap_chars {} must be below the chunk size ({} chars)",
                self.chunk_overlap_chars, char_budget
            ));
        }
        if !(0.0..=1.0).contains(&self.temperature) {
            return Err(format!(
                "analysis.temperature {} must be between 0.0 and 1.0",
                self.temperature
            ));
        }
        if self.max_retries > 10 {
            return Err(format!(
                "analysis.max_retries {} exceeds maximum (10)",
                self.max_retries
            ));
        }
        if self.rate_limit_tokens_per_minute == 0 {
            return Err("analysis.rate_limit_tokens_per_minute must be > 0".to_string());
        }
        if self.max_output_tokens == 0 {
            return Err("analysis.max_output_tokens must be > 0".to_string());
        }
        if self.max_output_tokens as usize >= self.context_window {
            return Err(format!(
                "analysis.max_output_tokens {} must be below context_window {}",
                self.max_output_tokens, self.context_window
            ));
        }
        if let Some(0) = self.workers {
            return Err("analysis.workers must be > 0".to_string());
        }
        if let Some(w) = self.workers {
            if w > 32 {
                return Err(format!("analysis.workers {} exceeds maximum (32)", w));
            }
        }
        Ok(())
    }
}
