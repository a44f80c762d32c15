//! User-friendly error handling for analysis operations.
//!
//! `AnalysisError` carries the whole failure taxonomy:
//!
//! - Transient endpoint failures (`RateLimited`, `Network`) and local parse
//!   failures (`ModelResponse`) are retried by the orchestrator
//! - `Auth` and `Request` are fatal and surface immediately
//! - `Unavailable` and `Cancelled` are terminal for one unit of work and
//!   degrade it to a placeholder
//! - `EmptyEngagement` and `Validation` fail the aggregation step

use super::backend::{BackendError, RateLimitInfo};
use super::chunk::ChunkingError;
use super::task::TaskKind;
use std::time::Duration;
use thiserror::Error;

/// Error type for analysis operations.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Invalid chunking parameters: {0}")]
    Chunking(#[from] ChunkingError),

    /// The reply could not be parsed into the task's schema.
    #[error("Malformed {task} response: {reason}. Response preview: {preview}")]
    ModelResponse {
        task: TaskKind,
        reason: String,
        preview: String,
    },

    #[error("{0}")]
    RateLimited(RateLimitInfo),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication failed: {0}. Check the API key.")]
    Auth(String),

    #[error("Request rejected: {0}")]
    Request(String),

    /// Retries and the fallback model were exhausted.
    #[error(
        "Analysis unavailable for {task} (text {fingerprint}) after {attempts} attempts: {last_error}"
    )]
    Unavailable {
        task: TaskKind,
        fingerprint: String,
        attempts: u32,
        last_error: Box<AnalysisError>,
    },

    #[error("Analysis of {task} cancelled after {attempts} attempts")]
    Cancelled { task: TaskKind, attempts: u32 },

    #[error("Transcript '{call_id}' is empty")]
    EmptyTranscript { call_id: String },

    #[error("No call analyses to aggregate")]
    EmptyEngagement,

    #[error("Invalid analysis for call '{call_id}': {reason}")]
    Validation { call_id: String, reason: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A per-transcript failure with the call it belongs to.
    #[error("Analysis of call '{call_id}' failed")]
    Call {
        call_id: String,
        #[source]
        source: Box<AnalysisError>,
    },
}

impl AnalysisError {
    /// Map an endpoint failure into the analysis taxonomy.
    pub fn from_backend_error(task: TaskKind, error: BackendError) -> Self {
        match error {
            BackendError::RateLimited(info) => AnalysisError::RateLimited(info),
            BackendError::Network(msg) => AnalysisError::Network(msg),
            BackendError::Timeout(duration) => {
                AnalysisError::Network(format!("request timed out after {}s", duration.as_secs()))
            }
            BackendError::ExitCode { .. } | BackendError::Io(_) => {
                AnalysisError::Network(error.to_string())
            }
            BackendError::Auth(msg) => AnalysisError::Auth(msg),
            BackendError::Request { .. } | BackendError::NotAvailable(_) => {
                AnalysisError::Request(error.to_string())
            }
            BackendError::MalformedResponse(body) => AnalysisError::ModelResponse {
                task,
                reason: "endpoint returned a malformed body".to_string(),
                preview: truncate_response(&body, 100),
            },
            BackendError::JsonExtraction { response } => AnalysisError::ModelResponse {
                task,
                reason: "no JSON found in response".to_string(),
                preview: truncate_response(&response, 100),
            },
        }
    }

    /// Build a schema failure with a short preview of the reply.
    pub fn model_response(task: TaskKind, reason: impl Into<String>, response: &str) -> Self {
        AnalysisError::ModelResponse {
            task,
            reason: reason.into(),
            preview: truncate_response(response, 100),
        }
    }

    /// Check if this error is worth another attempt.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            AnalysisError::RateLimited(_)
                | AnalysisError::Network(_)
                | AnalysisError::ModelResponse { .. }
        )
    }

    /// Errors that must abort the caller instead of degrading.
    pub fn is_fatal(&self) -> bool {
        match self {
            AnalysisError::Auth(_) | AnalysisError::Request(_) => true,
            AnalysisError::Call { source, .. } => source.is_fatal(),
            _ => false,
        }
    }

    /// Terminal failures of one unit of work that degrade to a placeholder.
    pub fn is_degradable(&self) -> bool {
        matches!(
            self,
            AnalysisError::Unavailable { .. } | AnalysisError::Cancelled { .. }
        )
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, AnalysisError::RateLimited(_))
    }

    /// Get suggested retry delay for rate limiting.
    pub fn retry_after(&self) -> Option<Duration> {
        if let AnalysisError::RateLimited(info) = self {
            info.retry_after
        } else {
            None
        }
    }
}

/// Truncate a response string for display.
fn truncate_response(response: &str, max_chars: usize) -> String {
    let trimmed = response.trim();
    if trimmed.chars().count() <= max_chars {
        trimmed.to_string()
    } else {
        let head: String = trimmed.chars().take(max_chars).collect();
        format!("{}...", head)
    }
}
