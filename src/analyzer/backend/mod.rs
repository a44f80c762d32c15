//! Model backends for LLM analysis.
//!
//! This module provides the Strategy pattern for different ways of reaching
//! a model. Each backend knows how to send one request and report failures
//! in a uniform shape.
//!
//! # Supported Backends
//!
//! - **Anthropic API**: `POST /v1/messages` over HTTPS (`reqwest` blocking client)
//! - **Claude CLI**: `claude --print --output-format json --model <m> -p -`
//!
//! # Design
//!
//! The `ModelBackend` trait defines the interface for all backends.
//! Backends are stateless and can be used concurrently from multiple threads.

mod anthropic;
mod claude;

pub use anthropic::AnthropicBackend;
pub use claude::ClaudeCliBackend;

use crate::config::{BackendConfig, BackendKind};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Result type for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;

/// One request to the model endpoint.
#[derive(Debug, Clone)]
pub struct ModelRequest<'a> {
    pub model: &'a str,
    pub prompt: &'a str,
    pub max_output_tokens: u32,
    pub temperature: f32,
}

/// Token usage reported by the endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    pub fn is_empty(&self) -> bool {
        self.input_tokens == 0 && self.output_tokens == 0
    }
}

/// Raw text reply from the model plus its usage.
#[derive(Debug, Clone)]
pub struct ModelResponse {
    pub text: String,
    pub usage: TokenUsage,
}

/// Trait for model backends (Strategy pattern).
///
/// Implementors must be thread-safe as they may be used from multiple
/// threads during parallel transcript processing.
pub trait ModelBackend: Send + Sync {
    /// Human-readable name for logging.
    fn name(&self) -> &'static str;

    /// Send one request and return the model's raw reply.
    fn complete(&self, request: &ModelRequest<'_>) -> BackendResult<ModelResponse>;
}

/// Build the backend selected in the configuration.
pub fn create_backend(config: &BackendConfig) -> BackendResult<Arc<dyn ModelBackend>> {
    let timeout = Duration::from_secs(config.request_timeout_secs);
    match config.kind {
        BackendKind::Api => {
            let api_key = std::env::var(&config.api_key_env).map_err(|_| {
                BackendError::Auth(format!("environment variable {} is not set", config.api_key_env))
            })?;
            let backend = AnthropicBackend::new(&config.api_base_url, api_key, timeout)?;
            Ok(Arc::new(backend))
        }
        BackendKind::Cli => Ok(Arc::new(ClaudeCliBackend::with_extra_args(
            timeout,
            config.cli_extra_args.clone(),
        ))),
    }
}

/// Errors from model backends.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Rate limited: {0}")]
    RateLimited(RateLimitInfo),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Authentication failed: {}", truncate_stderr(.0))]
    Auth(String),

    #[error("Request rejected (HTTP {status}): {}", truncate_stderr(message))]
    Request { status: u16, message: String },

    #[error("Malformed response: {}", truncate_stderr(.0))]
    MalformedResponse(String),

    #[error("Model CLI not found: {0}")]
    NotAvailable(String),

    #[error("Exit code {code}: {}", truncate_stderr(stderr))]
    ExitCode { code: i32, stderr: String },

    #[error("Failed to extract JSON from response")]
    JsonExtraction { response: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Rate limit information extracted from an endpoint reply.
#[derive(Debug, Clone)]
pub struct RateLimitInfo {
    /// When the rate limit resets (if provided by the endpoint)
    pub retry_after: Option<Duration>,
    /// Human-readable message
    pub message: String,
}

impl std::fmt::Display for RateLimitInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(retry_after) = self.retry_after {
            write!(f, "{} (retry after {:?})", self.message, retry_after)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

impl BackendError {
    /// Extract wait duration for retry logic.
    ///
    /// Uses the endpoint-provided retry_after if available, otherwise falls
    /// back to the provided default duration.
    pub fn wait_duration(&self, fallback: Duration) -> Duration {
        match self {
            BackendError::RateLimited(info) => info.retry_after.unwrap_or(fallback),
            _ => fallback,
        }
    }
}

/// Claude CLI wrapper format when using `--output-format json`.
///
/// The CLI wraps the actual response in a metadata envelope:
/// `{"type":"result","result":"...","is_error":false,"usage":{...}}`
#[derive(Debug, Deserialize)]
pub(crate) struct ClaudeWrapper {
    #[serde(rename = "type")]
    pub response_type: Option<String>,
    pub result: Option<String>,
    pub is_error: Option<bool>,
    pub structured_output: Option<serde_json::Value>,
    pub usage: Option<WrapperUsage>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WrapperUsage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
}

/// Extract a JSON document of type `T` from a model reply.
///
/// Handles multiple response formats:
/// 1. Claude CLI wrapper (`{"type":"result","result":"..."}`)
/// 2. Direct JSON object
/// 3. JSON in markdown code blocks
/// 4. JSON embedded in text
pub fn extract_json<T: DeserializeOwned>(response: &str) -> BackendResult<T> {
    let trimmed = response.trim();

    if let Ok(wrapper) = serde_json::from_str::<ClaudeWrapper>(trimmed) {
        if wrapper.response_type.as_deref() == Some("result") {
            if wrapper.is_error == Some(true) {
                return Err(BackendError::JsonExtraction {
                    response: wrapper
                        .result
                        .unwrap_or_else(|| "Claude returned an error".to_string()),
                });
            }

            if let Some(structured) = wrapper.structured_output {
                return serde_json::from_value(structured).map_err(|e| {
                    BackendError::JsonExtraction {
                        response: e.to_string(),
                    }
                });
            }

            if let Some(inner) = wrapper.result {
                if !inner.is_empty() {
                    return extract_json_inner(&inner);
                }
            }
        }
    }

    extract_json_inner(trimmed)
}

/// Inner JSON extraction logic (handles direct JSON, code blocks, text-embedded).
fn extract_json_inner<T: DeserializeOwned>(response: &str) -> BackendResult<T> {
    let trimmed = response.trim();

    if let Ok(parsed) = serde_json::from_str(trimmed) {
        return Ok(parsed);
    }

    // Check code blocks before object boundaries so fenced replies with
    // surrounding prose still parse
    if let Some(json_str) = extract_from_code_block(trimmed) {
        if let Ok(parsed) = serde_json::from_str(json_str) {
            return Ok(parsed);
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            if let Ok(parsed) = serde_json::from_str(&trimmed[start..=end]) {
                return Ok(parsed);
            }
        }
    }

    Err(BackendError::JsonExtraction {
        response: response.to_string(),
    })
}

/// Extract JSON from markdown code blocks.
fn extract_from_code_block(text: &str) -> Option<&str> {
    let patterns = ["```json\n", "```json\r\n", "```\n", "```\r\n"];

    for pattern in patterns {
        if let Some(start) = text.find(pattern) {
            let json_start = start + pattern.len();
            if let Some(end) = text[json_start..].find("```") {
                return Some(&text[json_start..json_start + end]);
            }
        }
    }
    None
}

/// Unwrap the text payload from a Claude CLI envelope, if present.
pub(crate) fn unwrap_cli_result(response: &str) -> Option<(String, TokenUsage)> {
    let wrapper = serde_json::from_str::<ClaudeWrapper>(response.trim()).ok()?;
    if wrapper.response_type.as_deref() != Some("result") || wrapper.is_error == Some(true) {
        return None;
    }
    let usage = wrapper
        .usage
        .map(|u| TokenUsage {
            input_tokens: u.input_tokens,
            output_tokens: u.output_tokens,
        })
        .unwrap_or_default();
    let text = match wrapper.structured_output {
        Some(value) => value.to_string(),
        None => wrapper.result?,
    };
    Some((text, usage))
}

/// Parse rate limit info from an error message or CLI stderr.
///
/// Endpoints signal rate limiting differently. This function attempts
/// to extract retry-after timing from various formats.
pub fn parse_rate_limit_info(stderr: &str) -> Option<RateLimitInfo> {
    let stderr_lower = stderr.to_lowercase();

    let is_rate_limited = stderr_lower.contains("rate limit")
        || stderr_lower.contains("rate_limit")
        || stderr_lower.contains("throttled")
        || stderr_lower.contains("429")
        || stderr_lower.contains("too many requests")
        || stderr_lower.contains("quota exceeded");

    if !is_rate_limited {
        return None;
    }

    let retry_after = extract_retry_seconds(&stderr_lower).map(Duration::from_secs);

    Some(RateLimitInfo {
        retry_after,
        message: stderr.lines().next().unwrap_or("Rate limited").to_string(),
    })
}

/// Extract retry delay from various formats.
///
/// Parses common rate-limit retry timing patterns without regex dependency.
fn extract_retry_seconds(stderr: &str) -> Option<u64> {
    let extract_after = |text: &str, keyword: &str| -> Option<u64> {
        text.find(keyword).and_then(|pos| {
            let after = &text[pos + keyword.len()..];
            extract_first_number(after)
        })
    };

    // "retry after 45 seconds" or "retry-after: 45"
    for keyword in ["retry after ", "retry-after", "retry_after", "retry in "] {
        if let Some(secs) = extract_after(stderr, keyword) {
            return Some(secs);
        }
    }

    // "wait 30 seconds"
    if let Some(secs) = extract_after(stderr, "wait ") {
        return Some(secs);
    }

    None
}

/// Extract the first number from a string.
fn extract_first_number(s: &str) -> Option<u64> {
    let mut num_str = String::new();

    for c in s.chars() {
        if c.is_ascii_digit() {
            num_str.push(c);
        } else if !num_str.is_empty() {
            break;
        } else if !c.is_whitespace() && c != ':' {
            // Only whitespace and colons may precede the number
            return None;
        }
    }

    num_str.parse().ok()
}

/// Truncate an error body for display.
///
/// Takes the first line and limits to 200 characters for readability.
pub(crate) fn truncate_stderr(stderr: &str) -> String {
    let first_line = stderr.lines().next().unwrap_or("").trim();
    if first_line.chars().count() <= 200 {
        first_line.to_string()
    } else {
        let head: String = first_line.chars().take(200).collect();
        format!("{}...", head)
    }
}

/// Check if a command is available in PATH.
///
/// Uses platform-specific command lookup:
/// - Unix: `which` command
/// - Windows: `where` command
pub fn command_exists(command: &str) -> bool {
    #[cfg(windows)]
    let lookup_cmd = "where";
    #[cfg(not(windows))]
    let lookup_cmd = "which";

    std::process::Command::new(lookup_cmd)
        .arg(command)
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

/// Wait for child process with timeout.
///
/// Uses a simple polling approach since std::process doesn't have
/// native timeout support. Reaps the child on timeout to prevent zombies.
pub(crate) fn wait_with_timeout(
    child: &mut std::process::Child,
    timeout: Duration,
) -> std::io::Result<std::process::Output> {
    use std::thread;
    use std::time::Instant;

    let start = Instant::now();
    let poll_interval = Duration::from_millis(100);

    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                let stdout = read_pipe(child.stdout.as_mut());
                let stderr = read_pipe(child.stderr.as_mut());
                return Ok(std::process::Output {
                    status,
                    stdout,
                    stderr,
                });
            }
            Ok(None) => {
                if start.elapsed() >= timeout {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(std::io::Error::new(
                        std::io::ErrorKind::TimedOut,
                        "Process timed out",
                    ));
                }
                thread::sleep(poll_interval);
            }
            Err(e) => return Err(e),
        }
    }
}

fn read_pipe<R: std::io::Read>(pipe: Option<&mut R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(p) = pipe {
        p.read_to_end(&mut buf).ok();
    }
    buf
}
