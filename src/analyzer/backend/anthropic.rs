//! Anthropic Messages API backend.
//!
//! Sends `POST {base_url}/v1/messages` with a blocking `reqwest` client and
//! maps HTTP failures onto `BackendError` so the retry layer can tell
//! transient failures from fatal ones.

use super::{
    parse_rate_limit_info, BackendError, BackendResult, ModelBackend, ModelRequest, ModelResponse,
    RateLimitInfo, TokenUsage,
};
use reqwest::blocking::Client;
use reqwest::header::RETRY_AFTER;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const API_VERSION: &str = "2023-06-01";

/// Backend for the Anthropic HTTP API.
#[derive(Debug, Clone)]
pub struct AnthropicBackend {
    client: Client,
    base_url: String,
    api_key: String,
    timeout: Duration,
}

impl AnthropicBackend {
    pub fn new(base_url: &str, api_key: String, timeout: Duration) -> BackendResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            timeout,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/messages", self.base_url)
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: String,
}

impl ModelBackend for AnthropicBackend {
    fn name(&self) -> &'static str {
        "Anthropic API"
    }

    fn complete(&self, request: &ModelRequest<'_>) -> BackendResult<ModelResponse> {
        let body = MessagesRequest {
            model: request.model,
            max_tokens: request.max_output_tokens,
            temperature: request.temperature,
            messages: vec![Message {
                role: "user",
                content: request.prompt,
            }],
        };

        let response = self
            .client
            .post(self.endpoint())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    BackendError::Timeout(self.timeout)
                } else {
                    BackendError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        let text = response
            .text()
            .map_err(|e| BackendError::Network(format!("failed to read response body: {}", e)))?;

        if !(200..300).contains(&status) {
            return Err(classify_status(status, &text, retry_after));
        }

        parse_messages_response(&text)
    }
}

/// Map a non-success HTTP status onto the backend error taxonomy.
pub(crate) fn classify_status(status: u16, body: &str, retry_after: Option<Duration>) -> BackendError {
    let message = serde_json::from_str::<ApiErrorBody>(body)
        .map(|b| b.error.message)
        .unwrap_or_else(|_| body.trim().to_string());

    match status {
        429 => {
            let retry_after =
                retry_after.or_else(|| parse_rate_limit_info(&message).and_then(|i| i.retry_after));
            BackendError::RateLimited(RateLimitInfo {
                retry_after,
                message: if message.is_empty() {
                    "Too many requests".to_string()
                } else {
                    message
                },
            })
        }
        401 | 403 => BackendError::Auth(message),
        408 => BackendError::Network(format!("HTTP {}: {}", status, message)),
        500..=599 => BackendError::Network(format!("HTTP {}: {}", status, message)),
        _ => BackendError::Request { status, message },
    }
}

/// Pull the text blocks and usage out of a Messages API reply.
pub(crate) fn parse_messages_response(body: &str) -> BackendResult<ModelResponse> {
    let parsed: MessagesResponse = serde_json::from_str(body)
        .map_err(|_| BackendError::MalformedResponse(body.to_string()))?;

    let text = parsed
        .content
        .iter()
        .filter(|block| block.block_type == "text")
        .filter_map(|block| block.text.as_deref())
        .collect::<Vec<_>>()
        .join("");

    if text.trim().is_empty() {
        return Err(BackendError::MalformedResponse(
            "response contained no text content".to_string(),
        ));
    }

    let usage = parsed
        .usage
        .map(|u| TokenUsage {
            input_tokens: u.input_tokens,
            output_tokens: u.output_tokens,
        })
        .unwrap_or_default();

    Ok(ModelResponse { text, usage })
}
