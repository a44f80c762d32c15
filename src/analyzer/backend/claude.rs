//! Claude CLI backend.
//!
//! Invokes `claude --print --output-format json --model <m> --tools ""`
//! with the prompt on stdin. Useful when a local CLI login is available
//! instead of an API key.

use super::{
    parse_rate_limit_info, unwrap_cli_result, wait_with_timeout, BackendError, BackendResult,
    ModelBackend, ModelRequest, ModelResponse,
};
use serde::Deserialize;
use std::process::{Command, Stdio};
use std::time::Duration;

/// Backend for the Claude CLI.
#[derive(Debug, Clone)]
pub struct ClaudeCliBackend {
    timeout: Duration,
    /// Extra CLI arguments to pass before the stdin passthrough args.
    extra_args: Vec<String>,
}

impl ClaudeCliBackend {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            extra_args: Vec::new(),
        }
    }

    /// Create a CLI backend with extra CLI arguments.
    pub fn with_extra_args(timeout: Duration, extra_args: Vec<String>) -> Self {
        Self {
            timeout,
            extra_args,
        }
    }

    fn command() -> &'static str {
        "claude"
    }

    fn build_command(&self, model: &str) -> Command {
        let mut cmd = Command::new(Self::command());
        cmd.args(["--print", "--output-format", "json", "--model", model]);
        for arg in &self.extra_args {
            cmd.arg(arg);
        }
        // "-p -" reads the prompt from stdin (avoids ARG_MAX limits)
        cmd.args(["--tools", "", "-p", "-"]);
        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd
    }
}

impl ModelBackend for ClaudeCliBackend {
    fn name(&self) -> &'static str {
        "Claude CLI"
    }

    fn complete(&self, request: &ModelRequest<'_>) -> BackendResult<ModelResponse> {
        if !super::command_exists(Self::command()) {
            return Err(BackendError::NotAvailable(
                "claude CLI not found in PATH".to_string(),
            ));
        }

        let mut child = self.build_command(request.model).spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            use std::io::Write;
            stdin.write_all(request.prompt.as_bytes())?;
        }

        let output = match wait_with_timeout(&mut child, self.timeout) {
            Ok(output) => output,
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {
                return Err(BackendError::Timeout(self.timeout))
            }
            Err(e) => return Err(BackendError::Io(e)),
        };

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !output.status.success() {
            if let Some(info) = parse_rate_limit_info(&stderr) {
                return Err(BackendError::RateLimited(info));
            }

            // The CLI may exit 1 but put error info in stdout
            let error_msg = extract_error_from_claude_response(&stdout).unwrap_or(stderr);
            if let Some(info) = parse_rate_limit_info(&error_msg) {
                return Err(BackendError::RateLimited(info));
            }

            return Err(BackendError::ExitCode {
                code: output.status.code().unwrap_or(-1),
                stderr: error_msg,
            });
        }

        parse_cli_output(&stdout)
    }
}

/// Turn successful CLI stdout into a model response.
///
/// The JSON envelope carries the text and usage. Bare text (older CLI
/// versions or `--output-format text`) is passed through with empty usage.
fn parse_cli_output(stdout: &str) -> BackendResult<ModelResponse> {
    if let Some(error) = extract_cli_error(stdout) {
        if let Some(info) = parse_rate_limit_info(&error) {
            return Err(BackendError::RateLimited(info));
        }
        return Err(BackendError::MalformedResponse(error));
    }

    if let Some((text, usage)) = unwrap_cli_result(stdout) {
        if text.trim().is_empty() {
            return Err(BackendError::MalformedResponse(
                "CLI returned an empty result".to_string(),
            ));
        }
        return Ok(ModelResponse { text, usage });
    }

    if stdout.trim().is_empty() {
        return Err(BackendError::MalformedResponse(
            "CLI produced no output".to_string(),
        ));
    }

    Ok(ModelResponse {
        text: stdout.to_string(),
        usage: Default::default(),
    })
}

/// Claude CLI wrapper format for error extraction.
#[derive(Debug, Deserialize)]
struct ClaudeErrorWrapper {
    is_error: Option<bool>,
    result: Option<String>,
}

/// Error message from an envelope flagged `is_error`, if any.
fn extract_cli_error(stdout: &str) -> Option<String> {
    let wrapper: ClaudeErrorWrapper = serde_json::from_str(stdout.trim()).ok()?;
    if wrapper.is_error == Some(true) {
        Some(
            wrapper
                .result
                .unwrap_or_else(|| "Claude returned an error".to_string()),
        )
    } else {
        None
    }
}

/// Extract error message from Claude's JSON response wrapper.
fn extract_error_from_claude_response(stdout: &str) -> Option<String> {
    let wrapper: ClaudeErrorWrapper = serde_json::from_str(stdout.trim()).ok()?;

    if wrapper.is_error == Some(true) {
        wrapper
            .result
            .or_else(|| Some("Claude returned an error".to_string()))
    } else {
        wrapper.result.filter(|r| !r.is_empty())
    }
}
