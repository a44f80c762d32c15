//! Reliable single-call analysis on top of a flaky endpoint.
//!
//! `RetryOrchestrator::analyze` runs the per-model attempt loop:
//!
//! ```text
//! primary: attempt -> ok ............................. Success
//!                  -> retriable -> backoff -> attempt (up to 1 + max_retries)
//!                  -> fatal ............................ Failure (immediate)
//!          exhausted -> switch once to fallback, attempt counter restarts
//! fallback: same loop; exhausted ...................... Unavailable
//! ```
//!
//! Every attempt first reserves its estimated token cost from the shared
//! `RateLimiter`. The cancellation token is checked before each attempt
//! and during every backoff sleep.

use super::cancel::CancellationToken;
use super::error::AnalysisError;
use super::invoker::{ModelInvoker, PreparedPrompt};
use super::limiter::RateLimiter;
use super::task::{SegmentPosition, StructuredResult, TaskKind};
use super::tracker::{ModelRole, RetryPolicy, UsageCounter};
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Primary and fallback model names.
#[derive(Debug, Clone)]
pub struct ModelPair {
    pub primary: String,
    pub fallback: String,
}

impl ModelPair {
    pub fn new(primary: impl Into<String>, fallback: impl Into<String>) -> Self {
        Self {
            primary: primary.into(),
            fallback: fallback.into(),
        }
    }

    /// Models to try in order; the fallback is skipped if it repeats the primary.
    fn sequence(&self) -> Vec<(ModelRole, &str)> {
        let mut models = vec![(ModelRole::Primary, self.primary.as_str())];
        if !self.fallback.trim().is_empty() && self.fallback != self.primary {
            models.push((ModelRole::Fallback, self.fallback.as_str()));
        }
        models
    }
}

/// Outcome of the attempt loop against one model.
enum ModelOutcome {
    Success(StructuredResult),
    Exhausted(AnalysisError),
}

/// Wraps `ModelInvoker` with backoff, proactive rate limiting and
/// primary-to-fallback switching.
pub struct RetryOrchestrator {
    invoker: ModelInvoker,
    models: ModelPair,
    policy: RetryPolicy,
    limiter: Arc<RateLimiter>,
    usage: Arc<UsageCounter>,
    cancel: CancellationToken,
}

impl RetryOrchestrator {
    pub fn new(
        invoker: ModelInvoker,
        models: ModelPair,
        policy: RetryPolicy,
        limiter: Arc<RateLimiter>,
        usage: Arc<UsageCounter>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            invoker,
            models,
            policy,
            limiter,
            usage,
            cancel,
        }
    }

    pub fn usage(&self) -> &Arc<UsageCounter> {
        &self.usage
    }

    /// Whether the rendered prompt for `text` fits the context window.
    pub fn fits(&self, task: TaskKind, text: &str) -> bool {
        self.invoker.prepare(task, text, None).is_ok()
    }

    /// Analyze a whole text with `task`.
    pub fn analyze(&self, text: &str, task: TaskKind) -> Result<StructuredResult, AnalysisError> {
        self.run(text, task, None)
    }

    /// Analyze one segment of a longer transcript.
    pub fn analyze_segment(
        &self,
        text: &str,
        task: TaskKind,
        segment: SegmentPosition,
    ) -> Result<StructuredResult, AnalysisError> {
        self.run(text, task, Some(segment))
    }

    fn run(
        &self,
        text: &str,
        task: TaskKind,
        segment: Option<SegmentPosition>,
    ) -> Result<StructuredResult, AnalysisError> {
        let prompt = self.invoker.prepare(task, text, segment)?;
        let cost = prompt.estimated_tokens + self.invoker.settings().max_output_tokens as usize;

        let mut total_attempts = 0u32;
        let mut last_error: Option<AnalysisError> = None;

        for (position, (role, model)) in self.models.sequence().into_iter().enumerate() {
            if position > 0 {
                self.usage.record_fallback_switch();
                tracing::warn!(
                    task = %task,
                    primary = %self.models.primary,
                    fallback = model,
                    "Primary model exhausted its retries, switching to fallback"
                );
            }

            match self.attempt_model(&prompt, role, model, cost, &mut total_attempts)? {
                ModelOutcome::Success(result) => return Ok(result),
                ModelOutcome::Exhausted(err) => last_error = Some(err),
            }
        }

        self.usage.record_unavailable();
        let last_error = last_error.unwrap_or_else(|| {
            AnalysisError::Network("no model attempts were made".to_string())
        });
        let fingerprint = fingerprint(text);
        tracing::warn!(
            task = %task,
            fingerprint = %fingerprint,
            attempts = total_attempts,
            error = %last_error,
            "Analysis unavailable after retries and fallback"
        );
        Err(AnalysisError::Unavailable {
            task,
            fingerprint,
            attempts: total_attempts,
            last_error: Box::new(last_error),
        })
    }

    /// Attempt loop against one model.
    ///
    /// Fatal errors and cancellation return `Err`; retriable errors that run
    /// out of attempts return `Exhausted`.
    fn attempt_model(
        &self,
        prompt: &PreparedPrompt,
        role: ModelRole,
        model: &str,
        cost: usize,
        total_attempts: &mut u32,
    ) -> Result<ModelOutcome, AnalysisError> {
        let task = prompt.task;
        let max_attempts = self.policy.attempts_per_model();
        let mut attempt = 0u32;

        loop {
            if self.cancel.is_cancelled() || !self.limiter.acquire(cost, &self.cancel) {
                return Err(self.cancelled(task, *total_attempts));
            }

            attempt += 1;
            *total_attempts += 1;
            self.usage.record_attempt(role);
            tracing::debug!(
                task = %task,
                model,
                attempt,
                max_attempts,
                "Sending request"
            );

            let err = match self.invoker.send(prompt, model) {
                Ok(result) => return Ok(ModelOutcome::Success(result)),
                Err(err) => err,
            };

            if err.is_rate_limited() {
                self.usage.record_rate_limit();
            }

            if !err.is_retriable() {
                tracing::warn!(task = %task, model, error = %err, "Non-retriable error");
                return Err(err);
            }

            if attempt >= max_attempts {
                tracing::warn!(
                    task = %task,
                    model,
                    attempts = attempt,
                    error = %err,
                    "Retries exhausted"
                );
                return Ok(ModelOutcome::Exhausted(err));
            }

            let wait = self.policy.wait_duration(attempt - 1, err.retry_after());
            tracing::warn!(
                task = %task,
                model,
                attempt,
                wait_ms = wait.as_millis() as u64,
                error = %err,
                "Attempt failed, backing off"
            );
            if !self.cancel.sleep(wait) {
                return Err(self.cancelled(task, *total_attempts));
            }
        }
    }

    fn cancelled(&self, task: TaskKind, attempts: u32) -> AnalysisError {
        tracing::info!(task = %task, attempts, "Analysis cancelled");
        AnalysisError::Cancelled { task, attempts }
    }
}

/// Short identifier of a text: first 12 hex chars of SHA-256 and the char count.
pub fn fingerprint(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    let hex = hex::encode(digest);
    format!("{}:{}", &hex[..12], text.chars().count())
}
