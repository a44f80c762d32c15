//! Single model request: build prompt, send, parse.

use super::backend::{ModelBackend, ModelRequest};
use super::chunk::TokenBudget;
use super::error::AnalysisError;
use super::prompt::build_prompt;
use super::task::{SegmentPosition, StructuredResult, TaskKind};
use super::tracker::UsageCounter;
use super::types::TokenEstimator;
use std::sync::Arc;

/// Request parameters shared by every invocation.
#[derive(Debug, Clone)]
pub struct InvokerSettings {
    pub max_output_tokens: u32,
    pub temperature: f32,
    pub budget: TokenBudget,
}

/// A rendered prompt ready to send, with its token estimate.
#[derive(Debug, Clone)]
pub struct PreparedPrompt {
    pub task: TaskKind,
    pub text: String,
    pub estimated_tokens: usize,
}

/// Wraps one request to the model endpoint.
///
/// Builds the task prompt, sends it, and validates the reply against the
/// task's schema. Its only side effect is recording usage.
pub struct ModelInvoker {
    backend: Arc<dyn ModelBackend>,
    usage: Arc<UsageCounter>,
    estimator: TokenEstimator,
    settings: InvokerSettings,
}

impl ModelInvoker {
    pub fn new(
        backend: Arc<dyn ModelBackend>,
        usage: Arc<UsageCounter>,
        estimator: TokenEstimator,
        settings: InvokerSettings,
    ) -> Self {
        Self {
            backend,
            usage,
            estimator,
            settings,
        }
    }

    pub fn settings(&self) -> &InvokerSettings {
        &self.settings
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Render the prompt for `task` and check it fits the context window.
    pub fn prepare(
        &self,
        task: TaskKind,
        text: &str,
        segment: Option<SegmentPosition>,
    ) -> Result<PreparedPrompt, AnalysisError> {
        let prompt = build_prompt(task, text, segment);
        let estimated_tokens = self.estimator.estimate(&prompt);
        if !self.settings.budget.fits(estimated_tokens) {
            return Err(AnalysisError::Request(format!(
                "{} prompt of ~{} tokens plus {} output tokens exceeds the {}-token context window",
                task,
                estimated_tokens,
                self.settings.budget.reserved_for_output,
                self.settings.budget.max_input_tokens
            )));
        }
        Ok(PreparedPrompt {
            task,
            text: prompt,
            estimated_tokens,
        })
    }

    /// Send a prepared prompt to `model` and parse the reply.
    pub fn send(&self, prompt: &PreparedPrompt, model: &str) -> Result<StructuredResult, AnalysisError> {
        let request = ModelRequest {
            model,
            prompt: &prompt.text,
            max_output_tokens: self.settings.max_output_tokens,
            temperature: self.settings.temperature,
        };

        let response = self
            .backend
            .complete(&request)
            .map_err(|e| AnalysisError::from_backend_error(prompt.task, e))?;

        if response.usage.is_empty() {
            let output = self.estimator.estimate(&response.text);
            self.usage
                .record_usage(prompt.estimated_tokens as u64, output as u64, true);
        } else {
            self.usage.record_usage(
                response.usage.input_tokens,
                response.usage.output_tokens,
                false,
            );
        }

        StructuredResult::parse(prompt.task, &response.text)
            .map_err(|reason| AnalysisError::model_response(prompt.task, reason, &response.text))
    }

    /// Build, send and parse in one step.
    pub fn invoke(
        &self,
        task: TaskKind,
        text: &str,
        model: &str,
        segment: Option<SegmentPosition>,
    ) -> Result<StructuredResult, AnalysisError> {
        let prompt = self.prepare(task, text, segment)?;
        self.send(&prompt, model)
    }
}
