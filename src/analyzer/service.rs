//! AnalyzerService facade for orchestrating an engagement run.
//!
//! This module provides the main entry point for analyzing a set of call
//! transcripts that belong to one customer engagement.
//!
//! # Workflow
//!
//! 1. Validate configuration and call ids
//! 2. Scale workers to the number of transcripts
//! 3. Run one `CallAnalysisPipeline` per transcript in parallel
//! 4. Collect per-call failures (fatal endpoint errors abort the run)
//! 5. Aggregate the successful calls into an `EngagementReport`
//! 6. Report usage

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;

use crate::config::AnalysisConfig;

use super::aggregate::EngagementAggregator;
use super::backend::ModelBackend;
use super::cancel::CancellationToken;
use super::chunk::{ChunkCalculator, TokenBudget};
use super::error::AnalysisError;
use super::invoker::{InvokerSettings, ModelInvoker};
use super::limiter::RateLimiter;
use super::pipeline::{CallAnalysisPipeline, ChunkSettings};
use super::retry::{ModelPair, RetryOrchestrator};
use super::tracker::{RetryPolicy, UsageCounter, UsageSummary};
use super::types::{CallAnalysis, EngagementReport, TokenEstimator, Transcript};
use super::worker::{ParallelExecutor, ProgressReporter, WorkerConfig, WorkerScaler};

/// Per-run options layered over the configuration.
#[derive(Debug, Clone, Default)]
pub struct AnalyzeOptions {
    /// Number of workers (None = configured value, then auto-scale)
    pub workers: Option<usize>,
    /// Cancellation and deadline shared by every transcript
    pub cancel: CancellationToken,
}

impl AnalyzeOptions {
    /// Set worker count override.
    pub fn workers(mut self, count: usize) -> Self {
        self.workers = Some(count);
        self
    }

    /// Use an existing cancellation token.
    pub fn cancel_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// A transcript that produced no `CallAnalysis`.
#[derive(Debug, Clone, Serialize)]
pub struct FailedCall {
    pub call_id: String,
    pub error: String,
}

/// Everything one engagement run produced.
#[derive(Debug, Serialize)]
pub struct EngagementRun {
    pub calls: Vec<CallAnalysis>,
    pub failed_calls: Vec<FailedCall>,
    pub report: EngagementReport,
    pub usage: UsageSummary,
}

/// Main service for analyzing engagements.
///
/// Facade pattern - owns the shared rate limiter and usage counter and
/// builds one orchestrator per transcript.
pub struct AnalyzerService {
    config: AnalysisConfig,
    backend: Arc<dyn ModelBackend>,
    limiter: Arc<RateLimiter>,
    usage: Arc<UsageCounter>,
    estimator: TokenEstimator,
}

impl AnalyzerService {
    /// Create a service after validating `config`.
    pub fn new(config: AnalysisConfig, backend: Arc<dyn ModelBackend>) -> Result<Self, AnalysisError> {
        config.validate().map_err(AnalysisError::Config)?;
        let limiter = Arc::new(RateLimiter::per_minute(config.rate_limit_tokens_per_minute));
        Ok(Self {
            config,
            backend,
            limiter,
            usage: Arc::new(UsageCounter::new()),
            estimator: TokenEstimator::default(),
        })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Usage counted so far across every run of this service.
    pub fn usage(&self) -> UsageSummary {
        self.usage.summary()
    }

    fn budget(&self) -> TokenBudget {
        TokenBudget::for_model(
            self.config.context_window,
            self.config.max_output_tokens as usize,
        )
    }

    fn chunk_settings(&self) -> ChunkSettings {
        ChunkSettings {
            max_tokens_per_chunk: self.config.max_tokens_per_chunk,
            overlap_chars: self.config.chunk_overlap_chars,
            budget: self.budget(),
        }
    }

    /// Build an orchestrator sharing this service's limiter and counters.
    pub fn orchestrator(&self, cancel: CancellationToken) -> RetryOrchestrator {
        let invoker = ModelInvoker::new(
            Arc::clone(&self.backend),
            Arc::clone(&self.usage),
            self.estimator.clone(),
            InvokerSettings {
                max_output_tokens: self.config.max_output_tokens,
                temperature: self.config.temperature,
                budget: self.budget(),
            },
        );
        RetryOrchestrator::new(
            invoker,
            ModelPair::new(&self.config.primary_model, &self.config.fallback_model),
            RetryPolicy::new(
                self.config.max_retries,
                self.config.base_retry_delay_ms,
                self.config.max_delay_ms,
            ),
            Arc::clone(&self.limiter),
            Arc::clone(&self.usage),
            cancel,
        )
    }

    /// Analyze a single transcript.
    pub fn analyze_call(
        &self,
        transcript: &Transcript,
        cancel: &CancellationToken,
    ) -> Result<CallAnalysis, AnalysisError> {
        let orchestrator = self.orchestrator(cancel.clone());
        let pipeline = CallAnalysisPipeline::new(
            &orchestrator,
            ChunkCalculator::new(self.estimator.clone()),
            self.chunk_settings(),
        );
        pipeline.analyze_call(&transcript.call_id, &transcript.text)
    }

    /// Analyze every transcript and aggregate the results.
    ///
    /// `progress` is called with `(completed, total)` as transcripts finish.
    pub fn analyze_engagement<F>(
        &self,
        transcripts: Vec<Transcript>,
        options: &AnalyzeOptions,
        progress: F,
    ) -> Result<EngagementRun, AnalysisError>
    where
        F: Fn(usize, usize) + Send + Sync + 'static,
    {
        if transcripts.is_empty() {
            return Err(AnalysisError::EmptyEngagement);
        }
        check_call_ids(&transcripts)?;

        let scaler = WorkerScaler::new(WorkerConfig {
            user_override: options.workers.or(self.config.workers),
            ..Default::default()
        });
        let worker_count = scaler.calculate_workers(transcripts.len());
        tracing::info!(
            transcripts = transcripts.len(),
            workers = worker_count,
            backend = self.backend.name(),
            "Starting engagement analysis"
        );

        let reporter = ProgressReporter::with_callback(transcripts.len(), progress);
        let executor = ParallelExecutor::new(worker_count);
        let outcomes = executor.execute(transcripts, &reporter, |transcript| {
            let result = self.analyze_call(&transcript, &options.cancel);
            (transcript.call_id, result)
        });

        let mut calls = Vec::new();
        let mut failed_calls = Vec::new();
        for (call_id, result) in outcomes {
            match result {
                Ok(analysis) => calls.push(analysis),
                Err(err) if err.is_fatal() => {
                    return Err(AnalysisError::Call {
                        call_id,
                        source: Box::new(err),
                    });
                }
                Err(err) => {
                    tracing::warn!(call_id = %call_id, error = %err, "Call analysis failed");
                    failed_calls.push(FailedCall {
                        call_id,
                        error: err.to_string(),
                    });
                }
            }
        }

        let orchestrator = self.orchestrator(options.cancel.clone());
        let report = EngagementAggregator::new(&orchestrator).aggregate(&calls)?;
        let usage = self.usage.summary();
        tracing::info!(
            calls = calls.len(),
            failed = failed_calls.len(),
            win_probability = report.win_probability,
            "Engagement analysis complete"
        );

        Ok(EngagementRun {
            calls,
            failed_calls,
            report,
            usage,
        })
    }
}

/// Reject empty or repeated call ids before any model request is made.
fn check_call_ids(transcripts: &[Transcript]) -> Result<(), AnalysisError> {
    let mut seen = HashSet::new();
    for transcript in transcripts {
        let call_id = transcript.call_id.trim();
        if call_id.is_empty() {
            return Err(AnalysisError::Validation {
                call_id: transcript.call_id.clone(),
                reason: "call_id is empty".to_string(),
            });
        }
        if !seen.insert(call_id) {
            return Err(AnalysisError::Validation {
                call_id: transcript.call_id.clone(),
                reason: "call_id appears more than once".to_string(),
            });
        }
    }
    Ok(())
}
