//! Per-transcript analysis pipeline.
//!
//! Classifies the call, splits the transcript into chunks, runs the
//! per-segment tasks in sequence order, and folds the outcomes into one
//! `CallAnalysis`. A segment task that is unavailable degrades to a
//! placeholder; fatal endpoint errors abort the call.

use super::chunk::{ChunkCalculator, TokenBudget, TranscriptChunk};
use super::classify::classify;
use super::error::AnalysisError;
use super::result::{CallResultBuilder, SegmentOutcome};
use super::retry::RetryOrchestrator;
use super::task::{SegmentPosition, StructuredResult, TaskKind};
use super::types::{CallAnalysis, CallType, TaskFailure, TextStats};

/// Chunking parameters for one pipeline.
#[derive(Debug, Clone)]
pub struct ChunkSettings {
    /// Configured per-chunk token budget before window capping
    pub max_tokens_per_chunk: usize,
    pub overlap_chars: usize,
    /// Context window arithmetic used to cap the chunk budget
    pub budget: TokenBudget,
}

/// Drives chunking and the retry orchestrator across one transcript.
pub struct CallAnalysisPipeline<'a> {
    orchestrator: &'a RetryOrchestrator,
    calculator: ChunkCalculator,
    settings: ChunkSettings,
}

impl<'a> CallAnalysisPipeline<'a> {
    pub fn new(
        orchestrator: &'a RetryOrchestrator,
        calculator: ChunkCalculator,
        settings: ChunkSettings,
    ) -> Self {
        Self {
            orchestrator,
            calculator,
            settings,
        }
    }

    /// Effective token budget per chunk.
    pub fn chunk_budget(&self) -> usize {
        self.settings
            .budget
            .chunk_budget(self.settings.max_tokens_per_chunk)
    }

    /// Split a transcript the way `analyze_call` will.
    pub fn chunk(&self, text: &str) -> Result<Vec<TranscriptChunk>, AnalysisError> {
        Ok(self
            .calculator
            .chunk(text, self.chunk_budget(), self.settings.overlap_chars)?)
    }

    /// Analyze one transcript.
    pub fn analyze_call(&self, call_id: &str, raw_text: &str) -> Result<CallAnalysis, AnalysisError> {
        if raw_text.trim().is_empty() {
            return Err(AnalysisError::EmptyTranscript {
                call_id: call_id.to_string(),
            });
        }

        let stats = TextStats::compute(raw_text, self.calculator.estimator());
        let chunks = self.chunk(raw_text)?;
        tracing::info!(
            call_id,
            chunks = chunks.len(),
            estimated_tokens = stats.estimated_tokens,
            "Analyzing call"
        );

        let mut failures = Vec::new();
        let call_type = match classify(self.orchestrator, raw_text) {
            Ok(call_type) => call_type,
            Err(err) if err.is_degradable() => {
                tracing::warn!(call_id, error = %err, "Classification unavailable");
                failures.push(TaskFailure {
                    segment: None,
                    task: TaskKind::Classification,
                    reason: err.to_string(),
                });
                CallType::Unknown
            }
            Err(err) => return Err(err),
        };

        let mut builder = CallResultBuilder::new(call_id, stats).call_type(call_type);
        for failure in failures {
            builder.record_failure(failure);
        }

        let total = chunks.len();
        for chunk in &chunks {
            let position = SegmentPosition::new(chunk.sequence_index, total);
            let outcome = self.analyze_segment(call_id, chunk, position, &mut builder)?;
            builder.push_segment(outcome);
        }

        let analysis = builder.build();
        if analysis.partial {
            tracing::warn!(
                call_id,
                failed_tasks = analysis.failures.len(),
                "Call analysis is partial"
            );
        } else {
            tracing::info!(call_id, call_type = %analysis.call_type, "Call analysis complete");
        }
        Ok(analysis)
    }

    /// Run every per-segment task on one chunk.
    fn analyze_segment(
        &self,
        call_id: &str,
        chunk: &TranscriptChunk,
        position: SegmentPosition,
        builder: &mut CallResultBuilder,
    ) -> Result<SegmentOutcome, AnalysisError> {
        let mut outcome = SegmentOutcome::new(position, chunk.estimated_tokens);

        for task in TaskKind::PER_SEGMENT {
            let result = match self.orchestrator.analyze_segment(&chunk.text, task, position) {
                Ok(result) => result,
                Err(err) if err.is_degradable() => {
                    tracing::warn!(
                        call_id,
                        segment = %position.label(),
                        task = %task,
                        error = %err,
                        "Segment task unavailable, using placeholder"
                    );
                    builder.record_failure(TaskFailure {
                        segment: Some(position.index),
                        task,
                        reason: err.to_string(),
                    });
                    continue;
                }
                Err(err) => return Err(err),
            };

            match result {
                StructuredResult::Summary(summary) => outcome.summary = Some(summary),
                StructuredResult::ActionItems(items) => outcome.action_items = Some(items),
                StructuredResult::Sentiment(sentiment) => outcome.sentiment = Some(sentiment),
                other => {
                    return Err(AnalysisError::model_response(
                        task,
                        format!("expected {} result, got {}", task, other.task()),
                        "",
                    ))
                }
            }
        }

        Ok(outcome)
    }
}
