//! LLM analysis of sales call transcripts.
//!
//! A transcript too large for one model call is split into overlapping
//! chunks, every chunk is analyzed through a retrying, rate-limited model
//! client, and the per-chunk results are merged into one `CallAnalysis`.
//! The analyses of all calls in an engagement are then aggregated into an
//! `EngagementReport` with a win probability, risks and next steps.
//!
//! # Module Structure
//!
//! - [`chunk`] - Token budget and boundary-aware chunking
//! - [`backend`] - Model endpoints (Anthropic API, Claude CLI)
//! - [`invoker`] - One request: prompt, send, schema validation
//! - [`retry`] - Backoff, rate limiting and primary/fallback switching
//! - [`pipeline`] - Per-transcript analysis
//! - [`aggregate`] - Cross-call engagement assessment and technical deployment analysis
//! - [`service`] - Parallel engagement runs

pub mod aggregate;
pub mod backend;
pub mod cancel;
pub mod chunk;
pub mod classify;
pub mod error;
pub mod heuristic;
pub mod invoker;
pub mod limiter;
pub mod pipeline;
pub mod prompt;
pub mod result;
pub mod retry;
pub mod service;
pub mod task;
pub mod tracker;
pub mod types;
pub mod worker;

// Re-export main types
pub use aggregate::{EngagementAggregator, SummaryDetail};
pub use backend::{create_backend, BackendError, ModelBackend, ModelRequest, ModelResponse};
pub use cancel::CancellationToken;
pub use chunk::{ChunkCalculator, ChunkingError, TokenBudget, TranscriptChunk};
pub use error::AnalysisError;
pub use pipeline::{CallAnalysisPipeline, ChunkSettings};
pub use retry::{ModelPair, RetryOrchestrator};
pub use service::{AnalyzeOptions, AnalyzerService, EngagementRun, FailedCall};
pub use task::{StructuredResult, TaskKind};
pub use tracker::{RetryPolicy, UsageCounter, UsageSummary};
pub use types::{
    ActionItem, CallAnalysis, CallType, EngagementLevel, EngagementReport, EngagementStats,
    Sentiment, SentimentResult, TechnicalDeployment, TokenEstimator, Transcript,
};
