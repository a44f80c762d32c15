//! callscope library
//!
//! LLM analysis of sales call transcripts: chunking, retrying model calls
//! with fallback, per-call analysis and engagement-level aggregation.

pub mod analyzer;
pub mod config;

pub use analyzer::{AnalysisError, AnalyzerService, CallAnalysis, EngagementReport};
pub use config::Config;
