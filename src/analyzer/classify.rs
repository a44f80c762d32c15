//! Call-type classification.
//!
//! Keyword matching on the opening of the transcript decides most calls
//! without a model request. Only when no keyword set matches does the
//! classifier ask the model.

use super::error::AnalysisError;
use super::retry::RetryOrchestrator;
use super::task::TaskKind;
use super::types::CallType;

/// Characters of the opening scanned for keywords.
const KEYWORD_WINDOW_CHARS: usize = 500;

/// Characters of the opening sent to the model.
const MODEL_WINDOW_CHARS: usize = 1000;

/// Keyword sets in match order.
const KEYWORD_SETS: &[(CallType, &[&str])] = &[
    (CallType::DemoCall, &["demo", "demonstration", "product demo"]),
    (
        CallType::PovCheckIn,
        &["pov sync", "pov check", "pov meeting", "proof of value"],
    ),
    (
        CallType::DiscoveryCall,
        &["discovery", "initial", "first call", "introductory"],
    ),
];

/// Classify from keywords alone.
pub fn classify_by_keywords(text: &str) -> Option<CallType> {
    let opening = head_chars(text, KEYWORD_WINDOW_CHARS).to_lowercase();
    KEYWORD_SETS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| opening.contains(k)))
        .map(|(call_type, _)| *call_type)
}

/// Classify a transcript, asking the model only when keywords are silent.
///
/// Degradable model failures are returned as `Err` for the caller to record;
/// the caller then treats the call as `Unknown`.
pub fn classify(orchestrator: &RetryOrchestrator, text: &str) -> Result<CallType, AnalysisError> {
    if let Some(call_type) = classify_by_keywords(text) {
        tracing::debug!(call_type = %call_type, "Classified by keywords");
        return Ok(call_type);
    }

    let opening = head_chars(text, MODEL_WINDOW_CHARS);
    let result = orchestrator.analyze(opening, TaskKind::Classification)?;
    let call_type = result.into_classification().ok_or_else(|| {
        AnalysisError::model_response(
            TaskKind::Classification,
            "reply had the wrong shape",
            "",
        )
    })?;
    tracing::debug!(call_type = %call_type, "Classified by model");
    Ok(call_type)
}

/// Prefix of at most `max_chars` characters.
fn head_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
