//! Unit tests for the per-call analysis pipeline

use std::sync::Arc;

use callscope::analyzer::types::TaskFailure;
use callscope::analyzer::{
    AnalysisError, CallType, CancellationToken, EngagementLevel, Sentiment, TaskKind, Transcript,
};
use callscope::config::AnalysisConfig;

use crate::helpers::{
    auth_error, default_reply, network_error, service, test_config, three_segment_transcript,
    MockBackend, NEGATIVE_SENTIMENT_JSON,
};

/// Config that splits `three_segment_transcript` into three chunks.
fn small_chunk_config() -> AnalysisConfig {
    AnalysisConfig {
        max_tokens_per_chunk: 120,
        chunk_overlap_chars: 50,
        ..test_config()
    }
}

fn is_sentiment_prompt(prompt: &str) -> bool {
    prompt.contains("engagement_level") && !prompt.contains("win_probability")
}

fn is_summary_prompt(prompt: &str) -> bool {
    prompt.contains("key_points") && !prompt.contains("win_probability")
}

// ============================================
// Sentiment across segments
// ============================================

#[test]
fn last_segment_decides_sentiment_swing() {
    let backend = Arc::new(MockBackend::with_responder(|_, prompt| {
        if is_sentiment_prompt(prompt) && prompt.contains("segment 3 of 3") {
            Ok(NEGATIVE_SENTIMENT_JSON.to_string())
        } else {
            Ok(default_reply(prompt))
        }
    }));
    let svc = service(&backend, small_chunk_config());
    let transcript = Transcript::new("call-1", three_segment_transcript());

    let analysis = svc
        .analyze_call(&transcript, &CancellationToken::new())
        .unwrap();

    assert_eq!(analysis.chunk_count, 3);
    assert!(!analysis.partial);
    assert_eq!(analysis.sentiment.overall, Sentiment::Negative);
    assert!(!analysis.sentiment.progression_notes.is_empty());
    assert!(analysis
        .sentiment
        .progression_notes
        .contains("Positive -> Positive -> Negative"));
}

#[test]
fn segments_are_labelled_in_order() {
    let backend = Arc::new(MockBackend::new());
    let svc = service(&backend, small_chunk_config());
    let transcript = Transcript::new("call-1", three_segment_transcript());

    svc.analyze_call(&transcript, &CancellationToken::new())
        .unwrap();

    let sentiment_prompts: Vec<String> = backend
        .prompts()
        .into_iter()
        .filter(|p| is_sentiment_prompt(p))
        .collect();
    assert_eq!(sentiment_prompts.len(), 3);
    for (i, prompt) in sentiment_prompts.iter().enumerate() {
        assert!(prompt.contains(&format!("segment {} of 3", i + 1)));
    }
}

// ============================================
// Merging
// ============================================

#[test]
fn duplicate_action_items_merge_within_call() {
    let backend = Arc::new(MockBackend::new());
    let svc = service(&backend, small_chunk_config());
    let transcript = Transcript::new("call-1", three_segment_transcript());

    let analysis = svc
        .analyze_call(&transcript, &CancellationToken::new())
        .unwrap();

    // Every segment reports "Send pricing proposal"
    assert_eq!(analysis.action_items.len(), 1);
    assert_eq!(analysis.action_items[0].source_call_id, "call-1");
    assert_eq!(analysis.key_points, vec!["Rollout plan reviewed"]);
    assert_eq!(analysis.sentiment.engagement_level, EngagementLevel::High);
}

// ============================================
// Classification
// ============================================

#[test]
fn keyword_classification_skips_model() {
    let backend = Arc::new(MockBackend::new());
    let svc = service(&backend, test_config());
    let transcript = Transcript::new(
        "demo-1",
        "Product demo for the Acme platform team.\nAE: Let me share my screen.",
    );

    let analysis = svc
        .analyze_call(&transcript, &CancellationToken::new())
        .unwrap();

    assert_eq!(analysis.call_type, CallType::DemoCall);
    assert!(backend.prompts().iter().all(|p| !p.contains("call_type")));
    // summary, action items, sentiment for one chunk
    assert_eq!(backend.invocations(), 3);
}

#[test]
fn model_classification_when_no_keywords() {
    let backend = Arc::new(MockBackend::new());
    let svc = service(&backend, test_config());
    let transcript = Transcript::new("qbr", "Quarterly review with the platform team.");

    let analysis = svc
        .analyze_call(&transcript, &CancellationToken::new())
        .unwrap();

    assert_eq!(analysis.call_type, CallType::DiscoveryCall);
    assert_eq!(backend.invocations(), 4);
}

#[test]
fn unavailable_classification_is_unknown() {
    let backend = Arc::new(MockBackend::with_responder(|_, prompt| {
        if prompt.contains("call_type") {
            Err(network_error())
        } else {
            Ok(default_reply(prompt))
        }
    }));
    let svc = service(&backend, test_config());
    let transcript = Transcript::new("qbr", "Quarterly review with the platform team.");

    let analysis = svc
        .analyze_call(&transcript, &CancellationToken::new())
        .unwrap();

    assert_eq!(analysis.call_type, CallType::Unknown);
    assert!(analysis.partial);
    assert_eq!(analysis.failures.len(), 1);
    assert_eq!(analysis.failures[0].task, TaskKind::Classification);
    assert_eq!(analysis.failures[0].segment, None);
}

// ============================================
// Degradation
// ============================================

#[test]
fn unavailable_segment_becomes_placeholder() {
    let backend = Arc::new(MockBackend::with_responder(|_, prompt| {
        if is_summary_prompt(prompt) && prompt.contains("segment 2 of 3") {
            Err(network_error())
        } else {
            Ok(default_reply(prompt))
        }
    }));
    let svc = service(&backend, small_chunk_config());
    let transcript = Transcript::new("call-1", three_segment_transcript());

    let analysis = svc
        .analyze_call(&transcript, &CancellationToken::new())
        .unwrap();

    assert!(analysis.partial);
    assert!(analysis
        .summary
        .contains("[analysis unavailable for segment 2 of 3]"));
    assert_eq!(
        analysis.failures,
        vec![TaskFailure {
            segment: Some(1),
            task: TaskKind::Summary,
            reason: analysis.failures[0].reason.clone(),
        }]
    );
    assert!(analysis.failures[0].reason.contains("unavailable"));
}

#[test]
fn cancelled_call_still_returns_partial_analysis() {
    let backend = Arc::new(MockBackend::new());
    let svc = service(&backend, test_config());
    let cancel = CancellationToken::new();
    cancel.cancel();
    let transcript = Transcript::new("demo-1", "Product demo for the Acme platform team.");

    let analysis = svc.analyze_call(&transcript, &cancel).unwrap();

    assert!(analysis.partial);
    assert_eq!(analysis.failures.len(), 3);
    assert_eq!(backend.invocations(), 0);
    assert_eq!(analysis.sentiment.overall, Sentiment::Neutral);
}

#[test]
fn auth_error_aborts_call() {
    let backend = Arc::new(MockBackend::with_responder(|_, prompt| {
        if is_sentiment_prompt(prompt) {
            Err(auth_error())
        } else {
            Ok(default_reply(prompt))
        }
    }));
    let svc = service(&backend, test_config());
    let transcript = Transcript::new("demo-1", "Product demo for the Acme platform team.");

    let err = svc
        .analyze_call(&transcript, &CancellationToken::new())
        .unwrap_err();
    assert!(matches!(err, AnalysisError::Auth(_)));
}

#[test]
fn empty_transcript_is_rejected() {
    let backend = Arc::new(MockBackend::new());
    let svc = service(&backend, test_config());
    let transcript = Transcript::new("blank", "  \n\t ");

    let err = svc
        .analyze_call(&transcript, &CancellationToken::new())
        .unwrap_err();
    assert!(matches!(err, AnalysisError::EmptyTranscript { ref call_id } if call_id == "blank"));
    assert_eq!(backend.invocations(), 0);
}
