//! Unit tests for engagement aggregation

use std::sync::Arc;

use callscope::analyzer::types::{AssessmentSource, DeploymentComplexity, Priority, TextStats};
use callscope::analyzer::{
    ActionItem, AnalysisError, CallAnalysis, CallType, CancellationToken, EngagementAggregator,
    EngagementLevel, Sentiment, SentimentResult,
};
use callscope::config::AnalysisConfig;

use crate::helpers::{
    assessment_json, default_reply, network_error, orchestrator, service, test_config, MockBackend,
};

fn action(description: &str, call_id: &str) -> ActionItem {
    ActionItem {
        description: description.to_string(),
        owner: None,
        due_date: None,
        priority: Priority::Unset,
        source_call_id: call_id.to_string(),
    }
}

fn call(call_id: &str, call_type: CallType, items: &[&str]) -> CallAnalysis {
    CallAnalysis {
        call_id: call_id.to_string(),
        call_type,
        summary: format!("Summary of {}", call_id),
        key_points: vec!["Budget approved".to_string()],
        action_items: items.iter().map(|d| action(d, call_id)).collect(),
        sentiment: SentimentResult {
            overall: Sentiment::Positive,
            engagement_level: EngagementLevel::High,
            progression_notes: String::new(),
        },
        raw_snippets: vec![format!("Quote from {}", call_id)],
        participants: vec![],
        call_date: None,
        partial: false,
        failures: vec![],
        stats: TextStats::default(),
        chunk_count: 1,
    }
}

// ============================================
// Input validation
// ============================================

#[test]
fn empty_engagement_fails() {
    let backend = Arc::new(MockBackend::new());
    let orch = orchestrator(&backend);

    let err = EngagementAggregator::new(&orch).aggregate(&[]).unwrap_err();
    assert!(matches!(err, AnalysisError::EmptyEngagement));
    assert_eq!(backend.invocations(), 0);
}

#[test]
fn duplicate_call_ids_fail_validation() {
    let backend = Arc::new(MockBackend::new());
    let orch = orchestrator(&backend);
    let analyses = vec![
        call("call-1", CallType::DiscoveryCall, &[]),
        call("call-1", CallType::DemoCall, &[]),
    ];

    let err = EngagementAggregator::new(&orch)
        .aggregate(&analyses)
        .unwrap_err();
    assert!(matches!(err, AnalysisError::Validation { .. }));
}

#[test]
fn foreign_action_item_fails_validation() {
    let backend = Arc::new(MockBackend::new());
    let orch = orchestrator(&backend);
    let mut analysis = call("call-1", CallType::DiscoveryCall, &[]);
    analysis.action_items.push(action("Send deck", "call-9"));

    let err = EngagementAggregator::new(&orch)
        .aggregate(&[analysis])
        .unwrap_err();
    assert!(matches!(err, AnalysisError::Validation { ref call_id, .. } if call_id == "call-1"));
}

// ============================================
// Report
// ============================================

#[test]
fn shared_action_item_merges_with_both_sources() {
    let backend = Arc::new(MockBackend::new());
    let orch = orchestrator(&backend);
    let analyses = vec![
        call(
            "call-1",
            CallType::DiscoveryCall,
            &["Send pricing proposal", "Book demo"],
        ),
        call("call-2", CallType::DemoCall, &["Send pricing proposal"]),
    ];

    let report = EngagementAggregator::new(&orch)
        .aggregate(&analyses)
        .unwrap();

    let pricing: Vec<_> = report
        .merged_action_items
        .iter()
        .filter(|m| m.item.description == "Send pricing proposal")
        .collect();
    assert_eq!(pricing.len(), 1);
    assert_eq!(pricing[0].source_call_ids, vec!["call-1", "call-2"]);
    assert_eq!(report.merged_action_items.len(), 2);
}

#[test]
fn model_assessment_fills_report() {
    let backend = Arc::new(MockBackend::new());
    let orch = orchestrator(&backend);
    let analyses = vec![call("call-1", CallType::DiscoveryCall, &[])];

    let report = EngagementAggregator::new(&orch)
        .aggregate(&analyses)
        .unwrap();

    assert_eq!(report.win_probability, 72);
    assert_eq!(report.assessment_source, AssessmentSource::Model);
    assert_eq!(report.positive_factors, vec!["Champion identified"]);
    assert_eq!(report.risks.len(), 1);
    assert_eq!(report.unresolved_questions, vec!["SSO support"]);
    assert_eq!(
        report.supporting_snippets,
        vec!["[call-1] \"This fits our budget\" (Budget signal)"]
    );
    assert_eq!(report.call_ids, vec!["call-1"]);
    assert!(report.diagnostics.is_empty());
    // Assessment plus technical deployment
    assert_eq!(backend.invocations(), 2);
}

#[test]
fn model_deployment_fills_report() {
    let backend = Arc::new(MockBackend::new());
    let orch = orchestrator(&backend);
    let analyses = vec![call("call-1", CallType::DiscoveryCall, &[])];

    let report = EngagementAggregator::new(&orch)
        .aggregate(&analyses)
        .unwrap();

    let deployment = &report.technical_deployment;
    assert_eq!(report.deployment_source, AssessmentSource::Model);
    assert_eq!(deployment.scm_platform.platform.as_deref(), Some("GitHub"));
    assert_eq!(deployment.ci_pipelines.primary_ci.as_deref(), Some("GitHub Actions"));
    assert_eq!(
        deployment.programming_languages.primary_languages,
        vec!["Java", "Python"]
    );
    assert_eq!(deployment.deployment_complexity, DeploymentComplexity::Medium);
    assert_eq!(report.stats.total_calls, 1);
}

#[test]
fn unavailable_deployment_uses_keyword_detection() {
    let backend = Arc::new(MockBackend::with_responder(|_, prompt| {
        if prompt.contains("scm_platform") {
            Err(network_error())
        } else {
            Ok(default_reply(prompt))
        }
    }));
    let orch = orchestrator(&backend);
    let mut analysis = call("call-1", CallType::DiscoveryCall, &[]);
    analysis.key_points = vec!["All services build on Jenkins from GitLab".to_string()];

    let report = EngagementAggregator::new(&orch)
        .aggregate(&[analysis])
        .unwrap();

    assert_eq!(report.assessment_source, AssessmentSource::Model);
    assert_eq!(report.deployment_source, AssessmentSource::Heuristic);
    let deployment = &report.technical_deployment;
    assert_eq!(deployment.scm_platform.platform.as_deref(), Some("GitLab"));
    assert_eq!(deployment.ci_pipelines.primary_ci.as_deref(), Some("Jenkins"));
    assert!(report
        .diagnostics
        .iter()
        .any(|d| d.contains("keyword detection")));
}

#[test]
fn oversized_engagement_is_trimmed_to_fit() {
    let backend = Arc::new(MockBackend::new());
    let config = AnalysisConfig {
        context_window: 4_000,
        max_output_tokens: 500,
        ..test_config()
    };
    let orch = service(&backend, config).orchestrator(CancellationToken::new());
    let analyses: Vec<_> = (0..60)
        .map(|i| {
            let id = format!("call-{}", i);
            let mut analysis = call(&id, CallType::DiscoveryCall, &["Send pricing proposal"]);
            analysis.summary = "The team walked through the rollout plan in detail. ".repeat(12);
            analysis
        })
        .collect();

    let report = EngagementAggregator::new(&orch)
        .aggregate(&analyses)
        .unwrap();

    assert_eq!(report.assessment_source, AssessmentSource::Model);
    assert_eq!(report.call_ids.len(), 60);
    assert!(report
        .diagnostics
        .iter()
        .any(|d| d.starts_with("engagement_assessment input trimmed")));
    // Rendered prompts stayed inside the window
    assert!(backend.prompts().iter().all(|p| p.len() / 4 + 500 <= 4_000));
}

#[test]
fn engagement_too_large_for_any_detail_uses_heuristic() {
    let backend = Arc::new(MockBackend::new());
    let config = AnalysisConfig {
        context_window: 4_000,
        max_output_tokens: 500,
        ..test_config()
    };
    let orch = service(&backend, config).orchestrator(CancellationToken::new());
    let analyses: Vec<_> = (0..600)
        .map(|i| call(&format!("call-{}", i), CallType::DemoCall, &[]))
        .collect();

    let report = EngagementAggregator::new(&orch)
        .aggregate(&analyses)
        .unwrap();

    assert_eq!(report.assessment_source, AssessmentSource::Heuristic);
    assert_eq!(report.deployment_source, AssessmentSource::Heuristic);
    assert_eq!(report.call_ids.len(), 600);
    assert!(report
        .diagnostics
        .iter()
        .any(|d| d.contains("every detail level")));
    assert_eq!(backend.invocations(), 0);
}

#[test]
fn out_of_range_probability_is_clamped_with_diagnostic() {
    let backend = Arc::new(MockBackend::with_responder(|_, prompt| {
        if prompt.contains("win_probability") {
            Ok(assessment_json(130))
        } else {
            Ok(default_reply(prompt))
        }
    }));
    let orch = orchestrator(&backend);
    let analyses = vec![call("call-1", CallType::DiscoveryCall, &[])];

    let report = EngagementAggregator::new(&orch)
        .aggregate(&analyses)
        .unwrap();

    assert_eq!(report.win_probability, 100);
    assert_eq!(report.diagnostics.len(), 1);
    assert!(report.diagnostics[0].contains("130"));
}

#[test]
fn unavailable_assessment_uses_heuristic() {
    let backend = Arc::new(MockBackend::with_responder(|_, _| Err(network_error())));
    let orch = orchestrator(&backend);
    let analyses = vec![
        call("call-1", CallType::DiscoveryCall, &["Send pricing proposal"]),
        call("call-2", CallType::DemoCall, &[]),
    ];

    let report = EngagementAggregator::new(&orch)
        .aggregate(&analyses)
        .unwrap();

    assert_eq!(report.assessment_source, AssessmentSource::Heuristic);
    // 50 + 2 * (10 + 5) + 5 for the demo
    assert_eq!(report.win_probability, 85);
    assert!(report
        .diagnostics
        .iter()
        .any(|d| d.contains("heuristic assessment")));
    assert_eq!(report.next_steps, vec!["Send pricing proposal"]);
    // No model snippets: first raw snippet of each call
    assert_eq!(
        report.supporting_snippets,
        vec!["[call-1] \"Quote from call-1\"", "[call-2] \"Quote from call-2\""]
    );
}

#[test]
fn partial_calls_are_reported() {
    let backend = Arc::new(MockBackend::new());
    let orch = orchestrator(&backend);
    let mut analysis = call("call-1", CallType::DiscoveryCall, &[]);
    analysis.partial = true;

    let report = EngagementAggregator::new(&orch)
        .aggregate(&[analysis])
        .unwrap();

    assert_eq!(report.partial_calls, vec!["call-1"]);
    assert!(report.diagnostics.iter().any(|d| d.contains("partial")));
}
