//! End-to-end engagement runs against a scripted backend

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use callscope::analyzer::backend::ModelBackend;
use callscope::analyzer::types::AssessmentSource;
use callscope::analyzer::{
    AnalysisError, AnalyzeOptions, AnalyzerService, CallType, Transcript,
};
use callscope::config::AnalysisConfig;

use crate::helpers::{
    auth_error, default_reply, service, test_config, three_segment_transcript, MockBackend,
};

fn engagement() -> Vec<Transcript> {
    vec![
        Transcript::new(
            "acme-discovery",
            "Initial discovery call with Acme.\nAE: What does your rollout look like?",
        ),
        Transcript::new(
            "acme-demo",
            "Product demo for Acme.\nSE: Here is the admin console.",
        ),
        Transcript::new(
            "acme-pov",
            "POV sync with Acme.\nCustomer: The pilot went well.",
        ),
    ]
}

#[test]
fn engagement_run_produces_report() {
    let backend = Arc::new(MockBackend::new());
    let svc = service(&backend, test_config());

    let run = svc
        .analyze_engagement(engagement(), &AnalyzeOptions::default().workers(3), |_, _| {})
        .unwrap();

    let ids: Vec<_> = run.calls.iter().map(|c| c.call_id.as_str()).collect();
    assert_eq!(ids, vec!["acme-discovery", "acme-demo", "acme-pov"]);
    let types: Vec<_> = run.calls.iter().map(|c| c.call_type).collect();
    assert_eq!(
        types,
        vec![CallType::DiscoveryCall, CallType::DemoCall, CallType::PovCheckIn]
    );
    assert!(run.failed_calls.is_empty());

    assert_eq!(run.report.win_probability, 72);
    assert_eq!(run.report.assessment_source, AssessmentSource::Model);
    // Every call reports the same follow-up
    assert_eq!(run.report.merged_action_items.len(), 1);
    assert_eq!(
        run.report.merged_action_items[0].source_call_ids,
        vec!["acme-discovery", "acme-demo", "acme-pov"]
    );

    assert_eq!(run.report.deployment_source, AssessmentSource::Model);
    assert_eq!(
        run.report.technical_deployment.scm_platform.platform.as_deref(),
        Some("GitHub")
    );
    assert_eq!(run.report.stats.total_action_items, 3);
    assert_eq!(run.report.stats.unique_action_items, 1);

    // 3 tasks per call, the assessment and the deployment analysis;
    // keywords classify every call
    assert_eq!(backend.invocations(), 11);
    assert_eq!(run.usage.requests, 11);
    assert_eq!(run.usage.input_tokens, 1_100);
}

#[test]
fn duplicate_call_ids_rejected_before_analysis() {
    let backend = Arc::new(MockBackend::new());
    let svc = service(&backend, test_config());
    let transcripts = vec![
        Transcript::new("call", "Initial discovery call with Acme."),
        Transcript::new("call", "Product demo for Acme."),
    ];

    let err = svc
        .analyze_engagement(transcripts, &AnalyzeOptions::default(), |_, _| {})
        .unwrap_err();
    assert!(matches!(err, AnalysisError::Validation { ref call_id, .. } if call_id == "call"));
    assert_eq!(backend.invocations(), 0);
}

#[test]
fn many_calls_in_small_window_keep_their_analyses() {
    let backend = Arc::new(MockBackend::new());
    let config = AnalysisConfig {
        context_window: 4_000,
        max_output_tokens: 500,
        ..test_config()
    };
    let svc = service(&backend, config);
    let transcripts: Vec<_> = (0..60)
        .map(|i| {
            Transcript::new(
                format!("acme-{}", i),
                format!("Initial discovery call number {} with Acme.", i),
            )
        })
        .collect();

    let run = svc
        .analyze_engagement(transcripts, &AnalyzeOptions::default(), |_, _| {})
        .unwrap();

    assert_eq!(run.calls.len(), 60);
    assert!(run.failed_calls.is_empty());
    assert_eq!(run.report.call_ids.len(), 60);
    assert_eq!(run.report.assessment_source, AssessmentSource::Model);
    assert!(run
        .report
        .diagnostics
        .iter()
        .any(|d| d.contains("trimmed")));
}

#[test]
fn progress_callback_sees_every_call() {
    let backend = Arc::new(MockBackend::new());
    let svc = service(&backend, test_config());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);

    svc.analyze_engagement(engagement(), &AnalyzeOptions::default(), move |done, total| {
        sink.lock().unwrap().push((done, total));
    })
    .unwrap();

    let mut seen = seen.lock().unwrap().clone();
    seen.sort();
    assert_eq!(seen, vec![(1, 3), (2, 3), (3, 3)]);
}

#[test]
fn empty_transcript_is_reported_as_failed_call() {
    let backend = Arc::new(MockBackend::new());
    let svc = service(&backend, test_config());
    let mut transcripts = engagement();
    transcripts.push(Transcript::new("blank", "   "));

    let run = svc
        .analyze_engagement(transcripts, &AnalyzeOptions::default(), |_, _| {})
        .unwrap();

    assert_eq!(run.calls.len(), 3);
    assert_eq!(run.failed_calls.len(), 1);
    assert_eq!(run.failed_calls[0].call_id, "blank");
    assert!(run.failed_calls[0].error.contains("empty"));
}

#[test]
fn auth_error_aborts_run_with_call_context() {
    let backend = Arc::new(MockBackend::with_responder(|_, _| Err(auth_error())));
    let svc = service(&backend, test_config());

    let err = svc
        .analyze_engagement(engagement(), &AnalyzeOptions::default().workers(1), |_, _| {})
        .unwrap_err();

    match err {
        AnalysisError::Call { call_id, source } => {
            assert_eq!(call_id, "acme-discovery");
            assert!(matches!(*source, AnalysisError::Auth(_)));
        }
        other => panic!("expected Call error, got {:?}", other),
    }
}

#[test]
fn no_transcripts_is_empty_engagement() {
    let backend = Arc::new(MockBackend::new());
    let svc = service(&backend, test_config());

    let err = svc
        .analyze_engagement(Vec::new(), &AnalyzeOptions::default(), |_, _| {})
        .unwrap_err();
    assert!(matches!(err, AnalysisError::EmptyEngagement));
}

#[test]
fn invalid_config_is_rejected() {
    let backend: Arc<dyn ModelBackend> = Arc::new(MockBackend::new());
    let config = AnalysisConfig {
        temperature: 2.0,
        ..test_config()
    };
    let err = AnalyzerService::new(config, backend).err().unwrap();
    assert!(matches!(err, AnalysisError::Config(_)));
}

#[test]
fn cancelled_run_still_returns_report() {
    let backend = Arc::new(MockBackend::new());
    let svc = service(&backend, test_config());
    let options = AnalyzeOptions::default();
    options.cancel.cancel();

    let run = svc
        .analyze_engagement(engagement(), &options, |_, _| {})
        .unwrap();

    assert_eq!(run.calls.len(), 3);
    assert!(run.calls.iter().all(|c| c.partial));
    assert_eq!(run.report.assessment_source, AssessmentSource::Heuristic);
    assert_eq!(backend.invocations(), 0);
}

#[test]
fn concurrent_calls_share_one_backend() {
    let in_flight = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let (current, max) = (Arc::clone(&in_flight), Arc::clone(&peak));
    let backend = Arc::new(MockBackend::with_responder(move |_, prompt| {
        let now = current.fetch_add(1, Ordering::SeqCst) + 1;
        max.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(std::time::Duration::from_millis(5));
        current.fetch_sub(1, Ordering::SeqCst);
        Ok(default_reply(prompt))
    }));
    let config = AnalysisConfig {
        max_tokens_per_chunk: 120,
        chunk_overlap_chars: 50,
        ..test_config()
    };
    let svc = service(&backend, config);
    let transcripts: Vec<_> = (0..4)
        .map(|i| Transcript::new(format!("call-{}", i), three_segment_transcript()))
        .collect();

    let run = svc
        .analyze_engagement(transcripts, &AnalyzeOptions::default().workers(4), |_, _| {})
        .unwrap();

    assert_eq!(run.calls.len(), 4);
    assert!(run.calls.iter().all(|c| c.chunk_count == 3 && !c.partial));
    assert!(peak.load(Ordering::SeqCst) >= 1);
}
