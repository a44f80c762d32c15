//! Unit tests for the retry orchestrator

use std::sync::Arc;

use callscope::analyzer::{AnalysisError, CancellationToken, TaskKind};
use callscope::config::AnalysisConfig;

use crate::helpers::{
    auth_error, default_reply, network_error, orchestrator, rate_limited, service, test_config,
    MockBackend, FALLBACK, PRIMARY, SUMMARY_JSON,
};

const TEXT: &str = "AE: Let's review the rollout plan.\nCustomer: Sounds good.";

// ============================================
// Primary model
// ============================================

#[test]
fn succeeds_after_two_rate_limits() {
    let backend = Arc::new(MockBackend::new().script(
        PRIMARY,
        vec![
            Err(rate_limited()),
            Err(rate_limited()),
            Ok(SUMMARY_JSON.to_string()),
        ],
    ));
    let orch = orchestrator(&backend);

    let result = orch.analyze(TEXT, TaskKind::Summary).unwrap();
    let summary = result.into_summary().unwrap();
    assert_eq!(summary.summary, "The team reviewed the rollout plan.");

    assert_eq!(backend.invocations_for(PRIMARY), 3);
    assert_eq!(backend.invocations_for(FALLBACK), 0);
    let usage = orch.usage().summary();
    assert_eq!(usage.primary_attempts, 3);
    assert_eq!(usage.fallback_attempts, 0);
    assert_eq!(usage.rate_limit_hits, 2);
    assert_eq!(usage.fallback_switches, 0);
}

#[test]
fn malformed_reply_is_retried() {
    let backend = Arc::new(
        MockBackend::new().script(PRIMARY, vec![Ok("I cannot help with that".to_string())]),
    );
    let orch = orchestrator(&backend);

    assert!(orch.analyze(TEXT, TaskKind::Summary).is_ok());
    assert_eq!(backend.invocations_for(PRIMARY), 2);
}

#[test]
fn auth_error_is_not_retried() {
    let backend = Arc::new(MockBackend::new().script(PRIMARY, vec![Err(auth_error())]));
    let orch = orchestrator(&backend);

    let err = orch.analyze(TEXT, TaskKind::Summary).unwrap_err();
    assert!(matches!(err, AnalysisError::Auth(_)));
    assert!(err.is_fatal());
    assert_eq!(backend.invocations(), 1);
}

// ============================================
// Fallback
// ============================================

#[test]
fn switches_to_fallback_once() {
    let backend = Arc::new(MockBackend::with_responder(|model, prompt| {
        if model == PRIMARY {
            Err(network_error())
        } else {
            Ok(default_reply(prompt))
        }
    }));
    let orch = orchestrator(&backend);

    let result = orch.analyze(TEXT, TaskKind::Summary).unwrap();
    assert!(result.into_summary().is_some());

    // 1 attempt + 3 retries on the primary, then the fallback succeeds
    assert_eq!(backend.invocations_for(PRIMARY), 4);
    assert_eq!(backend.invocations_for(FALLBACK), 1);
    assert_eq!(orch.usage().summary().fallback_switches, 1);
}

#[test]
fn unavailable_after_both_models_exhausted() {
    let backend = Arc::new(MockBackend::with_responder(|_, _| Err(network_error())));
    let orch = orchestrator(&backend);

    let err = orch.analyze(TEXT, TaskKind::Sentiment).unwrap_err();
    match &err {
        AnalysisError::Unavailable {
            task,
            attempts,
            fingerprint,
            last_error,
        } => {
            assert_eq!(*task, TaskKind::Sentiment);
            assert_eq!(*attempts, 8);
            assert!(!fingerprint.is_empty());
            assert!(matches!(**last_error, AnalysisError::Network(_)));
        }
        other => panic!("expected Unavailable, got {:?}", other),
    }
    assert!(err.is_degradable());
    assert_eq!(orch.usage().summary().unavailable_tasks, 1);
}

#[test]
fn fallback_equal_to_primary_is_skipped() {
    let backend = Arc::new(MockBackend::with_responder(|_, _| Err(network_error())));
    let config = AnalysisConfig {
        fallback_model: PRIMARY.to_string(),
        ..test_config()
    };
    let orch = service(&backend, config).orchestrator(CancellationToken::new());

    let err = orch.analyze(TEXT, TaskKind::Summary).unwrap_err();
    assert!(matches!(err, AnalysisError::Unavailable { attempts: 4, .. }));
    assert_eq!(orch.usage().summary().fallback_switches, 0);
}

// ============================================
// Cancellation
// ============================================

#[test]
fn cancelled_token_stops_before_first_attempt() {
    let backend = Arc::new(MockBackend::new());
    let cancel = CancellationToken::new();
    cancel.cancel();
    let orch = service(&backend, test_config()).orchestrator(cancel);

    let err = orch.analyze(TEXT, TaskKind::Summary).unwrap_err();
    assert!(matches!(err, AnalysisError::Cancelled { attempts: 0, .. }));
    assert!(err.is_degradable());
    assert_eq!(backend.invocations(), 0);
}

#[test]
fn cancel_during_retries_stops_at_next_boundary() {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    let backend = Arc::new(MockBackend::with_responder(move |_, _| {
        trigger.cancel();
        Err(network_error())
    }));
    let orch = service(&backend, test_config()).orchestrator(cancel);

    let err = orch.analyze(TEXT, TaskKind::Summary).unwrap_err();
    assert!(matches!(err, AnalysisError::Cancelled { attempts: 1, .. }));
    assert_eq!(backend.invocations(), 1);
}
