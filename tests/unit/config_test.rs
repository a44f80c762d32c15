//! Unit tests for config module

use callscope::config::{AnalysisConfig, BackendKind};
use callscope::Config;

#[test]
fn default_config_has_expected_values() {
    let config = Config::default();
    assert_eq!(config.analysis.primary_model, "claude-sonnet-4-20250514");
    assert_eq!(config.analysis.fallback_model, "claude-3-7-sonnet-20250219");
    assert_eq!(config.analysis.max_tokens_per_chunk, 8_000);
    assert_eq!(config.analysis.chunk_overlap_chars, 500);
    assert_eq!(config.analysis.base_retry_delay_ms, 5_000);
    assert_eq!(config.analysis.max_retries, 3);
    assert_eq!(config.analysis.max_delay_ms, 60_000);
    assert_eq!(config.analysis.rate_limit_tokens_per_minute, 40_000);
    assert_eq!(config.analysis.max_output_tokens, 4_000);
    assert!((config.analysis.temperature - 0.3).abs() < f32::EPSILON);
    assert_eq!(config.analysis.context_window, 200_000);
    assert!(config.analysis.workers.is_none());
    // Backend defaults
    assert_eq!(config.backend.kind, BackendKind::Api);
    assert_eq!(config.backend.api_base_url, "https://api.anthropic.com");
    assert_eq!(config.backend.api_key_env, "ANTHROPIC_API_KEY");
    assert_eq!(config.backend.request_timeout_secs, 120);
    assert!(config.validate().is_ok());
}

#[test]
fn config_serialization_roundtrip() {
    let mut config = Config::default();
    config.analysis.workers = Some(4);
    config.backend.kind = BackendKind::Cli;
    config.backend.cli_extra_args = vec!["--verbose".to_string()];

    let toml_str = toml::to_string(&config).unwrap();
    let parsed: Config = toml::from_str(&toml_str).unwrap();
    assert_eq!(parsed, config);
}

#[test]
fn partial_analysis_section_keeps_defaults() {
    let toml_str = r#"
[analysis]
primary_model = "claude-opus-4-20250514"
max_tokens_per_chunk = 4000
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(config.analysis.primary_model, "claude-opus-4-20250514");
    assert_eq!(config.analysis.max_tokens_per_chunk, 4_000);
    assert_eq!(config.analysis.chunk_overlap_chars, 500);
    assert_eq!(config.backend.kind, BackendKind::Api);
}

#[test]
fn backend_section_parses() {
    let toml_str = r#"
[backend]
kind = "cli"
request_timeout_secs = 300
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(config.backend.kind, BackendKind::Cli);
    assert_eq!(config.backend.request_timeout_secs, 300);
}

#[test]
fn unknown_backend_kind_is_a_parse_error() {
    let toml_str = r#"
[backend]
kind = "grpc"
"#;
    assert!(toml::from_str::<Config>(toml_str).is_err());
}

#[test]
fn validate_reports_first_invalid_value() {
    let config = Config {
        analysis: AnalysisConfig {
            max_tokens_per_chunk: 50,
            ..Default::default()
        },
        ..Default::default()
    };
    let err = config.validate().unwrap_err();
    assert!(err.contains("max_tokens_per_chunk"));
}

#[test]
fn validate_checks_backend_section() {
    let mut config = Config::default();
    config.backend.request_timeout_secs = 0;
    let err = config.validate().unwrap_err();
    assert!(err.contains("request_timeout_secs"));
}

#[test]
fn workers_bounds() {
    let ok = AnalysisConfig {
        workers: Some(32),
        ..Default::default()
    };
    assert!(ok.validate().is_ok());

    let too_many = AnalysisConfig {
        workers: Some(33),
        ..Default::default()
    };
    assert!(too_many.validate().is_err());
}
