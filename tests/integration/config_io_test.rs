//! Config file loading and saving

use std::fs;

use callscope::config::BackendKind;
use callscope::Config;
use tempfile::TempDir;

#[test]
fn load_from_missing_file_fails() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.toml");

    let err = Config::load_from(&path).unwrap_err();
    assert!(err.to_string().contains("Failed to read config file"));
}

#[test]
fn default_config_path_is_under_home() {
    assert!(Config::config_path()
        .unwrap()
        .ends_with(".config/callscope/config.toml"));
}

#[test]
fn malformed_toml_is_a_parse_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "[analysis\nmax_retries = 3").unwrap();

    let err = Config::load_from(&path).unwrap_err();
    assert!(err.to_string().contains("Failed to parse config file"));
}

#[test]
fn invalid_values_fail_validation() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "[analysis]\nchunk_overlap_chars = 100000\n").unwrap();

    let err = Config::load_or_default(Some(&path)).unwrap_err();
    let message = err.to_string();
    assert!(message.starts_with("Invalid config"));
    assert!(message.contains("chunk_overlap_chars"));
}

#[test]
fn save_then_load_roundtrip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("dir").join("config.toml");

    let mut config = Config::default();
    config.analysis.primary_model = "claude-opus-4-20250514".to_string();
    config.analysis.max_retries = 5;
    config.backend.kind = BackendKind::Cli;
    config.save_to(&path).unwrap();

    let loaded = Config::load_from(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn to_toml_has_both_sections() {
    let rendered = Config::default().to_toml().unwrap();
    assert!(rendered.contains("[analysis]"));
    assert!(rendered.contains("[backend]"));
    assert!(rendered.contains("primary_model = \"claude-sonnet-4-20250514\""));
    assert!(rendered.contains("kind = \"api\""));
    // Unset worker override is omitted
    assert!(!rendered.contains("workers"));
}
