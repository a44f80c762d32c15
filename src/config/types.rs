//! Configuration type definitions and defaults

use serde::{Deserialize, Serialize};

use super::analysis::AnalysisConfig;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub backend: BackendConfig,
}

impl Config {
    /// Validate every section.
    pub fn validate(&self) -> Result<(), String> {
        self.analysis.validate()?;
        self.backend.validate()
    }
}

/// How requests reach the model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Anthropic Messages API over HTTPS
    #[default]
    Api,
    /// Local `claude` CLI
    Cli,
}

impl std::str::FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "api" => Ok(BackendKind::Api),
            "cli" => Ok(BackendKind::Cli),
            other => Err(format!("Unknown backend '{}'. Valid: api, cli", other)),
        }
    }
}

/// Model endpoint configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default)]
    pub kind: BackendKind,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Timeout per model request in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Extra arguments passed to the CLI backend
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cli_extra_args: Vec<String>,
}

pub fn default_api_base_url() -> String {
    "https://api.anthropic.com".to_string()
}

pub fn default_api_key_env() -> String {
    "ANTHROPIC_API_KEY".to_string()
}

pub fn default_request_timeout_secs() -> u64 {
    120
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::default(),
            api_base_url: default_api_base_url(),
            api_key_env: default_api_key_env(),
            request_timeout_secs: default_request_timeout_secs(),
            cli_extra_args: Vec::new(),
        }
    }
}

impl BackendConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.request_timeout_secs == 0 {
            return Err("backend.request_timeout_secs must be > 0".to_string());
        }
        if self.request_timeout_secs > 3600 {
            return Err(format!(
                "backend.request_timeout_secs {} exceeds maximum (3600s)",
                self.request_timeout_secs
            ));
        }
        if self.kind == BackendKind::Api && self.api_key_env.trim().is_empty() {
            return Err("backend.api_key_env must not be empty".to_string());
        }
        Ok(())
    }
}
