use std::path::Path;
use std::time::Duration;

use fs_err as fs;
use serde::{Deserialize, Serialize};

use crate::enhance::EnhanceConfig;
use crate::errors::ConfigError;
use crate::orchestrator::{BackoffConfig, OrchestratorConfig};
use crate::wire::GenerationRequest;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Candidate models, tried in order.
    pub models: Vec<String>,
    pub timeout_secs: u64,
    pub max_attempts: u32,
    pub max_attempts_per_model: u32,
    pub min_completeness: f64,
    pub max_concurrent: usize,
    pub min_spacing_ms: u64,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub backoff_multiplier: f64,
    pub max_output_tokens: u32,
    pub enhance: EnhanceConfig,
    pub out_dir: String,
    pub save_responses: bool,
    pub openai_base: String,
    pub anthropic_base: String,
    pub ollama_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            models: vec!["gpt-4.1-mini".into(), "claude-sonnet-4".into(), "gpt-4.1".into()],
            timeout_secs: 120,
            max_attempts: 4,
            max_attempts_per_model: 2,
            min_completeness: 70.0,
            max_concurrent: 3,
            min_spacing_ms: 500,
            initial_backoff_ms: 1_000,
            max_backoff_ms: 30_000,
            backoff_multiplier: 2.0,
            max_output_tokens: 16_000,
            enhance: EnhanceConfig::default(),
            out_dir: ".sitesmith".into(),
            save_responses: false,
            openai_base: "https://api.openai.com/v1".into(),
            anthropic_base: "https://api.anthropic.com/v1".into(),
            ollama_url: "http://localhost:11434".into(),
        }
    }
}

impl Config {
    /// Read `path` as TOML; missing keys take their defaults. `None` yields
    /// the defaults outright.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Invalid {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            max_attempts_per_model: self.max_attempts_per_model,
            min_completeness: self.min_completeness,
            max_output_tokens: self.max_output_tokens,
            backoff: BackoffConfig {
                initial_delay: Duration::from_millis(self.initial_backoff_ms),
                max_delay: Duration::from_millis(self.max_backoff_ms),
                multiplier: self.backoff_multiplier,
            },
            max_concurrent: self.max_concurrent,
            min_spacing: Duration::from_millis(self.min_spacing_ms),
            enhance: self.enhance.clone(),
        }
    }

    pub fn request(&self, prompt: impl Into<String>) -> GenerationRequest {
        GenerationRequest::new(prompt, self.models.clone(), self.timeout(), self.max_attempts)
    }
}
