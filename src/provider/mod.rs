//! Generation backends. Each adapter turns a [`BackendRequest`] into the
//! assistant's raw text; [`ModelRouter`] picks the adapter from the model id.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, Response};
use serde::Serialize;

use crate::config::Config;
use crate::errors::BackendError;
use crate::wire::RawResponse;

pub mod anthropic;
pub mod ollama;
pub mod openai;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendRequest {
    pub system: String,
    pub user: String,
    pub model: String,
    pub max_output_tokens: u32,
}

#[async_trait]
pub trait Provider: Send + Sync {
    async fn complete(&self, req: &BackendRequest) -> Result<RawResponse, BackendError>;
}

pub type DynProvider = Arc<dyn Provider>;

/// Which adapter serves a model id, and the id that adapter should send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    OpenAi(String),
    Anthropic(String),
    Ollama(String),
}

const MODEL_ALIASES: &[(&str, &str)] = &[
    ("claude-sonnet-4", "claude-sonnet-4-20250514"),
    ("claude-opus-4", "claude-opus-4-20250514"),
];

pub fn resolve_model(id: &str) -> Route {
    let id = id.trim();
    if let Some(name) = id.strip_prefix("ollama:") {
        return Route::Ollama(name.to_string());
    }
    let resolved = MODEL_ALIASES
        .iter()
        .find(|(alias, _)| *alias == id)
        .map(|(_, full)| (*full).to_string())
        .unwrap_or_else(|| id.to_string());
    if resolved.starts_with("claude-") {
        Route::Anthropic(resolved)
    } else {
        // gpt-*, o-series and anything unrecognised
        Route::OpenAi(resolved)
    }
}

/// Dispatches each request to the adapter that serves its model.
pub struct ModelRouter {
    openai: openai::OpenAi,
    anthropic: anthropic::Anthropic,
    ollama: ollama::Ollama,
}

impl ModelRouter {
    pub fn new(cfg: &Config) -> Self {
        let client = Client::new();
        let timeout = cfg.timeout();
        Self {
            openai: openai::OpenAi::new(client.clone(), &cfg.openai_base, timeout),
            anthropic: anthropic::Anthropic::new(client.clone(), &cfg.anthropic_base, timeout),
            ollama: ollama::Ollama::new(client, &cfg.ollama_url, timeout),
        }
    }
}

#[async_trait]
impl Provider for ModelRouter {
    async fn complete(&self, req: &BackendRequest) -> Result<RawResponse, BackendError> {
        match resolve_model(&req.model) {
            Route::OpenAi(model) => self.openai.chat(req, &model).await,
            Route::Anthropic(model) => self.anthropic.messages(req, &model).await,
            Route::Ollama(model) => self.ollama.chat(req, &model).await,
        }
    }
}

/// Delta-seconds `Retry-After` only; an HTTP-date value yields `None` and
/// the caller falls back to its exponential backoff.
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Reads the body of a non-success response and classifies it.
pub(crate) async fn failure(resp: Response) -> BackendError {
    let status = resp.status().as_u16();
    let retry = retry_after(resp.headers());
    let body = resp.text().await.unwrap_or_default();
    match BackendError::from_status(status, &body) {
        BackendError::RateLimited { .. } => BackendError::RateLimited { retry_after: retry },
        other => other,
    }
}

pub(crate) fn missing_key(var: &str) -> BackendError {
    BackendError::ModelRefused {
        status: 401,
        message: format!("{var} is not set"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn missing_key_skips_only_that_model() {
        let err = missing_key("OPENAI_API_KEY");
        assert!(matches!(err, BackendError::ModelRefused { status: 401, .. }));
        assert!(!err.is_fatal());
    }

    #[test]
    fn routes_by_prefix() {
        assert_eq!(
            resolve_model("claude-sonnet-4"),
            Route::Anthropic("claude-sonnet-4-20250514".into())
        );
        assert_eq!(
            resolve_model("claude-3-5-haiku-latest"),
            Route::Anthropic("claude-3-5-haiku-latest".into())
        );
        assert_eq!(resolve_model("gpt-4.1-mini"), Route::OpenAi("gpt-4.1-mini".into()));
        assert_eq!(resolve_model("ollama:llama3.1"), Route::Ollama("llama3.1".into()));
        assert_eq!(resolve_model("mystery-model"), Route::OpenAi("mystery-model".into()));
    }

    #[test]
    fn parses_retry_after_seconds() {
        let mut headers = HeaderMap::new();
        assert_eq!(retry_after(&headers), None);
        headers.insert(RETRY_AFTER, HeaderValue::from_static("7"));
        assert_eq!(retry_after(&headers), Some(Duration::from_secs(7)));
        headers.insert(RETRY_AFTER, HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"));
        assert_eq!(retry_after(&headers), None);
    }
}
