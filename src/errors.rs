use std::time::Duration;
use thiserror::Error;

/// Failure reported by a text-generation backend for a single call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("backend unavailable ({status}): {message}")]
    Unavailable { status: u16, message: String },
    #[error("backend call timed out after {0:?}")]
    Timeout(Duration),
    #[error("backend rate limited")]
    RateLimited { retry_after: Option<Duration> },
    #[error("network error: {0}")]
    Network(String),
    #[error("backend rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },
    /// Credentials or model id this backend cannot serve; other models may.
    #[error("model not usable ({status}): {message}")]
    ModelRefused { status: u16, message: String },
    #[error("malformed backend envelope: {0}")]
    Malformed(String),
}

impl BackendError {
    /// Maps a non-success HTTP status plus response body onto the taxonomy.
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = truncate(body, 300);
        if mentions_budget(body) {
            return BackendError::Rejected { status, message };
        }
        match status {
            408 => BackendError::Timeout(Duration::ZERO),
            429 => BackendError::RateLimited { retry_after: None },
            500 | 502 | 503 | 504 | 529 => BackendError::Unavailable { status, message },
            401 | 403 | 404 => BackendError::ModelRefused { status, message },
            _ => BackendError::Rejected { status, message },
        }
    }

    pub fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            BackendError::Timeout(timeout)
        } else if let Some(status) = err.status() {
            BackendError::from_status(status.as_u16(), &err.to_string())
        } else {
            BackendError::Network(err.to_string())
        }
    }

    /// Failure of this one call rather than of the request as a whole.
    pub fn is_transient(&self) -> bool {
        !self.is_fatal()
    }

    /// Worth another attempt on the same model after a backoff.
    pub fn is_retryable_same_model(&self) -> bool {
        matches!(self, BackendError::RateLimited { .. } | BackendError::Network(_))
    }

    /// Signals the whole request should stop trying backends.
    pub fn is_fatal(&self) -> bool {
        matches!(self, BackendError::Rejected { .. })
    }
}

fn mentions_budget(body: &str) -> bool {
    let b = body.to_ascii_lowercase();
    ["budget", "insufficient_quota", "credit balance", "exceeded your current quota"]
        .iter()
        .any(|k| b.contains(k))
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}…", &s[..idx]),
        None => s.to_string(),
    }
}

/// Every cascade strategy came back empty.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("no files recovered from {response_len}-byte response after {strategies_tried} strategies")]
pub struct ParseFailure {
    pub response_len: usize,
    pub strategies_tried: usize,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Invalid {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_statuses() {
        assert!(matches!(
            BackendError::from_status(503, "overloaded"),
            BackendError::Unavailable { status: 503, .. }
        ));
        assert!(matches!(
            BackendError::from_status(529, ""),
            BackendError::Unavailable { .. }
        ));
        assert!(matches!(BackendError::from_status(429, ""), BackendError::RateLimited { .. }));
        assert!(matches!(BackendError::from_status(408, ""), BackendError::Timeout(_)));
        assert!(BackendError::from_status(400, "bad request").is_fatal());
    }

    #[test]
    fn budget_messages_are_fatal_even_on_5xx() {
        let err = BackendError::from_status(500, "Budget has been exceeded for this key");
        assert!(err.is_fatal());
        assert!(BackendError::from_status(403, "insufficient_quota").is_fatal());
    }

    #[test]
    fn credential_and_model_errors_only_skip_the_model() {
        for status in [401, 403, 404] {
            let err = BackendError::from_status(status, "model not found");
            assert!(matches!(err, BackendError::ModelRefused { .. }), "{status}");
            assert!(err.is_transient());
            assert!(!err.is_retryable_same_model());
        }
    }

    #[test]
    fn same_model_retry_only_for_rate_limit_and_network() {
        assert!(BackendError::RateLimited { retry_after: None }.is_retryable_same_model());
        assert!(BackendError::Network("reset".into()).is_retryable_same_model());
        assert!(!BackendError::Timeout(Duration::from_secs(1)).is_retryable_same_model());
        assert!(!BackendError::Unavailable { status: 502, message: String::new() }
            .is_retryable_same_model());
        assert!(BackendError::Malformed("no choices".into()).is_transient());
        assert!(!BackendError::Rejected { status: 400, message: String::new() }.is_transient());
    }
}
