use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::errors::BackendError;
use crate::parse::Strategy;
use crate::wire::RawResponse;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success { strategy: Strategy, files: usize, score: f64 },
    ParseFailed { response_len: usize },
    InvalidProject { strategy: Strategy },
    Unavailable { status: u16 },
    Timeout,
    RateLimited,
    Network { message: String },
    Rejected { status: u16, message: String },
    ModelRefused { status: u16, message: String },
    Malformed { message: String },
}

impl From<&BackendError> for AttemptOutcome {
    fn from(err: &BackendError) -> Self {
        match err {
            BackendError::Unavailable { status, .. } => AttemptOutcome::Unavailable { status: *status },
            BackendError::Timeout(_) => AttemptOutcome::Timeout,
            BackendError::RateLimited { .. } => AttemptOutcome::RateLimited,
            BackendError::Network(message) => AttemptOutcome::Network { message: message.clone() },
            BackendError::Rejected { status, message } => AttemptOutcome::Rejected {
                status: *status,
                message: message.clone(),
            },
            BackendError::ModelRefused { status, message } => AttemptOutcome::ModelRefused {
                status: *status,
                message: message.clone(),
            },
            BackendError::Malformed(message) => AttemptOutcome::Malformed { message: message.clone() },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttemptRecord {
    /// 1-based position in the request's attempt sequence.
    pub attempt: u32,
    pub model: String,
    pub emphasized: bool,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub outcome: AttemptOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalReason {
    Succeeded,
    Exhausted,
    FatalUpstream,
    /// Edit request whose response could not be used; prior project kept.
    EditUnusable,
}

/// Every attempt made on behalf of one generation request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttemptLedger {
    pub txid: Uuid,
    pub records: Vec<AttemptRecord>,
    pub terminal: Option<TerminalReason>,
    /// Every backend reply, kept in memory; files on disk are opt-in.
    #[serde(skip)]
    pub responses: Vec<RawResponse>,
}

impl Default for AttemptLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl AttemptLedger {
    pub fn new() -> Self {
        Self {
            txid: Uuid::new_v4(),
            records: Vec::new(),
            terminal: None,
            responses: Vec::new(),
        }
    }

    pub fn attempts(&self) -> u32 {
        self.records.len() as u32
    }

    pub fn attempts_for(&self, model: &str) -> u32 {
        self.records.iter().filter(|r| r.model == model).count() as u32
    }

    pub fn next_attempt(&self) -> u32 {
        self.attempts() + 1
    }

    pub fn record(
        &mut self,
        model: &str,
        emphasized: bool,
        started_at: DateTime<Utc>,
        elapsed_ms: u64,
        outcome: AttemptOutcome,
    ) {
        self.records.push(AttemptRecord {
            attempt: self.next_attempt(),
            model: model.to_string(),
            emphasized,
            started_at,
            elapsed_ms,
            outcome,
        });
    }

    pub fn retain(&mut self, raw: RawResponse) {
        self.responses.push(raw);
    }

    pub fn finish(&mut self, reason: TerminalReason) {
        self.terminal = Some(reason);
    }

    /// Models in the order they were first tried.
    pub fn models_tried(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for r in &self.records {
            if !seen.contains(&r.model.as_str()) {
                seen.push(&r.model);
            }
        }
        seen
    }
}
