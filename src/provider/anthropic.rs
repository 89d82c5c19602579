use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{failure, missing_key, BackendRequest};
use crate::errors::BackendError;
use crate::wire::RawResponse;

const API_VERSION: &str = "2023-06-01";

/// Anthropic messages API.
pub struct Anthropic {
    client: Client,
    base: String,
    timeout: Duration,
}

#[derive(Serialize)]
struct MsgRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: [Msg<'a>; 1],
}

#[derive(Serialize)]
struct Msg<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MsgResponse {
    #[serde(default)]
    content: Vec<Block>,
}

#[derive(Deserialize)]
struct Block {
    #[serde(default)]
    r#type: String,
    #[serde(default)]
    text: String,
}

impl Anthropic {
    pub fn new(client: Client, base: &str, timeout: Duration) -> Self {
        Self {
            client,
            base: base.trim_end_matches('/').to_string(),
            timeout,
        }
    }

    pub async fn messages(&self, req: &BackendRequest, model: &str) -> Result<RawResponse, BackendError> {
        let api_key = std::env::var("ANTHROPIC_API_KEY").map_err(|_| missing_key("ANTHROPIC_API_KEY"))?;
        let url = format!("{}/messages", self.base);
        let body = MsgRequest {
            model,
            max_tokens: req.max_output_tokens,
            system: &req.system,
            messages: [Msg { role: "user", content: &req.user }],
        };
        debug!(%url, model, "anthropic request");

        let resp = self
            .client
            .post(&url)
            .header("x-api-key", api_key)
            .header("anthropic-version", API_VERSION)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| BackendError::from_reqwest(e, self.timeout))?;
        if !resp.status().is_success() {
            return Err(failure(resp).await);
        }

        let text = resp
            .text()
            .await
            .map_err(|e| BackendError::from_reqwest(e, self.timeout))?;
        let content = extract_text(&text)?;
        debug!(model, chars = content.len(), "anthropic response");
        Ok(RawResponse::new(model, content))
    }
}

/// Concatenates the text blocks of a messages response.
fn extract_text(body: &str) -> Result<String, BackendError> {
    let parsed: MsgResponse =
        serde_json::from_str(body).map_err(|e| BackendError::Malformed(format!("anthropic: {e}")))?;
    let text: String = parsed
        .content
        .into_iter()
        .filter(|b| b.r#type == "text")
        .map(|b| b.text)
        .collect();
    if text.is_empty() {
        Err(BackendError::Malformed("anthropic: empty content".into()))
    } else {
        Ok(text)
    }
}
