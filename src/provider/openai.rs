use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{failure, missing_key, BackendRequest};
use crate::errors::BackendError;
use crate::wire::RawResponse;

/// OpenAI chat completions.
pub struct OpenAi {
    client: Client,
    base: String,
    timeout: Duration,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [Msg<'a>; 2],
    max_completion_tokens: u32,
}

#[derive(Serialize)]
struct Msg<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAi {
    pub fn new(client: Client, base: &str, timeout: Duration) -> Self {
        Self {
            client,
            base: base.trim_end_matches('/').to_string(),
            timeout,
        }
    }

    pub async fn chat(&self, req: &BackendRequest, model: &str) -> Result<RawResponse, BackendError> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| missing_key("OPENAI_API_KEY"))?;
        let url = format!("{}/chat/completions", self.base);
        let body = ChatRequest {
            model,
            messages: [
                Msg { role: "system", content: &req.system },
                Msg { role: "user", content: &req.user },
            ],
            max_completion_tokens: req.max_output_tokens,
        };
        debug!(%url, model, "openai request");

        let resp = self
            .client
            .post(&url)
            .bearer_auth(api_key)
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
        let content = extract_content(&text)?;
        debug!(model, chars = content.len(), "openai response");
        Ok(RawResponse::new(model, content))
    }
}

fn extract_content(body: &str) -> Result<String, BackendError> {
    let parsed: ChatResponse =
        serde_json::from_str(body).map_err(|e| BackendError::Malformed(format!("openai: {e}")))?;
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| BackendError::Malformed("openai: no message content".into()))
}
