use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{failure, BackendRequest};
use crate::errors::BackendError;
use crate::wire::RawResponse;

/// Local Ollama chat endpoint.
pub struct Ollama {
    client: Client,
    url: String,
    timeout: Duration,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [Msg<'a>; 2],
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Serialize)]
struct Msg<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: MsgOut,
}

#[derive(Deserialize)]
struct MsgOut {
    content: String,
}

impl Ollama {
    pub fn new(client: Client, url: &str, timeout: Duration) -> Self {
        Self {
            client,
            url: url.trim_end_matches('/').to_string(),
            timeout,
        }
    }

    pub async fn chat(&self, req: &BackendRequest, model: &str) -> Result<RawResponse, BackendError> {
        let url = format!("{}/api/chat", self.url);
        let body = ChatRequest {
            model,
            messages: [
                Msg { role: "system", content: &req.system },
                Msg { role: "user", content: &req.user },
            ],
            stream: false,
            options: OllamaOptions { temperature: 0.1, num_predict: req.max_output_tokens },
        };
        debug!(%url, model, "ollama request");

        let resp = self
            .client
            .post(&url)
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
        // non-chat bodies are passed on as-is; the parse cascade copes
        let content = match serde_json::from_str::<ChatResponse>(&text) {
            Ok(parsed) => parsed.message.content,
            Err(_) => text,
        };
        Ok(RawResponse::new(format!("ollama:{model}"), content))
    }
}
