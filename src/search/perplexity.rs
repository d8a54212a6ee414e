//! Perplexity chat completions クライアント

use super::AnswerSource;
use crate::error::{ExecCvError, Result};
use exec_cv_common::SYSTEM_PROMPT;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "https://api.perplexity.ai/chat/completions";
const TEMPERATURE: f32 = 0.1;

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: String,
}

pub struct PerplexityClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
}

impl PerplexityClient {
    pub fn new(api_key: String, model: String, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ExecCvError::Config(format!("HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_key,
            model,
            endpoint: DEFAULT_ENDPOINT.to_string(),
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

/// reqwest のエラーを再試行可否つきの分類に変換
pub(crate) fn classify_transport_error(e: reqwest::Error) -> ExecCvError {
    if e.is_timeout() {
        ExecCvError::Timeout(e.to_string())
    } else if e.is_connect() || e.is_request() {
        ExecCvError::Network(e.to_string())
    } else {
        ExecCvError::Fetch(e.to_string())
    }
}

/// HTTP 狀態碼を分類（401/403 は認証エラー）
pub(crate) fn classify_status(status: reqwest::StatusCode, body: String) -> ExecCvError {
    match status.as_u16() {
        401 | 403 => ExecCvError::Auth(format!("HTTP {}", status.as_u16())),
        code => ExecCvError::Http {
            status: code,
            message: body.chars().take(200).collect(),
        },
    }
}

impl AnswerSource for PerplexityClient {
    async fn ask(&self, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage { role: "system", content: SYSTEM_PROMPT },
                ChatMessage { role: "user", content: prompt },
            ],
            temperature: TEMPERATURE,
        };

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, body));
        }

        let parsed: ChatResponse = response.json().await.map_err(classify_transport_error)?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();

        tracing::trace!(chars = content.chars().count(), "perplexity answer received");
        Ok(content)
    }
}
