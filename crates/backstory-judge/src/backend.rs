//! Chat-completion backends.
//!
//! [`OpenAiCompatBackend`] speaks the OpenAI `/v1/chat/completions` protocol
//! (Groq, OpenAI, vLLM, llama.cpp server). One backend is bound to one model.

use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use reqwest::header;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use backstory_core::config::JudgeSettings;

use crate::error::{make_snippet, JudgeError, Result};

/// One single-turn prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub prompt: String,
    /// Ask the backend to return a JSON object.
    pub json_mode: bool,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Result of one backend call as the fallback policy sees it.
#[derive(Debug)]
pub enum BackendOutcome {
    Response(String),
    /// Retry the same backend.
    TransientFailure(JudgeError),
    /// Give up on this backend and move to the next one.
    PermanentFailure(JudgeError),
}

impl From<Result<String>> for BackendOutcome {
    fn from(result: Result<String>) -> Self {
        match result {
            Ok(content) => BackendOutcome::Response(content),
            Err(e) if e.is_retryable() => BackendOutcome::TransientFailure(e),
            Err(e) => BackendOutcome::PermanentFailure(e),
        }
    }
}

pub trait ChatBackend: Send + Sync {
    /// Model name, for logs.
    fn name(&self) -> &str;

    /// Returns the text of the first choice.
    fn complete<'a>(&'a self, request: &'a ChatRequest) -> BoxFuture<'a, Result<String>>;
}

#[derive(Debug)]
pub struct OpenAiCompatBackend {
    client: reqwest::Client,
    model: String,
    url_chat: String,
}

impl OpenAiCompatBackend {
    pub fn new(endpoint: &str, api_key: &str, model: &str, timeout: Duration) -> Result<Self> {
        let endpoint = endpoint.trim();
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(JudgeError::InvalidEndpoint(endpoint.to_string()));
        }

        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            header::HeaderValue::from_str(&format!("Bearer {api_key}"))
                .map_err(|e| JudgeError::Decode(format!("invalid API key header: {e}")))?,
        );
        headers.insert(header::CONTENT_TYPE, header::HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder().timeout(timeout).default_headers(headers).build()?;
        let url_chat = format!("{}/v1/chat/completions", endpoint.trim_end_matches('/'));
        debug!(model, url = %url_chat, "chat backend ready");
        Ok(Self { client, model: model.to_string(), url_chat })
    }

    /// One backend per configured model, in priority order.
    ///
    /// The API key is read from the environment variable named by
    /// `judge.api_key_env`.
    pub fn from_settings(settings: &JudgeSettings) -> Result<Vec<Box<dyn ChatBackend>>> {
        if settings.models.is_empty() {
            return Err(JudgeError::NoModels);
        }
        let api_key = std::env::var(&settings.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| JudgeError::MissingApiKey(settings.api_key_env.clone()))?;
        let timeout = Duration::from_secs(settings.timeout_secs.max(1));

        let mut backends: Vec<Box<dyn ChatBackend>> = Vec::with_capacity(settings.models.len());
        for model in &settings.models {
            backends.push(Box::new(Self::new(&settings.endpoint, &api_key, model, timeout)?));
        }
        info!(endpoint = %settings.endpoint, models = ?settings.models, "judge backends initialized");
        Ok(backends)
    }

    async fn send(&self, request: &ChatRequest) -> Result<String> {
        let started = Instant::now();
        let body = ChatCompletionRequest {
            model: &self.model,
            messages: vec![ChatMessage { role: "user", content: &request.prompt }],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            response_format: request.json_mode.then_some(ResponseFormat { kind: "json_object" }),
        };

        debug!(model = %self.model, prompt_len = request.prompt.len(), "POST {}", self.url_chat);
        let resp = self.client.post(&self.url_chat).json(&body).send().await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let snippet = make_snippet(&resp.text().await.unwrap_or_default());
            error!(status, model = %self.model, %snippet, latency_ms = started.elapsed().as_millis() as u64, "chat completion returned non-success status");
            return Err(JudgeError::HttpStatus { status, url: self.url_chat.clone(), snippet });
        }

        let out: ChatCompletionResponse = resp
            .json()
            .await
            .map_err(|e| JudgeError::Decode(format!("{e}; expected `choices[0].message.content`")))?;
        let content = out.choices.into_iter().find_map(|c| c.message.content).ok_or(JudgeError::EmptyChoices)?;

        debug!(model = %self.model, latency_ms = started.elapsed().as_millis() as u64, "chat completion completed");
        Ok(content)
    }
}

impl ChatBackend for OpenAiCompatBackend {
    fn name(&self) -> &str {
        &self.model
    }

    fn complete<'a>(&'a self, request: &'a ChatRequest) -> BoxFuture<'a, Result<String>> {
        Box::pin(self.send(request))
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageOut,
}

#[derive(Debug, Deserialize)]
struct ChatMessageOut {
    content: Option<String>,
}
