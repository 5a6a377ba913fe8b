use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use crate::config::CompletionConfig;
use crate::error::{AutoTranslateError, Result};

/// One outbound completion: a system instruction plus the user payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    pub target_language: String,
    pub system: String,
    pub user: String,
}

/// External completion API
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Send one request and return the raw text the model produced
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    response_format: ResponseFormat,
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
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI-compatible chat completions client
pub struct HttpCompletionClient {
    client: Client,
    config: CompletionConfig,
    api_key: String,
}

impl HttpCompletionClient {
    pub fn new(config: CompletionConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            AutoTranslateError::Config(format!("API key variable {} is not set", config.api_key_env))
        })?;
        Self::with_api_key(config, api_key)
    }

    pub fn with_api_key(config: CompletionConfig, api_key: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            config,
            api_key,
        })
    }

    fn chat_request<'a>(&'a self, request: &'a CompletionRequest) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage { role: "system", content: &request.system },
                ChatMessage { role: "user", content: &request.user },
            ],
            temperature: self.config.temperature,
            response_format: ResponseFormat { kind: "json_object" },
        }
    }
}

#[async_trait]
impl CompletionClient for HttpCompletionClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let url = format!("{}/chat/completions", self.config.endpoint.trim_end_matches('/'));

        debug!("Sending completion request for '{}' to: {}", request.target_language, url);

        let response = self.client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&self.chat_request(request))
            .send()
            .await
            .map_err(|e| AutoTranslateError::Translation(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AutoTranslateError::Translation(format!(
                "Completion API error {}: {}", status, error_text
            )));
        }

        let chat: ChatResponse = response.json().await
            .map_err(|e| AutoTranslateError::Translation(format!("Failed to parse response: {}", e)))?;

        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();

        debug!("Raw completion response: {}", content);

        if content.trim().is_empty() {
            return Err(AutoTranslateError::Translation("Empty completion received".to_string()));
        }
        Ok(content)
    }
}

/// Check that the completion endpoint answers and accepts the key
pub async fn check_completion_availability(config: &CompletionConfig) -> Result<()> {
    let api_key = std::env::var(&config.api_key_env).map_err(|_| {
        AutoTranslateError::Config(format!("API key variable {} is not set", config.api_key_env))
    })?;
    let url = format!("{}/models", config.endpoint.trim_end_matches('/'));

    let response = Client::new()
        .get(&url)
        .bearer_auth(api_key)
        .send()
        .await
        .map_err(|e| AutoTranslateError::Translation(format!("Failed to connect to completion API: {}", e)))?;

    if response.status().is_success() {
        info!("Completion API at {} is available (model '{}')", config.endpoint, config.model);
        Ok(())
    } else {
        Err(AutoTranslateError::Translation(format!(
            "Completion API at {} answered {}", config.endpoint, response.status()
        )))
    }
}
