use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tradeai_core::{Assistant, BotError, ChatTurn};

use crate::{DEFAULT_MODEL, DEFAULT_TIMEOUT};

const API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Configuration for the OpenAI chat client
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
    pub api_url: String,
    pub timeout: Duration,
}

impl OpenAiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: std::env::var("OPENAI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            max_tokens: 800,
            temperature: 0.7,
            api_url: API_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

#[derive(Serialize)]
struct Request<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f64,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct Response {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

pub struct OpenAiClient {
    client: Client,
    config: OpenAiConfig,
}

impl OpenAiClient {
    pub fn new(config: OpenAiConfig) -> Result<Self, BotError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| BotError::Config(format!("failed to build OpenAI client: {}", e)))?;
        Ok(Self { client, config })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }
}

fn build_request<'a>(config: &'a OpenAiConfig, messages: &'a [ChatTurn]) -> Request<'a> {
    Request {
        model: &config.model,
        max_tokens: config.max_tokens,
        temperature: config.temperature,
        messages: messages
            .iter()
            .map(|m| Message {
                role: m.role.as_str(),
                content: &m.content,
            })
            .collect(),
    }
}

#[async_trait]
impl Assistant for OpenAiClient {
    fn name(&self) -> &str {
        "OpenAI"
    }

    async fn complete(&self, messages: &[ChatTurn]) -> Result<String, BotError> {
        let request = build_request(&self.config, messages);

        let response = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    BotError::Unavailable("OpenAI request timed out".to_string())
                } else {
                    BotError::Provider(format!("OpenAI: {}", e.without_url()))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(%status, body = %body.chars().take(300).collect::<String>(), "OpenAI request failed");
            return Err(match status {
                StatusCode::UNAUTHORIZED => BotError::Config("OpenAI rejected the API key".to_string()),
                StatusCode::TOO_MANY_REQUESTS => BotError::RateLimited("OpenAI".to_string()),
                s => BotError::Provider(format!("OpenAI returned {}", s)),
            });
        }

        let parsed: Response = response
            .json()
            .await
            .map_err(|e| BotError::Provider(format!("OpenAI: invalid response: {}", e)))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| BotError::Provider("OpenAI returned an empty completion".to_string()))
    }
}
