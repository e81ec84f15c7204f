use reqwest::{header::AUTHORIZATION, Client};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use crate::{
    config::ChatConfig,
    errors::{AppError, Result},
    models::StoryResult,
    services::{
        story_formatter::{parse_story_text, SYSTEM_PROMPT},
        upstream::{bearer_header, check_status},
    },
};

const SERVICE: &str = "chat-completion";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct ChatCompletionRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// Client for an OpenAI-compatible chat-completion endpoint.
#[derive(Clone)]
pub struct ChatClient {
    client: Client,
    config: ChatConfig,
}

impl ChatClient {
    pub fn new(config: ChatConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self { client, config })
    }

    /// Sends one system + user exchange and returns the raw reply text.
    pub async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let authorization = bearer_header(SERVICE, self.config.api_key.as_deref())?;
        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));

        let body = ChatCompletionRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: Role::System,
                    content: system.to_string(),
                },
                ChatMessage {
                    role: Role::User,
                    content: user.to_string(),
                },
            ],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        debug!("Sending chat completion request - model={}", self.config.model);
        let start = std::time::Instant::now();

        let response = self
            .client
            .post(&url)
            .header(AUTHORIZATION, authorization)
            .json(&body)
            .send()
            .await?;
        let response = check_status(SERVICE, response).await?;

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| AppError::MalformedResponse(format!("Chat response: {}", e)))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                AppError::MalformedResponse("Chat response has no message content".to_string())
            })?;

        info!(
            "Chat completion finished - duration={:.2}s, chars={}",
            start.elapsed().as_secs_f32(),
            content.len()
        );
        Ok(content)
    }

    pub async fn generate_story(&self, prompt: &str, fallback_name: &str) -> Result<StoryResult> {
        let raw = self.complete(SYSTEM_PROMPT, prompt).await?;
        Ok(parse_story_text(&raw, fallback_name))
    }
}
