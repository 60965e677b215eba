//! Text-completion service used to answer `GPT:` chat messages.
//!
//! The coordinator treats the service as a pure pass-through: prompt in,
//! reply out, no state.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Chat text prefix that routes a message to the completion service.
pub const COMMAND_TOKEN: &str = "GPT:";

const SYSTEM_PROMPT: &str = "You are a university chatbot agent. Be descriptive and helpful";

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("completion service is not configured")]
    Disabled,

    #[error("completion request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("completion service returned no text")]
    EmptyReply,
}

#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError>;
}

/// Stand-in used when no API key is configured. Every request fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledCompletion;

#[async_trait]
impl CompletionService for DisabledCompletion {
    async fn complete(&self, _prompt: &str) -> Result<String, CompletionError> {
        Err(CompletionError::Disabled)
    }
}

/// Settings for an OpenAI-compatible chat completions endpoint.
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl CompletionConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: "gpt-3.5-turbo".to_string(),
            temperature: 0.7,
            max_tokens: 256,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

/// HTTP client for an OpenAI-compatible chat completions API.
pub struct ChatCompletionClient {
    client: reqwest::Client,
    config: CompletionConfig,
}

impl ChatCompletionClient {
    pub fn new(config: CompletionConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl CompletionService for ChatCompletionClient {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let response: ChatResponse = self
            .client
            .post(self.config.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        extract_reply(response)
    }
}

fn extract_reply(response: ChatResponse) -> Result<String, CompletionError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .ok_or(CompletionError::EmptyReply)
}

/// If `text` is a completion command, return the prompt that follows the token.
pub fn command_prompt(text: &str) -> Option<&str> {
    text.strip_prefix(COMMAND_TOKEN).map(str::trim)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_prompt() {
        assert_eq!(command_prompt("GPT: what is rust?"), Some("what is rust?"));
        assert_eq!(command_prompt("GPT:"), Some(""));
        assert_eq!(command_prompt("hello GPT: there"), None);
        assert_eq!(command_prompt("gpt: lower"), None);
    }

    #[test]
    fn test_extract_reply() {
        let json = r#"{"choices":[{"message":{"role":"assistant","content":"  Hi there \n"}}]}"#;
        let response: ChatResponse = serde_json::from_str(json).unwrap();
        assert_eq!(extract_reply(response).unwrap(), "Hi there");

        let empty: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(matches!(extract_reply(empty), Err(CompletionError::EmptyReply)));
    }

    #[test]
    fn test_endpoint_joins_cleanly() {
        let config = CompletionConfig::new("https://api.example.com/v1/", "key");
        assert_eq!(config.endpoint(), "https://api.example.com/v1/chat/completions");
    }

    #[tokio::test]
    async fn test_disabled_always_fails() {
        let err = DisabledCompletion.complete("hi").await.unwrap_err();
        assert!(matches!(err, CompletionError::Disabled));
    }
}
