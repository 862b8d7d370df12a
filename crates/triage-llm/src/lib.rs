//! Reasoning service and embedding clients for the triage engine

#![warn(missing_docs)]

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;
use triage_core::error::Result;

mod ollama;
pub use ollama::OllamaClient;
pub use ollama::OllamaConfig;
pub use ollama::OllamaOptions;

mod embedder;
pub use embedder::create_embedder;
pub use embedder::EmbedderConfig;
pub use embedder::EmbeddingClient;
pub use embedder::EmbeddingProvider;
pub use embedder::HashingEmbedder;
pub use embedder::OllamaEmbedder;

/// Message role in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// System message (instructions)
    System,
    /// User message
    User,
    /// Assistant message
    Assistant,
}

impl MessageRole {
    /// Wire name of the role
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

/// A message in a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message sender
    pub role: MessageRole,
    /// Content of the message
    pub content: String,
}

impl Message {
    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// LLM completion parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionParams {
    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,
    /// Temperature for sampling (0.0 to 2.0)
    pub temperature: Option<f32>,
    /// Top-p sampling
    pub top_p: Option<f32>,
    /// Stop sequences
    pub stop: Option<Vec<String>>,
    /// Ask the model for a JSON object
    pub json_mode: bool,
    /// Give up after the first failed attempt
    #[serde(default)]
    pub single_attempt: bool,
}

impl Default for CompletionParams {
    fn default() -> Self {
        Self {
            max_tokens: Some(1000),
            temperature: Some(0.7),
            top_p: Some(1.0),
            stop: None,
            json_mode: false,
            single_attempt: false,
        }
    }
}

impl CompletionParams {
    /// Low-temperature JSON output, used for triage assessments
    pub fn structured() -> Self {
        Self {
            temperature: Some(0.2),
            json_mode: true,
            ..Default::default()
        }
    }

    /// One request, no retries, used for chat answers
    pub fn single_attempt() -> Self {
        Self {
            single_attempt: true,
            ..Default::default()
        }
    }
}

/// Trait for the generative reasoning service
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Complete a conversation
    async fn complete(&self, messages: &[Message], params: &CompletionParams) -> Result<String>;

    /// Whether the service and its model are reachable
    async fn health_check(&self) -> bool {
        true
    }

    /// Provider name for logs
    fn provider_name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_creation() {
        let system = Message::system("You are a triage assistant");
        assert_eq!(system.role, MessageRole::System);
        assert_eq!(system.content, "You are a triage assistant");

        let user = Message::user("I have a cough");
        assert_eq!(user.role.as_str(), "user");
    }

    #[test]
    fn test_message_wire_format() {
        let json = serde_json::to_string(&Message::assistant("Rest")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"Rest"}"#);
    }

    #[test]
    fn test_structured_params() {
        let params = CompletionParams::structured();
        assert!(params.json_mode);
        assert_eq!(params.temperature, Some(0.2));
        assert_eq!(params.max_tokens, Some(1000));
        assert!(!params.single_attempt);
        assert!(CompletionParams::single_attempt().single_attempt);
    }
}
