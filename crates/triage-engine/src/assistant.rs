//! Conversational medical guidance assistant

use std::sync::Arc;
use std::time::Duration;
use tracing::{instrument, warn};
use triage_llm::{CompletionParams, LLMClient, Message};
use triage_prompts::CHAT_SYSTEM_PROMPT;

/// Returned whenever the model cannot answer
pub const CHAT_APOLOGY: &str = "I'm having trouble processing your question. Please try again or \
consult a healthcare professional.";

/// Single-attempt chat over the reasoning service
#[derive(Clone)]
pub struct ChatAssistant {
    llm: Option<Arc<dyn LLMClient>>,
    timeout: Duration,
}

impl ChatAssistant {
    /// Create an assistant; without a client every answer is the apology
    pub fn new(llm: Option<Arc<dyn LLMClient>>, timeout: Duration) -> Self {
        Self { llm, timeout }
    }

    /// Answer a standalone question
    pub async fn chat(&self, question: &str) -> String {
        self.chat_with_context(question, &[]).await
    }

    /// Answer a question after prior conversation turns
    #[instrument(skip(self, question, context), fields(turns = context.len()))]
    pub async fn chat_with_context(&self, question: &str, context: &[Message]) -> String {
        let Some(llm) = &self.llm else {
            warn!("Chat requested without a reasoning service");
            return CHAT_APOLOGY.to_string();
        };

        let mut messages = Vec::with_capacity(context.len() + 2);
        messages.push(Message::system(CHAT_SYSTEM_PROMPT));
        messages.extend_from_slice(context);
        messages.push(Message::user(question));

        let params = CompletionParams::single_attempt();
        match tokio::time::timeout(self.timeout, llm.complete(&messages, &params)).await {
            Ok(Ok(answer)) if !answer.trim().is_empty() => answer,
            Ok(Ok(_)) => {
                warn!("Chat failed: empty answer");
                CHAT_APOLOGY.to_string()
            }
            Ok(Err(e)) => {
                warn!("Chat failed: {}", e);
                CHAT_APOLOGY.to_string()
            }
            Err(_) => {
                warn!("Chat timed out after {:?}", self.timeout);
                CHAT_APOLOGY.to_string()
            }
        }
    }
}
