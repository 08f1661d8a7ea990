use super::models::{AiConfig, AiMessage, AiProviderResponse, Attachment, ChatReply};
use async_trait::async_trait;
use std::error::Error;
use thiserror::Error;
use tracing::{debug, warn};

const SUMMARY_INSTRUCTION: &str = "You are summarizing a set of Microsoft Word documents from my notes. \
For each attached document, provide a short summary, then a brief overall summary.";

#[derive(Debug, Error)]
pub enum AssistantError {
    #[error("Empty message")]
    EmptyMessage,

    #[error("No documents provided")]
    NoDocuments,

    #[error("AI provider error: {0}")]
    Provider(String),
}

#[async_trait]
pub trait AiProvider: Send + Sync {
    /// Sends a chat completion request to the AI provider.
    async fn chat_complete(
        &self,
        messages: &[AiMessage],
        config: &AiConfig,
    ) -> Result<AiProviderResponse, Box<dyn Error + Send + Sync>>;
}

// Blanket implementation for Box<dyn AiProvider>
// This allows us to use trait objects in the AiService.
#[async_trait]
impl AiProvider for Box<dyn AiProvider> {
    async fn chat_complete(
        &self,
        messages: &[AiMessage],
        config: &AiConfig,
    ) -> Result<AiProviderResponse, Box<dyn Error + Send + Sync>> {
        (**self).chat_complete(messages, config).await
    }
}

/// Running multi-turn history. Starts with the system prompt.
#[derive(Debug, Clone)]
pub struct Conversation {
    messages: Vec<AiMessage>,
}

impl Conversation {
    pub fn new(system_prompt: &str) -> Self {
        Self {
            messages: vec![AiMessage::system(system_prompt)],
        }
    }

    /// Number of user/assistant exchanges so far.
    pub fn turns(&self) -> usize {
        self.messages.iter().filter(|m| m.role == "assistant").count()
    }
}

pub struct AiService<P: AiProvider> {
    provider: P,
    system_prompt: String,
    config: AiConfig,
}

impl<P: AiProvider> AiService<P> {
    pub fn new(provider: P, system_prompt: String, config: AiConfig) -> Self {
        Self {
            provider,
            system_prompt,
            config,
        }
    }

    pub fn start_conversation(&self) -> Conversation {
        Conversation::new(&self.system_prompt)
    }

    /// Sends one user turn (with optional attached documents) and records the
    /// exchange in `conversation` if the provider answers.
    pub async fn chat(
        &self,
        conversation: &mut Conversation,
        text: &str,
        attachments: &[Attachment],
    ) -> Result<ChatReply, AssistantError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AssistantError::EmptyMessage);
        }

        let mut messages = conversation.messages.clone();
        messages.push(AiMessage::user_with_attachments(text, attachments));

        debug!(
            history = conversation.messages.len(),
            attachments = attachments.len(),
            "Sending chat turn"
        );
        let response = self
            .provider
            .chat_complete(&messages, &self.config)
            .await
            .map_err(|e| {
                warn!("Chat completion failed: {}", e);
                AssistantError::Provider(e.to_string())
            })?;

        // Attachments are not replayed on later turns; only the text is kept.
        conversation.messages.push(AiMessage::user(text));
        conversation
            .messages
            .push(AiMessage::assistant(response.content.clone()));

        Ok(ChatReply {
            reply: response.content,
            citations: response.citations,
        })
    }

    /// Summarizes each attached document and then all of them together.
    pub async fn summarize(&self, documents: &[Attachment]) -> Result<String, AssistantError> {
        if documents.is_empty() {
            return Err(AssistantError::NoDocuments);
        }

        let messages = vec![AiMessage::user_with_attachments(
            SUMMARY_INSTRUCTION,
            documents,
        )];
        let response = self
            .provider
            .chat_complete(&messages, &self.config)
            .await
            .map_err(|e| AssistantError::Provider(e.to_string()))?;

        Ok(response.content)
    }
}
