pub mod ai_service;
pub mod formatting;
pub mod models;

pub use ai_service::{AiProvider, AiService, AssistantError, Conversation};
pub use formatting::format_citations;
pub use models::{AiConfig, AiMessage, AiProviderResponse, Attachment, ChatReply};
