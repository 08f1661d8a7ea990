use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

/// Message body: plain text, or a list of parts when files are attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    FileUrl { file_url: FileUrl },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileUrl {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiMessage {
    pub role: String,
    pub content: MessageContent,
}

impl AiMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: MessageContent::Text(text.into()),
        }
    }

    /// A user message carrying text plus attached documents.
    pub fn user_with_attachments(text: impl Into<String>, attachments: &[Attachment]) -> Self {
        if attachments.is_empty() {
            return Self::user(text);
        }

        let mut parts = vec![ContentPart::Text { text: text.into() }];
        parts.extend(attachments.iter().map(|a| ContentPart::FileUrl {
            file_url: FileUrl {
                url: a.encoded.clone(),
            },
        }));

        Self {
            role: "user".to_string(),
            content: MessageContent::Parts(parts),
        }
    }
}

/// A document attached to a request, base64-encoded for the chat API.
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub encoded: String,
}

impl Attachment {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            encoded: STANDARD.encode(bytes),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AiConfig {
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

/// Raw response from an AI provider.
#[derive(Debug, Clone, Default)]
pub struct AiProviderResponse {
    pub content: String,

    /// Source URLs the provider grounded its answer on, if any.
    pub citations: Vec<String>,
}

/// Reply returned to the caller of a chat turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatReply {
    pub reply: String,
    pub citations: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_message_serializes_as_string() {
        let json = serde_json::to_value(AiMessage::user("Hello!")).unwrap();
        assert_eq!(json["role"], "user");
        assert_eq!(json["content"], "Hello!");
    }

    #[test]
    fn test_attachments_serialize_as_file_url_parts() {
        let attachment = Attachment::from_bytes(b"docx bytes");
        let msg = AiMessage::user_with_attachments("Summarize", &[attachment]);

        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["content"][0]["type"], "text");
        assert_eq!(json["content"][0]["text"], "Summarize");
        assert_eq!(json["content"][1]["type"], "file_url");
        assert_eq!(json["content"][1]["file_url"]["url"], "ZG9jeCBieXRlcw==");
    }

    #[test]
    fn test_no_attachments_stays_plain_text() {
        let msg = AiMessage::user_with_attachments("Hi", &[]);
        assert_eq!(msg.content, MessageContent::Text("Hi".to_string()));
    }
}
