// SPDX-FileCopyrightText: 2026 Meterr Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Request and response content as seen by the token estimator.

use serde::{Deserialize, Serialize};

/// Text to be measured: either a raw string or a chat transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Content {
    Text(String),
    Messages(Vec<ChatMessage>),
}

impl From<&str> for Content {
    fn from(value: &str) -> Self {
        Content::Text(value.to_string())
    }
}

impl From<String> for Content {
    fn from(value: String) -> Self {
        Content::Text(value)
    }
}

impl From<Vec<ChatMessage>> for Content {
    fn from(value: Vec<ChatMessage>) -> Self {
        Content::Messages(value)
    }
}

/// A single role-tagged chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: MessageContent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<MessageContent>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
            name: None,
        }
    }

    pub fn system(content: impl Into<MessageContent>) -> Self {
        Self::new("system", content)
    }

    pub fn user(content: impl Into<MessageContent>) -> Self {
        Self::new("user", content)
    }

    pub fn assistant(content: impl Into<MessageContent>) -> Self {
        Self::new("assistant", content)
    }

    /// Attach a participant name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Message body: plain text or a list of typed parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl From<&str> for MessageContent {
    fn from(value: &str) -> Self {
        MessageContent::Text(value.to_string())
    }
}

impl From<String> for MessageContent {
    fn from(value: String) -> Self {
        MessageContent::Text(value)
    }
}

impl From<Vec<ContentPart>> for MessageContent {
    fn from(value: Vec<ContentPart>) -> Self {
        MessageContent::Parts(value)
    }
}

/// One typed part of a multi-part message.
///
/// Only text parts carry countable text; images and unrecognized part types
/// are accepted but contribute nothing to the estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: serde_json::Value },
    #[serde(other)]
    Other,
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text { text: text.into() }
    }

    /// The text carried by this part, if any.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentPart::Text { text } => Some(text),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_openai_style_transcript() {
        let json = serde_json::json!([
            {"role": "system", "content": "be brief"},
            {"role": "user", "name": "alice", "content": [
                {"type": "text", "text": "what is this?"},
                {"type": "image_url", "image_url": {"url": "https://example.com/a.png"}}
            ]}
        ]);
        let content: Content = serde_json::from_value(json).unwrap();
        let Content::Messages(messages) = content else {
            panic!("expected messages");
        };
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].name.as_deref(), Some("alice"));
        let MessageContent::Parts(parts) = &messages[1].content else {
            panic!("expected parts");
        };
        assert_eq!(parts[0].as_text(), Some("what is this?"));
        assert!(parts[1].as_text().is_none());
    }

    #[test]
    fn unknown_part_type_is_tolerated() {
        let part: ContentPart =
            serde_json::from_value(serde_json::json!({"type": "input_audio", "data": "..."}))
                .unwrap();
        assert_eq!(part, ContentPart::Other);
    }

    #[test]
    fn raw_string_parses_as_text() {
        let content: Content = serde_json::from_value(serde_json::json!("hello")).unwrap();
        assert_eq!(content, Content::Text("hello".into()));
    }
}
