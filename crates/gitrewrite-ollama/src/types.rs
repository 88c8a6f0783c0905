//! Ollama API request and response types.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Sampling options.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChatOptions {
    pub temperature: f64,
}

/// Body of `POST /api/chat`.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,

    /// JSON schema constraining the reply.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<Value>,

    /// Always `false`; the whole reply is returned in one body.
    pub stream: bool,

    pub options: ChatOptions,
}

impl ChatRequest {
    /// Create a non-streaming request.
    #[must_use]
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>, temperature: f64) -> Self {
        Self {
            model: model.into(),
            messages,
            format: None,
            stream: false,
            options: ChatOptions { temperature },
        }
    }

    #[must_use]
    pub fn with_format(mut self, format: Value) -> Self {
        self.format = Some(format);
        self
    }
}

// === Internal API response types ===

#[derive(Debug, Deserialize)]
pub(crate) struct ChatResponse {
    pub message: ChatMessage,
}

#[derive(Debug, Serialize)]
pub(crate) struct ShowRequest<'a> {
    pub model: &'a str,
    /// Older servers only read `name`.
    pub name: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ShowResponse {
    #[serde(default)]
    pub model_info: Option<HashMap<String, Value>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TagsResponse {
    #[serde(default)]
    pub models: Vec<ModelTag>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ModelTag {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorBody {
    pub error: String,
}
