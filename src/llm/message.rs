//! Chat request and message types.
//!
//! A [`ChatRequest`] is built fresh for every call and turned into the
//! JSON body of `POST {base}/chat/completions` by [`ChatRequest::to_body`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::LlmError;

/// Role of a chat message participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions.
    System,
}

/// A single role-tagged chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the message sender.
    pub role: Role,
    /// Message content.
    pub content: String,
}

/// A chat completion request.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// Model identifier.
    pub model: String,
    /// Ordered conversation messages.
    pub messages: Vec<ChatMessage>,
    /// Sampling temperature.
    pub temperature: f64,
    /// Maximum tokens to generate. Omitted from the body when `None`.
    pub max_tokens: Option<u32>,
    /// Provider-specific fields merged into the body last.
    pub extra: Option<Map<String, Value>>,
}

impl ChatRequest {
    /// Builds the JSON request body.
    ///
    /// Standard fields are written first; `extra` is merged last so that
    /// its keys override them.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::InvalidRequest`] if the temperature is not a
    /// finite number (it would otherwise be silently encoded as `null`).
    pub fn to_body(&self) -> Result<Value, LlmError> {
        if !self.temperature.is_finite() {
            return Err(LlmError::InvalidRequest(format!(
                "temperature must be finite, got {}",
                self.temperature
            )));
        }

        let messages = serde_json::to_value(&self.messages)
            .map_err(|e| LlmError::InvalidRequest(format!("messages: {e}")))?;

        let mut body = Map::new();
        body.insert("model".to_string(), Value::String(self.model.clone()));
        body.insert("messages".to_string(), messages);
        body.insert("temperature".to_string(), Value::from(self.temperature));
        if let Some(max_tokens) = self.max_tokens {
            body.insert("max_tokens".to_string(), Value::from(max_tokens));
        }
        if let Some(extra) = &self.extra {
            for (key, value) in extra {
                body.insert(key.clone(), value.clone());
            }
        }

        Ok(Value::Object(body))
    }
}

/// Creates a system message.
#[must_use]
pub fn system_message(content: &str) -> ChatMessage {
    ChatMessage {
        role: Role::System,
        content: content.to_string(),
    }
}
