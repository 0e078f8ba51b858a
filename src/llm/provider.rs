//! Pluggable LLM provider trait.
//!
//! Stages talk to a [`LlmProvider`] rather than to a concrete client,
//! which keeps prompt logic testable without a network.

use serde_json::Value;

use super::message::ChatRequest;
use crate::error::LlmError;

/// Trait for chat-completion backends.
///
/// Implementations own the transport layer (HTTP, retries) and hand back
/// the decoded response document untouched.
pub trait LlmProvider: Send + Sync {
    /// Provider name (e.g., `"openai"`).
    fn name(&self) -> &'static str;

    /// Executes a chat completion request.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError`] on protocol errors, exhausted retries, or
    /// invalid requests.
    fn chat(&self, request: &ChatRequest) -> Result<Value, LlmError>;
}
