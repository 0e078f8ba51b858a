//! Prompt stages.
//!
//! A stage renders its template, sends the prompt as a single system
//! message, and interprets the reply. Both stages share one
//! [`LlmProvider`] but are otherwise independent.

pub mod generation;
pub mod retrieval;

use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::error::LlmError;
use crate::llm::{ChatRequest, LlmProvider, extract_text, system_message};

pub use generation::{GenerationResult, GenerationStage};
pub use retrieval::{Interpretation, RetrievalResult, RetrievalStage};

/// Per-stage request settings.
#[derive(Debug, Clone, PartialEq)]
pub struct StageSettings {
    /// Model identifier.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f64,
    /// Maximum tokens to generate.
    pub max_tokens: Option<u32>,
    /// Provider-specific request fields.
    pub extra: Option<Map<String, Value>>,
}

impl StageSettings {
    /// Near-deterministic settings (temperature `0.0`, no token cap).
    #[must_use]
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            temperature: 0.0,
            max_tokens: None,
            extra: None,
        }
    }
}

/// Trait implemented by both prompt stages.
pub trait Stage {
    /// Stage name for logging.
    fn name(&self) -> &'static str;

    /// Request settings.
    fn settings(&self) -> &StageSettings;

    /// Sends `prompt` as one system message and returns the reply text.
    ///
    /// The text is returned exactly as extracted; an absent reply is `""`.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError`] from the provider unchanged.
    fn execute(&self, provider: &dyn LlmProvider, prompt: &str) -> Result<String, LlmError> {
        let settings = self.settings();
        let request = ChatRequest {
            model: settings.model.clone(),
            messages: vec![system_message(prompt)],
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            extra: settings.extra.clone(),
        };

        info!(
            stage = self.name(),
            provider = provider.name(),
            model = %settings.model,
            prompt_bytes = prompt.len(),
            "Invoking chat endpoint"
        );
        let response = provider.chat(&request)?;
        let raw = extract_text(&response);
        debug!(stage = self.name(), reply_bytes = raw.len(), "Received reply");

        Ok(raw)
    }
}
