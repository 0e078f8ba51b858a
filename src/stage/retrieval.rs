//! Retrieval stage: natural-language question → Cypher query.
//!
//! Models may answer with a JSON object (`{"cypher": ..., "rationale": ...}`)
//! or with a bare query. Both are accepted; see [`Interpretation`].

use serde_json::Value;
use tracing::debug;

use super::{Stage, StageSettings};
use crate::error::{Result, TemplateError};
use crate::llm::LlmProvider;
use crate::prompt::{RETRIEVAL_SLOTS, Template};

/// Outcome of one retrieval call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievalResult {
    /// Query string to hand to the executor.
    pub query: String,
    /// Model's explanation, when it gave one.
    pub rationale: Option<String>,
    /// Reply text exactly as extracted from the response.
    pub raw: String,
}

/// How a retrieval reply was read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interpretation {
    /// The reply was a JSON object.
    Structured {
        /// `cypher` field, or the whole reply when that field is absent.
        query: String,
        /// `rationale` field.
        rationale: Option<String>,
    },
    /// The reply is the query itself.
    Freeform {
        /// Trimmed reply text.
        text: String,
    },
}

impl Interpretation {
    /// Reads a raw reply. Never fails: anything that is not a JSON object
    /// is taken as freeform text.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        let body = strip_code_fence(trimmed);

        match serde_json::from_str::<Value>(body) {
            Ok(Value::Object(object)) => {
                let query = object
                    .get("cypher")
                    .and_then(Value::as_str)
                    .map_or_else(|| trimmed.to_string(), |q| q.trim().to_string());
                let rationale = object
                    .get("rationale")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                Self::Structured { query, rationale }
            }
            _ => Self::Freeform {
                text: body.to_string(),
            },
        }
    }

    /// Normalises into a [`RetrievalResult`] carrying `raw`.
    #[must_use]
    pub fn into_result(self, raw: String) -> RetrievalResult {
        match self {
            Self::Structured { query, rationale } => RetrievalResult {
                query,
                rationale,
                raw,
            },
            Self::Freeform { text } => RetrievalResult {
                query: text,
                rationale: None,
                raw,
            },
        }
    }
}

/// Removes a surrounding markdown code fence (```` ```json ````, ```` ```cypher ````, ...).
fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let Some(inner) = rest.strip_suffix("```") else {
        return text;
    };
    // Drop the info string on the opening line.
    match inner.split_once('\n') {
        Some((info, body)) if !info.trim().contains(' ') => body.trim(),
        _ => inner.trim(),
    }
}

/// Stage that turns a question plus schema context into a query.
#[derive(Debug, Clone)]
pub struct RetrievalStage {
    settings: StageSettings,
    template: Template,
}

impl RetrievalStage {
    /// Creates the stage, validating the template's slots.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError`] if the template is malformed or references
    /// a slot other than `user_query`, `kg_schema`, `kg_value_dict`,
    /// `cypher_example`.
    pub fn new(settings: StageSettings, template: &str) -> std::result::Result<Self, TemplateError> {
        let template = Template::parse(template)?;
        template.check_slots(&RETRIEVAL_SLOTS)?;
        Ok(Self { settings, template })
    }

    /// Renders the retrieval prompt.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError`] if a slot cannot be resolved.
    pub fn build_prompt(
        &self,
        user_query: &str,
        schema_text: &str,
        value_dictionary_text: &str,
        example_text: &str,
    ) -> std::result::Result<String, TemplateError> {
        self.template.render(&[
            ("user_query", user_query),
            ("kg_schema", schema_text),
            ("kg_value_dict", value_dictionary_text),
            ("cypher_example", example_text),
        ])
    }

    /// Renders, calls the provider, and interprets the reply.
    ///
    /// # Errors
    ///
    /// Returns template or provider errors unchanged. Reply interpretation
    /// never fails.
    pub fn generate_query(
        &self,
        provider: &dyn LlmProvider,
        user_query: &str,
        schema_text: &str,
        value_dictionary_text: &str,
        example_text: &str,
    ) -> Result<RetrievalResult> {
        let prompt = self.build_prompt(user_query, schema_text, value_dictionary_text, example_text)?;
        self.generate_from_prompt(provider, &prompt)
    }

    /// Calls the provider with an already rendered prompt.
    ///
    /// # Errors
    ///
    /// Returns provider errors unchanged.
    pub fn generate_from_prompt(
        &self,
        provider: &dyn LlmProvider,
        prompt: &str,
    ) -> Result<RetrievalResult> {
        let raw = self.execute(provider, prompt)?;
        let interpretation = Interpretation::parse(&raw);
        debug!(
            structured = matches!(interpretation, Interpretation::Structured { .. }),
            "Interpreted retrieval reply"
        );
        Ok(interpretation.into_result(raw))
    }
}

impl Stage for RetrievalStage {
    fn name(&self) -> &'static str {
        "retrieval"
    }

    fn settings(&self) -> &StageSettings {
        &self.settings
    }
}
