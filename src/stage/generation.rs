//! Generation stage: question + evidence → enhanced prompt.

use super::{Stage, StageSettings};
use crate::error::{Result, TemplateError};
use crate::llm::LlmProvider;
use crate::prompt::{GENERATION_SLOTS, Template};

/// Outcome of one generation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationResult {
    /// The enhanced prompt (the reply text, unparsed).
    pub enhanced_prompt: String,
    /// Reply text exactly as extracted from the response.
    pub raw: String,
}

/// Stage that folds retrieved evidence back into a final prompt.
#[derive(Debug, Clone)]
pub struct GenerationStage {
    settings: StageSettings,
    template: Template,
}

impl GenerationStage {
    /// Creates the stage, validating the template's slots.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError`] if the template is malformed or references
    /// a slot other than `user_query`, `kg_triplets`.
    pub fn new(settings: StageSettings, template: &str) -> std::result::Result<Self, TemplateError> {
        let template = Template::parse(template)?;
        template.check_slots(&GENERATION_SLOTS)?;
        Ok(Self { settings, template })
    }

    /// Renders the generation prompt.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError`] if a slot cannot be resolved.
    pub fn build_prompt(
        &self,
        user_query: &str,
        evidence_text: &str,
    ) -> std::result::Result<String, TemplateError> {
        self.template
            .render(&[("user_query", user_query), ("kg_triplets", evidence_text)])
    }

    /// Renders, calls the provider, and returns the reply verbatim.
    ///
    /// # Errors
    ///
    /// Returns template or provider errors unchanged.
    pub fn generate(
        &self,
        provider: &dyn LlmProvider,
        user_query: &str,
        evidence_text: &str,
    ) -> Result<GenerationResult> {
        let prompt = self.build_prompt(user_query, evidence_text)?;
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
    ) -> Result<GenerationResult> {
        let raw = self.execute(provider, prompt)?;
        Ok(GenerationResult {
            enhanced_prompt: raw.clone(),
            raw,
        })
    }
}

impl Stage for GenerationStage {
    fn name(&self) -> &'static str {
        "generation"
    }

    fn settings(&self) -> &StageSettings {
        &self.settings
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::prompt::GENERATION_TEMPLATE;
    use crate::stage::testing::{Failing, FixedReply};

    #[test]
    fn test_generate_returns_reply_verbatim() {
        let stage = GenerationStage::new(StageSettings::new("m"), GENERATION_TEMPLATE)
            .unwrap_or_else(|_| unreachable!());
        let reply = "Using the evidence cell_id=C1; soh=0.82, explain...\n";
        let result = stage
            .generate(&FixedReply::new(reply), "Why is C1 degrading?", "cell_id=C1; soh=0.82")
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(result.enhanced_prompt, reply);
        assert_eq!(result.raw, reply);
    }

    #[test]
    fn test_json_reply_is_not_parsed() {
        let stage = GenerationStage::new(StageSettings::new("m"), "{user_query}")
            .unwrap_or_else(|_| unreachable!());
        let reply = r#"{"cypher": "MATCH (n) RETURN n"}"#;
        let result = stage
            .generate(&FixedReply::new(reply), "q", "")
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(result.enhanced_prompt, reply);
    }

    #[test]
    fn test_build_prompt() {
        let stage = GenerationStage::new(
            StageSettings::new("m"),
            "Evidence:\n{kg_triplets}\nQuestion: {user_query}",
        )
        .unwrap_or_else(|_| unreachable!());
        let prompt = stage
            .build_prompt("q?", "a=1; b=x")
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(prompt, "Evidence:\na=1; b=x\nQuestion: q?");
    }

    #[test]
    fn test_settings_flow_into_request() {
        let mut settings = StageSettings::new("gen-model");
        settings.temperature = 0.3;
        settings.max_tokens = Some(800);
        let mut extra = serde_json::Map::new();
        extra.insert("seed".to_string(), json!(7));
        settings.extra = Some(extra);

        let provider = FixedReply::new("ok");
        let stage = GenerationStage::new(settings, "{user_query}").unwrap_or_else(|_| unreachable!());
        stage.generate(&provider, "q", "e").unwrap_or_else(|_| unreachable!());

        let request = provider.last_request().unwrap_or_else(|| unreachable!());
        assert_eq!(request.model, "gen-model");
        assert!((request.temperature - 0.3).abs() < f64::EPSILON);
        assert_eq!(request.max_tokens, Some(800));
        let body = request.to_body().unwrap_or_else(|_| unreachable!());
        assert_eq!(body["seed"], json!(7));
    }

    #[test]
    fn test_unknown_slot_rejected() {
        let result = GenerationStage::new(StageSettings::new("m"), "{user_query} {kg_schema}");
        assert!(matches!(result, Err(TemplateError::UnknownSlot { ref name }) if name == "kg_schema"));
    }

    #[test]
    fn test_provider_error_propagates() {
        let stage = GenerationStage::new(StageSettings::new("m"), GENERATION_TEMPLATE)
            .unwrap_or_else(|_| unreachable!());
        assert!(stage.generate(&Failing, "q", "e").is_err());
    }
}
