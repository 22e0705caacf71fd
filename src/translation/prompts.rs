/*!
 * Prompt templates for content translation.
 *
 * Templates carry two placeholders: `{lang}` for the target language code
 * and `{ignores}` for the comma separated terms kept untranslated.
 */

use crate::app_config::TranslationCommonConfig;

/// System prompt template
#[derive(Debug, Clone, PartialEq)]
pub struct PromptTemplate {
    /// The template string with placeholders
    template: String,
}

impl PromptTemplate {
    /// Create a new prompt template.
    pub fn new(template: &str) -> Self {
        Self {
            template: template.to_string(),
        }
    }

    /// Render the template with the given variables.
    pub fn render(&self, language: &str, ignored_terms: &[String]) -> String {
        self.template
            .replace("{lang}", language)
            .replace("{ignores}", &ignored_terms.join(", "))
    }
}

/// The prompts an LLM translator sends
#[derive(Debug, Clone, PartialEq)]
pub struct TranslationPrompts {
    system: PromptTemplate,
    batch_system: PromptTemplate,
    continue_prompt: String,
    ignored_terms: Vec<String>,
}

impl TranslationPrompts {
    pub fn new(
        system: PromptTemplate,
        batch_system: PromptTemplate,
        continue_prompt: impl Into<String>,
        ignored_terms: Vec<String>,
    ) -> Self {
        Self {
            system,
            batch_system,
            continue_prompt: continue_prompt.into(),
            ignored_terms,
        }
    }

    pub fn from_config(common: &TranslationCommonConfig) -> Self {
        Self::new(
            PromptTemplate::new(&common.system_prompt),
            PromptTemplate::new(&common.batch_system_prompt),
            common.continue_prompt.clone(),
            common.ignored_terms.clone(),
        )
    }

    /// System prompt for translating one text
    pub fn system_for(&self, language: &str) -> String {
        self.system.render(language, &self.ignored_terms)
    }

    /// System prompt for translating a JSON object
    pub fn batch_system_for(&self, language: &str) -> String {
        self.batch_system.render(language, &self.ignored_terms)
    }

    /// Follow-up message for a truncated answer
    pub fn continue_prompt(&self) -> &str {
        &self.continue_prompt
    }
}

impl Default for TranslationPrompts {
    fn default() -> Self {
        Self::from_config(&TranslationCommonConfig::default())
    }
}
