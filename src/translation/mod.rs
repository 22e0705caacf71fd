/*!
 * Translation of localized content fields.
 *
 * - `engine`: the translation engine trait and the passthrough engine
 * - `llm`: engine backed by an LLM chat provider, with concurrent
 *   per-language requests and continuation of truncated answers
 * - `pipeline`: per-entity language diffing and write-back
 * - `prompts`: prompt templates
 * - `placeholders`: masking of markup that must stay untranslated
 * - `concurrency`: provider-specific concurrency defaults
 */

use std::sync::Arc;

use crate::app_config::{TranslationConfig, TranslationProvider};
use crate::providers::{Anthropic, OpenAI, RetryPolicy};

// Re-export main types for easier usage
pub use self::concurrency::ProviderProfile;
pub use self::engine::{BatchTexts, FieldTexts, PassthroughEngine, TranslationEngine};
pub use self::llm::{LlmSettings, LlmTranslator};
pub use self::pipeline::TranslationPipeline;
pub use self::placeholders::MaskedText;
pub use self::prompts::{PromptTemplate, TranslationPrompts};

// Submodules
pub mod concurrency;
pub mod engine;
pub mod llm;
pub mod pipeline;
pub mod placeholders;
pub mod prompts;

/// Build the engine selected by the configuration
pub fn build_engine(config: &TranslationConfig) -> Arc<dyn TranslationEngine> {
    let profile = ProviderProfile::for_provider(config.provider);
    let retry = RetryPolicy {
        max_retries: config.common.retry_count,
        backoff_base_ms: config.common.retry_backoff_ms,
        rate_limit: profile.effective_rate_limit(config.get_rate_limit()),
    };
    let prompts = TranslationPrompts::from_config(&config.common);
    let settings = LlmSettings::from_config(config);

    match config.provider {
        TranslationProvider::Passthrough => Arc::new(PassthroughEngine),
        TranslationProvider::OpenAI => Arc::new(LlmTranslator::new(
            OpenAI::new_with_config(
                config.get_api_key(),
                config.get_endpoint(),
                config.get_model(),
                retry,
                config.get_timeout_secs(),
            ),
            prompts,
            settings,
        )),
        TranslationProvider::Anthropic => Arc::new(LlmTranslator::new(
            Anthropic::new_with_config(
                config.get_api_key(),
                config.get_endpoint(),
                config.get_model(),
                retry,
                config.get_timeout_secs(),
            ),
            prompts,
            settings,
        )),
    }
}
