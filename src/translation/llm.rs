/*!
 * LLM-backed translation engine.
 *
 * `LlmTranslator` drives any chat `Provider`:
 * - single texts are translated with the system prompt at `temperature`
 * - whole objects are sent as one JSON object per language at
 *   `batch_temperature`, languages fanned out concurrently
 * - a truncated answer is continued by replaying the conversation with a
 *   "continue" instruction until the provider reports completion
 * - each language's conversation runs under a timeout; a failed, timed out
 *   or unparseable language is logged and dropped from the result
 */

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use log::{debug, error, warn};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;

use super::concurrency::ProviderProfile;
use super::engine::{BatchTexts, FieldTexts, TranslationEngine};
use super::placeholders::MaskedText;
use super::prompts::TranslationPrompts;
use crate::app_config::TranslationConfig;
use crate::errors::{ProviderError, TranslationError};
use crate::providers::{ChatMessage, ChatOptions, Provider};

/// Runtime settings of an LLM translator
#[derive(Debug, Clone, PartialEq)]
pub struct LlmSettings {
    /// Temperature for single text translation
    pub temperature: f32,
    /// Temperature for JSON object translation
    pub batch_temperature: f32,
    /// Languages translated at the same time
    pub max_concurrent_requests: usize,
    /// Follow-ups allowed for one truncated answer
    pub max_continuations: usize,
    /// Upper bound for one whole conversation
    pub request_timeout: Duration,
    /// Output token limit per request
    pub max_tokens: Option<u32>,
    /// Whether whole-object translation is offered
    pub batch: bool,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            temperature: 0.3,
            batch_temperature: 0.7,
            max_concurrent_requests: 4,
            max_continuations: 5,
            request_timeout: Duration::from_secs(120),
            max_tokens: None,
            batch: true,
        }
    }
}

impl LlmSettings {
    pub fn from_config(config: &TranslationConfig) -> Self {
        let profile = ProviderProfile::for_provider(config.provider);
        Self {
            temperature: config.common.temperature,
            batch_temperature: config.common.batch_temperature,
            max_concurrent_requests: profile.effective_concurrent_requests(config.get_concurrent_requests()),
            max_continuations: config.common.max_continuations,
            request_timeout: Duration::from_secs(config.common.request_timeout_secs),
            max_tokens: config.get_max_tokens(),
            batch: config.common.batch_translate,
        }
    }
}

/// Translation engine backed by a chat provider
#[derive(Debug)]
pub struct LlmTranslator<P: Provider> {
    provider: Arc<P>,
    prompts: TranslationPrompts,
    settings: LlmSettings,
}

impl<P: Provider> LlmTranslator<P> {
    pub fn new(provider: P, prompts: TranslationPrompts, settings: LlmSettings) -> Self {
        Self {
            provider: Arc::new(provider),
            prompts,
            settings,
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn settings(&self) -> &LlmSettings {
        &self.settings
    }

    /// Run a conversation to completion, following truncated answers
    ///
    /// Returns the concatenation of every answer. An answer still cut off
    /// once the continuation budget is spent is an error, never a partial
    /// translation.
    async fn converse(&self, mut messages: Vec<ChatMessage>, options: &ChatOptions) -> Result<String, ProviderError> {
        let mut output = String::new();
        let mut continuations = 0;

        loop {
            let request = self.provider.chat_request(&messages, options);
            let response = self.provider.complete(request).await?;
            let text = P::extract_text(&response);
            output.push_str(&text);

            if !P::is_truncated(&response) {
                return Ok(output);
            }
            if continuations >= self.settings.max_continuations {
                warn!(
                    "Answer still truncated after {} continuation(s), dropping {} chars",
                    continuations,
                    output.chars().count()
                );
                return Err(ProviderError::Truncated {
                    continuations,
                    received_chars: output.chars().count(),
                });
            }

            continuations += 1;
            debug!("Answer truncated, asking for continuation {}", continuations);
            messages.push(ChatMessage::assistant(text));
            messages.push(ChatMessage::user(self.prompts.continue_prompt()));
        }
    }

    async fn converse_with_timeout(
        &self,
        messages: Vec<ChatMessage>,
        options: &ChatOptions,
    ) -> Result<String, ProviderError> {
        let timeout = self.settings.request_timeout;
        tokio::time::timeout(timeout, self.converse(messages, options))
            .await
            .map_err(|_| ProviderError::Timeout(timeout.as_secs()))?
    }

    /// Translate one language's fields as a single JSON object
    async fn translate_object(&self, language: &str, fields: FieldTexts) -> Result<FieldTexts, TranslationError> {
        let masked: Vec<(String, MaskedText)> = fields
            .into_iter()
            .map(|(field, text)| (field, MaskedText::mask(&text)))
            .collect();

        let object: Map<String, Value> = masked
            .iter()
            .map(|(field, m)| (field.clone(), Value::String(m.text.clone())))
            .collect();

        let messages = vec![
            ChatMessage::system(self.prompts.batch_system_for(language)),
            ChatMessage::user(Value::Object(object).to_string()),
        ];
        let options = ChatOptions {
            temperature: Some(self.settings.batch_temperature),
            json_mode: true,
            max_tokens: self.settings.max_tokens,
        };

        let answer = self.converse_with_timeout(messages, &options).await?;
        let parsed = parse_object(&answer).ok_or_else(|| TranslationError::Parse {
            language: language.to_string(),
            message: format!("not a JSON object: {}", preview(&answer)),
        })?;

        Ok(masked
            .into_iter()
            .filter_map(|(field, m)| match parsed.get(&field) {
                Some(Value::String(text)) => Some((field, m.restore(text))),
                _ => None,
            })
            .collect())
    }
}

/// Extract the JSON object from an answer, tolerating text around it
fn parse_object(answer: &str) -> Option<Map<String, Value>> {
    let start = answer.find('{')?;
    let end = answer.rfind('}')?;
    if end < start {
        return None;
    }
    match serde_json::from_str::<Value>(&answer[start..=end]) {
        Ok(Value::Object(object)) => Some(object),
        _ => None,
    }
}

fn preview(text: &str) -> String {
    let head: String = text.chars().take(80).collect();
    if head.len() < text.len() {
        format!("{}...", head)
    } else {
        head
    }
}

#[async_trait]
impl<P: Provider + 'static> TranslationEngine for LlmTranslator<P> {
    async fn translate(&self, language: &str, text: &str) -> Result<String, TranslationError> {
        let masked = MaskedText::mask(text);
        let messages = vec![
            ChatMessage::system(self.prompts.system_for(language)),
            ChatMessage::user(masked.text.clone()),
        ];
        let options = ChatOptions {
            temperature: Some(self.settings.temperature),
            json_mode: false,
            max_tokens: self.settings.max_tokens,
        };

        let answer = self.converse_with_timeout(messages, &options).await?;
        Ok(masked.restore(answer.trim()))
    }

    fn supports_batch_translate(&self) -> bool {
        self.settings.batch
    }

    async fn check_connection(&self) -> Result<(), TranslationError> {
        self.provider.test_connection().await?;
        Ok(())
    }

    async fn batch_translate(&self, request: BatchTexts) -> Result<BatchTexts, TranslationError> {
        let concurrency = self.settings.max_concurrent_requests.max(1);

        let mut results = stream::iter(request.into_iter().enumerate())
            .map(|(index, (language, fields))| async move {
                let result = if fields.is_empty() {
                    Ok(FieldTexts::new())
                } else {
                    self.translate_object(&language, fields).await
                };
                (index, language, result)
            })
            .buffer_unordered(concurrency)
            .collect::<Vec<_>>()
            .await;

        // Re-key by request order, not arrival order
        results.sort_by_key(|(index, _, _)| *index);

        let mut translated = BatchTexts::new();
        for (_, language, result) in results {
            match result {
                Ok(fields) => {
                    translated.insert(language, fields);
                }
                Err(e) => {
                    error!("Translation into '{}' failed, skipping language: {}", language, e);
                }
            }
        }

        Ok(translated)
    }
}
