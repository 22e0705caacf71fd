use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::path::PathBuf;

use crate::content::{ContentSchema, EntityType, RelationDef, RelationKind};
use crate::language_utils;

/// Longest accepted retention period, in days
pub const MAX_RETENTION_DAYS: i64 = 36_500;

/// Most retries accepted for one provider request
pub const MAX_RETRY_COUNT: u32 = 10;

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and saving configuration settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Languages content is localized into
    #[serde(default)]
    pub languages: LanguageConfig,

    /// Revision store location
    #[serde(default)]
    pub storage: StorageConfig,

    /// Translation config
    #[serde(default)]
    pub translation: TranslationConfig,

    /// Snapshot retention settings
    #[serde(default)]
    pub retention: RetentionConfig,

    /// Content type declarations
    #[serde(default = "default_content_types")]
    pub content_types: Vec<EntityType>,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Language settings
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct LanguageConfig {
    /// Language holding the authoritative source text
    #[serde(default = "default_base_language")]
    pub base_language: String,

    /// Every language localized fields are kept in, base language included
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,
}

impl LanguageConfig {
    /// Languages translations are produced for
    pub fn target_languages(&self) -> Vec<String> {
        language_utils::target_languages(&self.languages, &self.base_language)
    }
}

impl Default for LanguageConfig {
    fn default() -> Self {
        Self {
            base_language: default_base_language(),
            languages: default_languages(),
        }
    }
}

/// Storage settings
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct StorageConfig {
    /// SQLite database file; the user data directory is used when unset
    #[serde(default)]
    pub database_path: Option<PathBuf>,
}

/// Retention settings for `clean-outdated`
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct RetentionConfig {
    /// Only revisions older than this many days are cleaned
    #[serde(default)]
    pub outdated_snapshot_days: i64,
}

/// Translation engine type
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TranslationProvider {
    // @provider: returns the source text unchanged
    #[default]
    Passthrough,
    // @provider: OpenAI
    OpenAI,
    // @provider: Anthropic
    Anthropic,
}

impl TranslationProvider {
    // @returns: Capitalized provider name
    pub fn display_name(&self) -> &str {
        match self {
            Self::Passthrough => "Passthrough",
            Self::OpenAI => "OpenAI",
            Self::Anthropic => "Anthropic",
        }
    }

    // @returns: Lowercase provider identifier
    pub fn to_lowercase_string(&self) -> String {
        match self {
            Self::Passthrough => "passthrough".to_string(),
            Self::OpenAI => "openai".to_string(),
            Self::Anthropic => "anthropic".to_string(),
        }
    }

    /// Whether the provider calls a remote API
    pub fn is_remote(&self) -> bool {
        !matches!(self, Self::Passthrough)
    }
}

// Implement Display trait for TranslationProvider
impl std::fmt::Display for TranslationProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_lowercase_string())
    }
}

// Implement FromStr trait for TranslationProvider
impl std::str::FromStr for TranslationProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "passthrough" => Ok(Self::Passthrough),
            "openai" => Ok(Self::OpenAI),
            "anthropic" => Ok(Self::Anthropic),
            _ => Err(anyhow!("Invalid provider type: {}", s)),
        }
    }
}

/// Provider configuration wrapper
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProviderConfig {
    // @field: Provider type identifier
    #[serde(rename = "type")]
    pub provider_type: String,

    // @field: Model name
    #[serde(default = "String::new")]
    pub model: String,

    // @field: API key
    #[serde(default = "String::new")]
    pub api_key: String,

    // @field: Service URL
    #[serde(default = "String::new")]
    pub endpoint: String,

    // @field: Max concurrent requests, 0 for the provider profile default
    #[serde(default)]
    pub concurrent_requests: usize,

    // @field: HTTP timeout seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    // @field: Rate limit (requests per minute)
    #[serde(default)]
    pub rate_limit: Option<u32>,

    // @field: Output token limit per request
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

impl ProviderConfig {
    // @param provider_type: Provider enum
    // @returns: Provider config with defaults
    pub fn new(provider_type: TranslationProvider) -> Self {
        let (model, endpoint, rate_limit) = match provider_type {
            TranslationProvider::Passthrough => (String::new(), String::new(), None),
            TranslationProvider::OpenAI => (
                default_openai_model(),
                default_openai_endpoint(),
                default_openai_rate_limit(),
            ),
            TranslationProvider::Anthropic => (
                default_anthropic_model(),
                default_anthropic_endpoint(),
                default_anthropic_rate_limit(),
            ),
        };

        Self {
            provider_type: provider_type.to_lowercase_string(),
            model,
            api_key: String::new(),
            endpoint,
            concurrent_requests: 0,
            timeout_secs: default_timeout_secs(),
            rate_limit,
            max_tokens: None,
        }
    }
}

/// Translation service configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TranslationConfig {
    /// Translation provider to use
    #[serde(default)]
    pub provider: TranslationProvider,

    /// Available translation providers
    #[serde(default)]
    pub available_providers: Vec<ProviderConfig>,

    /// Common translation settings
    #[serde(default)]
    pub common: TranslationCommonConfig,
}

/// Common translation settings applicable to all providers
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TranslationCommonConfig {
    /// System prompt for single text translation
    /// Placeholders: {lang}, {ignores}
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// System prompt for whole-object JSON translation
    /// Placeholders: {lang}, {ignores}
    #[serde(default = "default_batch_system_prompt")]
    pub batch_system_prompt: String,

    /// User message asking a truncated answer to go on
    #[serde(default = "default_continue_prompt")]
    pub continue_prompt: String,

    /// Terms kept untranslated
    #[serde(default)]
    pub ignored_terms: Vec<String>,

    /// Whether LLM engines translate one JSON object per language
    #[serde(default = "default_true")]
    pub batch_translate: bool,

    /// Temperature for single text translation
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Temperature for JSON object translation
    #[serde(default = "default_batch_temperature")]
    pub batch_temperature: f32,

    /// Retry count for failed requests
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    /// Backoff multiplier for retries (in milliseconds)
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Maximum number of "continue" follow-ups for a truncated answer
    #[serde(default = "default_max_continuations")]
    pub max_continuations: usize,

    /// Upper bound for one language's whole conversation, in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for TranslationCommonConfig {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
            batch_system_prompt: default_batch_system_prompt(),
            continue_prompt: default_continue_prompt(),
            ignored_terms: Vec::new(),
            batch_translate: true,
            temperature: default_temperature(),
            batch_temperature: default_batch_temperature(),
            retry_count: default_retry_count(),
            retry_backoff_ms: default_retry_backoff_ms(),
            max_continuations: default_max_continuations(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

fn default_base_language() -> String {
    "en".to_string()
}

fn default_languages() -> Vec<String> {
    vec!["en".to_string(), "vi".to_string(), "ro".to_string()]
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_retry_count() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    1000
}

fn default_temperature() -> f32 {
    0.3
}

fn default_batch_temperature() -> f32 {
    0.7
}

fn default_max_continuations() -> usize {
    5
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_true() -> bool {
    true
}

fn default_openai_endpoint() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_anthropic_endpoint() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_anthropic_model() -> String {
    "claude-3-haiku-20240307".to_string()
}

fn default_openai_rate_limit() -> Option<u32> {
    Some(60)
}

fn default_anthropic_rate_limit() -> Option<u32> {
    Some(45)
}

fn default_system_prompt() -> String {
    "You are a professional translator. Please translate and paraphrase (if needed) this content into {lang} language with friendly tone, concise and easy to understand. Just translate the content only, keep the HTML or markdown tag as it is, and keep the proper nouns as it is, too. You just response me with translated content only, do not add any additional comment or explanation.\nAdditionally, keep these term as it is: {ignores}.\nHere is your content:".to_string()
}

fn default_batch_system_prompt() -> String {
    "You are a professional translator. Please translate and paraphrase (if needed) this json object into {lang} language with friendly tone, concise and easy to understand. Just translate the values only, keep the keys, the HTML or markdown tag and the proper nouns as they are. You just response me with the translated json object only, do not add any additional comment or explanation.\nAdditionally, keep these term as it is: {ignores}.\nHere is your json object:".to_string()
}

fn default_continue_prompt() -> String {
    "Continue exactly where you stopped, without repeating anything.".to_string()
}

/// Blog content types used when the configuration declares none
fn default_content_types() -> Vec<EntityType> {
    vec![
        EntityType::new("category")
            .localized_field("title")
            .localized_field("description"),
        EntityType::new("tag").localized_field("name"),
        EntityType::new("post")
            .localized_field("title")
            .localized_field("content")
            .relation(RelationDef::new("category", RelationKind::ManyToOne, "category").related_name("posts"))
            .relation(RelationDef::new("tags", RelationKind::ManyToMany, "tag").ordered())
            .relation(RelationDef::new("sections", RelationKind::Generic, "section").ordered()),
        EntityType::new("section")
            .localized_field("title")
            .localized_field("body"),
    ]
}

impl Config {
    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        // Validate languages
        for code in &self.languages.languages {
            language_utils::validate_language_code(code)
                .with_context(|| format!("Invalid entry in languages: {}", code))?;
        }
        language_utils::validate_language_code(&self.languages.base_language)
            .context("Invalid base language")?;

        if !self
            .languages
            .languages
            .iter()
            .any(|code| language_utils::language_codes_match(code, &self.languages.base_language))
        {
            return Err(anyhow!(
                "Base language '{}' must be one of the configured languages",
                self.languages.base_language
            ));
        }

        for (i, code) in self.languages.languages.iter().enumerate() {
            if self.languages.languages[..i]
                .iter()
                .any(|other| language_utils::language_codes_match(other, code))
            {
                return Err(anyhow!("Language '{}' is configured twice", code));
            }
        }

        // Validate API key for remote providers
        if self.translation.provider.is_remote() && self.translation.get_api_key().is_empty() {
            return Err(anyhow!(
                "Translation API key is required for {} provider",
                self.translation.provider.display_name()
            ));
        }

        for provider in &self.translation.available_providers {
            if !provider.endpoint.is_empty() {
                url::Url::parse(&provider.endpoint).with_context(|| {
                    format!("Invalid endpoint for {} provider: {}", provider.provider_type, provider.endpoint)
                })?;
            }
        }

        if !(0..=MAX_RETENTION_DAYS).contains(&self.retention.outdated_snapshot_days) {
            return Err(anyhow!(
                "outdated_snapshot_days must be between 0 and {}",
                MAX_RETENTION_DAYS
            ));
        }

        if self.translation.common.retry_count > MAX_RETRY_COUNT {
            return Err(anyhow!("retry_count must be at most {}", MAX_RETRY_COUNT));
        }

        if self.translation.common.request_timeout_secs == 0 {
            return Err(anyhow!("request_timeout_secs must be greater than zero"));
        }

        self.schema().context("Invalid content types")?;

        Ok(())
    }

    /// Build the content schema declared by `content_types`
    pub fn schema(&self) -> Result<ContentSchema> {
        Ok(ContentSchema::new(self.content_types.clone())?)
    }
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            languages: LanguageConfig::default(),
            storage: StorageConfig::default(),
            translation: TranslationConfig::default(),
            retention: RetentionConfig::default(),
            content_types: default_content_types(),
            log_level: LogLevel::default(),
        }
    }
}

impl TranslationConfig {
    /// Get the active provider configuration from the available_providers array
    pub fn get_active_provider_config(&self) -> Option<&ProviderConfig> {
        self.get_provider_config(&self.provider)
    }

    /// Get a specific provider configuration by type
    pub fn get_provider_config(&self, provider_type: &TranslationProvider) -> Option<&ProviderConfig> {
        let provider_str = provider_type.to_lowercase_string();
        self.available_providers
            .iter()
            .find(|p| p.provider_type == provider_str)
    }

    /// Get the model for the active provider
    pub fn get_model(&self) -> String {
        if let Some(provider_config) = self.get_active_provider_config() {
            if !provider_config.model.is_empty() {
                return provider_config.model.clone();
            }
        }

        // Default fallback based on provider type
        match self.provider {
            TranslationProvider::Passthrough => String::new(),
            TranslationProvider::OpenAI => default_openai_model(),
            TranslationProvider::Anthropic => default_anthropic_model(),
        }
    }

    /// Get the API key for the active provider
    pub fn get_api_key(&self) -> String {
        self.get_active_provider_config()
            .map(|p| p.api_key.clone())
            .unwrap_or_default()
    }

    /// Get the endpoint for the active provider
    pub fn get_endpoint(&self) -> String {
        if let Some(provider_config) = self.get_active_provider_config() {
            if !provider_config.endpoint.is_empty() {
                return provider_config.endpoint.clone();
            }
        }

        match self.provider {
            TranslationProvider::Passthrough => String::new(),
            TranslationProvider::OpenAI => default_openai_endpoint(),
            TranslationProvider::Anthropic => default_anthropic_endpoint(),
        }
    }

    /// Get the HTTP timeout for the active provider
    pub fn get_timeout_secs(&self) -> u64 {
        self.get_active_provider_config()
            .map(|p| p.timeout_secs)
            .unwrap_or_else(default_timeout_secs)
    }

    /// Get the user override for concurrent requests, if any
    pub fn get_concurrent_requests(&self) -> Option<usize> {
        self.get_active_provider_config()
            .map(|p| p.concurrent_requests)
            .filter(|&n| n > 0)
    }

    /// Get the output token limit for the active provider
    pub fn get_max_tokens(&self) -> Option<u32> {
        self.get_active_provider_config().and_then(|p| p.max_tokens)
    }

    /// Get the rate limit for the active provider
    pub fn get_rate_limit(&self) -> Option<u32> {
        if let Some(provider_config) = self.get_active_provider_config() {
            return provider_config.rate_limit;
        }

        match self.provider {
            TranslationProvider::Passthrough => None,
            TranslationProvider::OpenAI => default_openai_rate_limit(),
            TranslationProvider::Anthropic => default_anthropic_rate_limit(),
        }
    }
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            provider: TranslationProvider::default(),
            available_providers: vec![
                ProviderConfig::new(TranslationProvider::OpenAI),
                ProviderConfig::new(TranslationProvider::Anthropic),
            ],
            common: TranslationCommonConfig::default(),
        }
    }
}
