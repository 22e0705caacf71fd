/*!
 * Provider implementations for LLM chat services.
 *
 * This module contains client implementations for the supported providers:
 * - OpenAI: OpenAI chat completions API (and compatible servers)
 * - Anthropic: Anthropic messages API
 * - Mock: scripted provider used by tests
 */

use async_trait::async_trait;
use log::error;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::time::Duration;

use crate::errors::ProviderError;

/// Role of a chat message author
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// One message of a provider-independent conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Sampling options for one chat request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatOptions {
    /// Sampling temperature
    pub temperature: Option<f32>,
    /// Ask the provider for a JSON object answer
    pub json_mode: bool,
    /// Upper bound for generated tokens
    pub max_tokens: Option<u32>,
}

/// Common trait for all LLM providers
///
/// This trait defines the interface that all provider implementations must follow,
/// allowing them to be used interchangeably by the LLM translator.
#[async_trait]
pub trait Provider: Send + Sync + Debug {
    /// The request type for this provider
    type Request: Send + Sync;

    /// The response type for this provider
    type Response: Send + Sync;

    /// Build a provider request from a conversation
    fn chat_request(&self, messages: &[ChatMessage], options: &ChatOptions) -> Self::Request;

    /// Complete a request using this provider
    async fn complete(&self, request: Self::Request) -> Result<Self::Response, ProviderError>;

    /// Test the connection to the provider
    async fn test_connection(&self) -> Result<(), ProviderError>;

    /// Extract text from the provider response
    fn extract_text(response: &Self::Response) -> String;

    /// Whether generation stopped because of the output token limit
    fn is_truncated(response: &Self::Response) -> bool;
}

/// Upper bound for one backoff sleep
pub const MAX_BACKOFF_MS: u64 = 60_000;

/// Retry and pacing settings shared by the HTTP providers
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Base backoff time in milliseconds for exponential backoff
    pub backoff_base_ms: u64,
    /// Optional rate limit in requests per minute
    pub rate_limit: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base_ms: 1000,
            rate_limit: None,
        }
    }
}

impl RetryPolicy {
    /// Map a failed HTTP status to a provider error
    pub fn classify(status_code: u16, message: String) -> ProviderError {
        match status_code {
            401 | 403 => ProviderError::AuthenticationError(message),
            429 => ProviderError::RateLimitExceeded(message),
            _ => ProviderError::ApiError {
                status_code,
                message,
            },
        }
    }

    /// Exponential backoff before retry `attempt` (1-based), capped at `MAX_BACKOFF_MS`
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt.saturating_sub(1)).unwrap_or(u64::MAX);
        Duration::from_millis(self.backoff_base_ms.saturating_mul(factor).min(MAX_BACKOFF_MS))
    }

    /// Send a request, retrying rate limits, server errors and network failures
    ///
    /// `build` is called once per attempt since a request builder is consumed
    /// by sending it.
    pub async fn send<F>(&self, provider: &str, build: F) -> Result<reqwest::Response, ProviderError>
    where
        F: Fn() -> reqwest::RequestBuilder + Send + Sync,
    {
        let mut attempt = 0;
        let mut last_error = None;

        while attempt <= self.max_retries {
            if let Some(rate_limit) = self.rate_limit {
                if attempt > 0 && rate_limit > 0 {
                    let delay_ms = 60_000 / rate_limit as u64;
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                }
            }

            match build().send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }

                    let error_text = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "Failed to get error response text".to_string());

                    if status.as_u16() == 429 || status.is_server_error() {
                        error!(
                            "{} API error ({}): {} - attempt {}/{}",
                            provider,
                            status,
                            error_text,
                            attempt + 1,
                            self.max_retries + 1
                        );
                        last_error = Some(Self::classify(status.as_u16(), error_text));
                    } else {
                        // Client error - don't retry
                        error!("{} API error ({}): {}", provider, status, error_text);
                        return Err(Self::classify(status.as_u16(), error_text));
                    }
                }
                Err(e) => {
                    error!(
                        "{} API network error: {} - attempt {}/{}",
                        provider,
                        e,
                        attempt + 1,
                        self.max_retries + 1
                    );
                    last_error = Some(ProviderError::ConnectionError(format!(
                        "Failed to send request to {} API: {}",
                        provider, e
                    )));
                }
            }

            attempt += 1;

            if attempt <= self.max_retries {
                tokio::time::sleep(self.backoff(attempt)).await;
            }
        }

        Err(last_error.unwrap_or_else(|| {
            ProviderError::RequestFailed(format!(
                "{} API request failed after {} attempts",
                provider,
                self.max_retries + 1
            ))
        }))
    }
}

pub mod openai;
pub mod anthropic;
pub mod mock;

pub use anthropic::Anthropic;
pub use mock::{MockBehavior, MockProvider};
pub use openai::OpenAI;
