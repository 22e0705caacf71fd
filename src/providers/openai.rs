/*!
 * OpenAI chat completions client.
 *
 * Works with the public OpenAI API and with compatible servers exposing
 * `/chat/completions` under the configured endpoint.
 */

use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use super::{ChatMessage, ChatOptions, Provider, RetryPolicy};
use crate::errors::ProviderError;

const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1";

/// OpenAI client for interacting with the chat completions API
pub struct OpenAI {
    /// HTTP client for API requests
    client: Client,
    /// API key for authentication
    api_key: String,
    /// API base URL (defaults to the public API)
    endpoint: String,
    /// Model used for every request
    model: String,
    /// Retry and pacing settings
    retry: RetryPolicy,
}

impl fmt::Debug for OpenAI {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAI")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("retry", &self.retry)
            .finish()
    }
}

/// Chat completion request body
#[derive(Debug, Serialize)]
pub struct OpenAIRequest {
    /// The model to use
    model: String,
    /// The conversation so far
    messages: Vec<ChatMessage>,
    /// Temperature for generation
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    /// Maximum number of tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    /// Structured output mode
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
}

impl OpenAIRequest {
    /// Create a new request for a model
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            messages: Vec::new(),
            temperature: None,
            max_tokens: None,
            response_format: None,
        }
    }

    /// Add a message to the request
    pub fn add_message(mut self, message: ChatMessage) -> Self {
        self.messages.push(message);
        self
    }

    /// Set the temperature
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the output token limit
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Ask for a JSON object answer
    pub fn json_object(mut self) -> Self {
        self.response_format = Some(ResponseFormat {
            format_type: "json_object".to_string(),
        });
        self
    }
}

/// Chat completion response
#[derive(Debug, Deserialize)]
pub struct OpenAIResponse {
    /// Generated choices, the first one is used
    pub choices: Vec<OpenAIChoice>,
    /// Token usage information
    #[serde(default)]
    pub usage: Option<TokenUsage>,
}

/// One generated choice
#[derive(Debug, Deserialize)]
pub struct OpenAIChoice {
    pub message: OpenAIMessage,
    /// `stop`, `length`, `content_filter`...
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Message content of a choice
#[derive(Debug, Deserialize)]
pub struct OpenAIMessage {
    #[serde(default)]
    pub content: Option<String>,
}

/// Token usage information
#[derive(Debug, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl OpenAI {
    /// Create a new OpenAI client
    pub fn new(api_key: impl Into<String>, endpoint: impl Into<String>, model: impl Into<String>) -> Self {
        Self::new_with_config(api_key, endpoint, model, RetryPolicy::default(), 120)
    }

    /// Create a new OpenAI client with retry settings and an HTTP timeout
    pub fn new_with_config(
        api_key: impl Into<String>,
        endpoint: impl Into<String>,
        model: impl Into<String>,
        retry: RetryPolicy,
        timeout_secs: u64,
    ) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(timeout_secs))
                .pool_idle_timeout(Duration::from_secs(90))
                .build()
                .unwrap_or_default(),
            api_key: api_key.into(),
            endpoint: endpoint.into(),
            model: model.into(),
            retry,
        }
    }

    /// Full URL of the chat completions endpoint
    pub fn chat_completions_url(&self) -> String {
        let base = if self.endpoint.is_empty() {
            DEFAULT_ENDPOINT
        } else {
            self.endpoint.trim_end_matches('/')
        };
        format!("{}/chat/completions", base)
    }
}

#[async_trait]
impl Provider for OpenAI {
    type Request = OpenAIRequest;
    type Response = OpenAIResponse;

    fn chat_request(&self, messages: &[ChatMessage], options: &ChatOptions) -> Self::Request {
        let mut request = messages
            .iter()
            .cloned()
            .fold(OpenAIRequest::new(&self.model), OpenAIRequest::add_message);

        if let Some(temperature) = options.temperature {
            request = request.temperature(temperature);
        }
        if let Some(max_tokens) = options.max_tokens {
            request = request.max_tokens(max_tokens);
        }
        if options.json_mode {
            request = request.json_object();
        }
        request
    }

    async fn complete(&self, request: Self::Request) -> Result<Self::Response, ProviderError> {
        let url = self.chat_completions_url();

        let response = self
            .retry
            .send("OpenAI", || {
                self.client
                    .post(&url)
                    .header(header::CONTENT_TYPE, "application/json")
                    .bearer_auth(&self.api_key)
                    .json(&request)
            })
            .await?;

        response
            .json::<OpenAIResponse>()
            .await
            .map_err(|e| ProviderError::ParseError(format!("Failed to parse OpenAI API response: {}", e)))
    }

    async fn test_connection(&self) -> Result<(), ProviderError> {
        let request = self.chat_request(
            &[ChatMessage::user("Hello")],
            &ChatOptions {
                max_tokens: Some(10),
                ..ChatOptions::default()
            },
        );

        self.complete(request).await?;
        Ok(())
    }

    fn extract_text(response: &Self::Response) -> String {
        response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .unwrap_or_default()
    }

    fn is_truncated(response: &Self::Response) -> bool {
        response
            .choices
            .first()
            .and_then(|choice| choice.finish_reason.as_deref())
            == Some("length")
    }
}
