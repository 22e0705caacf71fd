use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use super::{ChatMessage, ChatOptions, ChatRole, Provider, RetryPolicy};
use crate::errors::ProviderError;

/// Anthropic requires an explicit output limit
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Anthropic client for interacting with Anthropic API
pub struct Anthropic {
    /// HTTP client for API requests
    client: Client,
    /// API key for authentication
    api_key: String,
    /// API endpoint URL (optional, defaults to public API)
    endpoint: String,
    /// Model used for every request
    model: String,
    /// Retry and pacing settings
    retry: RetryPolicy,
}

impl fmt::Debug for Anthropic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Anthropic")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("retry", &self.retry)
            .finish()
    }
}

/// Anthropic message request
#[derive(Debug, Serialize)]
pub struct AnthropicRequest {
    /// The model to use
    model: String,

    /// The messages for the conversation
    messages: Vec<AnthropicMessage>,

    /// System prompt to guide the AI
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,

    /// Temperature for generation
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,

    /// Maximum number of tokens to generate
    max_tokens: u32,
}

/// Anthropic message format
#[derive(Debug, Serialize, Deserialize)]
pub struct AnthropicMessage {
    /// Role of the message sender (user, assistant)
    pub role: String,

    /// Content of the message
    pub content: String,
}

/// Token usage information
#[derive(Debug, Deserialize)]
pub struct TokenUsage {
    /// Number of input tokens
    pub input_tokens: u32,
    /// Number of output tokens
    pub output_tokens: u32,
}

/// Anthropic response
#[derive(Debug, Deserialize)]
pub struct AnthropicResponse {
    /// The content of the response
    pub content: Vec<AnthropicContent>,
    /// Why generation stopped (`end_turn`, `max_tokens`...)
    #[serde(default)]
    pub stop_reason: Option<String>,
    /// Token usage information
    pub usage: TokenUsage,
}

/// Individual content block in an Anthropic response
#[derive(Debug, Deserialize)]
pub struct AnthropicContent {
    /// The type of content
    #[serde(rename = "type")]
    pub content_type: String,

    /// The actual text content
    #[serde(default)]
    pub text: String,
}

impl AnthropicRequest {
    /// Create a new Anthropic request
    pub fn new(model: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            model: model.into(),
            messages: Vec::new(),
            system: None,
            temperature: None,
            max_tokens,
        }
    }

    /// Add a message to the request
    pub fn add_message(mut self, role: impl Into<String>, content: impl Into<String>) -> Self {
        self.messages.push(AnthropicMessage {
            role: role.into(),
            content: content.into(),
        });
        self
    }

    /// Append to the system prompt
    pub fn system(mut self, system: impl Into<String>) -> Self {
        let system = system.into();
        self.system = Some(match self.system.take() {
            Some(existing) => format!("{}\n\n{}", existing, system),
            None => system,
        });
        self
    }

    /// Set the temperature
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

impl Anthropic {
    /// Create a new Anthropic client
    pub fn new(api_key: impl Into<String>, endpoint: impl Into<String>, model: impl Into<String>) -> Self {
        Self::new_with_config(api_key, endpoint, model, RetryPolicy::default(), 120)
    }

    /// Create a new Anthropic client with retry settings and an HTTP timeout
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
                .build()
                .unwrap_or_default(),
            api_key: api_key.into(),
            endpoint: endpoint.into(),
            model: model.into(),
            retry,
        }
    }

    /// Full URL of the messages endpoint
    pub fn messages_url(&self) -> String {
        if self.endpoint.is_empty() {
            "https://api.anthropic.com/v1/messages".to_string()
        } else {
            format!("{}/v1/messages", self.endpoint.trim_end_matches('/'))
        }
    }
}

#[async_trait]
impl Provider for Anthropic {
    type Request = AnthropicRequest;
    type Response = AnthropicResponse;

    fn chat_request(&self, messages: &[ChatMessage], options: &ChatOptions) -> Self::Request {
        let mut request = AnthropicRequest::new(
            &self.model,
            options.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        );

        // The messages API takes system prompts out of band
        for message in messages {
            request = match message.role {
                ChatRole::System => request.system(&message.content),
                ChatRole::User => request.add_message("user", &message.content),
                ChatRole::Assistant => request.add_message("assistant", &message.content),
            };
        }

        if let Some(temperature) = options.temperature {
            request = request.temperature(temperature);
        }
        if options.json_mode {
            request = request.system("Respond with a single JSON object and nothing else.");
        }
        request
    }

    async fn complete(&self, request: Self::Request) -> Result<Self::Response, ProviderError> {
        let api_url = self.messages_url();

        let response = self
            .retry
            .send("Anthropic", || {
                self.client
                    .post(&api_url)
                    .header("Content-Type", "application/json")
                    .header("x-api-key", &self.api_key)
                    .header("anthropic-version", "2023-06-01")
                    .json(&request)
            })
            .await?;

        response.json::<AnthropicResponse>().await.map_err(|e| {
            ProviderError::ParseError(format!("Failed to parse Anthropic API response: {}", e))
        })
    }

    async fn test_connection(&self) -> Result<(), ProviderError> {
        let request = AnthropicRequest::new(&self.model, 10).add_message("user", "Hello");

        self.complete(request).await?;
        Ok(())
    }

    fn extract_text(response: &Self::Response) -> String {
        response
            .content
            .iter()
            .filter(|c| c.content_type == "text")
            .map(|c| c.text.as_str())
            .collect()
    }

    fn is_truncated(response: &Self::Response) -> bool {
        response.stop_reason.as_deref() == Some("max_tokens")
    }
}
