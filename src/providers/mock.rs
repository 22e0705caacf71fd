/*!
 * Mock provider implementations for testing.
 *
 * This module provides mock providers that simulate different behaviors:
 * - `MockProvider::working()` - Always succeeds with a prefixed "translation"
 * - `MockProvider::chunked(n)` - Delivers the answer `n` characters at a time
 * - `MockProvider::malformed()` - Answers with text that is not JSON
 * - `MockProvider::failing()` - Always fails with an error
 * - `MockProvider::failing_for(lang)` - Fails only for one target language
 */

use async_trait::async_trait;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::errors::ProviderError;
use crate::providers::{ChatMessage, ChatOptions, ChatRole, Provider};

static TARGET_LANGUAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"into (\S+) language").expect("valid regex"));

/// Mock request for testing
#[derive(Debug, Clone, PartialEq)]
pub struct MockRequest {
    /// The full conversation
    pub messages: Vec<ChatMessage>,
    /// Sampling options
    pub options: ChatOptions,
}

impl MockRequest {
    /// Target language named by the system prompt
    pub fn target_language(&self) -> String {
        self.messages
            .iter()
            .filter(|m| m.role == ChatRole::System)
            .find_map(|m| TARGET_LANGUAGE.captures(&m.content))
            .map(|c| c[1].to_string())
            .unwrap_or_else(|| "xx".to_string())
    }

    /// First user message, the content to translate
    pub fn source_text(&self) -> &str {
        self.messages
            .iter()
            .find(|m| m.role == ChatRole::User)
            .map(|m| m.content.as_str())
            .unwrap_or("")
    }

    /// Output already delivered in earlier turns of a continuation
    pub fn delivered(&self) -> String {
        self.messages
            .iter()
            .filter(|m| m.role == ChatRole::Assistant)
            .map(|m| m.content.as_str())
            .collect()
    }
}

/// Mock response for testing
#[derive(Debug, Clone, PartialEq)]
pub struct MockResponse {
    /// The generated text
    pub text: String,
    /// Whether the answer was cut by the output limit
    pub truncated: bool,
}

/// Behavior mode for the mock provider
#[derive(Debug, Clone, PartialEq)]
pub enum MockBehavior {
    /// Always succeeds with `{lang}-{text}`, applied per string value in JSON mode
    Working,
    /// Like `Working`, but every answer carries at most this many characters
    Chunked { chunk_chars: usize },
    /// Answers with text that does not parse as JSON
    Malformed,
    /// Always fails with an error
    Failing,
    /// Fails for one target language only
    FailingFor { language: String },
    /// Simulates slow response (for timeout testing)
    Slow { delay_ms: u64 },
}

/// Mock provider for testing translation behavior
#[derive(Debug)]
pub struct MockProvider {
    /// Behavior mode
    behavior: MockBehavior,
    /// Request counter
    request_count: Arc<AtomicUsize>,
    /// Every request received, in arrival order
    requests: Arc<Mutex<Vec<MockRequest>>>,
}

impl MockProvider {
    /// Create a new mock provider with the specified behavior
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            request_count: Arc::new(AtomicUsize::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a working mock provider that always succeeds
    pub fn working() -> Self {
        Self::new(MockBehavior::Working)
    }

    /// Create a mock that truncates its answers into chunks
    pub fn chunked(chunk_chars: usize) -> Self {
        Self::new(MockBehavior::Chunked { chunk_chars })
    }

    /// Create a mock answering with unparseable text
    pub fn malformed() -> Self {
        Self::new(MockBehavior::Malformed)
    }

    /// Create a failing mock provider that always errors
    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing)
    }

    /// Create a mock failing for a single target language
    pub fn failing_for(language: impl Into<String>) -> Self {
        Self::new(MockBehavior::FailingFor {
            language: language.into(),
        })
    }

    /// Create a mock that waits before answering
    pub fn slow(delay_ms: u64) -> Self {
        Self::new(MockBehavior::Slow { delay_ms })
    }

    /// Number of requests received so far
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Copy of every request received so far
    pub fn requests(&self) -> Vec<MockRequest> {
        self.requests.lock().clone()
    }

    /// The complete answer the working behavior gives for a request
    pub fn full_answer(request: &MockRequest) -> String {
        let language = request.target_language();
        let text = request.source_text();

        if request.options.json_mode {
            if let Ok(Value::Object(object)) = serde_json::from_str::<Value>(text) {
                let translated: serde_json::Map<String, Value> = object
                    .into_iter()
                    .map(|(key, value)| match value {
                        Value::String(s) => (key, Value::String(format!("{}-{}", language, s))),
                        other => (key, other),
                    })
                    .collect();
                return Value::Object(translated).to_string();
            }
        }

        format!("{}-{}", language, text)
    }

    fn answer(request: &MockRequest, chunk_chars: Option<usize>) -> MockResponse {
        let full = Self::full_answer(request);
        let Some(chunk_chars) = chunk_chars else {
            return MockResponse {
                text: full,
                truncated: false,
            };
        };

        let delivered = request.delivered().chars().count();
        let remaining: Vec<char> = full.chars().skip(delivered).collect();
        let take = chunk_chars.max(1).min(remaining.len());

        MockResponse {
            text: remaining[..take].iter().collect(),
            truncated: take < remaining.len(),
        }
    }
}

impl Clone for MockProvider {
    fn clone(&self) -> Self {
        Self {
            behavior: self.behavior.clone(),
            request_count: Arc::clone(&self.request_count),
            requests: Arc::clone(&self.requests),
        }
    }
}

#[async_trait]
impl Provider for MockProvider {
    type Request = MockRequest;
    type Response = MockResponse;

    fn chat_request(&self, messages: &[ChatMessage], options: &ChatOptions) -> Self::Request {
        MockRequest {
            messages: messages.to_vec(),
            options: options.clone(),
        }
    }

    async fn complete(&self, request: Self::Request) -> Result<Self::Response, ProviderError> {
        let count = self.request_count.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());

        match &self.behavior {
            MockBehavior::Working => Ok(Self::answer(&request, None)),

            MockBehavior::Chunked { chunk_chars } => Ok(Self::answer(&request, Some(*chunk_chars))),

            MockBehavior::Malformed => Ok(MockResponse {
                text: "Sorry, here is the object: {\"title\": ".to_string(),
                truncated: false,
            }),

            MockBehavior::Failing => Err(ProviderError::ApiError {
                message: format!("Simulated provider failure (request #{})", count + 1),
                status_code: 500,
            }),

            MockBehavior::FailingFor { language } => {
                if request.target_language() == *language {
                    Err(ProviderError::ApiError {
                        message: format!("Simulated failure for {}", language),
                        status_code: 503,
                    })
                } else {
                    Ok(Self::answer(&request, None))
                }
            }

            MockBehavior::Slow { delay_ms } => {
                tokio::time::sleep(tokio::time::Duration::from_millis(*delay_ms)).await;
                Ok(Self::answer(&request, None))
            }
        }
    }

    async fn test_connection(&self) -> Result<(), ProviderError> {
        match self.behavior {
            MockBehavior::Failing => Err(ProviderError::ConnectionError(
                "Simulated connection failure".to_string(),
            )),
            _ => Ok(()),
        }
    }

    fn extract_text(response: &Self::Response) -> String {
        response.text.clone()
    }

    fn is_truncated(response: &Self::Response) -> bool {
        response.truncated
    }
}
