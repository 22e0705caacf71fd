/*!
 * Provider-specific concurrency tuning.
 *
 * How many per-language requests the LLM translator keeps in flight, and
 * the request rate assumed when the configuration sets none.
 */

use crate::app_config::TranslationProvider;

/// Provider-specific concurrency profile with tuned defaults
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderProfile {
    /// Maximum concurrent requests
    pub max_concurrent_requests: usize,
    /// Target requests per minute (for rate limiting)
    pub target_rpm: Option<u32>,
}

impl ProviderProfile {
    /// Get the optimal profile for a given provider
    pub fn for_provider(provider: TranslationProvider) -> Self {
        match provider {
            TranslationProvider::Passthrough => Self {
                // No network involved
                max_concurrent_requests: 1,
                target_rpm: None,
            },
            TranslationProvider::OpenAI => Self {
                max_concurrent_requests: 10,
                target_rpm: Some(60),
            },
            TranslationProvider::Anthropic => Self {
                // Lower rate limits
                max_concurrent_requests: 5,
                target_rpm: Some(45),
            },
        }
    }

    /// Get effective concurrent requests, respecting any user override
    pub fn effective_concurrent_requests(&self, user_override: Option<usize>) -> usize {
        user_override
            .filter(|&n| n > 0)
            .unwrap_or(self.max_concurrent_requests)
    }

    /// Get the effective rate limit, respecting any configured value
    pub fn effective_rate_limit(&self, configured: Option<u32>) -> Option<u32> {
        configured.or(self.target_rpm)
    }
}
