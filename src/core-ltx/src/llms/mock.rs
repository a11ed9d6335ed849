//! Mock LLM collaborators for testing
//!
//! Configurable stand-ins for [`LlmProvider`] and [`Summarizer`] that never
//! make network calls.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::Error;
use crate::llms::{LlmProvider, PromptConfig, Summarizer, Summary};

/// Mock LLM provider
///
/// Returns the response whose key is contained in the prompt, falling back to a
/// default response, or fails every call.
#[derive(Default)]
pub struct MockLlmProvider {
    /// Map of prompt substrings to responses
    responses: HashMap<String, String>,
    default_response: Option<String>,
    should_fail: bool,
}

impl MockLlmProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock that returns a specific response when the prompt contains the given text
    pub fn with_response(prompt_contains: &str, response: &str) -> Self {
        let mut provider = Self::new();
        provider
            .responses
            .insert(prompt_contains.to_string(), response.to_string());
        provider
    }

    /// Create a mock with a default response for any prompt
    pub fn with_default(response: &str) -> Self {
        Self {
            default_response: Some(response.to_string()),
            ..Self::default()
        }
    }

    /// Create a mock that always fails with an error
    pub fn with_failure() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    async fn complete_prompt(&self, _model: &str, prompt: &str) -> Result<String, Error> {
        if self.should_fail {
            return Err(Error::NoResponse);
        }

        for (key, response) in &self.responses {
            if prompt.contains(key) {
                return Ok(response.clone());
            }
        }

        self.default_response.clone().ok_or(Error::NoResponse)
    }
}

/// Mock summarizer
///
/// Summarizes every page as "Summary of {url}", or fails every call. Counts calls.
/// [`MockSummarizer::unavailable_for`] answers the first calls with a 503 instead.
#[derive(Default)]
pub struct MockSummarizer {
    should_fail: bool,
    unavailable_calls: usize,
    calls: AtomicUsize,
}

impl MockSummarizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_failure() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    pub fn unavailable_for(calls: usize) -> Self {
        Self {
            unavailable_calls: calls,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Summarizer for MockSummarizer {
    async fn summarize(&self, _text: &str, config: &PromptConfig) -> Result<Summary, Error> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.should_fail {
            return Err(Error::SummaryParse("Mock summarizer configured to fail".to_string()));
        }
        if call < self.unavailable_calls {
            return Err(Error::ProviderRejected {
                status: 503,
                message: "Mock summarizer temporarily unavailable".to_string(),
            });
        }
        Ok(Summary {
            description: format!("Description of {}", config.url),
            summary: format!("Summary of {}", config.url),
        })
    }
}
