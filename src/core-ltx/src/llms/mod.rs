pub mod chatgpt;
#[cfg(any(test, feature = "test-helpers"))]
pub mod mock;
pub mod prompts;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use chatgpt::ChatGpt;
pub use prompts::prompt_summarize_page;

use crate::Error;

/// Interface to a hosted LLM that lets us complete a prompt and await a response.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn complete_prompt(&self, model: &str, prompt: &str) -> Result<String, Error>;
}

/// Per-domain summarization settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptConfig {
    pub model: String,
    /// Extra instructions appended to the prompt.
    pub instructions: Option<String>,
    /// The page being summarized.
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub description: String,
    pub summary: String,
}

impl Summary {
    pub fn is_empty(&self) -> bool {
        self.description.trim().is_empty() && self.summary.trim().is_empty()
    }
}

/// Produces a short description and summary of a page's text.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, text: &str, config: &PromptConfig) -> Result<Summary, Error>;
}

/// A [`Summarizer`] that prompts an [`LlmProvider`] and parses its JSON answer.
pub struct LlmSummarizer<P> {
    provider: P,
}

/// Summaries from OpenAI chat models.
pub type ChatGptSummarizer = LlmSummarizer<ChatGpt>;

impl<P: LlmProvider> LlmSummarizer<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }
}

/// Parses the model's reply, tolerating a surrounding markdown code fence.
pub fn parse_summary(response: &str) -> Result<Summary, Error> {
    let trimmed = response.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();

    let summary: Summary = serde_json::from_str(body)?;
    if summary.is_empty() {
        return Err(Error::SummaryParse("model returned an empty summary".to_string()));
    }
    Ok(summary)
}

#[async_trait]
impl<P: LlmProvider> Summarizer for LlmSummarizer<P> {
    async fn summarize(&self, text: &str, config: &PromptConfig) -> Result<Summary, Error> {
        let prompt = prompt_summarize_page(&config.url, text, config.instructions.as_deref())?;
        let response = self.provider.complete_prompt(&config.model, &prompt).await?;
        parse_summary(&response)
    }
}
