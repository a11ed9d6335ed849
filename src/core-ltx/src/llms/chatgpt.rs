use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
};
use async_trait::async_trait;

use crate::Error;
use crate::llms::LlmProvider;

/// OpenAI chat completions.
///
/// Requires `OPENAI_API_KEY` to be set in the environment.
pub struct ChatGpt {
    client: Client<OpenAIConfig>,
}

impl ChatGpt {
    pub fn new() -> Self {
        Self { client: Client::new() }
    }

    pub fn with_api_key(api_key: &str) -> Self {
        Self {
            client: Client::with_config(OpenAIConfig::new().with_api_key(api_key)),
        }
    }
}

impl Default for ChatGpt {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmProvider for ChatGpt {
    async fn complete_prompt(&self, model: &str, prompt: &str) -> Result<String, Error> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(model)
            .messages([
                ChatCompletionRequestSystemMessageArgs::default()
                    .content("You write concise, factual summaries of web pages.")
                    .build()?
                    .into(),
                ChatCompletionRequestUserMessageArgs::default()
                    .content(prompt)
                    .build()?
                    .into(),
            ])
            .build()?;

        let response = self.client.chat().create(request).await?;

        response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or(Error::NoResponse)
    }
}
