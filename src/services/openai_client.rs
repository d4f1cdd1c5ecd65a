use async_openai::{
    config::OpenAIConfig,
    types::{ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs},
    Client,
};

/// The content loop talks to "a generator", not to OpenAI specifically,
/// so tests can drive the loop with a scripted one.
#[allow(async_fn_in_trait)]
pub trait DraftGenerator {
    async fn generate(&self, prompt: &str) -> anyhow::Result<String>;
}

pub struct OpenaiClient {
    client: Client<OpenAIConfig>,
}

impl Default for OpenaiClient {
    fn default() -> Self {
        OpenaiClient {
            client: Client::new(),
        }
    }
}

impl OpenaiClient {
    pub fn new(api_key: String) -> Self {
        let config = OpenAIConfig::new().with_api_key(api_key);
        OpenaiClient {
            client: Client::with_config(config),
        }
    }
}

impl DraftGenerator for OpenaiClient {
    async fn generate(&self, prompt: &str) -> anyhow::Result<String> {
        let request = CreateChatCompletionRequestArgs::default()
            .model("gpt-4o-mini")
            .messages([ChatCompletionRequestUserMessageArgs::default()
                .content(prompt)
                .build()?
                .into()])
            .max_tokens(2000_u32)
            .build()?;

        let response = self.client.chat().create(request).await?;
        log::info!(
            "Generator replied with {} choices",
            response.choices.len()
        );

        let first_choice = response
            .choices
            .first()
            .ok_or_else(|| anyhow::anyhow!("no choices in generator response"))?
            .message
            .content
            .clone()
            .ok_or_else(|| anyhow::anyhow!("no content in generator response"))?;

        Ok(first_choice)
    }
}
