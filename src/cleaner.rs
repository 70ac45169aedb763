//! Record cleaning through a chat-completion model.
//!
//! A [`RecordCleaner`] turns one raw dump row into one CSV line. The pipeline
//! treats it as an opaque, slow and fallible call: every error it returns is
//! handled per record by skipping that record.

use crate::{
    config::Config,
    error::{Error, Result},
    prompt::PromptTemplate,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

/// Converts a raw record into a cleaned CSV line.
#[async_trait]
pub trait RecordCleaner: Send + Sync {
    /// Cleans a single raw record.
    ///
    /// # Errors
    ///
    /// Returns an error if the transformation fails for this record.
    async fn clean(&self, record: &str) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: [ChatMessage<'a>; 1],
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

/// Cleaner backed by an OpenAI-compatible chat completions endpoint.
pub struct OpenAiCleaner {
    client: reqwest::Client,
    prompt: PromptTemplate,
    endpoint: String,
    model: String,
    temperature: f32,
    api_key: Option<String>,
}

impl OpenAiCleaner {
    /// Creates a cleaner from configuration.
    ///
    /// A missing API key is not an error here; each call fails instead.
    ///
    /// # Errors
    ///
    /// Returns an error if the prompt template or HTTP client cannot be built.
    pub fn new(config: &Config) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        if config.api_key.is_none() && !config.dry_run {
            warn!("No API key configured - every record will fail to clean and be skipped");
        }

        Ok(Self {
            client,
            prompt: PromptTemplate::new(config)?,
            endpoint: format!("{}/chat/completions", config.api_base),
            model: config.model.clone(),
            temperature: config.temperature,
            api_key: config.api_key.clone(),
        })
    }

    /// Returns the chat completions URL this cleaner posts to.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl RecordCleaner for OpenAiCleaner {
    async fn clean(&self, record: &str) -> Result<String> {
        let api_key = self.api_key.as_deref().ok_or(Error::MissingApiKey)?;
        let prompt = self.prompt.render(record)?;

        trace!("Prompt:\n{}", prompt);

        let request = ChatRequest {
            model: &self.model,
            temperature: self.temperature,
            messages: [ChatMessage {
                role: "user",
                content: &prompt,
            }],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::ApiStatus {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        let parsed: ChatResponse = serde_json::from_str(&body)?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(Error::EmptyResponse)?;

        debug!("Model returned {} bytes", content.len());
        Ok(content)
    }
}
