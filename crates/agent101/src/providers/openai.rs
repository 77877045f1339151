use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;

use super::base::{CompletionOptions, Provider, Usage};
use super::configs::OpenAiProviderConfig;
use super::utils::{
    check_openai_context_length_error, create_openai_request, get_openai_usage,
    openai_response_to_message,
};
use crate::models::message::Message;
use crate::models::tool::Tool;

pub struct OpenAiProvider {
    client: Client,
    config: OpenAiProviderConfig,
}

impl OpenAiProvider {
    pub fn new(config: OpenAiProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600)) // 10 minutes timeout
            .build()?;

        Ok(Self { client, config })
    }

    async fn post(&self, payload: Value) -> Result<Value> {
        let url = format!(
            "{}/v1/chat/completions",
            self.config.host.trim_end_matches('/')
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&payload)
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", url))?;

        match response.status() {
            StatusCode::OK => Ok(response.json().await?),
            status if status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() >= 500 => {
                Err(anyhow!("Server error: {}", status))
            }
            status => {
                // Error bodies carry the reason, e.g. a context length error
                let body: Value = response.json().await.unwrap_or(Value::Null);
                if let Some(error) = body.get("error") {
                    if let Some(err) = check_openai_context_length_error(error) {
                        return Err(err.into());
                    }
                }
                Err(anyhow!("Request failed: {}\nResponse: {}", status, body))
            }
        }
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    async fn complete(
        &self,
        messages: &[Message],
        tools: &[Tool],
        options: &CompletionOptions,
    ) -> Result<(Message, Usage)> {
        let payload = create_openai_request(
            Some(&self.config.model),
            messages,
            tools,
            options,
            self.config.temperature,
            self.config.max_tokens,
        )?;

        let response = self.post(payload).await?;

        // Raise specific error if context length is exceeded
        if let Some(error) = response.get("error") {
            if let Some(err) = check_openai_context_length_error(error) {
                return Err(err.into());
            }
            return Err(anyhow!("OpenAI API error: {}", error));
        }

        let message = openai_response_to_message(response.clone())?;
        let usage = get_openai_usage(&response);
        tracing::debug!(
            model = %self.config.model,
            input_tokens = ?usage.input_tokens,
            output_tokens = ?usage.output_tokens,
            "openai completion"
        );

        Ok((message, usage))
    }
}
