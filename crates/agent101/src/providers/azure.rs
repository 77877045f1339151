use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;

use super::base::{CompletionOptions, Provider, Usage};
use super::configs::AzureProviderConfig;
use super::utils::{
    check_openai_context_length_error, create_openai_request, get_openai_usage,
    openai_response_to_message,
};
use crate::models::message::Message;
use crate::models::tool::Tool;

/// Chat completions against an Azure OpenAI deployment. The wire format matches OpenAI,
/// only the url layout and the auth header differ.
pub struct AzureProvider {
    client: Client,
    config: AzureProviderConfig,
}

impl AzureProvider {
    pub fn new(config: AzureProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600))
            .build()?;

        Ok(Self { client, config })
    }

    fn url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.config.endpoint.trim_end_matches('/'),
            self.config.deployment_name,
            self.config.api_version
        )
    }

    async fn post(&self, payload: Value) -> Result<Value> {
        let url = self.url();
        let response = self
            .client
            .post(&url)
            .header("api-key", &self.config.api_key)
            .json(&payload)
            .send()
            .await
            .with_context(|| format!("Failed to reach azure deployment {}", self.config.deployment_name))?;

        match response.status() {
            StatusCode::OK => Ok(response.json().await?),
            status if status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() >= 500 => {
                Err(anyhow!("Server error: {}", status))
            }
            status => {
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
impl Provider for AzureProvider {
    async fn complete(
        &self,
        messages: &[Message],
        tools: &[Tool],
        options: &CompletionOptions,
    ) -> Result<(Message, Usage)> {
        let payload = create_openai_request(
            None,
            messages,
            tools,
            options,
            self.config.temperature,
            self.config.max_tokens,
        )?;

        let response = self.post(payload).await?;
        if let Some(error) = response.get("error") {
            return Err(anyhow!("Azure OpenAI API error: {}", error));
        }

        let message = openai_response_to_message(response.clone())?;
        let usage = get_openai_usage(&response);
        tracing::debug!(
            deployment = %self.config.deployment_name,
            total_tokens = ?usage.total_tokens,
            "azure completion"
        );

        Ok((message, usage))
    }
}
