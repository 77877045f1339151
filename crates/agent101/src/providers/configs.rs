// Unified enum to wrap different provider configurations
#[derive(Debug, Clone)]
pub enum ProviderConfig {
    OpenAi(OpenAiProviderConfig),
    Azure(AzureProviderConfig),
}

#[derive(Debug, Clone)]
pub struct OpenAiProviderConfig {
    pub host: String,
    pub api_key: String,
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<i32>,
}

/// An Azure OpenAI deployment. The deployment selects the model, so there is no model field.
#[derive(Debug, Clone)]
pub struct AzureProviderConfig {
    pub endpoint: String,
    pub deployment_name: String,
    pub api_key: String,
    pub api_version: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<i32>,
}
