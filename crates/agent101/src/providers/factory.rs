use super::{
    azure::AzureProvider, base::Provider, configs::ProviderConfig, openai::OpenAiProvider,
};
use anyhow::Result;
use std::sync::Arc;
use strum_macros::{Display, EnumIter};

#[derive(EnumIter, Display, Debug, Clone, Copy, PartialEq, Eq)]
#[strum(serialize_all = "lowercase")]
pub enum ProviderType {
    OpenAi,
    Azure,
}

impl ProviderConfig {
    pub fn provider_type(&self) -> ProviderType {
        match self {
            ProviderConfig::OpenAi(_) => ProviderType::OpenAi,
            ProviderConfig::Azure(_) => ProviderType::Azure,
        }
    }
}

pub fn get_provider(config: ProviderConfig) -> Result<Arc<dyn Provider>> {
    match config {
        ProviderConfig::OpenAi(openai_config) => Ok(Arc::new(OpenAiProvider::new(openai_config)?)),
        ProviderConfig::Azure(azure_config) => Ok(Arc::new(AzureProvider::new(azure_config)?)),
    }
}
