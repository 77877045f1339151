use crate::error::{to_env_var, ConfigError, ENV_PREFIX};
use agent101::controller::{ControllerConfig, DEFAULT_RECURSION_LIMIT, DEFAULT_SYSTEM_PROMPT};
use agent101::providers::configs::{AzureProviderConfig, OpenAiProviderConfig, ProviderConfig};
use config::{Config, Environment};
use serde::Deserialize;
use std::net::SocketAddr;

#[derive(Debug, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerSettings {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let addr = format!("{}:{}", self.host, self.port);
        addr.parse().map_err(|_| ConfigError::InvalidAddress(addr))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase", tag = "type")]
pub enum ProviderSettings {
    OpenAi {
        #[serde(default = "default_openai_host")]
        host: String,
        api_key: String,
        #[serde(default = "default_model")]
        model: String,
        #[serde(default = "default_temperature")]
        temperature: Option<f32>,
        #[serde(default)]
        max_tokens: Option<i32>,
    },
    Azure {
        endpoint: String,
        deployment_name: String,
        api_key: String,
        #[serde(default = "default_azure_api_version")]
        api_version: String,
        #[serde(default = "default_temperature")]
        temperature: Option<f32>,
        #[serde(default)]
        max_tokens: Option<i32>,
    },
}

impl ProviderSettings {
    // Convert to the agent101 ProviderConfig
    pub fn into_config(self) -> ProviderConfig {
        match self {
            ProviderSettings::OpenAi {
                host,
                api_key,
                model,
                temperature,
                max_tokens,
            } => ProviderConfig::OpenAi(OpenAiProviderConfig {
                host,
                api_key,
                model,
                temperature,
                max_tokens,
            }),
            ProviderSettings::Azure {
                endpoint,
                deployment_name,
                api_key,
                api_version,
                temperature,
                max_tokens,
            } => ProviderConfig::Azure(AzureProviderConfig {
                endpoint,
                deployment_name,
                api_key,
                api_version,
                temperature,
                max_tokens,
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AgentSettings {
    #[serde(default = "default_agent_name")]
    pub name: String,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    /// Keep conversation checkpoints in memory between requests
    #[serde(default)]
    pub persist_execution_state: bool,
    #[serde(default = "default_recursion_limit")]
    pub recursion_limit: usize,
    /// Execute the built-in tools on the server instead of handing every tool call back
    #[serde(default)]
    pub execute_tools: bool,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            system_prompt: default_system_prompt(),
            persist_execution_state: false,
            recursion_limit: default_recursion_limit(),
            execute_tools: false,
        }
    }
}

impl AgentSettings {
    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            system_prompt: self.system_prompt.clone(),
            persist_execution_state: self.persist_execution_state,
            recursion_limit: self.recursion_limit,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    pub provider: ProviderSettings,
    #[serde(default)]
    pub agent: AgentSettings,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::load_and_validate()
    }

    fn load_and_validate() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port())?
            // Layer on the environment variables
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let result: Result<Self, config::ConfigError> = config.try_deserialize();

        match result {
            Ok(settings) => Ok(settings),
            Err(err) => {
                tracing::debug!("Configuration error: {:?}", &err);

                if let Some(path) = missing_field_path(&err.to_string()) {
                    Err(ConfigError::MissingEnvVar {
                        env_var: to_env_var(&path),
                    })
                } else if let config::ConfigError::NotFound(field) = &err {
                    Err(ConfigError::MissingEnvVar {
                        env_var: to_env_var(field),
                    })
                } else {
                    Err(ConfigError::Other(err))
                }
            }
        }
    }
}

/// Recover the settings path from a "missing field `x`" error. Serde only names the leaf
/// field, so provider fields are placed under `provider` explicitly.
fn missing_field_path(message: &str) -> Option<String> {
    let field = message.split("missing field `").nth(1)?.split('`').next()?;
    let path = match field {
        "provider" => "provider.type".to_string(),
        "type" | "api_key" | "endpoint" | "deployment_name" => format!("provider.{}", field),
        other => other.to_string(),
    };
    Some(path)
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8888
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_temperature() -> Option<f32> {
    Some(0.2)
}

fn default_openai_host() -> String {
    "https://api.openai.com".to_string()
}

fn default_azure_api_version() -> String {
    "2024-10-21".to_string()
}

fn default_agent_name() -> String {
    "agent-101".to_string()
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}

fn default_recursion_limit() -> usize {
    DEFAULT_RECURSION_LIMIT
}
