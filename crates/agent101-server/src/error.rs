use thiserror::Error;

pub const ENV_PREFIX: &str = "AGENT101";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {env_var}")]
    MissingEnvVar { env_var: String },

    #[error("Invalid server address: {0}")]
    InvalidAddress(String),

    #[error("Configuration error: {0}")]
    Other(#[from] config::ConfigError),
}

/// Map a dotted settings path to the environment variable that sets it,
/// e.g. `provider.api_key` to `AGENT101_PROVIDER__API_KEY`
pub fn to_env_var(field_path: &str) -> String {
    format!(
        "{}_{}",
        ENV_PREFIX,
        field_path.replace('.', "__").to_uppercase()
    )
}
