//! Environment-sourced provider configuration.

use std::env;
use std::error::Error;
use std::fmt;

/// A required configuration variable was absent or empty.
#[derive(Debug, Clone)]
pub enum ConfigError {
    MissingVar(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingVar(name) => {
                write!(f, "missing required environment variable: {}", name)
            }
        }
    }
}

impl Error for ConfigError {}

/// Connection settings for an Azure OpenAI deployment.
///
/// Sourced from the environment:
/// - `AZURE_OPENAI_ENDPOINT` — resource base URL
/// - `AZURE_OPENAI_API_KEY` — API key (used by [`crate::auth::StaticTokenProvider`])
/// - `AZURE_OPENAI_API_VERSION` — REST API version query value
/// - `AZURE_OPENAI_DEPLOYMENT` — deployment (model) name
/// - `POOL_MANAGEMENT_ENDPOINT` — optional remote session-pool endpoint,
///   only meaningful for unrestricted-profile execution setups
#[derive(Clone, Debug)]
pub struct CodeCrewConfig {
    pub endpoint: String,
    pub api_key: String,
    pub api_version: String,
    pub deployment: String,
    pub pool_endpoint: Option<String>,
}

impl CodeCrewConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(CodeCrewConfig {
            endpoint: require("AZURE_OPENAI_ENDPOINT")?,
            api_key: require("AZURE_OPENAI_API_KEY")?,
            api_version: require("AZURE_OPENAI_API_VERSION")?,
            deployment: require("AZURE_OPENAI_DEPLOYMENT")?,
            pool_endpoint: env::var("POOL_MANAGEMENT_ENDPOINT")
                .ok()
                .filter(|v| !v.is_empty()),
        })
    }
}

fn require(name: &str) -> Result<String, ConfigError> {
    match env::var(name) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(ConfigError::MissingVar(name.to_string())),
    }
}
