//! Environment-driven configuration
//!
//! All settings come from the environment (optionally via a `.env` file
//! loaded in `main`). Recognized provider options: Azure gateway
//! (`AZURE_OPENAI_API_KEY` + `AZURE_OPENAI_ENDPOINT`) or standard OpenAI
//! (`OPENAI_API_KEY`); see `provider::from_config` for the selection.

use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub openai_api_key: Option<String>,
    pub openai_model: String,

    pub azure_api_key: Option<String>,
    pub azure_endpoint: Option<String>,
    pub azure_api_version: String,
    pub azure_deployment: String,

    pub database_url: String,
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            openai_model: "gpt-5-mini".to_string(),
            azure_api_key: None,
            azure_endpoint: None,
            azure_api_version: "2024-02-15-preview".to_string(),
            azure_deployment: "gpt-35-turbo".to_string(),
            database_url: "sqlite:accounting.db".to_string(),
            port: 8080,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Config::default();

        Self {
            openai_api_key: non_empty("OPENAI_API_KEY"),
            openai_model: non_empty("OPENAI_MODEL").unwrap_or(defaults.openai_model),
            azure_api_key: non_empty("AZURE_OPENAI_API_KEY"),
            azure_endpoint: non_empty("AZURE_OPENAI_ENDPOINT"),
            azure_api_version: non_empty("AZURE_OPENAI_API_VERSION")
                .unwrap_or(defaults.azure_api_version),
            azure_deployment: non_empty("AZURE_OPENAI_DEPLOYMENT_NAME")
                .unwrap_or(defaults.azure_deployment),
            database_url: non_empty("DATABASE_URL").unwrap_or(defaults.database_url),
            port: non_empty("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
        }
    }
}

/// Treat unset and blank variables the same.
fn non_empty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}
