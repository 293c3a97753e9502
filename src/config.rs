//! Process-wide configuration, read once at startup.
//!
//! Every component takes its settings from this struct instead of reading
//! the environment itself; a missing required variable prevents startup.

use crate::error::{InsightError, Result};

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// API key for the model service.
    pub openai_api_key: String,
    /// Base endpoint of the model service.
    pub openai_endpoint: String,
    /// API version the model service expects.
    pub openai_api_version: String,
    /// Deployment (model) name to invoke.
    pub deployment: String,
    /// Connection string template with one `%s` password slot.
    pub database_connection_string: String,
    /// Raw database password, escaped at connection time.
    pub database_password: String,
}

impl AppConfig {
    /// Build the configuration from the environment. Call `dotenv` first if
    /// a `.env` file should be honoured.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            openai_api_key: required("AZURE_OPENAI_API_KEY")?,
            openai_endpoint: required("AZURE_OPENAI_ENDPOINT")?,
            openai_api_version: required("OPENAI_API_VERSION")?,
            deployment: std::env::var("AZURE_OPENAI_DEPLOYMENT")
                .unwrap_or_else(|_| "gpt-4".to_string()),
            database_connection_string: required("SQL_DATABASE_CONNECTION_STRING")?,
            database_password: required("SQL_DATABASE_PASSWORD")?,
        })
    }
}

fn required(key: &str) -> Result<String> {
    std::env::var(key)
        .map_err(|_| InsightError::Config(format!("required environment variable {} is not set", key)))
}
