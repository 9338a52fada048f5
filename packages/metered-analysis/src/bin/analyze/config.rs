use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::time::Duration;

use metered_analysis::{PipelineConfig, DEFAULT_ACTION_KEY};

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub analysis_endpoint: Option<String>,
    pub analysis_api_key: Option<String>,
    pub action_key: String,
    pub fallback_price: i64,
    pub remote_timeout: Duration,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            analysis_endpoint: env::var("ANALYSIS_ENDPOINT").ok(),
            analysis_api_key: env::var("ANALYSIS_API_KEY").ok(),
            action_key: env::var("ANALYSIS_ACTION_KEY")
                .unwrap_or_else(|_| DEFAULT_ACTION_KEY.to_string()),
            fallback_price: env::var("ANALYSIS_FALLBACK_PRICE")
                .unwrap_or_else(|_| "500".to_string())
                .parse()
                .context("ANALYSIS_FALLBACK_PRICE must be a valid number")?,
            remote_timeout: Duration::from_secs(
                env::var("ANALYSIS_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "90".to_string())
                    .parse()
                    .context("ANALYSIS_TIMEOUT_SECS must be a valid number")?,
            ),
        })
    }

    /// Endpoint and key, required only by commands that call the service.
    pub fn analysis_service(&self) -> Result<(&str, &str)> {
        let endpoint = self
            .analysis_endpoint
            .as_deref()
            .context("ANALYSIS_ENDPOINT must be set")?;
        let api_key = self
            .analysis_api_key
            .as_deref()
            .context("ANALYSIS_API_KEY must be set")?;
        Ok((endpoint, api_key))
    }

    pub fn pipeline(&self) -> PipelineConfig {
        PipelineConfig::default()
            .with_action(self.action_key.clone(), self.fallback_price)
            .with_remote_timeout(self.remote_timeout)
    }
}
