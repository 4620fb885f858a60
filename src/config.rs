use crate::classifier::ModelSource;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    pub store_base_url: String,
    pub store_token: Option<String>,
    pub cache_ttl_secs: u64,
    pub model_key: String,
    pub model_path: Option<String>,
    pub store_connect_timeout_secs: u64,
    pub store_read_timeout_secs: u64,
    pub feed_url: Option<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            store_base_url: std::env::var("STORE_BASE_URL")
                .map_err(|_| anyhow::anyhow!("STORE_BASE_URL environment variable required"))
                .and_then(|url| validate_http_url("STORE_BASE_URL", url))?,
            store_token: optional_var("STORE_TOKEN"),
            cache_ttl_secs: parse_secs("CACHE_TTL_SECS", 300)?,
            model_key: optional_var("MODEL_KEY")
                .unwrap_or_else(|| "models/loan_approval_model.json".to_string()),
            model_path: optional_var("MODEL_PATH"),
            store_connect_timeout_secs: parse_secs("STORE_CONNECT_TIMEOUT_SECS", 3)?,
            store_read_timeout_secs: parse_secs("STORE_READ_TIMEOUT_SECS", 5)?,
            feed_url: optional_var("FEED_URL")
                .map(|url| validate_http_url("FEED_URL", url))
                .transpose()?,
        };

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!("Store Base URL: {}", config.store_base_url);
        tracing::debug!("Cache TTL: {}s", config.cache_ttl_secs);
        tracing::debug!("Model source: {:?}", config.model_source());
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }

    /// Local model file if configured, otherwise the store key.
    pub fn model_source(&self) -> ModelSource {
        match &self.model_path {
            Some(path) => ModelSource::LocalFile(path.clone()),
            None => ModelSource::Store(self.model_key.clone()),
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn store_connect_timeout(&self) -> Duration {
        Duration::from_secs(self.store_connect_timeout_secs)
    }

    pub fn store_read_timeout(&self) -> Duration {
        Duration::from_secs(self.store_read_timeout_secs)
    }
}

fn optional_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.trim().is_empty())
}

fn parse_secs(name: &str, default: u64) -> anyhow::Result<u64> {
    let Some(raw) = optional_var(name) else {
        return Ok(default);
    };
    let secs: u64 = raw
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("{} must be a whole number of seconds", name))?;
    if secs == 0 {
        anyhow::bail!("{} must be greater than zero", name);
    }
    Ok(secs)
}

fn validate_http_url(name: &str, url: String) -> anyhow::Result<String> {
    if url.trim().is_empty() {
        anyhow::bail!("{} cannot be empty", name);
    }
    if !url.starts_with("http://") && !url.starts_with("https://") {
        anyhow::bail!("{} must start with http:// or https://", name);
    }
    Ok(url.trim_end_matches('/').to_string())
}
