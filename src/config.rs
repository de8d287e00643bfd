use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

pub const DEFAULT_API_BASE: &str = "http://localhost:9000";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub api_base: String,
    pub token_store_path: String,
    pub log_level: String,
    pub request_timeout_secs: u64,
}

impl Config {
    pub fn from_env(env_path: &Path) -> Result<Self, config::ConfigError> {
        dotenvy::from_path(env_path).map_err(|e| {
            config::ConfigError::Message(format!(
                "FATAL: Failed to load .env file from '{}'. Error: {}",
                env_path.display(),
                e
            ))
        })?;

        Self::from_sources(
            config::File::new("config/default.toml", config::FileFormat::Toml).required(false),
            |key| env::var(key).ok(),
        )
    }

    /// Layers built-in defaults, then `defaults` (normally
    /// `config/default.toml`), then whichever variables `var` yields.
    pub fn from_sources<S, F>(defaults: S, var: F) -> Result<Self, config::ConfigError>
    where
        S: config::Source + Send + Sync + 'static,
        F: Fn(&str) -> Option<String>,
    {
        let token_store_path = var("TOKEN_STORE_PATH").ok_or_else(|| {
            config::ConfigError::Message(
                "FATAL: Environment variable 'TOKEN_STORE_PATH' is not set in your .env file."
                    .to_string(),
            )
        })?;

        if Path::new(&token_store_path).is_relative() {
            return Err(config::ConfigError::Message(format!(
                "FATAL: The 'TOKEN_STORE_PATH' in your .env file is a relative path ('{}'). It MUST be an absolute path.",
                token_store_path
            )));
        }

        let mut builder = config::Config::builder()
            .set_default("api_base", DEFAULT_API_BASE)?
            .set_default("log_level", "info")?
            .set_default("request_timeout_secs", 30i64)?
            .add_source(defaults)
            .set_override("token_store_path", token_store_path)?;

        if let Some(api_base) = var("API_BASE") {
            builder = builder.set_override("api_base", api_base)?;
        }
        if let Some(log_level) = var("LOG_LEVEL") {
            builder = builder.set_override("log_level", log_level)?;
        }
        if let Some(timeout) = var("REQUEST_TIMEOUT_SECS")
            .and_then(|v| v.trim().parse::<i64>().ok())
            .filter(|v| *v > 0)
        {
            builder = builder.set_override("request_timeout_secs", timeout)?;
        }

        let mut config: Config = builder.build()?.try_deserialize()?;
        config.api_base = validate_api_base(&config.api_base)?;
        if config.request_timeout_secs == 0 {
            return Err(config::ConfigError::Message(
                "FATAL: 'request_timeout_secs' must be greater than zero.".to_string(),
            ));
        }
        Ok(config)
    }

    pub fn token_store_path(&self) -> PathBuf {
        PathBuf::from(&self.token_store_path)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Checks that `raw` is an absolute http(s) URL and strips any trailing slash
/// so endpoint paths can be appended directly.
pub fn validate_api_base(raw: &str) -> Result<String, config::ConfigError> {
    let trimmed = raw.trim();
    let parsed = Url::parse(trimmed).map_err(|e| {
        config::ConfigError::Message(format!(
            "FATAL: 'API_BASE' ('{}') is not a valid URL: {}",
            trimmed, e
        ))
    })?;

    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(config::ConfigError::Message(format!(
            "FATAL: 'API_BASE' must use http or https, got '{}'.",
            parsed.scheme()
        )));
    }

    Ok(trimmed.trim_end_matches('/').to_string())
}
