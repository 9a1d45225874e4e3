use domain::models::{Actor, ActorRole};
use serde::Deserialize;
use std::net::SocketAddr;
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub backend: BackendConfig,
    pub polling: PollingConfig,
    pub actor: ActorConfig,
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the scheduling API, e.g. https://api.example.com/api/v1
    pub base_url: String,

    /// Bearer token attached to every request
    #[serde(default)]
    pub access_token: String,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_poll_interval")]
    pub interval_secs: u64,

    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

/// Identity the binary acts as.
#[derive(Debug, Clone, Deserialize)]
pub struct ActorConfig {
    pub user_id: Uuid,

    #[serde(default)]
    pub display_name: String,

    #[serde(default = "default_actor_role")]
    pub role: ActorRole,
}

impl ActorConfig {
    pub fn to_actor(&self) -> Actor {
        Actor {
            user_id: self.user_id,
            display_name: self.display_name.clone(),
            role: self.role,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetricsConfig {
    /// Address for the Prometheus scrape endpoint; disabled when unset
    #[serde(default)]
    pub listen_addr: Option<String>,
}

// Default value functions
fn default_request_timeout() -> u64 {
    30
}
fn default_poll_interval() -> u64 {
    30
}
fn default_shutdown_timeout() -> u64 {
    5
}
fn default_actor_role() -> ActorRole {
    ActorRole::Admin
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "json".to_string()
}

/// Configuration validation error
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Loading order (later sources override earlier):
    /// 1. config/default.toml - base configuration with defaults
    /// 2. config/local.toml - local overrides (optional, not in git)
    /// 3. Environment variables with VG__ prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(config::Environment::with_prefix("VG").separator("__"))
            .build()?;

        let cfg: Self = config.try_deserialize()?;
        cfg.validate()
            .map_err(|e| config::ConfigError::Message(e.to_string()))?;
        Ok(cfg)
    }

    /// Load configuration for testing with custom overrides.
    ///
    /// Builds entirely from embedded defaults so tests do not depend on
    /// the working directory.
    #[cfg(test)]
    pub fn load_for_test(overrides: &[(&str, &str)]) -> Result<Self, config::ConfigError> {
        let defaults = r#"
            [backend]
            base_url = ""
            access_token = ""
            request_timeout_secs = 30

            [polling]
            interval_secs = 30
            shutdown_timeout_secs = 5

            [actor]
            user_id = "00000000-0000-0000-0000-000000000000"
            display_name = "Test Admin"
            role = "admin"

            [logging]
            level = "info"
            format = "json"
        "#;

        let mut builder = config::Config::builder()
            .add_source(config::File::from_str(defaults, config::FileFormat::Toml));

        for (key, value) in overrides {
            builder = builder.set_override(*key, *value)?;
        }

        let cfg: Self = builder.build()?.try_deserialize()?;
        // Skip validation in tests to allow partial configs
        Ok(cfg)
    }

    /// Validate configuration values.
    fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.backend.base_url.is_empty() {
            return Err(ConfigValidationError::MissingRequired(
                "VG__BACKEND__BASE_URL environment variable must be set".to_string(),
            ));
        }

        if !self.backend.base_url.starts_with("http://")
            && !self.backend.base_url.starts_with("https://")
        {
            return Err(ConfigValidationError::InvalidValue(
                "backend.base_url must start with http:// or https://".to_string(),
            ));
        }

        if self.backend.access_token.is_empty() {
            return Err(ConfigValidationError::MissingRequired(
                "VG__BACKEND__ACCESS_TOKEN environment variable must be set".to_string(),
            ));
        }

        if self.actor.user_id.is_nil() {
            return Err(ConfigValidationError::MissingRequired(
                "VG__ACTOR__USER_ID environment variable must be set".to_string(),
            ));
        }

        if self.polling.interval_secs == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "polling.interval_secs cannot be 0".to_string(),
            ));
        }

        if self.backend.request_timeout_secs == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "backend.request_timeout_secs cannot be 0".to_string(),
            ));
        }

        self.metrics_socket_addr()?;

        Ok(())
    }

    pub fn metrics_socket_addr(&self) -> Result<Option<SocketAddr>, ConfigValidationError> {
        match self.metrics.listen_addr.as_deref() {
            None | Some("") => Ok(None),
            Some(addr) => addr.parse().map(Some).map_err(|_| {
                ConfigValidationError::InvalidValue(format!(
                    "metrics.listen_addr is not a socket address: {}",
                    addr
                ))
            }),
        }
    }
}
