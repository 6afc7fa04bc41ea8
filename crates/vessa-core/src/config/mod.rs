//! Application configuration schemas.
//!
//! Configuration is deserialized from TOML files via the `config` crate
//! and can be overridden with `VESSA__SECTION__KEY` environment variables.

pub mod gateway;
pub mod logging;
pub mod polling;
pub mod session;

use serde::{Deserialize, Serialize};

use self::gateway::GatewayConfig;
use self::logging::LoggingConfig;
use self::polling::PollingConfig;
use self::session::SessionConfig;

use crate::error::AppError;

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Remote gateway connection settings.
    pub gateway: GatewayConfig,
    /// Notification refresh settings.
    #[serde(default)]
    pub polling: PollingConfig,
    /// Local session persistence.
    #[serde(default)]
    pub session: SessionConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration for an environment.
    ///
    /// Merges `config/default.toml`, `config/{env}.toml` and environment
    /// variables prefixed with `VESSA__`.
    pub fn load(env: &str) -> Result<Self, AppError> {
        let builder = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false));
        Self::finish(builder)
    }

    /// Load configuration from an explicit file, still honouring
    /// environment overrides.
    pub fn load_file(path: &str) -> Result<Self, AppError> {
        let builder = config::Config::builder()
            .add_source(config::File::with_name(path).required(false));
        Self::finish(builder)
    }

    /// Build a configuration with defaults everywhere except the gateway URL.
    pub fn from_base_url(base_url: impl Into<String>) -> Self {
        Self {
            gateway: GatewayConfig::new(base_url),
            polling: PollingConfig::default(),
            session: SessionConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    fn finish(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self, AppError> {
        let config = builder
            .add_source(
                config::Environment::with_prefix("VESSA")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        let parsed: Self = config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))?;
        parsed.validate()?;
        Ok(parsed)
    }

    /// Reject values that would make the client unusable.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.gateway.base_url.trim().is_empty() {
            return Err(AppError::configuration("gateway.base_url must not be empty"));
        }
        if self.gateway.request_timeout_seconds == 0 {
            return Err(AppError::configuration(
                "gateway.request_timeout_seconds must be at least 1",
            ));
        }
        if self.polling.interval_seconds == 0 {
            return Err(AppError::configuration(
                "polling.interval_seconds must be at least 1",
            ));
        }
        Ok(())
    }
}
