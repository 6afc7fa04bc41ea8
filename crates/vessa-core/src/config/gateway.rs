//! Remote gateway connection configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Where the gateway lives and how long a single call may take.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Base URL of the gateway, e.g. `https://api.vessa.io`.
    pub base_url: String,
    /// Path prefix in front of every endpoint, e.g. `api/v1`. Empty when
    /// `base_url` already includes it.
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,
    /// Deadline for a whole request, in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    /// Deadline for establishing the TCP/TLS connection, in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
    /// `User-Agent` header sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl GatewayConfig {
    /// Create a gateway configuration with default timeouts.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_prefix: default_api_prefix(),
            request_timeout_seconds: default_request_timeout(),
            connect_timeout_seconds: default_connect_timeout(),
            user_agent: default_user_agent(),
        }
    }

    /// Non-empty segments of [`GatewayConfig::api_prefix`].
    pub fn api_prefix_segments(&self) -> Vec<String> {
        self.api_prefix
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Request deadline as a [`Duration`].
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    /// Connect deadline as a [`Duration`].
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }
}

fn default_api_prefix() -> String {
    "api/v1".to_string()
}

fn default_request_timeout() -> u64 {
    15
}

fn default_connect_timeout() -> u64 {
    5
}

fn default_user_agent() -> String {
    concat!("vessa-console/", env!("CARGO_PKG_VERSION")).to_string()
}
