//! Notification refresh configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Largest page the gateway accepts for the notification listing.
pub const MAX_PAGE_LIMIT: u32 = 100;

/// How and how often the notification store is refreshed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Seconds between scheduled refreshes.
    #[serde(default = "default_interval")]
    pub interval_seconds: u64,
    /// Number of notifications requested per refresh.
    #[serde(default = "default_page_limit")]
    pub page_limit: u32,
    /// Only request unread notifications.
    #[serde(default)]
    pub unread_only: bool,
    /// Retries for a transient refresh failure.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base delay between retries, multiplied by the attempt number.
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,
    /// Suspend scheduled refreshes while the console is hidden.
    #[serde(default = "default_true")]
    pub pause_when_hidden: bool,
    /// Listen on the gateway's push channel and refresh when it announces
    /// a notification. Polling continues either way.
    #[serde(default = "default_true")]
    pub push_enabled: bool,
    /// Delay before reconnecting a dropped push channel, multiplied by the
    /// number of consecutive failures and capped at the refresh interval.
    #[serde(default = "default_push_reconnect")]
    pub push_reconnect_seconds: u64,
}

impl PollingConfig {
    /// Refresh interval as a [`Duration`].
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }

    /// Page limit clamped to what the gateway accepts.
    pub fn effective_page_limit(&self) -> u32 {
        self.page_limit.clamp(1, MAX_PAGE_LIMIT)
    }

    /// Backoff before retry number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.retry_backoff_ms.saturating_mul(u64::from(attempt)))
    }

    /// Wait before reconnecting the push channel after `failures`
    /// consecutive failed attempts.
    pub fn push_reconnect_delay(&self, failures: u32) -> Duration {
        let base = self.push_reconnect_seconds.max(1);
        let cap = self.interval_seconds.max(base);
        Duration::from_secs(base.saturating_mul(u64::from(failures.max(1))).min(cap))
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_interval(),
            page_limit: default_page_limit(),
            unread_only: false,
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff(),
            pause_when_hidden: true,
            push_enabled: true,
            push_reconnect_seconds: default_push_reconnect(),
        }
    }
}

fn default_interval() -> u64 {
    30
}

fn default_page_limit() -> u32 {
    50
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_backoff() -> u64 {
    500
}

fn default_push_reconnect() -> u64 {
    5
}

fn default_true() -> bool {
    true
}
