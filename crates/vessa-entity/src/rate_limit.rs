//! Advisory API quota information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Quota reported by the gateway's `X-RateLimit-*` headers.
///
/// Display only: the client never blocks on it. `remaining` is clamped so
/// that `0 <= remaining <= limit` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitInfo {
    limit: u32,
    remaining: u32,
    reset_at: Option<DateTime<Utc>>,
}

impl RateLimitInfo {
    pub fn new(limit: u32, remaining: u32, reset_at: Option<DateTime<Utc>>) -> Self {
        Self {
            limit,
            remaining: remaining.min(limit),
            reset_at,
        }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn reset_at(&self) -> Option<DateTime<Utc>> {
        self.reset_at
    }

    /// Whether the quota is used up.
    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }
}
