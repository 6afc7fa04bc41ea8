//! Priority scales.
//!
//! Alerts are ranked `low|medium|high` while delivery preferences use
//! `low|medium|high|critical`. It is not settled whether these describe
//! the same concept, so they stay two separate types.

use crate::macros::open_enum;

open_enum!(
    /// Priority attached to an alert/notification record.
    AlertPriority {
        /// Informational.
        Low => "low",
        /// Needs attention.
        Medium => "medium",
        /// Needs immediate attention.
        High => "high",
    }
);

open_enum!(
    /// Minimum priority a delivery preference reacts to.
    PreferencePriority {
        Low => "low",
        Medium => "medium",
        High => "high",
        Critical => "critical",
    }
);

impl Default for AlertPriority {
    fn default() -> Self {
        Self::Medium
    }
}

impl Default for PreferencePriority {
    fn default() -> Self {
        Self::Low
    }
}

impl PreferencePriority {
    /// Numeric rank for threshold comparisons. Unknown values rank lowest.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Low => 1,
            Self::Medium => 2,
            Self::High => 3,
            Self::Critical => 4,
            Self::Other(_) => 0,
        }
    }
}
