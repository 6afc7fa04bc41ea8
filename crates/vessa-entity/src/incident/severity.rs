//! Incident severity.

use crate::macros::open_enum;

open_enum!(
    /// Severity assigned by the detection pipeline.
    IncidentSeverity {
        Low => "low",
        Medium => "medium",
        High => "high",
        Critical => "critical",
    }
);

impl IncidentSeverity {
    /// Numeric rank, higher is worse. Unknown values rank lowest.
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
