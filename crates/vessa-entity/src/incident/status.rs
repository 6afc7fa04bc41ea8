//! Incident lifecycle status.

use crate::macros::open_enum;

open_enum!(
    /// Where an incident is in the response workflow.
    IncidentStatus {
        Open => "open",
        Investigating => "investigating",
        InProgress => "in_progress" | "in-progress",
        Contained => "contained",
        Resolved => "resolved",
        Closed => "closed",
    }
);

impl IncidentStatus {
    /// Status an incident moves to once an analyst has reviewed it.
    ///
    /// Only untouched (`open`) incidents change; anything further along
    /// keeps its status.
    pub fn reviewed(&self) -> Self {
        match self {
            Self::Open => Self::Investigating,
            other => other.clone(),
        }
    }

    /// Whether the incident is finished.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Resolved | Self::Closed)
    }
}

impl Default for IncidentStatus {
    fn default() -> Self {
        Self::Open
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_review_transition() {
        assert_eq!(IncidentStatus::Open.reviewed(), IncidentStatus::Investigating);
        assert_eq!(IncidentStatus::Resolved.reviewed(), IncidentStatus::Resolved);
        assert!(IncidentStatus::Closed.is_terminal());
        assert_eq!(
            "in-progress".parse::<IncidentStatus>().unwrap(),
            IncidentStatus::InProgress
        );
    }
}
