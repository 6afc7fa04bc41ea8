//! Notification/alert workflow status.

use crate::macros::open_enum;

open_enum!(
    /// Workflow status shown next to an alert.
    NotificationStatus {
        Open => "open",
        Investigating => "investigating",
        InProgress => "in_progress" | "in-progress",
        Resolved => "resolved",
        Closed => "closed",
    }
);

impl NotificationStatus {
    /// Whether the alert still needs work.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Open | Self::Investigating | Self::InProgress)
    }
}
