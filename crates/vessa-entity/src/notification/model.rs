//! Notification record as returned by the gateway.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use vessa_core::types::NotificationId;

use super::priority::AlertPriority;
use super::status::NotificationStatus;

/// A single detection finding attached to an alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// What was detected.
    pub message: String,
    /// Finding category, e.g. `sql_injection`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Severity as reported by the detector.
    pub severity: String,
}

/// A notification delivered to the signed-in user.
///
/// `read_at == None` means unread. Once set by the gateway it is never
/// cleared for the same `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRecord {
    /// Gateway-assigned identifier.
    pub id: NotificationId,
    /// Short headline.
    pub title: String,
    /// Body text.
    pub message: String,
    /// Alert priority.
    #[serde(default)]
    pub priority: AlertPriority,
    /// Workflow status, when the alert carries one.
    #[serde(default)]
    pub status: Option<NotificationStatus>,
    /// When the gateway created the notification.
    #[serde(alias = "createdAt", with = "crate::timestamp")]
    pub created_at: DateTime<Utc>,
    /// When the user read it.
    #[serde(default, alias = "readAt", with = "crate::timestamp::option")]
    pub read_at: Option<DateTime<Utc>>,
    /// Detection findings, in detector order.
    #[serde(default)]
    pub findings: Vec<Finding>,
    /// Systems or endpoints involved.
    #[serde(default, alias = "affectedAssets")]
    pub affected_assets: BTreeSet<String>,
    /// Free-form labels.
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Component that raised the alert (`waf`, `api_gateway`, ...).
    #[serde(default, alias = "detectionSource")]
    pub detection_source: Option<String>,
    /// Incident this notification refers to.
    #[serde(default, alias = "incidentId")]
    pub incident_id: Option<String>,
}

impl NotificationRecord {
    /// Check if the notification has not been read yet.
    pub fn is_unread(&self) -> bool {
        self.read_at.is_none()
    }
}

/// One page of the notification listing.
///
/// `unread_count` is the gateway's own figure and is informational only;
/// local counts are always recomputed from `items`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationPage {
    /// Notifications on this page, newest first.
    #[serde(default)]
    pub items: Vec<NotificationRecord>,
    /// Unread notifications as reported by the gateway.
    #[serde(default)]
    pub unread_count: u64,
    /// Total notifications for the user.
    #[serde(default)]
    pub total: u64,
}

/// Query parameters for the notification listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationQuery {
    /// Only return unread notifications.
    pub unread_only: bool,
    /// Maximum items to return.
    pub limit: u32,
    /// Items to skip.
    pub offset: u32,
}

impl Default for NotificationQuery {
    fn default() -> Self {
        Self {
            unread_only: false,
            limit: 50,
            offset: 0,
        }
    }
}
