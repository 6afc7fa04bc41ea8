//! Notification delivery preferences.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use vessa_core::types::PreferenceId;

use super::priority::PreferencePriority;

/// Channel a notification can be delivered through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationChannel {
    /// Email to the account or a custom address.
    Email,
    /// Live push to the open console.
    Websocket,
    /// HTTP POST to a user-supplied URL.
    Webhook,
}

impl NotificationChannel {
    /// Return the channel as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Websocket => "websocket",
            Self::Webhook => "webhook",
        }
    }
}

impl std::fmt::Display for NotificationChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A stored delivery preference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationPreference {
    /// Preference identifier.
    pub id: PreferenceId,
    /// Delivery channel.
    pub channel: NotificationChannel,
    /// Whether delivery on this channel is on.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Lowest priority that is delivered.
    #[serde(default)]
    pub min_priority: PreferencePriority,
    /// Target URL for the webhook channel.
    #[serde(default)]
    pub webhook_url: Option<String>,
    /// Override address for the email channel.
    #[serde(default)]
    pub email_address: Option<String>,
    #[serde(default, with = "crate::timestamp::option")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, with = "crate::timestamp::option")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Payload for creating a preference.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_channel_target"))]
pub struct NewPreference {
    pub channel: NotificationChannel,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub min_priority: PreferencePriority,
    #[validate(url, length(max = 512))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
    #[validate(email, length(max = 255))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_address: Option<String>,
}

impl NewPreference {
    /// A preference for `channel` with default settings.
    pub fn new(channel: NotificationChannel) -> Self {
        Self {
            channel,
            enabled: true,
            min_priority: PreferencePriority::default(),
            webhook_url: None,
            email_address: None,
        }
    }
}

/// Partial update of a preference; unset fields are left alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct PreferenceUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_priority: Option<PreferencePriority>,
    #[validate(url, length(min = 1, max = 512))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
    #[validate(email, length(max = 255))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_address: Option<String>,
}

impl PreferenceUpdate {
    /// Whether the update would change anything.
    pub fn is_empty(&self) -> bool {
        self.enabled.is_none()
            && self.min_priority.is_none()
            && self.webhook_url.is_none()
            && self.email_address.is_none()
    }
}

fn validate_channel_target(pref: &NewPreference) -> Result<(), ValidationError> {
    if pref.channel == NotificationChannel::Webhook
        && pref.webhook_url.as_deref().is_none_or(|url| url.trim().is_empty())
    {
        let mut err = ValidationError::new("webhook_url_required");
        err.message = Some("webhook channel requires a webhook_url".into());
        return Err(err);
    }
    Ok(())
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate;
    use vessa_core::ErrorKind;

    #[test]
    fn test_webhook_requires_url() {
        let pref = NewPreference::new(NotificationChannel::Webhook);
        let err = validate(&pref).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);

        let mut blank = NewPreference::new(NotificationChannel::Webhook);
        blank.webhook_url = Some("   ".to_string());
        assert!(validate(&blank).is_err());

        let mut ok = NewPreference::new(NotificationChannel::Webhook);
        ok.webhook_url = Some("https://hooks.example.com/vessa".to_string());
        assert!(validate(&ok).is_ok());
    }

    #[test]
    fn test_email_must_be_well_formed() {
        let mut pref = NewPreference::new(NotificationChannel::Email);
        pref.email_address = Some("not-an-address".to_string());
        assert!(validate(&pref).is_err());

        pref.email_address = Some("soc@example.com".to_string());
        assert!(validate(&pref).is_ok());
    }

    #[test]
    fn test_update_skips_unset_fields() {
        let update = PreferenceUpdate {
            enabled: Some(false),
            ..Default::default()
        };
        let json = serde_json::to_value(&update).expect("serialize");
        assert_eq!(json, serde_json::json!({"enabled": false}));
        assert!(!update.is_empty());
        assert!(PreferenceUpdate::default().is_empty());
    }
}
