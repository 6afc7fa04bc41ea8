//! API key record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use vessa_core::types::ApiKeyId;

use super::secret::SecretKey;
use super::state::ApiKeyState;

/// An API key owned by the signed-in user.
///
/// `key` holds whatever the gateway returned. Whether the gateway keeps
/// returning the plaintext on list calls is its decision; the client never
/// assumes it can get a secret back after losing it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiKeyRecord {
    pub id: ApiKeyId,
    pub name: String,
    #[serde(default)]
    pub key: Option<SecretKey>,
    pub is_active: bool,
    #[serde(with = "crate::timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default, with = "crate::timestamp::option")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "last_used", alias = "lastUsed", with = "crate::timestamp::option")]
    pub last_used_at: Option<DateTime<Utc>>,
    #[serde(default, with = "crate::timestamp::option")]
    pub revoked_at: Option<DateTime<Utc>>,
}

impl ApiKeyRecord {
    pub fn state(&self) -> ApiKeyState {
        ApiKeyState::from_active(self.is_active)
    }

    /// Apply a state locally without touching any other field.
    pub fn set_state(&mut self, state: ApiKeyState) {
        self.is_active = state.is_active();
    }

    /// Whether the key has passed its expiry time.
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|exp| exp <= Utc::now())
    }
}

/// Payload for creating a key.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewApiKey {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(range(min = 1))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in_days: Option<u32>,
}

impl NewApiKey {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            expires_in_days: None,
        }
    }
}
