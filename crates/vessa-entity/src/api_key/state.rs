//! API key state machine.
//!
//! ```text
//!  create ──► Active ◄── activate ── Inactive
//!               │  ▲                    ▲
//!     deactivate│  └──── regenerate ────┤
//!               └───────────────────────┘
//!  delete: any state ──► removed
//! ```

use serde::{Deserialize, Serialize};

use vessa_core::{AppError, AppResult};

/// Whether a key authenticates requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiKeyState {
    Active,
    Inactive,
}

/// A lifecycle action on an existing key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyAction {
    Activate,
    Deactivate,
    Regenerate,
    Delete,
}

impl KeyAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Activate => "activate",
            Self::Deactivate => "deactivate",
            Self::Regenerate => "regenerate",
            Self::Delete => "delete",
        }
    }
}

impl std::fmt::Display for KeyAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ApiKeyState {
    pub fn from_active(is_active: bool) -> Self {
        if is_active { Self::Active } else { Self::Inactive }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }

    /// State after `action`, `None` when the key is removed.
    ///
    /// Activating an active key or deactivating an inactive one is a
    /// conflict and is rejected before anything is sent to the gateway.
    pub fn apply(self, action: KeyAction) -> AppResult<Option<Self>> {
        match (self, action) {
            (Self::Inactive, KeyAction::Activate) => Ok(Some(Self::Active)),
            (Self::Active, KeyAction::Deactivate) => Ok(Some(Self::Inactive)),
            (_, KeyAction::Regenerate) => Ok(Some(Self::Active)),
            (_, KeyAction::Delete) => Ok(None),
            (state, action) => Err(AppError::conflict(format!(
                "cannot {action} a key that is already {}",
                state.as_str()
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }
}
