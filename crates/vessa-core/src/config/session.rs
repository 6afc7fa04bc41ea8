//! Local session persistence configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Where the command-line front-end keeps the bearer token between runs.
///
/// Only the session token is written. API key secrets never touch disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Path of the token file.
    #[serde(default = "default_token_file")]
    pub token_file: PathBuf,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            token_file: default_token_file(),
        }
    }
}

fn default_token_file() -> PathBuf {
    PathBuf::from("data/session.token")
}
