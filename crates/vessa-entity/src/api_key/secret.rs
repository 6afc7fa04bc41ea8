//! Masked holder for an API key secret.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Number of trailing characters left visible when masking.
const VISIBLE_SUFFIX: usize = 4;

/// The plaintext of an API key.
///
/// `Debug`, `Display` and `Serialize` only ever show the masked form, so a
/// secret cannot leak through logs or JSON output by accident. Call
/// [`SecretKey::reveal`] to get the plaintext.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretKey(String);

impl SecretKey {
    /// Wrap a plaintext secret.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Return the plaintext.
    pub fn reveal(&self) -> &str {
        &self.0
    }

    /// Masked representation keeping the prefix and the last characters.
    pub fn masked(&self) -> String {
        let chars: Vec<char> = self.0.chars().collect();
        if chars.len() <= VISIBLE_SUFFIX * 2 {
            return "•".repeat(chars.len().max(1));
        }
        let prefix: String = match self.0.find('_') {
            Some(idx) if idx < 8 => self.0[..=idx].to_string(),
            _ => String::new(),
        };
        let suffix: String = chars[chars.len() - VISIBLE_SUFFIX..].iter().collect();
        format!("{prefix}…{suffix}")
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SecretKey").field(&self.masked()).finish()
    }
}

impl fmt::Display for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.masked())
    }
}

impl Serialize for SecretKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.masked())
    }
}

impl<'de> Deserialize<'de> for SecretKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self)
    }
}
