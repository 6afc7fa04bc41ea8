//! Credential source consulted on every request.

use std::fmt::Debug;

/// Supplies request credentials and is told when the gateway rejects them.
///
/// Implemented by the session in the sync layer. The HTTP client never
/// stores tokens itself.
pub trait SessionCredentials: Send + Sync + Debug + 'static {
    /// Bearer token for the `Authorization` header, if signed in.
    fn bearer_token(&self) -> Option<String>;

    /// Plaintext of the selected API key, for endpoints that need one.
    fn api_key(&self) -> Option<String>;

    /// Called when the gateway answered 401 to an authenticated request.
    fn unauthorized(&self, reason: &str);
}

/// Credentials for anonymous use (login, registration).
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCredentials;

impl SessionCredentials for NoCredentials {
    fn bearer_token(&self) -> Option<String> {
        None
    }

    fn api_key(&self) -> Option<String> {
        None
    }

    fn unauthorized(&self, _reason: &str) {}
}
