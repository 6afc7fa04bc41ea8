//! Console session: bearer token, decoded claims and the active API key.
//!
//! A [`Session`] is built once by the composition root and shared through
//! `Arc`. Everything that cares about login state subscribes to its
//! [`watch`] channel instead of polling.

use std::fmt;
use std::sync::RwLock;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use tokio::sync::watch;
use tracing::{info, warn};

use vessa_core::error::AppError;
use vessa_core::result::AppResult;
use vessa_core::types::ApiKeyId;
use vessa_entity::api_key::SecretKey;
use vessa_entity::auth::TokenClaims;
use vessa_gateway::SessionCredentials;

/// Login state of the console.
#[derive(Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Nobody is signed in.
    Anonymous,
    /// A bearer token is held.
    Authenticated {
        token: String,
        /// Claims read from the token payload, when it is a JWT.
        claims: Option<TokenClaims>,
    },
    /// The gateway rejected the token.
    Terminated { reason: String },
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated { .. })
    }
}

impl fmt::Debug for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Anonymous => f.write_str("Anonymous"),
            Self::Authenticated { claims, .. } => f
                .debug_struct("Authenticated")
                .field("claims", claims)
                .finish_non_exhaustive(),
            Self::Terminated { reason } => f
                .debug_struct("Terminated")
                .field("reason", reason)
                .finish(),
        }
    }
}

/// API key attached to incident requests.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveKey {
    pub id: ApiKeyId,
    pub secret: SecretKey,
}

/// Shared session handle.
#[derive(Debug)]
pub struct Session {
    /// Current state; receivers are handed out by [`Session::subscribe`].
    state: watch::Sender<SessionState>,
    /// Selected API key, cleared whenever the session ends.
    active_key: RwLock<Option<ActiveKey>>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// Creates an anonymous session.
    pub fn new() -> Self {
        let (state, _) = watch::channel(SessionState::Anonymous);
        Self {
            state,
            active_key: RwLock::new(None),
        }
    }

    /// Creates a session that already holds `token`.
    pub fn with_token(token: impl Into<String>) -> AppResult<Self> {
        let session = Self::new();
        session.authenticate(token)?;
        Ok(session)
    }

    /// Adopts a bearer token issued by the gateway.
    ///
    /// Tokens that are JWTs have their claims decoded for display and
    /// expiry checks. An already expired token is refused.
    pub fn authenticate(&self, token: impl Into<String>) -> AppResult<()> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(AppError::validation("Bearer token is empty"));
        }

        let claims = decode_claims(&token);
        if claims.as_ref().is_some_and(TokenClaims::is_expired) {
            return Err(AppError::authentication("Session token has expired"));
        }

        info!(
            subject = claims.as_ref().map(|c| c.sub.as_str()).unwrap_or("unknown"),
            "Session authenticated"
        );
        self.clear_api_key();
        self.state
            .send_replace(SessionState::Authenticated { token, claims });
        Ok(())
    }

    /// Ends the session at the user's request.
    pub fn logout(&self) {
        self.clear_api_key();
        let previous = self.state.send_replace(SessionState::Anonymous);
        if previous.is_authenticated() {
            info!("Session logged out");
        }
    }

    /// Ends the session because the gateway refused the token.
    ///
    /// Only an authenticated session moves to `Terminated`; a late 401
    /// after logout leaves the state alone.
    pub fn terminate(&self, reason: &str) {
        let terminated = self.state.send_if_modified(|state| {
            if state.is_authenticated() {
                *state = SessionState::Terminated {
                    reason: reason.to_string(),
                };
                true
            } else {
                false
            }
        });
        if terminated {
            self.clear_api_key();
            warn!(reason = %reason, "Session terminated by gateway");
        }
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    /// Bearer token, unless the session is over or the token expired.
    pub fn token(&self) -> Option<String> {
        match &*self.state.borrow() {
            SessionState::Authenticated { token, claims } => {
                if claims.as_ref().is_some_and(TokenClaims::is_expired) {
                    None
                } else {
                    Some(token.clone())
                }
            }
            _ => None,
        }
    }

    pub fn claims(&self) -> Option<TokenClaims> {
        match &*self.state.borrow() {
            SessionState::Authenticated { claims, .. } => claims.clone(),
            _ => None,
        }
    }

    /// Selects the key sent as `X-API-Key`.
    pub fn select_api_key(&self, key: ActiveKey) -> AppResult<()> {
        if !self.is_authenticated() {
            return Err(AppError::authentication("Sign in before selecting an API key"));
        }
        *self.active_key.write().unwrap_or_else(|e| e.into_inner()) = Some(key);
        Ok(())
    }

    pub fn clear_api_key(&self) {
        self.active_key
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .take();
    }

    pub fn active_key(&self) -> Option<ActiveKey> {
        self.active_key
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn active_key_id(&self) -> Option<ApiKeyId> {
        self.active_key().map(|key| key.id)
    }
}

impl SessionCredentials for Session {
    fn bearer_token(&self) -> Option<String> {
        self.token()
    }

    fn api_key(&self) -> Option<String> {
        self.active_key().map(|key| key.secret.reveal().to_string())
    }

    fn unauthorized(&self, reason: &str) {
        self.terminate(reason);
    }
}

/// Reads the payload segment of a JWT without verifying it.
fn decode_claims(token: &str) -> Option<TokenClaims> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    serde_json::from_slice(&bytes).ok()
}
