//! API key lifecycle.
//!
//! State changes are applied locally first and reverted for that key if
//! the gateway refuses. Illegal transitions are rejected before any
//! request goes out. The key selected for incident requests is dropped
//! as soon as it stops being usable.

use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info, warn};

use vessa_core::error::AppError;
use vessa_core::result::AppResult;
use vessa_core::types::ApiKeyId;
use vessa_entity::api_key::{ApiKeyRecord, ApiKeyState, KeyAction, NewApiKey, SecretKey};
use vessa_gateway::ApiKeyGateway;

use crate::session::{ActiveKey, Session};

/// A key together with the secret the gateway just issued for it.
///
/// The secret is shown to the user once; nothing here writes it to disk.
#[derive(Debug, Clone)]
pub struct IssuedKey {
    pub record: ApiKeyRecord,
    pub secret: SecretKey,
}

/// The signed-in user's API keys.
pub struct KeyRing {
    gateway: Arc<dyn ApiKeyGateway>,
    session: Arc<Session>,
    keys: RwLock<Vec<ApiKeyRecord>>,
}

impl fmt::Debug for KeyRing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyRing")
            .field("keys", &self.read().len())
            .field("selected", &self.session.active_key_id())
            .finish()
    }
}

impl KeyRing {
    pub fn new(gateway: Arc<dyn ApiKeyGateway>, session: Arc<Session>) -> Self {
        Self {
            gateway,
            session,
            keys: RwLock::new(Vec::new()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<ApiKeyRecord>> {
        self.keys.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<ApiKeyRecord>> {
        self.keys.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Reload keys from the gateway.
    pub async fn refresh(&self) -> AppResult<Vec<ApiKeyRecord>> {
        let keys = self.gateway.list_keys().await?;
        *self.write() = keys.clone();

        if let Some(selected) = self.session.active_key_id() {
            let usable = keys
                .iter()
                .any(|k| k.id == selected && k.is_active && !k.is_expired());
            if !usable {
                info!(key_id = %selected, "Selected API key is no longer usable");
                self.session.clear_api_key();
            }
        }
        debug!(count = keys.len(), "API keys loaded");
        Ok(keys)
    }

    pub fn keys(&self) -> Vec<ApiKeyRecord> {
        self.read().clone()
    }

    pub fn get(&self, id: &ApiKeyId) -> Option<ApiKeyRecord> {
        self.read().iter().find(|k| k.id == *id).cloned()
    }

    /// Create a key. The returned secret is the only copy the user gets.
    pub async fn create(&self, request: &NewApiKey) -> AppResult<IssuedKey> {
        vessa_entity::validate(request)?;
        let record = self.gateway.create_key(request).await?;
        let issued = issued(record)?;
        self.write().push(issued.record.clone());
        info!(key_id = %issued.record.id, name = %issued.record.name, "API key created");
        Ok(issued)
    }

    /// Issue a new secret for a key. The old secret stops working.
    pub async fn regenerate(&self, id: &ApiKeyId) -> AppResult<IssuedKey> {
        let previous = self.require(id)?;
        previous.state().apply(KeyAction::Regenerate)?;

        let issued = issued(self.gateway.regenerate_key(id).await?)?;
        self.replace(issued.record.clone());

        if self.session.active_key_id().as_ref() == Some(id) {
            self.session.select_api_key(ActiveKey {
                id: id.clone(),
                secret: issued.secret.clone(),
            })?;
        }
        info!(key_id = %id, "API key regenerated");
        Ok(issued)
    }

    pub async fn activate(&self, id: &ApiKeyId) -> AppResult<ApiKeyRecord> {
        self.transition(id, KeyAction::Activate).await
    }

    pub async fn deactivate(&self, id: &ApiKeyId) -> AppResult<ApiKeyRecord> {
        self.transition(id, KeyAction::Deactivate).await
    }

    async fn transition(&self, id: &ApiKeyId, action: KeyAction) -> AppResult<ApiKeyRecord> {
        let previous = self.require(id)?;
        let Some(next) = previous.state().apply(action)? else {
            return Err(AppError::internal(format!("{action} does not keep the key")));
        };

        let selection = self.session.active_key();
        let mut optimistic = previous.clone();
        optimistic.set_state(next);
        self.replace(optimistic);
        if next == ApiKeyState::Inactive {
            self.drop_selection(id);
        }

        let result = match action {
            KeyAction::Activate => self.gateway.activate_key(id).await,
            _ => self.gateway.deactivate_key(id).await,
        };

        match result {
            Ok(mut record) => {
                if record.key.is_none() {
                    record.key = previous.key.clone();
                }
                self.replace(record.clone());
                info!(key_id = %id, state = record.state().as_str(), "API key {action}d");
                Ok(record)
            }
            Err(err) => {
                warn!(key_id = %id, error = %err, "API key {action} failed, reverting");
                self.replace(previous);
                self.restore_selection(id, selection);
                Err(err)
            }
        }
    }

    /// Delete a key.
    pub async fn delete(&self, id: &ApiKeyId) -> AppResult<()> {
        let selection = self.session.active_key();
        let (index, previous) = {
            let mut keys = self.write();
            let index = keys
                .iter()
                .position(|k| k.id == *id)
                .ok_or_else(|| AppError::not_found(format!("API key {id} is not loaded")))?;
            (index, keys.remove(index))
        };
        self.drop_selection(id);

        match self.gateway.delete_key(id).await {
            Ok(()) => {
                info!(key_id = %id, "API key deleted");
                Ok(())
            }
            Err(err) => {
                warn!(key_id = %id, error = %err, "API key delete failed, reverting");
                {
                    let mut keys = self.write();
                    let index = index.min(keys.len());
                    keys.insert(index, previous);
                }
                self.restore_selection(id, selection);
                Err(err)
            }
        }
    }

    /// Use `id` as the `X-API-Key` for incident requests.
    pub fn select(&self, id: &ApiKeyId) -> AppResult<()> {
        let record = self.require(id)?;
        if !record.is_active {
            return Err(AppError::conflict(format!("API key {id} is inactive")));
        }
        if record.is_expired() {
            return Err(AppError::conflict(format!("API key {id} has expired")));
        }
        let secret = record.key.ok_or_else(|| {
            AppError::validation(format!(
                "The secret for API key {id} is not available; regenerate it to use it"
            ))
        })?;
        self.session.select_api_key(ActiveKey {
            id: id.clone(),
            secret,
        })?;
        info!(key_id = %id, "API key selected");
        Ok(())
    }

    pub fn selected(&self) -> Option<ApiKeyId> {
        self.session.active_key_id()
    }

    /// Forget every key; used on logout.
    pub fn clear(&self) {
        self.write().clear();
        self.session.clear_api_key();
    }

    fn require(&self, id: &ApiKeyId) -> AppResult<ApiKeyRecord> {
        self.get(id)
            .ok_or_else(|| AppError::not_found(format!("API key {id} is not loaded")))
    }

    fn replace(&self, record: ApiKeyRecord) {
        let mut keys = self.write();
        match keys.iter_mut().find(|k| k.id == record.id) {
            Some(slot) => *slot = record,
            None => keys.push(record),
        }
    }

    fn drop_selection(&self, id: &ApiKeyId) {
        if self.session.active_key_id().as_ref() == Some(id) {
            debug!(key_id = %id, "Clearing selected API key");
            self.session.clear_api_key();
        }
    }

    fn restore_selection(&self, id: &ApiKeyId, selection: Option<ActiveKey>) {
        if let Some(key) = selection.filter(|key| key.id == *id) {
            if self.session.active_key_id().is_none() {
                // Fails only if the session ended meanwhile.
                let _ = self.session.select_api_key(key);
            }
        }
    }
}

fn issued(record: ApiKeyRecord) -> AppResult<IssuedKey> {
    let secret = record
        .key
        .clone()
        .ok_or_else(|| AppError::internal("Gateway did not return the new key secret"))?;
    Ok(IssuedKey { record, secret })
}
