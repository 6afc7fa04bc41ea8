//! Gateway contracts.
//!
//! Each trait covers one resource family of the remote API. They are
//! object safe so the sync layer can hold `Arc<dyn ...>` and tests can
//! substitute in-memory fakes.

use async_trait::async_trait;
use futures::stream::BoxStream;

use vessa_core::result::AppResult;
use vessa_core::types::{ApiKeyId, IncidentId, NotificationId, PageResponse, PreferenceId};
use vessa_entity::api_key::{ApiKeyRecord, NewApiKey};
use vessa_entity::auth::{AccessToken, Credentials, Registration, UserProfile};
use vessa_entity::incident::{IncidentQuery, IncidentRecord};
use vessa_entity::notification::{
    NewPreference, NotificationPage, NotificationPreference, NotificationQuery,
    NotificationRecord, PreferenceUpdate, PushedNotification,
};

/// Notifications pushed by the gateway, in arrival order.
///
/// Ends when the gateway closes the channel.
pub type PushStream = BoxStream<'static, AppResult<PushedNotification>>;

/// Notification listing, read state and delivery preferences.
#[async_trait]
pub trait NotificationGateway: Send + Sync + std::fmt::Debug + 'static {
    /// List notifications for the signed-in user.
    async fn list_notifications(&self, query: NotificationQuery) -> AppResult<NotificationPage>;

    /// Mark one notification read.
    ///
    /// Returns the updated record when the gateway sends one back.
    async fn mark_read(&self, id: &NotificationId) -> AppResult<Option<NotificationRecord>>;

    /// Mark every notification read in one call and return how many changed.
    ///
    /// Fails with `NotImplemented` when the gateway has no bulk endpoint.
    async fn mark_all_read(&self) -> AppResult<u64>;

    async fn list_preferences(&self) -> AppResult<Vec<NotificationPreference>>;

    async fn create_preference(&self, preference: &NewPreference)
    -> AppResult<NotificationPreference>;

    async fn update_preference(
        &self,
        id: &PreferenceId,
        update: &PreferenceUpdate,
    ) -> AppResult<NotificationPreference>;

    async fn delete_preference(&self, id: &PreferenceId) -> AppResult<()>;
}

/// Incident browsing and review.
#[async_trait]
pub trait IncidentGateway: Send + Sync + std::fmt::Debug + 'static {
    async fn list_incidents(&self, query: &IncidentQuery)
    -> AppResult<PageResponse<IncidentRecord>>;

    async fn get_incident(&self, id: &IncidentId) -> AppResult<IncidentRecord>;

    /// Record that an analyst reviewed the incident; returns the updated record.
    async fn review_incident(&self, id: &IncidentId) -> AppResult<IncidentRecord>;
}

/// API key lifecycle. Every call is a single remote request.
#[async_trait]
pub trait ApiKeyGateway: Send + Sync + std::fmt::Debug + 'static {
    async fn list_keys(&self) -> AppResult<Vec<ApiKeyRecord>>;

    /// Create a key. The response carries the new secret.
    async fn create_key(&self, request: &NewApiKey) -> AppResult<ApiKeyRecord>;

    /// Issue a new secret for the key; the old secret stops working.
    async fn regenerate_key(&self, id: &ApiKeyId) -> AppResult<ApiKeyRecord>;

    async fn activate_key(&self, id: &ApiKeyId) -> AppResult<ApiKeyRecord>;

    async fn deactivate_key(&self, id: &ApiKeyId) -> AppResult<ApiKeyRecord>;

    async fn delete_key(&self, id: &ApiKeyId) -> AppResult<()>;
}

/// Session issuance. Implemented by the gateway, only consumed here.
#[async_trait]
pub trait AuthGateway: Send + Sync + std::fmt::Debug + 'static {
    async fn login(&self, credentials: &Credentials) -> AppResult<AccessToken>;

    async fn register(&self, registration: &Registration) -> AppResult<UserProfile>;
}

/// Server push of newly created notifications.
#[async_trait]
pub trait NotificationPush: Send + Sync + std::fmt::Debug + 'static {
    /// Open an authenticated push channel.
    async fn subscribe(&self) -> AppResult<PushStream>;
}
