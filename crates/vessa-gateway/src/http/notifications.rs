//! Notification endpoints.

use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;

use vessa_core::error::{AppError, ErrorKind};
use vessa_core::result::AppResult;
use vessa_core::types::{NotificationId, PreferenceId};
use vessa_entity::notification::{
    NewPreference, NotificationPage, NotificationPreference, NotificationQuery,
    NotificationRecord, PreferenceUpdate,
};

use super::{Auth, HttpGateway};
use crate::traits::NotificationGateway;

#[derive(Debug, Deserialize)]
struct ReadAllResponse {
    #[serde(default)]
    updated_count: u64,
}

#[async_trait]
impl NotificationGateway for HttpGateway {
    async fn list_notifications(&self, query: NotificationQuery) -> AppResult<NotificationPage> {
        let url = self.url(&["notifications", ""])?;
        let builder = self.request(Method::GET, url).query(&[
            ("unread_only", query.unread_only.to_string()),
            ("limit", query.limit.to_string()),
            ("offset", query.offset.to_string()),
        ]);
        self.send_json(builder, Auth::Bearer).await
    }

    async fn mark_read(&self, id: &NotificationId) -> AppResult<Option<NotificationRecord>> {
        let url = self.url(&["notifications", id.as_str(), "read"])?;
        let body: serde_json::Value = self
            .send_json(self.request(Method::POST, url), Auth::Bearer)
            .await?;

        // Older gateways answer `{"status": "success"}` instead of the record.
        if body.get("id").is_some() {
            Ok(Some(serde_json::from_value(body)?))
        } else {
            Ok(None)
        }
    }

    async fn mark_all_read(&self) -> AppResult<u64> {
        let url = self.url(&["notifications", "read-all"])?;
        let result: AppResult<ReadAllResponse> = self
            .send_json(self.request(Method::POST, url), Auth::Bearer)
            .await;
        match result {
            Ok(response) => Ok(response.updated_count),
            Err(err) if matches!(err.kind, ErrorKind::NotFound | ErrorKind::NotImplemented) => {
                Err(AppError::not_implemented(format!(
                    "Gateway has no bulk read endpoint: {}",
                    err.message
                )))
            }
            Err(err) => Err(err),
        }
    }

    async fn list_preferences(&self) -> AppResult<Vec<NotificationPreference>> {
        let url = self.url(&["notifications", "preferences"])?;
        self.send_json(self.request(Method::GET, url), Auth::Bearer)
            .await
    }

    async fn create_preference(
        &self,
        preference: &NewPreference,
    ) -> AppResult<NotificationPreference> {
        vessa_entity::validate(preference)?;
        let url = self.url(&["notifications", "preferences"])?;
        self.send_json(self.request(Method::POST, url).json(preference), Auth::Bearer)
            .await
    }

    async fn update_preference(
        &self,
        id: &PreferenceId,
        update: &PreferenceUpdate,
    ) -> AppResult<NotificationPreference> {
        vessa_entity::validate(update)?;
        if update.is_empty() {
            return Err(AppError::validation("Preference update changes nothing"));
        }
        let url = self.url(&["notifications", "preferences", id.as_str()])?;
        self.send_json(self.request(Method::PATCH, url).json(update), Auth::Bearer)
            .await
    }

    async fn delete_preference(&self, id: &PreferenceId) -> AppResult<()> {
        let url = self.url(&["notifications", "preferences", id.as_str()])?;
        self.send(self.request(Method::DELETE, url), Auth::Bearer)
            .await?;
        Ok(())
    }
}
