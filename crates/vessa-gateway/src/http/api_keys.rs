use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;

use vessa_core::result::AppResult;
use vessa_core::types::ApiKeyId;
use vessa_entity::api_key::{ApiKeyRecord, NewApiKey};

use super::{Auth, HttpGateway};
use crate::traits::ApiKeyGateway;

/// The listing is either a bare array or `{"items": [...], "total": n}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum KeyListing {
    Paged { items: Vec<ApiKeyRecord> },
    Bare(Vec<ApiKeyRecord>),
}

impl HttpGateway {
    async fn key_action(&self, id: &ApiKeyId, action: &str) -> AppResult<ApiKeyRecord> {
        let url = self.url(&["users", "me", "api-keys", id.as_str(), action])?;
        self.send_json(self.request(Method::POST, url), Auth::Bearer)
            .await
    }
}

#[async_trait]
impl ApiKeyGateway for HttpGateway {
    async fn list_keys(&self) -> AppResult<Vec<ApiKeyRecord>> {
        let url = self.url(&["users", "me", "api-keys"])?;
        let listing: KeyListing = self
            .send_json(self.request(Method::GET, url), Auth::Bearer)
            .await?;
        Ok(match listing {
            KeyListing::Paged { items } | KeyListing::Bare(items) => items,
        })
    }

    async fn create_key(&self, request: &NewApiKey) -> AppResult<ApiKeyRecord> {
        vessa_entity::validate(request)?;
        let url = self.url(&["users", "me", "api-keys"])?;
        self.send_json(self.request(Method::POST, url).json(request), Auth::Bearer)
            .await
    }

    async fn regenerate_key(&self, id: &ApiKeyId) -> AppResult<ApiKeyRecord> {
        self.key_action(id, "regenerate").await
    }

    async fn activate_key(&self, id: &ApiKeyId) -> AppResult<ApiKeyRecord> {
        self.key_action(id, "activate").await
    }

    async fn deactivate_key(&self, id: &ApiKeyId) -> AppResult<ApiKeyRecord> {
        self.key_action(id, "deactivate").await
    }

    async fn delete_key(&self, id: &ApiKeyId) -> AppResult<()> {
        let url = self.url(&["users", "me", "api-keys", id.as_str()])?;
        self.send(self.request(Method::DELETE, url), Auth::Bearer)
            .await?;
        Ok(())
    }
}
