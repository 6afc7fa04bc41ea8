use async_trait::async_trait;
use reqwest::Method;

use vessa_core::result::AppResult;
use vessa_core::types::{IncidentId, PageResponse};
use vessa_entity::incident::{IncidentPage, IncidentQuery, IncidentRecord};

use super::{Auth, HttpGateway};
use crate::traits::IncidentGateway;

#[async_trait]
impl IncidentGateway for HttpGateway {
    async fn list_incidents(
        &self,
        query: &IncidentQuery,
    ) -> AppResult<PageResponse<IncidentRecord>> {
        let url = self.url(&["incidents", ""])?;
        let builder = self.request(Method::GET, url).query(&query.to_params());
        let page: IncidentPage = self.send_json(builder, Auth::BearerWithApiKey).await?;
        Ok(page.into_page(query.page))
    }

    async fn get_incident(&self, id: &IncidentId) -> AppResult<IncidentRecord> {
        let url = self.url(&["incidents", id.as_str()])?;
        self.send_json(self.request(Method::GET, url), Auth::BearerWithApiKey)
            .await
    }

    async fn review_incident(&self, id: &IncidentId) -> AppResult<IncidentRecord> {
        let url = self.url(&["incidents", id.as_str(), "review"])?;
        self.send_json(self.request(Method::POST, url), Auth::BearerWithApiKey)
            .await
    }
}
