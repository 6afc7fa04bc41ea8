use async_trait::async_trait;
use reqwest::Method;

use vessa_core::result::AppResult;
use vessa_entity::auth::{AccessToken, Credentials, Registration, UserProfile};

use super::{Auth, HttpGateway};
use crate::traits::AuthGateway;

#[async_trait]
impl AuthGateway for HttpGateway {
    async fn login(&self, credentials: &Credentials) -> AppResult<AccessToken> {
        let url = self.url(&["auth", "token"])?;
        let builder = self.request(Method::POST, url).form(&[
            ("username", credentials.username.as_str()),
            ("password", credentials.password.as_str()),
        ]);
        self.send_json(builder, Auth::Anonymous).await
    }

    async fn register(&self, registration: &Registration) -> AppResult<UserProfile> {
        vessa_entity::validate(registration)?;
        let url = self.url(&["auth", "register"])?;
        self.send_json(self.request(Method::POST, url).json(registration), Auth::Anonymous)
            .await
    }
}
