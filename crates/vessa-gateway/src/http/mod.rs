//! `reqwest` implementation of the gateway contracts.

mod api_keys;
mod auth;
mod incidents;
mod notifications;

use std::sync::{Arc, RwLock};
use std::time::Instant;

use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, AUTHORIZATION};
use reqwest::{Method, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use uuid::Uuid;

use vessa_core::config::gateway::GatewayConfig;
use vessa_core::error::{AppError, ErrorKind};
use vessa_core::result::AppResult;
use vessa_entity::rate_limit::RateLimitInfo;

use crate::credentials::SessionCredentials;

/// Header carrying the per-request correlation id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";
/// Header carrying the selected API key.
pub const API_KEY_HEADER: &str = "x-api-key";

const RATE_LIMIT_LIMIT: &str = "x-ratelimit-limit";
const RATE_LIMIT_REMAINING: &str = "x-ratelimit-remaining";
const RATE_LIMIT_RESET: &str = "x-ratelimit-reset";

/// Which credentials a request carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Auth {
    /// No credentials; a 401 is a plain failure.
    Anonymous,
    /// Bearer token; a 401 ends the session.
    Bearer,
    /// Bearer token plus the selected API key.
    BearerWithApiKey,
}

/// HTTP client for the Vessa gateway.
///
/// Cheap to clone; clones share the connection pool, credentials and the
/// last observed rate limit.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: reqwest::Client,
    base_url: Url,
    prefix: Vec<String>,
    credentials: Arc<dyn SessionCredentials>,
    rate_limit: Arc<RwLock<Option<RateLimitInfo>>>,
}

impl HttpGateway {
    /// Build a client from configuration.
    pub fn new(
        config: &GatewayConfig,
        credentials: Arc<dyn SessionCredentials>,
    ) -> AppResult<Self> {
        let base_url = Url::parse(config.base_url.trim_end_matches('/')).map_err(|e| {
            AppError::configuration(format!("Invalid gateway base_url '{}': {e}", config.base_url))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(AppError::configuration(format!(
                "Gateway base_url '{}' cannot carry paths",
                config.base_url
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(config.connect_timeout())
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| {
                AppError::with_source(ErrorKind::Configuration, "Failed to build HTTP client", e)
            })?;

        Ok(Self {
            client,
            base_url,
            prefix: config.api_prefix_segments(),
            credentials,
            rate_limit: Arc::new(RwLock::new(None)),
        })
    }

    /// Quota reported by the most recent response that carried one.
    pub fn rate_limit(&self) -> Option<RateLimitInfo> {
        *self.rate_limit.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Build an absolute URL from path segments below the base URL and
    /// the API prefix.
    pub(crate) fn url(&self, segments: &[&str]) -> AppResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| AppError::configuration("Gateway base_url cannot carry paths"))?
            .pop_if_empty()
            .extend(&self.prefix)
            .extend(segments);
        Ok(url)
    }

    pub(crate) fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client.request(method, url)
    }

    /// Send a request and turn every non-2xx answer into an [`AppError`].
    pub(crate) async fn send(&self, builder: RequestBuilder, auth: Auth) -> AppResult<Response> {
        let request_id = Uuid::new_v4().to_string();
        let mut builder = builder.header(REQUEST_ID_HEADER, &request_id);

        if auth != Auth::Anonymous {
            if let Some(token) = self.credentials.bearer_token() {
                builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
            }
        }
        if auth == Auth::BearerWithApiKey {
            if let Some(key) = self.credentials.api_key() {
                builder = builder.header(API_KEY_HEADER, key);
            }
        }

        let request = builder
            .build()
            .map_err(|e| AppError::with_source(ErrorKind::Internal, "Failed to build request", e))?;
        let method = request.method().clone();
        let path = request.url().path().to_string();
        let started = Instant::now();

        let response = self.client.execute(request).await.map_err(|e| {
            warn!(%method, %path, request_id = %request_id, error = %e, "Gateway request failed");
            map_transport_error(e)
        })?;

        let status = response.status();
        debug!(
            %method,
            %path,
            request_id = %request_id,
            status = status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Gateway response"
        );

        if let Some(info) = parse_rate_limit(response.headers()) {
            *self.rate_limit.write().unwrap_or_else(|e| e.into_inner()) = Some(info);
        }

        if status.is_success() {
            return Ok(response);
        }

        let message = error_message(response, status).await;

        if status == StatusCode::UNAUTHORIZED && auth != Auth::Anonymous {
            warn!(%path, "Gateway rejected the session token");
            self.credentials.unauthorized(&message);
        }

        Err(AppError::from_status(status.as_u16(), message))
    }

    /// Send a request and decode a JSON body.
    pub(crate) async fn send_json<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        auth: Auth,
    ) -> AppResult<T> {
        let response = self.send(builder, auth).await?;
        let bytes = response.bytes().await.map_err(map_transport_error)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

fn map_transport_error(err: reqwest::Error) -> AppError {
    if err.is_timeout() {
        AppError::with_source(ErrorKind::Timeout, format!("Gateway request timed out: {err}"), err)
    } else if err.is_decode() || err.is_body() {
        AppError::with_source(
            ErrorKind::Serialization,
            format!("Failed to read gateway response: {err}"),
            err,
        )
    } else {
        AppError::with_source(ErrorKind::Network, format!("Gateway unreachable: {err}"), err)
    }
}

/// Extract the gateway's `detail` field, falling back to the status text.
async fn error_message(response: Response, status: StatusCode) -> String {
    let fallback = status
        .canonical_reason()
        .unwrap_or("request failed")
        .to_string();
    let Ok(body) = response.text().await else {
        return fallback;
    };
    match serde_json::from_str::<serde_json::Value>(&body) {
        Ok(value) => match value.get("detail") {
            Some(serde_json::Value::String(detail)) => detail.clone(),
            Some(other) => other.to_string(),
            None => fallback,
        },
        Err(_) if !body.trim().is_empty() && body.len() <= 512 => body.trim().to_string(),
        Err(_) => fallback,
    }
}

fn parse_rate_limit(headers: &HeaderMap) -> Option<RateLimitInfo> {
    let number = |name: &str| -> Option<u64> {
        headers.get(name)?.to_str().ok()?.trim().parse().ok()
    };
    let limit = u32::try_from(number(RATE_LIMIT_LIMIT)?).ok()?;
    let remaining = number(RATE_LIMIT_REMAINING)
        .map(|r| u32::try_from(r).unwrap_or(u32::MAX))
        .unwrap_or(limit);
    let reset_at = number(RATE_LIMIT_RESET)
        .and_then(|secs| i64::try_from(secs).ok())
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0));
    Some(RateLimitInfo::new(limit, remaining, reset_at))
}
