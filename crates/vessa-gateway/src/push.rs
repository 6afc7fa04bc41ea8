//! Notification push channel over a WebSocket.
//!
//! The gateway exposes `{prefix}/notifications/ws`. After the upgrade the
//! client sends `{"type":"auth","token":...}`; the gateway answers with
//! `auth_success` or an `error` frame and a 4xxx close code, then pushes
//! one `notification` frame per alert created for the user.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use futures::SinkExt;
use reqwest::Url;
use tokio::net::TcpStream;
use tokio::time;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use vessa_core::config::gateway::GatewayConfig;
use vessa_core::error::{AppError, ErrorKind};
use vessa_core::result::AppResult;
use vessa_entity::notification::{PushAuth, PushFrame};

use crate::credentials::SessionCredentials;
use crate::traits::{NotificationPush, PushStream};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Close codes at or above this value carry an authentication failure.
const AUTH_CLOSE_CODES: u16 = 4000;

/// WebSocket client for pushed notifications.
#[derive(Debug, Clone)]
pub struct PushClient {
    url: Url,
    credentials: Arc<dyn SessionCredentials>,
    handshake_timeout: Duration,
}

impl PushClient {
    pub fn new(
        config: &GatewayConfig,
        credentials: Arc<dyn SessionCredentials>,
    ) -> AppResult<Self> {
        let mut url = Url::parse(config.base_url.trim_end_matches('/')).map_err(|e| {
            AppError::configuration(format!("Invalid gateway base_url '{}': {e}", config.base_url))
        })?;
        let scheme = match url.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => {
                return Err(AppError::configuration(format!(
                    "Gateway scheme '{other}' has no push channel"
                )));
            }
        };
        url.set_scheme(scheme)
            .map_err(|_| AppError::configuration("Failed to derive push channel URL"))?;
        url.path_segments_mut()
            .map_err(|_| AppError::configuration("Gateway base_url cannot carry paths"))?
            .pop_if_empty()
            .extend(config.api_prefix_segments())
            .extend(["notifications", "ws"]);

        Ok(Self {
            url,
            credentials,
            handshake_timeout: config.request_timeout(),
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    async fn open(&self, token: String) -> AppResult<Socket> {
        let (mut socket, _) = connect_async(self.url.as_str()).await.map_err(map_ws_error)?;

        let auth = serde_json::to_string(&PushAuth { token })?;
        socket
            .send(Message::text(auth))
            .await
            .map_err(map_ws_error)?;

        match next_frame(&mut socket).await? {
            Some(PushFrame::AuthSuccess) => Ok(socket),
            Some(PushFrame::Error { message }) => Err(AppError::authentication(format!(
                "Push channel refused the session: {message}"
            ))),
            Some(_) => Err(AppError::internal(
                "Push channel sent data before authenticating",
            )),
            None => Err(AppError::network("Push channel closed during authentication")),
        }
    }
}

#[async_trait]
impl NotificationPush for PushClient {
    async fn subscribe(&self) -> AppResult<PushStream> {
        let token = self
            .credentials
            .bearer_token()
            .ok_or_else(|| AppError::authentication("Sign in to receive pushed notifications"))?;

        let socket = time::timeout(self.handshake_timeout, self.open(token))
            .await
            .map_err(|_| AppError::timeout("Push channel handshake timed out"))??;
        debug!(url = %self.url, "Push channel authenticated");

        let notifications = stream::unfold(Some(socket), |socket| async move {
            let mut socket = socket?;
            loop {
                match next_frame(&mut socket).await {
                    Ok(Some(PushFrame::Notification { data })) => {
                        return Some((Ok(data), Some(socket)));
                    }
                    Ok(Some(PushFrame::Error { message })) => {
                        warn!(%message, "Push channel reported an error");
                    }
                    Ok(Some(_)) => {}
                    Ok(None) => return None,
                    Err(err) => return Some((Err(err), None)),
                }
            }
        });
        Ok(notifications.boxed())
    }
}

/// Next decodable frame, or `None` once the gateway closed the channel.
async fn next_frame(socket: &mut Socket) -> AppResult<Option<PushFrame>> {
    while let Some(message) = socket.next().await {
        match message.map_err(map_ws_error)? {
            Message::Text(text) => match serde_json::from_str::<PushFrame>(text.as_str()) {
                Ok(frame) => return Ok(Some(frame)),
                Err(e) => debug!(error = %e, "Ignoring malformed push frame"),
            },
            Message::Close(Some(frame)) if u16::from(frame.code) >= AUTH_CLOSE_CODES => {
                return Err(AppError::authentication(format!(
                    "Push channel closed: {}",
                    frame.reason.as_str()
                )));
            }
            Message::Close(frame) => {
                debug!(?frame, "Push channel closed by gateway");
                return Ok(None);
            }
            _ => {}
        }
    }
    Ok(None)
}

fn map_ws_error(err: WsError) -> AppError {
    match err {
        WsError::Http(response) => {
            let status = response.status().as_u16();
            AppError::from_status(status, format!("Push channel handshake rejected ({status})"))
        }
        WsError::Url(e) => AppError::configuration(format!("Push channel URL unusable: {e}")),
        WsError::ConnectionClosed | WsError::AlreadyClosed => {
            AppError::network("Push channel connection closed")
        }
        other => AppError::with_source(
            ErrorKind::Network,
            format!("Push channel failed: {other}"),
            other,
        ),
    }
}
