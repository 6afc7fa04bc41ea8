//! Composition root.
//!
//! [`Console`] builds the session, the HTTP gateway and every component
//! that depends on them, and hands out shared references. Presentation
//! surfaces (the CLI, the watcher binary) only talk to a `Console`.

use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::info;

use vessa_core::config::AppConfig;
use vessa_core::result::AppResult;
use vessa_entity::auth::{Credentials, Registration, UserProfile};
use vessa_entity::notification::NotificationQuery;
use vessa_entity::rate_limit::RateLimitInfo;
use vessa_gateway::{AuthGateway, HttpGateway, PushClient};

use crate::controller::{RefreshController, Visibility};
use crate::incidents::IncidentBoard;
use crate::keys::KeyRing;
use crate::push::PushListener;
use crate::session::Session;
use crate::store::NotificationStore;

/// Everything a presentation surface needs, wired once.
#[derive(Debug)]
pub struct Console {
    config: AppConfig,
    session: Arc<Session>,
    gateway: Arc<HttpGateway>,
    push: Arc<PushClient>,
    store: Arc<NotificationStore>,
    keys: Arc<KeyRing>,
    incidents: Arc<IncidentBoard>,
    visibility: watch::Sender<Visibility>,
    shutdown: CancellationToken,
}

impl Console {
    /// Build a console with a fresh anonymous session.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        Self::with_session(config, Arc::new(Session::new()))
    }

    /// Build a console around an existing session.
    pub fn with_session(config: AppConfig, session: Arc<Session>) -> AppResult<Self> {
        config.validate()?;

        let gateway = Arc::new(HttpGateway::new(&config.gateway, session.clone())?);
        let push = Arc::new(PushClient::new(&config.gateway, session.clone())?);
        let query = NotificationQuery {
            unread_only: config.polling.unread_only,
            limit: config.polling.effective_page_limit(),
            offset: 0,
        };
        let store = Arc::new(NotificationStore::new(gateway.clone(), query));
        let keys = Arc::new(KeyRing::new(gateway.clone(), session.clone()));
        let incidents = Arc::new(IncidentBoard::new(gateway.clone()));
        let (visibility, _) = watch::channel(Visibility::Visible);

        info!(base_url = %config.gateway.base_url, "Console initialized");

        Ok(Self {
            config,
            session,
            gateway,
            push,
            store,
            keys,
            incidents,
            visibility,
            shutdown: CancellationToken::new(),
        })
    }

    /// Exchange credentials for a bearer token and start the session.
    pub async fn login(&self, credentials: &Credentials) -> AppResult<()> {
        let token = self.gateway.login(credentials).await?;
        self.session.authenticate(token.access_token)?;
        info!(username = %credentials.username, "Signed in");
        Ok(())
    }

    pub async fn register(&self, registration: &Registration) -> AppResult<UserProfile> {
        self.gateway.register(registration).await
    }

    /// End the session and drop everything loaded under it.
    pub fn logout(&self) {
        self.session.logout();
        self.store.clear();
        self.incidents.clear();
        self.keys.clear();
    }

    /// A refresh controller bound to this console's store and session.
    ///
    /// It stops when [`Console::shutdown`] is called.
    pub fn refresh_controller(&self) -> RefreshController {
        RefreshController::new(
            self.store.clone(),
            self.session.clone(),
            self.config.polling.clone(),
            self.visibility.subscribe(),
            self.shutdown.child_token(),
        )
    }

    /// A push listener that refreshes through `controller`, or `None` when
    /// push is disabled.
    ///
    /// It stops when [`Console::shutdown`] is called.
    pub fn push_listener(&self, controller: &RefreshController) -> Option<PushListener> {
        if !self.config.polling.push_enabled {
            return None;
        }
        Some(PushListener::new(
            self.push.clone(),
            controller.clone(),
            self.session.clone(),
            self.config.polling.clone(),
            self.shutdown.child_token(),
        ))
    }

    /// Report whether the console is in front of the user.
    pub fn set_visibility(&self, visibility: Visibility) {
        self.visibility.send_replace(visibility);
    }

    /// Stop every controller handed out by this console.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn gateway(&self) -> &Arc<HttpGateway> {
        &self.gateway
    }

    pub fn store(&self) -> &Arc<NotificationStore> {
        &self.store
    }

    pub fn keys(&self) -> &Arc<KeyRing> {
        &self.keys
    }

    pub fn incidents(&self) -> &Arc<IncidentBoard> {
        &self.incidents
    }

    pub fn rate_limit(&self) -> Option<RateLimitInfo> {
        self.gateway.rate_limit()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use vessa_core::error::ErrorKind;

    #[test]
    fn test_invalid_config_rejected() {
        let err = Console::new(AppConfig::from_base_url("")).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Configuration);
    }

    #[tokio::test]
    async fn test_logout_clears_everything() {
        let session = Arc::new(Session::with_token("opaque").expect("session"));
        let console = Console::with_session(
            AppConfig::from_base_url("http://127.0.0.1:9"),
            session.clone(),
        )
        .expect("console");

        console.logout();
        assert!(!session.is_authenticated());
        assert!(console.store().records().is_empty());
        assert!(console.incidents().current_page().is_none());
        assert!(console.keys().keys().is_empty());
    }

    #[tokio::test]
    async fn test_controller_stops_on_shutdown() {
        let console = Console::new(AppConfig::from_base_url("http://127.0.0.1:9")).expect("console");
        let controller = console.refresh_controller();
        console.shutdown();
        assert!(console.is_shut_down());
        assert!(controller.cancellation_token().is_cancelled());
    }

    #[tokio::test]
    async fn test_push_listener_follows_config() {
        let mut config = AppConfig::from_base_url("http://127.0.0.1:9");
        config.polling.push_enabled = false;
        let console = Console::new(config).expect("console");
        assert!(console.push_listener(&console.refresh_controller()).is_none());

        let console = Console::new(AppConfig::from_base_url("http://127.0.0.1:9")).expect("console");
        let listener = console
            .push_listener(&console.refresh_controller())
            .expect("push enabled by default");
        // Nobody is signed in, so the listener ends without connecting.
        listener.spawn().await.expect("listener task");
    }
}
