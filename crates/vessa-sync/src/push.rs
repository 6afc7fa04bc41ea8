//! Push listener: refreshes the notification store when the gateway
//! announces a new notification.
//!
//! Polling stays the source of truth. The listener only brings the next
//! refresh forward, reconnecting with a growing delay while the channel is
//! unreachable and giving up for good when the gateway has no push
//! endpoint or refuses the session.

use std::sync::Arc;

use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use vessa_core::config::polling::PollingConfig;
use vessa_core::error::{AppError, ErrorKind};
use vessa_core::types::NotificationId;
use vessa_gateway::NotificationPush;

use crate::controller::RefreshController;
use crate::session::Session;

/// Turns pushed notifications into coalesced refreshes.
#[derive(Debug)]
pub struct PushListener {
    push: Arc<dyn NotificationPush>,
    controller: RefreshController,
    session: Arc<Session>,
    config: PollingConfig,
    cancel: CancellationToken,
}

/// Why one connection ended.
enum Disconnect {
    /// The channel was up and the gateway closed it.
    Closed,
    /// Connecting or reading failed.
    Failed(AppError),
}

impl PushListener {
    pub fn new(
        push: Arc<dyn NotificationPush>,
        controller: RefreshController,
        session: Arc<Session>,
        config: PollingConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            push,
            controller,
            session,
            config,
            cancel,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Listen until cancelled, the session ends or the channel is refused.
    pub async fn run(self) {
        let mut session = self.session.subscribe();
        let mut failures: u32 = 0;

        loop {
            if self.cancel.is_cancelled() || !session.borrow_and_update().is_authenticated() {
                break;
            }

            let disconnect = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                changed = session.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
                disconnect = self.listen() => disconnect,
            };

            match disconnect {
                Disconnect::Closed => {
                    failures = 0;
                    debug!("Push channel closed by gateway, reconnecting");
                }
                Disconnect::Failed(err) if err.is_transient() => {
                    failures = failures.saturating_add(1);
                    warn!(failures, error = %err, "Push channel dropped");
                }
                Disconnect::Failed(err) => {
                    info!(error = %err, "Push channel unavailable, relying on polling");
                    break;
                }
            }

            let delay = self.config.push_reconnect_delay(failures);
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                changed = session.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = time::sleep(delay) => {}
            }
        }
        debug!("Push listener stopped");
    }

    async fn listen(&self) -> Disconnect {
        let mut pushed = match self.push.subscribe().await {
            Ok(stream) => stream,
            Err(err) => return Disconnect::Failed(err),
        };
        info!("Push channel connected");

        while let Some(item) = pushed.next().await {
            match item {
                Ok(notification) => self.on_pushed(&notification.id).await,
                Err(err) => return Disconnect::Failed(err),
            }
        }
        Disconnect::Closed
    }

    async fn on_pushed(&self, id: &NotificationId) {
        if self.controller.is_paused() {
            debug!(%id, "Notification pushed while hidden, refresh deferred");
            return;
        }
        debug!(%id, "Notification pushed, refreshing");
        match self.controller.refresh_now().await {
            Ok(_) => {}
            Err(err) if matches!(err.kind, ErrorKind::Cancelled | ErrorKind::Authentication) => {}
            Err(err) => warn!(error = %err, "Pushed notification refresh failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use tokio::sync::watch;
    use vessa_entity::notification::NotificationQuery;

    use crate::controller::Visibility;
    use crate::session::tests::signed_in;
    use crate::store::NotificationStore;
    use crate::testing::{notification, pushed, FakeNotifications, FakePush};

    struct Harness {
        notifications: Arc<FakeNotifications>,
        push: Arc<FakePush>,
        session: Arc<Session>,
        visibility: watch::Sender<Visibility>,
        controller: RefreshController,
        cancel: CancellationToken,
    }

    impl Harness {
        fn new() -> Self {
            let notifications = Arc::new(FakeNotifications::with_records(vec![notification(
                "n1", false,
            )]));
            let session = Arc::new(signed_in());
            let store = Arc::new(NotificationStore::new(
                notifications.clone(),
                NotificationQuery::default(),
            ));
            let (visibility, rx) = watch::channel(Visibility::Visible);
            let cancel = CancellationToken::new();
            let controller = RefreshController::new(
                store,
                session.clone(),
                PollingConfig::default(),
                rx,
                cancel.child_token(),
            );
            Self {
                notifications,
                push: Arc::new(FakePush::default()),
                session,
                visibility,
                controller,
                cancel,
            }
        }

        fn spawn_listener(&self) -> JoinHandle<()> {
            PushListener::new(
                self.push.clone(),
                self.controller.clone(),
                self.session.clone(),
                PollingConfig::default(),
                self.cancel.child_token(),
            )
            .spawn()
        }
    }

    async fn settle() {
        time::sleep(Duration::from_millis(10)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_pushed_notification_refreshes_store() {
        let h = Harness::new();
        let channel = h.push.open_next();
        let task = h.spawn_listener();
        settle().await;
        assert_eq!(h.push.subscribe_calls(), 1);
        assert_eq!(h.notifications.list_calls(), 0);

        h.notifications
            .set_records(vec![notification("n1", false), notification("n2", false)]);
        channel.unbounded_send(Ok(pushed("n2"))).expect("push");
        settle().await;

        assert_eq!(h.notifications.list_calls(), 1);
        assert!(h.controller.store().get(&NotificationId::new("n2")).is_some());
        assert_eq!(h.controller.store().unread_count(), 2);

        h.cancel.cancel();
        task.await.expect("listener task");
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnects_after_transient_failure() {
        let h = Harness::new();
        h.push.fail_next_subscribe(AppError::network("connection refused"));
        let channel = h.push.open_next();
        let task = h.spawn_listener();

        settle().await;
        assert_eq!(h.push.subscribe_calls(), 1);
        time::sleep(Duration::from_secs(6)).await;
        assert_eq!(h.push.subscribe_calls(), 2);

        channel.unbounded_send(Ok(pushed("n1"))).expect("push");
        settle().await;
        assert_eq!(h.notifications.list_calls(), 1);

        h.cancel.cancel();
        task.await.expect("listener task");
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_channel_reconnects() {
        let h = Harness::new();
        let first = h.push.open_next();
        let task = h.spawn_listener();
        settle().await;

        drop(first);
        time::sleep(Duration::from_secs(6)).await;
        assert_eq!(h.push.subscribe_calls(), 2);

        h.cancel.cancel();
        task.await.expect("listener task");
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_endpoint_stops_listener() {
        let h = Harness::new();
        h.push.fail_next_subscribe(AppError::from_status(404, "Not Found"));
        let task = h.spawn_listener();

        task.await.expect("listener task");
        assert_eq!(h.push.subscribe_calls(), 1);
        assert_eq!(h.notifications.list_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_end_stops_listener() {
        let h = Harness::new();
        let _channel = h.push.open_next();
        let task = h.spawn_listener();
        settle().await;

        h.session.terminate("Could not validate credentials");
        task.await.expect("listener task");
        assert_eq!(h.push.subscribe_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hidden_defers_pushed_refresh() {
        let h = Harness::new();
        let channel = h.push.open_next();
        h.visibility.send_replace(Visibility::Hidden);
        let task = h.spawn_listener();
        settle().await;

        channel.unbounded_send(Ok(pushed("n1"))).expect("push");
        settle().await;
        assert_eq!(h.notifications.list_calls(), 0);

        h.cancel.cancel();
        task.await.expect("listener task");
    }
}
