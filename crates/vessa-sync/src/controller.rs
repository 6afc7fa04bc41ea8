//! Refresh controller: decides when the notification store reloads.
//!
//! The controller loads once at start, then on a fixed interval while the
//! console is visible. Hiding the console pauses the interval; showing it
//! again refreshes immediately and restarts the interval. Manual refreshes
//! join a refresh that is already running instead of issuing a second
//! request.
//!
//! Cancellation drops the in-flight request, so a response arriving after
//! the owner went away never reaches the store.

use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use vessa_core::config::polling::PollingConfig;
use vessa_core::error::{AppError, ErrorKind};
use vessa_core::result::AppResult;

use crate::session::Session;
use crate::store::{LoadOutcome, NotificationStore, StoreEvent};

type RefreshFuture = Shared<BoxFuture<'static, AppResult<LoadOutcome>>>;

/// Whether the console is in front of the user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Visibility {
    #[default]
    Visible,
    Hidden,
}

/// Snapshot of the controller for loading and error banners.
#[derive(Debug, Clone, Default)]
pub struct RefreshStatus {
    /// A refresh is running.
    pub in_flight: bool,
    pub last_success_at: Option<DateTime<Utc>>,
    /// Error from the most recent failed refresh, cleared on success.
    pub last_error: Option<AppError>,
    pub consecutive_failures: u32,
}

struct ControllerInner {
    store: Arc<NotificationStore>,
    session: Arc<Session>,
    config: PollingConfig,
    visibility: watch::Receiver<Visibility>,
    cancel: CancellationToken,
    in_flight: Mutex<Option<RefreshFuture>>,
    status: RwLock<RefreshStatus>,
}

impl std::fmt::Debug for ControllerInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControllerInner")
            .field("store", &self.store)
            .field("config", &self.config)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// Drives periodic and on-demand refreshes of a [`NotificationStore`].
///
/// Cheap to clone; clones share the in-flight refresh and status.
#[derive(Debug, Clone)]
pub struct RefreshController {
    inner: Arc<ControllerInner>,
}

impl RefreshController {
    pub fn new(
        store: Arc<NotificationStore>,
        session: Arc<Session>,
        config: PollingConfig,
        visibility: watch::Receiver<Visibility>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            inner: Arc::new(ControllerInner {
                store,
                session,
                config,
                visibility,
                cancel,
                in_flight: Mutex::new(None),
                status: RwLock::new(RefreshStatus::default()),
            }),
        }
    }

    /// Refresh now, joining a refresh that is already running.
    pub async fn refresh_now(&self) -> AppResult<LoadOutcome> {
        if self.inner.cancel.is_cancelled() {
            return Err(AppError::cancelled("Notification refresh was cancelled"));
        }
        if !self.inner.session.is_authenticated() {
            return Err(AppError::authentication("Sign in to load notifications"));
        }

        let refresh = {
            let mut slot = self.inner.in_flight.lock().unwrap_or_else(|e| e.into_inner());
            match slot.as_ref() {
                Some(running) => {
                    debug!("Joining in-flight notification refresh");
                    running.clone()
                }
                None => {
                    let inner = Arc::clone(&self.inner);
                    let refresh = async move { inner.run_refresh().await }.boxed().shared();
                    *slot = Some(refresh.clone());
                    refresh
                }
            }
        };
        refresh.await
    }

    /// Run the polling loop until cancelled or the session ends.
    pub async fn run(&self) {
        let inner = &self.inner;
        let mut visibility = inner.visibility.clone();
        let mut visibility_open = true;
        let mut session = inner.session.subscribe();
        let mut ticker = time::interval(inner.config.interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut current = *visibility.borrow_and_update();

        info!(
            interval_seconds = inner.config.interval_seconds,
            pause_when_hidden = inner.config.pause_when_hidden,
            "Notification refresh started"
        );

        // The initial load runs even when the console starts hidden.
        if inner.session.is_authenticated() && !inner.cancel.is_cancelled() {
            self.refresh_logged().await;
            ticker.reset();
        }

        loop {
            if !session.borrow_and_update().is_authenticated() {
                info!("Session ended, stopping notification refresh");
                inner.store.clear();
                break;
            }
            let paused = inner.config.pause_when_hidden && current == Visibility::Hidden;

            tokio::select! {
                biased;
                _ = inner.cancel.cancelled() => {
                    info!("Notification refresh cancelled");
                    break;
                }
                changed = session.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                changed = visibility.changed(), if visibility_open => {
                    if changed.is_err() {
                        visibility_open = false;
                        continue;
                    }
                    let next = *visibility.borrow_and_update();
                    let resumed = paused && next == Visibility::Visible;
                    current = next;
                    if resumed {
                        debug!("Console visible again, refreshing");
                        self.refresh_logged().await;
                        ticker.reset();
                    }
                }
                _ = ticker.tick(), if !paused => {
                    self.refresh_logged().await;
                }
            }
        }
    }

    /// Whether scheduled refreshes are suspended because the console is
    /// hidden.
    pub fn is_paused(&self) -> bool {
        self.inner.config.pause_when_hidden && *self.inner.visibility.borrow() == Visibility::Hidden
    }

    /// Spawn [`RefreshController::run`] on the current runtime.
    pub fn spawn(&self) -> JoinHandle<()> {
        let controller = self.clone();
        tokio::spawn(async move { controller.run().await })
    }

    async fn refresh_logged(&self) {
        match self.refresh_now().await {
            Ok(LoadOutcome::Applied { records, unread }) => {
                debug!(records, unread, "Scheduled notification refresh applied");
            }
            Ok(LoadOutcome::Discarded) => {
                debug!("Scheduled notification refresh superseded");
            }
            Err(err) if matches!(err.kind, ErrorKind::Cancelled) => {}
            Err(err) => {
                warn!(error = %err, "Background notification refresh failed");
            }
        }
    }

    pub fn status(&self) -> RefreshStatus {
        self.inner
            .status
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.inner.store.subscribe()
    }

    pub fn store(&self) -> &Arc<NotificationStore> {
        &self.inner.store
    }

    /// Stop polling and drop any in-flight request.
    pub fn cancel(&self) {
        self.inner.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.inner.cancel.clone()
    }
}

impl ControllerInner {
    async fn run_refresh(self: Arc<Self>) -> AppResult<LoadOutcome> {
        self.update_status(|status| status.in_flight = true);

        let result = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                Err(AppError::cancelled("Notification refresh was cancelled"))
            }
            result = self.load_with_retry() => result,
        };

        self.in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        self.update_status(|status| {
            status.in_flight = false;
            match &result {
                Ok(_) => {
                    status.last_success_at = Some(Utc::now());
                    status.last_error = None;
                    status.consecutive_failures = 0;
                }
                Err(err) if err.kind == ErrorKind::Cancelled => {}
                Err(err) => {
                    status.last_error = Some(err.clone());
                    status.consecutive_failures += 1;
                }
            }
        });
        result
    }

    async fn load_with_retry(&self) -> AppResult<LoadOutcome> {
        let mut attempt = 0;
        loop {
            match self.store.load().await {
                Ok(outcome) => return Ok(outcome),
                Err(err) if err.is_transient() && attempt < self.config.max_retries => {
                    attempt += 1;
                    let delay = self.config.backoff(attempt);
                    warn!(
                        attempt,
                        max_retries = self.config.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Notification refresh failed, retrying"
                    );
                    time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn update_status(&self, change: impl FnOnce(&mut RefreshStatus)) {
        change(&mut self.status.write().unwrap_or_else(|e| e.into_inner()));
    }
}
