//! Notification store.
//!
//! Holds the local copy of the user's notifications. Every surface reads
//! from the same store and mutates it only through the operations here.
//!
//! Listings are applied by completion order: each `load` takes a request
//! token when it starts, and a response is applied only if no newer
//! request has been applied before it. `clear` bumps an epoch so that
//! requests started before a logout never repopulate the store.
//!
//! The unread count is always recomputed from the records. The gateway's
//! own `unread_count` field is ignored.

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use futures::future::join_all;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use vessa_core::error::{AppError, ErrorKind};
use vessa_core::result::AppResult;
use vessa_core::types::NotificationId;
use vessa_entity::notification::{NotificationQuery, NotificationRecord};
use vessa_gateway::NotificationGateway;

const EVENT_CAPACITY: usize = 64;

/// Result of a [`NotificationStore::load`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The listing replaced the store contents.
    Applied { records: usize, unread: usize },
    /// A newer listing was applied first, or the store was cleared.
    Discarded,
}

/// Result of a successful [`NotificationStore::mark_read`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkOutcome {
    /// The gateway accepted the change.
    Marked,
    /// Nothing to do; no request was sent.
    AlreadyRead,
}

/// Change notifications for store observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    /// A listing replaced the store contents.
    Replaced { unread: usize },
    /// A mark or rollback changed read state.
    ReadStateChanged { unread: usize },
    /// The store was emptied.
    Cleared,
}

/// One notification that could not be marked read.
#[derive(Debug, Clone)]
pub struct FailedMark {
    pub id: NotificationId,
    pub error: AppError,
}

/// Aggregate failure of [`NotificationStore::mark_all_read`].
///
/// Notifications listed in `failed` are unread again locally; every other
/// notification that was unread stays read.
#[derive(Debug, Clone)]
pub struct MarkAllReadError {
    /// Notifications the gateway confirmed.
    pub marked: usize,
    pub failed: Vec<FailedMark>,
}

impl MarkAllReadError {
    pub fn failed_ids(&self) -> Vec<NotificationId> {
        self.failed.iter().map(|f| f.id.clone()).collect()
    }
}

impl fmt::Display for MarkAllReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} notification(s) marked read, {} failed",
            self.marked,
            self.failed.len()
        )?;
        if let Some(first) = self.failed.first() {
            write!(f, " (first error: {})", first.error)?;
        }
        Ok(())
    }
}

impl std::error::Error for MarkAllReadError {}

impl From<MarkAllReadError> for AppError {
    fn from(err: MarkAllReadError) -> Self {
        let ids = err
            .failed
            .iter()
            .map(|f| f.id.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        AppError::partial_failure(format!(
            "Failed to mark {} notification(s) read: {ids}",
            err.failed.len()
        ))
    }
}

#[derive(Debug, Default)]
struct StoreState {
    records: Vec<NotificationRecord>,
    /// Token of the newest listing applied so far.
    applied_token: u64,
    /// Bumped by `clear`.
    epoch: u64,
    total: u64,
    last_loaded_at: Option<DateTime<Utc>>,
}

impl StoreState {
    fn unread_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_unread()).count()
    }

    fn find_mut(&mut self, id: &NotificationId) -> Option<&mut NotificationRecord> {
        self.records.iter_mut().find(|r| r.id == *id)
    }

    /// Clears `read_at` on `id` only if it still holds `stamp`.
    fn rollback(&mut self, id: &NotificationId, stamp: DateTime<Utc>) -> bool {
        match self.find_mut(id) {
            Some(record) if record.read_at == Some(stamp) => {
                record.read_at = None;
                true
            }
            _ => false,
        }
    }
}

/// Process-wide notification store.
pub struct NotificationStore {
    /// Remote notification endpoints.
    gateway: Arc<dyn NotificationGateway>,
    /// Listing parameters used by every load.
    query: NotificationQuery,
    /// Records and bookkeeping. Never held across an await.
    state: RwLock<StoreState>,
    /// Source of request tokens.
    next_token: AtomicU64,
    events: broadcast::Sender<StoreEvent>,
}

impl fmt::Debug for NotificationStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.read();
        f.debug_struct("NotificationStore")
            .field("query", &self.query)
            .field("records", &state.records.len())
            .field("unread", &state.unread_count())
            .field("epoch", &state.epoch)
            .finish()
    }
}

impl NotificationStore {
    pub fn new(gateway: Arc<dyn NotificationGateway>, query: NotificationQuery) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            gateway,
            query,
            state: RwLock::new(StoreState::default()),
            next_token: AtomicU64::new(0),
            events,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    fn emit(&self, event: StoreEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Replace the store contents with the gateway's current listing.
    ///
    /// Stale responses are dropped and reported as [`LoadOutcome::Discarded`].
    /// On error the existing records are kept.
    pub async fn load(&self) -> AppResult<LoadOutcome> {
        let token = self.next_token.fetch_add(1, Ordering::SeqCst) + 1;
        let epoch = self.read().epoch;

        let page = self.gateway.list_notifications(self.query).await?;

        let (records, unread) = {
            let mut state = self.write();
            if state.epoch != epoch || token <= state.applied_token {
                debug!(
                    token,
                    applied_token = state.applied_token,
                    "Discarding stale notification listing"
                );
                return Ok(LoadOutcome::Discarded);
            }

            let mut seen = HashSet::with_capacity(page.items.len());
            let records: Vec<NotificationRecord> = page
                .items
                .into_iter()
                .filter(|r| seen.insert(r.id.clone()))
                .collect();

            state.applied_token = token;
            state.records = records;
            state.total = page.total;
            state.last_loaded_at = Some(Utc::now());

            let unread = state.unread_count();
            if unread as u64 != page.unread_count {
                debug!(
                    reported = page.unread_count,
                    counted = unread,
                    "Gateway unread count disagrees with listing"
                );
            }
            (state.records.len(), unread)
        };

        debug!(token, records, unread, "Notification store replaced");
        self.emit(StoreEvent::Replaced { unread });
        Ok(LoadOutcome::Applied { records, unread })
    }

    /// Mark one notification read.
    ///
    /// The record is stamped locally before the request is sent and the
    /// stamp is removed again if the gateway refuses.
    pub async fn mark_read(&self, id: &NotificationId) -> AppResult<MarkOutcome> {
        let stamp = Utc::now();
        {
            let mut state = self.write();
            let record = state
                .find_mut(id)
                .ok_or_else(|| AppError::not_found(format!("Notification {id} is not loaded")))?;
            if record.read_at.is_some() {
                return Ok(MarkOutcome::AlreadyRead);
            }
            record.read_at = Some(stamp);
        }
        self.emit(StoreEvent::ReadStateChanged {
            unread: self.unread_count(),
        });

        match self.gateway.mark_read(id).await {
            Ok(updated) => {
                if let Some(read_at) = updated.and_then(|r| r.read_at) {
                    let mut state = self.write();
                    if let Some(record) = state.find_mut(id) {
                        if record.read_at == Some(stamp) {
                            record.read_at = Some(read_at);
                        }
                    }
                }
                debug!(notification_id = %id, "Notification marked read");
                Ok(MarkOutcome::Marked)
            }
            Err(err) => {
                let reverted = self.write().rollback(id, stamp);
                warn!(
                    notification_id = %id,
                    reverted,
                    error = %err,
                    "Failed to mark notification read"
                );
                if reverted {
                    self.emit(StoreEvent::ReadStateChanged {
                        unread: self.unread_count(),
                    });
                }
                Err(err)
            }
        }
    }

    /// Mark every loaded unread notification read.
    ///
    /// Uses the gateway's bulk endpoint when it has one and falls back to
    /// one request per notification otherwise. Returns how many were
    /// marked.
    pub async fn mark_all_read(&self) -> Result<usize, MarkAllReadError> {
        let stamp = Utc::now();
        let ids: Vec<NotificationId> = {
            let mut state = self.write();
            state
                .records
                .iter_mut()
                .filter(|r| r.is_unread())
                .map(|r| {
                    r.read_at = Some(stamp);
                    r.id.clone()
                })
                .collect()
        };
        if ids.is_empty() {
            return Ok(0);
        }
        self.emit(StoreEvent::ReadStateChanged { unread: 0 });

        let failed = match self.gateway.mark_all_read().await {
            Ok(updated) => {
                debug!(local = ids.len(), updated, "Bulk mark-all-read accepted");
                Vec::new()
            }
            Err(err) if err.kind == ErrorKind::NotImplemented => {
                debug!(count = ids.len(), "No bulk endpoint, marking individually");
                self.mark_each(&ids, stamp).await
            }
            Err(err) => ids
                .iter()
                .map(|id| FailedMark {
                    id: id.clone(),
                    error: err.clone(),
                })
                .collect(),
        };

        if failed.is_empty() {
            info!(count = ids.len(), "All notifications marked read");
            return Ok(ids.len());
        }

        {
            let mut state = self.write();
            for failure in &failed {
                state.rollback(&failure.id, stamp);
            }
        }
        self.emit(StoreEvent::ReadStateChanged {
            unread: self.unread_count(),
        });

        let marked = ids.len() - failed.len();
        warn!(marked, failed = failed.len(), "Mark-all-read partially failed");
        Err(MarkAllReadError { marked, failed })
    }

    async fn mark_each(&self, ids: &[NotificationId], stamp: DateTime<Utc>) -> Vec<FailedMark> {
        let results = join_all(ids.iter().map(|id| self.gateway.mark_read(id))).await;

        let mut failed = Vec::new();
        let mut state = self.write();
        for (id, result) in ids.iter().zip(results) {
            match result {
                Ok(updated) => {
                    if let (Some(read_at), Some(record)) =
                        (updated.and_then(|r| r.read_at), state.find_mut(id))
                    {
                        if record.read_at == Some(stamp) {
                            record.read_at = Some(read_at);
                        }
                    }
                }
                Err(error) => failed.push(FailedMark {
                    id: id.clone(),
                    error,
                }),
            }
        }
        failed
    }

    /// Unread notifications among the loaded records.
    pub fn unread_count(&self) -> usize {
        self.read().unread_count()
    }

    /// Snapshot of all records in listing order.
    pub fn records(&self) -> Vec<NotificationRecord> {
        self.read().records.clone()
    }

    pub fn unread(&self) -> Vec<NotificationRecord> {
        self.read()
            .records
            .iter()
            .filter(|r| r.is_unread())
            .cloned()
            .collect()
    }

    pub fn get(&self, id: &NotificationId) -> Option<NotificationRecord> {
        self.read().records.iter().find(|r| r.id == *id).cloned()
    }

    /// Total reported by the gateway; display only.
    pub fn total(&self) -> u64 {
        self.read().total
    }

    pub fn last_loaded_at(&self) -> Option<DateTime<Utc>> {
        self.read().last_loaded_at
    }

    /// Empty the store and invalidate in-flight listings.
    pub fn clear(&self) {
        {
            let mut state = self.write();
            state.epoch += 1;
            state.records.clear();
            state.total = 0;
            state.last_loaded_at = None;
        }
        debug!("Notification store cleared");
        self.emit(StoreEvent::Cleared);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }
}
