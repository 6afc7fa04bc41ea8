//! In-memory gateway doubles for the sync tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::channel::mpsc;
use futures::stream::{self, StreamExt};
use tokio::sync::oneshot;

use vessa_core::error::AppError;
use vessa_core::result::AppResult;
use vessa_core::types::{ApiKeyId, IncidentId, NotificationId, PageResponse, PreferenceId};
use vessa_entity::api_key::{ApiKeyRecord, NewApiKey, SecretKey};
use vessa_entity::incident::{IncidentQuery, IncidentRecord};
use vessa_entity::notification::{
    NewPreference, NotificationPage, NotificationPreference, NotificationQuery,
    NotificationRecord, PreferenceUpdate, PushedNotification,
};
use vessa_gateway::{
    ApiKeyGateway, IncidentGateway, NotificationGateway, NotificationPush, PushStream,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

pub(crate) fn notification(id: &str, read: bool) -> NotificationRecord {
    let read_at = read.then_some("2024-01-01T00:00:00Z");
    serde_json::from_value(serde_json::json!({
        "id": id,
        "title": format!("Alert {id}"),
        "message": "Blocked request",
        "priority": "high",
        "created_at": "2024-01-01T00:00:00Z",
        "read_at": read_at,
    }))
    .expect("notification fixture")
}

pub(crate) fn api_key(id: &str, active: bool) -> ApiKeyRecord {
    serde_json::from_value(serde_json::json!({
        "id": id,
        "name": format!("key {id}"),
        "key": format!("vsk_{id}_initial"),
        "is_active": active,
        "created_at": "2024-02-01T12:00:00Z",
    }))
    .expect("api key fixture")
}

pub(crate) fn incident(id: &str, status: &str) -> IncidentRecord {
    serde_json::from_value(serde_json::json!({
        "id": id,
        "title": format!("Incident {id}"),
        "severity": "high",
        "status": status,
        "created_at": "2024-05-01T08:00:00Z",
    }))
    .expect("incident fixture")
}

/// Notification gateway with scripted failures and gated listings.
#[derive(Debug, Default)]
pub(crate) struct FakeNotifications {
    records: Mutex<Vec<NotificationRecord>>,
    reported_unread: Mutex<Option<u64>>,
    list_calls: AtomicUsize,
    list_errors: Mutex<VecDeque<AppError>>,
    list_gates: Mutex<VecDeque<oneshot::Receiver<Vec<NotificationRecord>>>>,
    mark_failures: Mutex<HashMap<String, AppError>>,
    mark_calls: Mutex<Vec<String>>,
    server_read_at: Mutex<Option<DateTime<Utc>>>,
    bulk_disabled: AtomicBool,
    bulk_error: Mutex<Option<AppError>>,
    bulk_calls: AtomicUsize,
}

impl FakeNotifications {
    pub(crate) fn with_records(records: Vec<NotificationRecord>) -> Self {
        let fake = Self::default();
        *lock(&fake.records) = records;
        fake
    }

    pub(crate) fn set_records(&self, records: Vec<NotificationRecord>) {
        *lock(&self.records) = records;
    }

    pub(crate) fn set_reported_unread(&self, count: u64) {
        *lock(&self.reported_unread) = Some(count);
    }

    /// The next listing waits for the returned sender.
    pub(crate) fn gate_next_list(&self) -> oneshot::Sender<Vec<NotificationRecord>> {
        let (tx, rx) = oneshot::channel();
        lock(&self.list_gates).push_back(rx);
        tx
    }

    pub(crate) fn fail_next_list(&self, error: AppError) {
        lock(&self.list_errors).push_back(error);
    }

    pub(crate) fn fail_mark(&self, id: &str, error: AppError) {
        lock(&self.mark_failures).insert(id.to_string(), error);
    }

    pub(crate) fn set_server_read_at(&self, at: DateTime<Utc>) {
        *lock(&self.server_read_at) = Some(at);
    }

    pub(crate) fn disable_bulk(&self) {
        self.bulk_disabled.store(true, Ordering::SeqCst);
    }

    pub(crate) fn fail_bulk(&self, error: AppError) {
        *lock(&self.bulk_error) = Some(error);
    }

    pub(crate) fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn bulk_calls(&self) -> usize {
        self.bulk_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn mark_calls(&self) -> Vec<String> {
        lock(&self.mark_calls).clone()
    }
}

#[async_trait]
impl NotificationGateway for FakeNotifications {
    async fn list_notifications(&self, _query: NotificationQuery) -> AppResult<NotificationPage> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let error = lock(&self.list_errors).pop_front();
        if let Some(error) = error {
            return Err(error);
        }

        let gate = lock(&self.list_gates).pop_front();
        let items = match gate {
            Some(rx) => rx
                .await
                .map_err(|_| AppError::cancelled("listing gate dropped"))?,
            None => lock(&self.records).clone(),
        };

        let counted = items.iter().filter(|r| r.is_unread()).count() as u64;
        let unread_count = lock(&self.reported_unread).unwrap_or(counted);
        let total = items.len() as u64;
        Ok(NotificationPage {
            items,
            unread_count,
            total,
        })
    }

    async fn mark_read(&self, id: &NotificationId) -> AppResult<Option<NotificationRecord>> {
        lock(&self.mark_calls).push(id.to_string());
        if let Some(error) = lock(&self.mark_failures).get(id.as_str()) {
            return Err(error.clone());
        }

        let Some(read_at) = *lock(&self.server_read_at) else {
            return Ok(None);
        };
        let mut records = lock(&self.records);
        Ok(records.iter_mut().find(|r| r.id == *id).map(|r| {
            r.read_at = Some(read_at);
            r.clone()
        }))
    }

    async fn mark_all_read(&self) -> AppResult<u64> {
        self.bulk_calls.fetch_add(1, Ordering::SeqCst);
        if self.bulk_disabled.load(Ordering::SeqCst) {
            return Err(AppError::from_status(405, "Method Not Allowed"));
        }
        if let Some(error) = lock(&self.bulk_error).clone() {
            return Err(error);
        }
        let mut records = lock(&self.records);
        let now = Utc::now();
        let mut updated = 0;
        for record in records.iter_mut().filter(|r| r.is_unread()) {
            record.read_at = Some(now);
            updated += 1;
        }
        Ok(updated)
    }

    async fn list_preferences(&self) -> AppResult<Vec<NotificationPreference>> {
        Ok(Vec::new())
    }

    async fn create_preference(
        &self,
        _preference: &NewPreference,
    ) -> AppResult<NotificationPreference> {
        Err(AppError::not_implemented("preferences"))
    }

    async fn update_preference(
        &self,
        _id: &PreferenceId,
        _update: &PreferenceUpdate,
    ) -> AppResult<NotificationPreference> {
        Err(AppError::not_implemented("preferences"))
    }

    async fn delete_preference(&self, _id: &PreferenceId) -> AppResult<()> {
        Err(AppError::not_implemented("preferences"))
    }
}

/// API key gateway backed by a vector.
#[derive(Debug, Default)]
pub(crate) struct FakeKeys {
    keys: Mutex<Vec<ApiKeyRecord>>,
    next_failure: Mutex<Option<AppError>>,
    calls: Mutex<Vec<String>>,
    issued: AtomicUsize,
}

impl FakeKeys {
    pub(crate) fn with_keys(keys: Vec<ApiKeyRecord>) -> Self {
        let fake = Self::default();
        *lock(&fake.keys) = keys;
        fake
    }

    /// The next mutating call fails with `error`.
    pub(crate) fn fail_next(&self, error: AppError) {
        *lock(&self.next_failure) = Some(error);
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    fn begin(&self, call: String) -> AppResult<()> {
        lock(&self.calls).push(call);
        match lock(&self.next_failure).take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn update(
        &self,
        id: &ApiKeyId,
        change: impl FnOnce(&mut ApiKeyRecord),
    ) -> AppResult<ApiKeyRecord> {
        let mut keys = lock(&self.keys);
        let record = keys
            .iter_mut()
            .find(|k| k.id == *id)
            .ok_or_else(|| AppError::from_status(404, "API key not found"))?;
        change(record);
        Ok(record.clone())
    }
}

#[async_trait]
impl ApiKeyGateway for FakeKeys {
    async fn list_keys(&self) -> AppResult<Vec<ApiKeyRecord>> {
        Ok(lock(&self.keys).clone())
    }

    async fn create_key(&self, request: &NewApiKey) -> AppResult<ApiKeyRecord> {
        self.begin(format!("create:{}", request.name))?;
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let mut record = api_key(&format!("new{n}"), true);
        record.name = request.name.clone();
        record.key = Some(SecretKey::new(format!("vsk_created_{n}")));
        lock(&self.keys).push(record.clone());
        Ok(record)
    }

    async fn regenerate_key(&self, id: &ApiKeyId) -> AppResult<ApiKeyRecord> {
        self.begin(format!("regenerate:{id}"))?;
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        self.update(id, |record| {
            record.key = Some(SecretKey::new(format!("vsk_regenerated_{n}")));
            record.is_active = true;
        })
    }

    async fn activate_key(&self, id: &ApiKeyId) -> AppResult<ApiKeyRecord> {
        self.begin(format!("activate:{id}"))?;
        self.update(id, |record| record.is_active = true)
    }

    async fn deactivate_key(&self, id: &ApiKeyId) -> AppResult<ApiKeyRecord> {
        self.begin(format!("deactivate:{id}"))?;
        self.update(id, |record| record.is_active = false)
    }

    async fn delete_key(&self, id: &ApiKeyId) -> AppResult<()> {
        self.begin(format!("delete:{id}"))?;
        lock(&self.keys).retain(|k| k.id != *id);
        Ok(())
    }
}

/// Incident gateway with gated listings.
#[derive(Debug, Default)]
pub(crate) struct FakeIncidents {
    incidents: Mutex<Vec<IncidentRecord>>,
    list_calls: AtomicUsize,
    list_gates: Mutex<VecDeque<oneshot::Receiver<Vec<IncidentRecord>>>>,
    review_failure: Mutex<Option<AppError>>,
}

impl FakeIncidents {
    pub(crate) fn with_incidents(incidents: Vec<IncidentRecord>) -> Self {
        let fake = Self::default();
        *lock(&fake.incidents) = incidents;
        fake
    }

    pub(crate) fn gate_next_list(&self) -> oneshot::Sender<Vec<IncidentRecord>> {
        let (tx, rx) = oneshot::channel();
        lock(&self.list_gates).push_back(rx);
        tx
    }

    pub(crate) fn fail_review(&self, error: AppError) {
        *lock(&self.review_failure) = Some(error);
    }

    pub(crate) fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IncidentGateway for FakeIncidents {
    async fn list_incidents(
        &self,
        query: &IncidentQuery,
    ) -> AppResult<PageResponse<IncidentRecord>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let gate = lock(&self.list_gates).pop_front();
        let items = match gate {
            Some(rx) => rx
                .await
                .map_err(|_| AppError::cancelled("listing gate dropped"))?,
            None => lock(&self.incidents).clone(),
        };
        let total = items.len() as u64;
        Ok(PageResponse::new(
            items,
            query.page.page,
            query.page.page_size,
            total,
        ))
    }

    async fn get_incident(&self, id: &IncidentId) -> AppResult<IncidentRecord> {
        lock(&self.incidents)
            .iter()
            .find(|i| i.id == *id)
            .cloned()
            .ok_or_else(|| AppError::from_status(404, "Incident not found"))
    }

    async fn review_incident(&self, id: &IncidentId) -> AppResult<IncidentRecord> {
        if let Some(error) = lock(&self.review_failure).take() {
            return Err(error);
        }
        let mut incidents = lock(&self.incidents);
        let record = incidents
            .iter_mut()
            .find(|i| i.id == *id)
            .ok_or_else(|| AppError::from_status(404, "Incident not found"))?;
        record.status = record.status.reviewed();
        record.updated_at = Some(Utc::now());
        Ok(record.clone())
    }
}

pub(crate) fn pushed(id: &str) -> PushedNotification {
    serde_json::from_value(serde_json::json!({
        "id": id,
        "title": format!("Alert {id}"),
        "priority": "high",
    }))
    .expect("pushed notification fixture")
}

enum PushScript {
    Fail(AppError),
    Open(mpsc::UnboundedReceiver<AppResult<PushedNotification>>),
}

/// Push channel whose connections are scripted one by one.
///
/// Once the script runs out, connections stay open and silent.
#[derive(Default)]
pub(crate) struct FakePush {
    script: Mutex<VecDeque<PushScript>>,
    subscribe_calls: AtomicUsize,
}

impl std::fmt::Debug for FakePush {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakePush")
            .field("subscribe_calls", &self.subscribe_calls())
            .finish_non_exhaustive()
    }
}

impl FakePush {
    pub(crate) fn fail_next_subscribe(&self, error: AppError) {
        lock(&self.script).push_back(PushScript::Fail(error));
    }

    /// Script a connection; dropping the sender closes it.
    pub(crate) fn open_next(&self) -> mpsc::UnboundedSender<AppResult<PushedNotification>> {
        let (tx, rx) = mpsc::unbounded();
        lock(&self.script).push_back(PushScript::Open(rx));
        tx
    }

    pub(crate) fn subscribe_calls(&self) -> usize {
        self.subscribe_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NotificationPush for FakePush {
    async fn subscribe(&self) -> AppResult<PushStream> {
        self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
        let next = lock(&self.script).pop_front();
        match next {
            Some(PushScript::Fail(error)) => Err(error),
            Some(PushScript::Open(rx)) => Ok(rx.boxed()),
            None => Ok(stream::pending().boxed()),
        }
    }
}
