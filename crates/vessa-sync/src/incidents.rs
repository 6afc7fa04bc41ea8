//! Incident board: the currently displayed page of incidents.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, warn};

use vessa_core::result::AppResult;
use vessa_core::types::{IncidentId, PageResponse};
use vessa_entity::incident::{IncidentQuery, IncidentRecord, IncidentStatus};
use vessa_gateway::IncidentGateway;

#[derive(Debug, Default)]
struct BoardState {
    page: Option<PageResponse<IncidentRecord>>,
    query: Option<IncidentQuery>,
    applied_token: u64,
    epoch: u64,
}

impl BoardState {
    fn find_mut(&mut self, id: &IncidentId) -> Option<&mut IncidentRecord> {
        self.page
            .as_mut()
            .and_then(|page| page.items.iter_mut().find(|i| i.id == *id))
    }
}

/// Holds one page of incidents and applies reviews optimistically.
#[derive(Debug)]
pub struct IncidentBoard {
    gateway: Arc<dyn IncidentGateway>,
    state: RwLock<BoardState>,
    next_token: AtomicU64,
}

impl IncidentBoard {
    pub fn new(gateway: Arc<dyn IncidentGateway>) -> Self {
        Self {
            gateway,
            state: RwLock::new(BoardState::default()),
            next_token: AtomicU64::new(0),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, BoardState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, BoardState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Load a page. Returns `None` when a newer page was applied first.
    pub async fn load_page(
        &self,
        query: IncidentQuery,
    ) -> AppResult<Option<PageResponse<IncidentRecord>>> {
        let token = self.next_token.fetch_add(1, Ordering::SeqCst) + 1;
        let epoch = self.read().epoch;

        let page = self.gateway.list_incidents(&query).await?;

        let mut state = self.write();
        if state.epoch != epoch || token <= state.applied_token {
            debug!(token, applied_token = state.applied_token, "Discarding stale incident page");
            return Ok(None);
        }
        state.applied_token = token;
        state.query = Some(query);
        state.page = Some(page.clone());
        debug!(
            page = page.page,
            items = page.items.len(),
            total = page.total_items,
            "Incident page loaded"
        );
        Ok(Some(page))
    }

    pub fn current_page(&self) -> Option<PageResponse<IncidentRecord>> {
        self.read().page.clone()
    }

    pub fn current_query(&self) -> Option<IncidentQuery> {
        self.read().query.clone()
    }

    /// Look an incident up on the current page, then at the gateway.
    pub async fn get(&self, id: &IncidentId) -> AppResult<IncidentRecord> {
        let local = self
            .read()
            .page
            .as_ref()
            .and_then(|page| page.items.iter().find(|i| i.id == *id).cloned());
        match local {
            Some(record) => Ok(record),
            None => self.gateway.get_incident(id).await,
        }
    }

    /// Mark an incident reviewed.
    ///
    /// An open incident shows as investigating right away and goes back
    /// to open if the gateway refuses.
    pub async fn review(&self, id: &IncidentId) -> AppResult<IncidentRecord> {
        let reverted_to: Option<IncidentStatus> = {
            let mut state = self.write();
            state.find_mut(id).map(|record| {
                let previous = record.status.clone();
                record.status = previous.reviewed();
                previous
            })
        };

        match self.gateway.review_incident(id).await {
            Ok(record) => {
                if let Some(slot) = self.write().find_mut(id) {
                    *slot = record.clone();
                }
                debug!(incident_id = %id, status = %record.status, "Incident reviewed");
                Ok(record)
            }
            Err(err) => {
                if let Some(previous) = reverted_to {
                    let mut state = self.write();
                    if let Some(record) = state.find_mut(id) {
                        if record.status == previous.reviewed() {
                            record.status = previous;
                        }
                    }
                }
                warn!(incident_id = %id, error = %err, "Incident review failed");
                Err(err)
            }
        }
    }

    /// Forget the current page and discard in-flight loads.
    pub fn clear(&self) {
        let mut state = self.write();
        state.epoch += 1;
        state.page = None;
        state.query = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use vessa_core::error::{AppError, ErrorKind};
    use vessa_core::types::PageRequest;

    use crate::testing::{incident, FakeIncidents};

    fn query(page: u64) -> IncidentQuery {
        IncidentQuery {
            page: PageRequest::new(page, 20),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_stale_page_discarded() {
        let fake = Arc::new(FakeIncidents::default());
        let gate_one = fake.gate_next_list();
        let gate_two = fake.gate_next_list();
        let board = Arc::new(IncidentBoard::new(fake.clone()));

        let first = tokio::spawn({
            let board = board.clone();
            async move { board.load_page(query(1)).await }
        });
        while fake.list_calls() < 1 {
            tokio::task::yield_now().await;
        }
        let second = tokio::spawn({
            let board = board.clone();
            async move { board.load_page(query(2)).await }
        });
        while fake.list_calls() < 2 {
            tokio::task::yield_now().await;
        }

        gate_two.send(vec![incident("inc-2", "open")]).expect("release two");
        assert!(second.await.unwrap().unwrap().is_some());
        gate_one.send(vec![incident("inc-1", "open")]).expect("release one");
        assert!(first.await.unwrap().unwrap().is_none());

        let page = board.current_page().expect("page");
        assert_eq!(page.page, 2);
        assert_eq!(page.items[0].id.as_str(), "inc-2");
    }

    #[tokio::test]
    async fn test_review_is_optimistic() {
        let fake = Arc::new(FakeIncidents::with_incidents(vec![incident("inc-1", "open")]));
        let board = IncidentBoard::new(fake.clone());
        board.load_page(query(1)).await.expect("load");

        let record = board.review(&IncidentId::new("inc-1")).await.expect("review");
        assert_eq!(record.status, IncidentStatus::Investigating);
        let page = board.current_page().unwrap();
        assert_eq!(page.items[0].status, IncidentStatus::Investigating);
        assert!(page.items[0].updated_at.is_some());
    }

    #[tokio::test]
    async fn test_failed_review_reverts() {
        let fake = Arc::new(FakeIncidents::with_incidents(vec![incident("inc-1", "open")]));
        fake.fail_review(AppError::from_status(403, "Forbidden"));
        let board = IncidentBoard::new(fake.clone());
        board.load_page(query(1)).await.expect("load");

        let err = board.review(&IncidentId::new("inc-1")).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Authorization);
        assert_eq!(board.current_page().unwrap().items[0].status, IncidentStatus::Open);
    }

    #[tokio::test]
    async fn test_get_falls_back_to_gateway() {
        let fake = Arc::new(FakeIncidents::with_incidents(vec![incident("inc-9", "resolved")]));
        let board = IncidentBoard::new(fake.clone());
        let record = board.get(&IncidentId::new("inc-9")).await.expect("get");
        assert_eq!(record.status, IncidentStatus::Resolved);
        assert!(board.get(&IncidentId::new("missing")).await.is_err());
    }
}
