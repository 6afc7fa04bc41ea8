//! Integration tests for the incident board with an API key.

mod helpers;

use vessa_core::error::ErrorKind;
use vessa_core::types::{ApiKeyId, IncidentId};
use vessa_entity::api_key::SecretKey;
use vessa_entity::auth::Credentials;
use vessa_entity::incident::{IncidentQuery, IncidentStatus};
use vessa_sync::ActiveKey;

use helpers::{API_KEY_SECRET, FakeGateway, PASSWORD, incident};

#[tokio::test]
async fn test_incidents_require_selected_key() {
    let gateway = FakeGateway::start().await;
    gateway.state().incidents = vec![incident("inc-1", "open")];
    let console = gateway.console();
    console
        .login(&Credentials::new("analyst@example.com", PASSWORD))
        .await
        .expect("login");

    let err = console
        .incidents()
        .load_page(IncidentQuery::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Authorization);
    assert!(console.session().is_authenticated());

    console
        .session()
        .select_api_key(ActiveKey {
            id: ApiKeyId::new("key-1"),
            secret: SecretKey::new(API_KEY_SECRET),
        })
        .expect("select key");

    let page = console
        .incidents()
        .load_page(IncidentQuery::default())
        .await
        .expect("load")
        .expect("fresh page");
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.total_items, 1);
}

#[tokio::test]
async fn test_review_updates_board() {
    let gateway = FakeGateway::start().await;
    gateway.state().incidents = vec![incident("inc-1", "open"), incident("inc-2", "resolved")];
    let console = gateway.console();
    console
        .login(&Credentials::new("analyst@example.com", PASSWORD))
        .await
        .expect("login");
    console
        .session()
        .select_api_key(ActiveKey {
            id: ApiKeyId::new("key-1"),
            secret: SecretKey::new(API_KEY_SECRET),
        })
        .expect("select key");
    console
        .incidents()
        .load_page(IncidentQuery::default())
        .await
        .expect("load");

    let reviewed = console
        .incidents()
        .review(&IncidentId::new("inc-1"))
        .await
        .expect("review");
    assert_eq!(reviewed.status, IncidentStatus::Investigating);

    let page = console.incidents().current_page().expect("page");
    assert_eq!(page.items[0].status, IncidentStatus::Investigating);
    assert!(page.items[0].updated_at.is_some());
    assert_eq!(page.items[1].status, IncidentStatus::Resolved);
}
