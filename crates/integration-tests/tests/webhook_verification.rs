//! Webhook intake: signatures gate every state change.

#![allow(clippy::unwrap_used)]

use axum::http::StatusCode;
use axum::response::IntoResponse;
use mercato_core::{OrderStatus, OwnerId};
use mercato_integration_tests::{
    TestApp, WEBHOOK_SECRET, completion_event, sample_order, signature,
};
use mercato_storefront::db::OrderStore;
use mercato_storefront::error::AppError;
use mercato_storefront::services::OrderError;
use mercato_storefront::webhooks::{WebhookError, sign};

#[tokio::test]
async fn test_tampered_payload_rejected_and_order_unchanged() {
    let app = TestApp::new();
    let owner = OwnerId::generate();
    let order = app.state.orders().create_order(owner, sample_order()).await.unwrap();

    let body = completion_event("evt_tamper", order.id, Some(owner), "sess_t");
    let header = signature(&body);
    let mut tampered = body.clone();
    let last = tampered.len() - 2;
    tampered[last] = b' ';

    let err = app
        .state
        .webhooks()
        .handle(&tampered, Some(&header))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        OrderError::Authentication(WebhookError::SignatureMismatch)
    ));

    let stored = app.store.get_by_id(order.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::Pending);
    assert_eq!(stored.version, 1);
}

#[tokio::test]
async fn test_missing_signature_rejected() {
    let app = TestApp::new();
    let body = completion_event(
        "evt_unsigned",
        mercato_core::OrderId::generate(),
        None,
        "sess_u",
    );

    assert!(matches!(
        app.state.webhooks().handle(&body, None).await,
        Err(OrderError::Authentication(WebhookError::MissingHeader(_)))
    ));
}

#[tokio::test]
async fn test_wrong_secret_rejected() {
    let app = TestApp::new();
    let body = completion_event(
        "evt_wrong_key",
        mercato_core::OrderId::generate(),
        None,
        "sess_w",
    );
    let header = sign("whsec_someone_else", &body, chrono::Utc::now().timestamp()).unwrap();

    assert!(matches!(
        app.state.webhooks().handle(&body, Some(&header)).await,
        Err(OrderError::Authentication(WebhookError::SignatureMismatch))
    ));
}

#[tokio::test]
async fn test_replayed_old_signature_rejected() {
    let app = TestApp::new();
    let owner = OwnerId::generate();
    let order = app.state.orders().create_order(owner, sample_order()).await.unwrap();
    let body = completion_event("evt_replay", order.id, Some(owner), "sess_r");
    let an_hour_ago = chrono::Utc::now().timestamp() - 3600;
    let header = sign(WEBHOOK_SECRET, &body, an_hour_ago).unwrap();

    assert!(matches!(
        app.state.webhooks().handle(&body, Some(&header)).await,
        Err(OrderError::Authentication(WebhookError::StaleTimestamp { .. }))
    ));
    let stored = app.store.get_by_id(order.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::Pending);
}

#[tokio::test]
async fn test_signed_but_malformed_payload_rejected() {
    let app = TestApp::new();
    let body = br#"{"type":"checkout.session.completed"}"#;

    let err = app
        .state
        .webhooks()
        .handle(body, Some(&signature(body)))
        .await
        .unwrap_err();
    assert!(
        matches!(err, OrderError::MalformedEvent(_)),
        "expected an unreadable event, not an authentication failure: {err:?}"
    );
}

#[tokio::test]
async fn test_signed_but_malformed_payload_is_bad_request_not_retryable() {
    let app = TestApp::new();
    let body = br#"{"id":"evt_noref","type":"checkout.session.completed","data":{"object":{}}}"#;

    let err = app
        .state
        .webhooks()
        .handle(body, Some(&signature(body)))
        .await
        .unwrap_err();
    let err = AppError::from(err);
    assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    let response = err.into_response();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["retryable"], false);
}
