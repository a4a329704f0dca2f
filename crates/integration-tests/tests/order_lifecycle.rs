//! Order lifecycle: creation, checkout, payment confirmation, fulfillment.

#![allow(clippy::unwrap_used)]

use mercato_core::{Money, OrderId, OrderStatus, OwnerId, TransitionError};
use mercato_integration_tests::{
    ScriptedGateway, TestApp, completion_event, sample_order, signature,
};
use mercato_storefront::db::OrderStore;
use mercato_storefront::services::{CompletionOutcome, OrderError, WebhookOutcome};
use mercato_storefront::webhooks::CheckoutEvent;

#[tokio::test]
async fn test_checkout_then_payment_confirms_order() {
    let app = TestApp::with_gateway(ScriptedGateway::new().then_session("sess_abc"));
    let owner = OwnerId::generate();
    let orders = app.state.orders();

    let order = orders.create_order(owner, sample_order()).await.unwrap();
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.total, Money::from_minor(4999));
    assert_eq!(order.external_session_id, None);

    let session = orders.begin_checkout(&order).await.unwrap();
    assert_eq!(session.session_id, "sess_abc");

    let request = app.gateway.last_request().unwrap();
    assert_eq!(request.correlation_id, order.id);
    assert_eq!(request.owner_id, owner);

    let stored = app.store.get_by_id(order.id).await.unwrap().unwrap();
    assert_eq!(stored.external_session_id.as_deref(), Some("sess_abc"));
    assert_eq!(stored.status, OrderStatus::Pending);

    let body = completion_event("evt_1", order.id, Some(owner), "sess_abc");
    let outcome = app
        .state
        .webhooks()
        .handle(&body, Some(&signature(&body)))
        .await
        .unwrap();
    let WebhookOutcome::Processed(CompletionOutcome::Confirmed(confirmed)) = outcome else {
        panic!("expected confirmation, got {outcome:?}");
    };
    assert_eq!(confirmed.status, OrderStatus::Confirmed);
    assert_eq!(confirmed.total, Money::from_minor(4999));
    assert_eq!(confirmed.external_session_id.as_deref(), Some("sess_abc"));

    let stored = app.store.get_by_owner_and_id(owner, order.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::Confirmed);
}

#[tokio::test]
async fn test_completion_is_idempotent() {
    let app = TestApp::new();
    let owner = OwnerId::generate();
    let orders = app.state.orders();
    let order = orders.create_order(owner, sample_order()).await.unwrap();
    orders.begin_checkout(&order).await.unwrap();

    let body = completion_event("evt_twice", order.id, Some(owner), "sess_1");
    let event = CheckoutEvent::parse(&body).unwrap();

    let first = orders.apply_completion_event(&event).await.unwrap();
    let CompletionOutcome::Confirmed(confirmed) = first else {
        panic!("expected confirmation, got {first:?}");
    };

    let second = orders.apply_completion_event(&event).await.unwrap();
    let CompletionOutcome::AlreadyApplied(unchanged) = second else {
        panic!("expected no-op, got {second:?}");
    };
    assert_eq!(unchanged.version, confirmed.version);
    assert_eq!(unchanged.status, OrderStatus::Confirmed);
}

#[tokio::test]
async fn test_redelivered_webhook_is_duplicate() {
    let app = TestApp::new();
    let owner = OwnerId::generate();
    let order = app.state.orders().create_order(owner, sample_order()).await.unwrap();

    let body = completion_event("evt_redelivered", order.id, None, "sess_x");
    let webhooks = app.state.webhooks();

    let first = webhooks.handle(&body, Some(&signature(&body))).await.unwrap();
    assert!(matches!(
        first,
        WebhookOutcome::Processed(CompletionOutcome::Confirmed(_))
    ));
    let second = webhooks.handle(&body, Some(&signature(&body))).await.unwrap();
    assert_eq!(second, WebhookOutcome::Duplicate);

    let stored = app.store.get_by_id(order.id).await.unwrap().unwrap();
    assert_eq!(stored.version, 2);
}

#[tokio::test]
async fn test_completion_without_owner_hint_scans() {
    let app = TestApp::new();
    let order = app
        .state
        .orders()
        .create_order(OwnerId::generate(), sample_order())
        .await
        .unwrap();

    let body = completion_event("evt_scan", order.id, None, "sess_scan");
    let event = CheckoutEvent::parse(&body).unwrap();
    let outcome = app.state.orders().apply_completion_event(&event).await.unwrap();

    let CompletionOutcome::Confirmed(confirmed) = outcome else {
        panic!("expected confirmation, got {outcome:?}");
    };
    // No session was recorded at checkout; the event supplies it.
    assert_eq!(confirmed.external_session_id.as_deref(), Some("sess_scan"));
}

#[tokio::test]
async fn test_unknown_correlation_id() {
    let app = TestApp::new();
    let missing = OrderId::generate();
    let body = completion_event("evt_unknown", missing, None, "sess_none");

    let event = CheckoutEvent::parse(&body).unwrap();
    assert!(matches!(
        app.state.orders().apply_completion_event(&event).await,
        Err(OrderError::NotFound(id)) if id == missing
    ));

    let outcome = app
        .state
        .webhooks()
        .handle(&body, Some(&signature(&body)))
        .await
        .unwrap();
    assert_eq!(outcome, WebhookOutcome::UnknownOrder(missing));
    assert!(app.store.is_empty().await);
}

#[tokio::test]
async fn test_non_completion_event_ignored() {
    let app = TestApp::new();
    let body = br#"{"id":"evt_refund","type":"charge.refunded","data":{"object":{"id":"ch_1"}}}"#;

    let outcome = app
        .state
        .webhooks()
        .handle(body, Some(&signature(body)))
        .await
        .unwrap();
    assert_eq!(outcome, WebhookOutcome::Processed(CompletionOutcome::Ignored));
}

#[tokio::test]
async fn test_gateway_failure_leaves_order_pending_and_retryable() {
    let app = TestApp::with_gateway(ScriptedGateway::new().then_fail().then_session("sess_retry"));
    let owner = OwnerId::generate();
    let orders = app.state.orders();
    let order = orders.create_order(owner, sample_order()).await.unwrap();

    let err = orders.begin_checkout(&order).await.unwrap_err();
    assert!(matches!(err, OrderError::Gateway(_)));

    let stored = app.store.get_by_id(order.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::Pending);
    assert_eq!(stored.external_session_id, None);

    let session = orders.resume_checkout(owner, order.id).await.unwrap();
    assert_eq!(session.session_id, "sess_retry");
    assert_eq!(app.gateway.calls(), 2);
}

#[tokio::test]
async fn test_begin_checkout_twice_opens_one_session() {
    let app = TestApp::new();
    let orders = app.state.orders();
    let order = orders
        .create_order(OwnerId::generate(), sample_order())
        .await
        .unwrap();

    let first = orders.begin_checkout(&order).await.unwrap();
    let second = orders.begin_checkout(&order).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(app.gateway.calls(), 1);
}

#[tokio::test]
async fn test_validation_reports_every_violation() {
    let app = TestApp::new();
    let mut input = sample_order();
    input.items[0].quantity = 0;
    input.customer_email = "not-an-email".to_owned();
    input.shipping_address.city = String::new();

    let err = app
        .state
        .orders()
        .create_order(OwnerId::generate(), input)
        .await
        .unwrap_err();
    let OrderError::Validation(errors) = err else {
        panic!("expected validation failure, got {err:?}");
    };
    assert!(errors.has_field("items[0].quantity"));
    assert!(errors.has_field("customer_email"));
    assert!(errors.has_field("shipping_address.city"));
    assert!(app.store.is_empty().await);
}

#[tokio::test]
async fn test_status_updates_follow_transition_rules() {
    let app = TestApp::new();
    let orders = app.state.orders();
    let order = orders
        .create_order(OwnerId::generate(), sample_order())
        .await
        .unwrap();

    let err = orders.update_order_status(order.id, "shipped").await.unwrap_err();
    let OrderError::Validation(errors) = err else {
        panic!("expected validation failure, got {err:?}");
    };
    assert!(errors.has_field("status"));

    let processing = orders
        .update_order_status(order.id, "processing")
        .await
        .unwrap();
    assert_eq!(processing.status, OrderStatus::Processing);

    let same = orders
        .update_order_status(order.id, "processing")
        .await
        .unwrap();
    assert_eq!(same.version, processing.version);

    assert!(matches!(
        orders.update_order_status(order.id, "confirmed").await,
        Err(OrderError::InvalidTransition(TransitionError::Backward { .. }))
    ));

    let delivered = orders
        .update_order_status(order.id, "delivered")
        .await
        .unwrap();
    assert_eq!(delivered.status, OrderStatus::Delivered);

    assert!(matches!(
        orders.update_order_status(order.id, "cancelled").await,
        Err(OrderError::InvalidTransition(TransitionError::Terminal(
            OrderStatus::Delivered
        )))
    ));
}

#[tokio::test]
async fn test_cancelled_order_is_not_confirmed_by_late_payment() {
    let app = TestApp::new();
    let owner = OwnerId::generate();
    let orders = app.state.orders();
    let order = orders.create_order(owner, sample_order()).await.unwrap();
    orders.update_order_status(order.id, "cancelled").await.unwrap();

    let body = completion_event("evt_late", order.id, Some(owner), "sess_late");
    let event = CheckoutEvent::parse(&body).unwrap();
    let outcome = orders.apply_completion_event(&event).await.unwrap();

    let CompletionOutcome::AlreadyApplied(unchanged) = outcome else {
        panic!("expected no-op, got {outcome:?}");
    };
    assert_eq!(unchanged.status, OrderStatus::Cancelled);
}
