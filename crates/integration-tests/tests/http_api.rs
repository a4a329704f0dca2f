//! HTTP surface, driven through the router with `oneshot`.

#![allow(clippy::unwrap_used)]

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use serde_json::{Value, json};
use tower::ServiceExt;

use mercato_core::{AccountRole, OrderStatus, OwnerId};
use mercato_integration_tests::{
    ScriptedGateway, TestApp, bearer, completion_event, sample_order, signature,
};
use mercato_storefront::db::OrderStore;
use mercato_storefront::middleware::REQUEST_ID_HEADER;
use mercato_storefront::webhooks::SIGNATURE_HEADER;

async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn get(uri: &str, auth: Option<&str>) -> Request<Body> {
    let mut builder = Request::get(uri);
    if let Some(auth) = auth {
        builder = builder.header(header::AUTHORIZATION, auth);
    }
    builder.body(Body::empty()).unwrap()
}

fn json_request(method: &str, uri: &str, auth: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, auth)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn webhook(body: Vec<u8>, signature: Option<String>) -> Request<Body> {
    let mut builder = Request::post("/webhooks/checkout");
    if let Some(signature) = signature {
        builder = builder.header(SIGNATURE_HEADER, signature);
    }
    builder.body(Body::from(body)).unwrap()
}

#[tokio::test]
async fn test_health() {
    let app = TestApp::new();
    let response = app.router().oneshot(get("/health", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key(REQUEST_ID_HEADER));

    let response = app.router().oneshot(get("/health/ready", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_checkout_and_webhook_flow() {
    let app = TestApp::with_gateway(ScriptedGateway::new().then_session("sess_abc"));
    let owner = OwnerId::generate();
    let auth = bearer(owner, AccountRole::Customer);

    let input = serde_json::to_value(sample_order()).unwrap();
    let (status, body) = send(
        app.router(),
        json_request("POST", "/api/checkout", &auth, &input),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["session_id"], "sess_abc");
    assert_eq!(
        body["redirect_url"],
        "https://checkout.example.test/pay/sess_abc"
    );
    let order_id = body["order_id"].as_str().unwrap().parse().unwrap();

    let payload = completion_event("evt_http", order_id, Some(owner), "sess_abc");
    let header = signature(&payload);
    let (status, body) = send(app.router(), webhook(payload, Some(header))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["received"], true);

    let (status, body) = send(
        app.router(),
        get(&format!("/api/orders/{order_id}"), Some(&auth)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "confirmed");
    assert_eq!(body["total"], 4999);
    assert_eq!(body["external_session_id"], "sess_abc");
}

#[tokio::test]
async fn test_requires_bearer_token() {
    let app = TestApp::new();
    let (status, body) = send(app.router(), get("/api/orders", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Unauthorized");

    let (status, _) = send(app.router(), get("/api/orders", Some("Bearer nope"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_checkout_validation_lists_violations() {
    let app = TestApp::new();
    let auth = bearer(OwnerId::generate(), AccountRole::Customer);
    let input = json!({
        "items": [],
        "shipping_address": { "street": "", "city": "", "country": "" },
        "customer_email": "nobody"
    });

    let (status, body) = send(
        app.router(),
        json_request("POST", "/api/checkout", &auth, &input),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let fields: Vec<&str> = body["violations"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v["field"].as_str().unwrap())
        .collect();
    for expected in [
        "items",
        "shipping_address.street",
        "shipping_address.city",
        "shipping_address.country",
        "customer_email",
    ] {
        assert!(fields.contains(&expected), "missing violation for {expected}");
    }
    assert_eq!(app.gateway.calls(), 0);
}

#[tokio::test]
async fn test_gateway_outage_is_retryable() {
    let app = TestApp::with_gateway(ScriptedGateway::new().then_fail());
    let owner = OwnerId::generate();
    let auth = bearer(owner, AccountRole::Customer);
    let input = serde_json::to_value(sample_order()).unwrap();

    let (status, body) = send(
        app.router(),
        json_request("POST", "/api/checkout", &auth, &input),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["retryable"], true);

    let (_, listing) = send(app.router(), get("/api/orders", Some(&auth))).await;
    assert_eq!(listing["total"], 1);
    let order_id = listing["orders"][0]["id"].as_str().unwrap().to_owned();

    let (status, body) = send(
        app.router(),
        json_request(
            "POST",
            &format!("/api/orders/{order_id}/checkout"),
            &auth,
            &json!({}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["session_id"], "sess_2");
}

#[tokio::test]
async fn test_tampered_webhook_is_client_error() {
    let app = TestApp::new();
    let owner = OwnerId::generate();
    let order = app
        .state
        .orders()
        .create_order(owner, sample_order())
        .await
        .unwrap();

    let payload = completion_event("evt_bad", order.id, Some(owner), "sess_bad");
    let header = signature(&payload);
    let forged = completion_event("evt_bad", order.id, Some(owner), "sess_forged");

    let (status, _) = send(app.router(), webhook(forged, Some(header))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(app.router(), webhook(payload, None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let stored = app.store.get_by_id(order.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::Pending);
}

#[tokio::test]
async fn test_unknown_order_webhook_acknowledged() {
    let app = TestApp::new();
    let payload = completion_event(
        "evt_orphan",
        mercato_core::OrderId::generate(),
        None,
        "sess_orphan",
    );
    let header = signature(&payload);

    let (status, body) = send(app.router(), webhook(payload, Some(header))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["received"], true);
}

#[tokio::test]
async fn test_admin_routes_require_admin_role() {
    let app = TestApp::new();
    let customer = bearer(OwnerId::generate(), AccountRole::Customer);

    let (status, body) = send(app.router(), get("/api/admin/orders", Some(&customer))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Forbidden");
}

#[tokio::test]
async fn test_admin_status_updates() {
    let app = TestApp::new();
    let owner = OwnerId::generate();
    let order = app
        .state
        .orders()
        .create_order(owner, sample_order())
        .await
        .unwrap();
    let admin = bearer(OwnerId::generate(), AccountRole::Admin);
    let uri = format!("/api/admin/orders/{}/status", order.id);

    let (status, body) = send(
        app.router(),
        json_request("PUT", &uri, &admin, &json!({ "status": "shipped" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["violations"][0]["field"], "status");

    let (status, body) = send(
        app.router(),
        json_request("PUT", &uri, &admin, &json!({ "status": "processing" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "processing");

    let (status, _) = send(
        app.router(),
        json_request("PUT", &uri, &admin, &json!({ "status": "pending" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = send(
        app.router(),
        get(&format!("/api/admin/orders/{}", order.id), Some(&admin)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["order"]["status"], "processing");
    assert_eq!(body["owner"], Value::Null);
}

#[tokio::test]
async fn test_other_owners_order_is_not_found() {
    let app = TestApp::new();
    let order = app
        .state
        .orders()
        .create_order(OwnerId::generate(), sample_order())
        .await
        .unwrap();
    let stranger = bearer(OwnerId::generate(), AccountRole::Customer);

    let (status, _) = send(
        app.router(),
        get(&format!("/api/orders/{}", order.id), Some(&stranger)),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(app.router(), get("/api/orders/not-a-uuid", Some(&stranger))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_listing_rejects_bad_paging() {
    let app = TestApp::new();
    let auth = bearer(OwnerId::generate(), AccountRole::Customer);

    let (status, body) = send(app.router(), get("/api/orders?page=0&limit=500", Some(&auth))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["violations"].as_array().unwrap().len(), 2);
}
