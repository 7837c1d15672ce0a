//! Webhook settlement: signature gating, idempotent reconciliation and
//! fire-and-forget notification.

mod common;

use axum::{
    body::Body,
    http::{header, Method, Request},
};
use chrono::Utc;
use common::{guest_checkout_payload, response_json, TestApp};
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde_json::json;
use storefront_api::{
    entities::{order, payment, Order, Payment},
    gateway::compute_signature,
};
use tower::ServiceExt;
use uuid::Uuid;

/// Places an order, opens a session, returns (order_id, session_id).
async fn order_with_open_session(app: &TestApp, token: &str) -> (Uuid, String) {
    let variant = app
        .seed_variant("SETL-A", dec!(1000), Some(10), 10, Some("price_setl_a"))
        .await;
    app.add_to_cart(token, variant.id, 3).await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/orders",
            Some(token),
            Some(guest_checkout_payload("settle@example.com")),
        )
        .await;
    let order_id =
        Uuid::parse_str(response_json(response).await["id"].as_str().unwrap()).unwrap();

    let opened = app
        .request(
            Method::POST,
            &format!("/api/v1/payments/{}/checkout", order_id),
            Some(token),
            None,
        )
        .await;
    let session_id = response_json(opened).await["session_id"]
        .as_str()
        .unwrap()
        .to_string();

    (order_id, session_id)
}

#[tokio::test]
async fn completed_event_settles_payment_and_marks_order_paid() {
    let app = TestApp::new().await;
    let (_, token) = app.create_guest().await;
    let (order_id, session_id) = order_with_open_session(&app, &token).await;

    let response = app
        .deliver_webhook("checkout.session.completed", &session_id)
        .await;
    assert_eq!(response.status(), 204);

    let payment = Payment::find()
        .filter(payment::Column::OrderId.eq(order_id))
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert!(payment.settled);

    let order = Order::find_by_id(order_id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(order.status, order::OrderStatus::Paid);

    // Exactly one confirmation, addressed to the order's owner, with the
    // frozen total and named lines.
    assert_eq!(app.wait_for_receipts(1).await, 1);
    let receipts = app.sink.receipts.lock().unwrap();
    assert_eq!(receipts[0].order_id, order_id);
    assert_eq!(receipts[0].recipient_email, "settle@example.com");
    assert_eq!(receipts[0].total, dec!(2700));
    assert_eq!(receipts[0].lines.len(), 1);
    assert_eq!(receipts[0].lines[0].quantity, 3);
}

#[tokio::test]
async fn duplicate_completed_event_is_accepted_without_renotifying() {
    let app = TestApp::new().await;
    let (_, token) = app.create_guest().await;
    let (order_id, session_id) = order_with_open_session(&app, &token).await;

    let first = app
        .deliver_webhook("checkout.session.completed", &session_id)
        .await;
    assert_eq!(first.status(), 204);
    assert_eq!(app.wait_for_receipts(1).await, 1);

    // The gateway redelivers: accepted, no second transition, no second
    // notification.
    let second = app
        .deliver_webhook("checkout.session.completed", &session_id)
        .await;
    assert_eq!(second.status(), 204);

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(app.sink.receipts.lock().unwrap().len(), 1);

    let order = Order::find_by_id(order_id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(order.status, order::OrderStatus::Paid);
}

#[tokio::test]
async fn unknown_session_is_an_accepted_noop() {
    let app = TestApp::new().await;

    let response = app
        .deliver_webhook("checkout.session.completed", "cs_never_heard_of_it")
        .await;
    assert_eq!(response.status(), 204);
}

#[tokio::test]
async fn unrecognized_event_types_are_ignored() {
    let app = TestApp::new().await;

    let response = app
        .deliver_webhook("payment_intent.succeeded", "pi_123")
        .await;
    assert_eq!(response.status(), 204);
}

#[tokio::test]
async fn expired_event_returns_payment_to_no_session() {
    let app = TestApp::new().await;
    let (_, token) = app.create_guest().await;
    let (order_id, session_id) = order_with_open_session(&app, &token).await;

    let response = app
        .deliver_webhook("checkout.session.expired", &session_id)
        .await;
    assert_eq!(response.status(), 204);

    let payment = Payment::find()
        .filter(payment::Column::OrderId.eq(order_id))
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert!(!payment.settled);
    assert_eq!(payment.gateway_session_id, None);

    // A settled payment ignores a late expiry.
    let reopened = app
        .request(
            Method::POST,
            &format!("/api/v1/payments/{}/checkout", order_id),
            Some(&token),
            None,
        )
        .await;
    let new_session = response_json(reopened).await["session_id"]
        .as_str()
        .unwrap()
        .to_string();
    app.deliver_webhook("checkout.session.completed", &new_session)
        .await;
    app.deliver_webhook("checkout.session.expired", &new_session)
        .await;

    let payment = Payment::find()
        .filter(payment::Column::OrderId.eq(order_id))
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert!(payment.settled);
    assert_eq!(payment.gateway_session_id.as_deref(), Some(new_session.as_str()));
}

#[tokio::test]
async fn tampered_signature_is_rejected_without_state_change() {
    let app = TestApp::new().await;
    let (_, token) = app.create_guest().await;
    let (order_id, session_id) = order_with_open_session(&app, &token).await;

    let body = json!({
        "type": "checkout.session.completed",
        "data": { "object": { "id": session_id } }
    })
    .to_string();
    let ts = Utc::now().timestamp().to_string();
    // Signed with the wrong secret.
    let signature = format!(
        "t={},v1={}",
        ts,
        compute_signature("whsec_wrong", &ts, body.as_bytes())
    );

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/webhooks/payment")
        .header(header::CONTENT_TYPE, "application/json")
        .header("Stripe-Signature", signature)
        .body(Body::from(body))
        .unwrap();
    let response = app.router_clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), 400);

    let payment = Payment::find()
        .filter(payment::Column::OrderId.eq(order_id))
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert!(!payment.settled);
}

#[tokio::test]
async fn missing_signature_is_rejected() {
    let app = TestApp::new().await;

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/webhooks/payment")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({ "type": "checkout.session.completed" }).to_string(),
        ))
        .unwrap();
    let response = app.router_clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), 400);
}
