//! Checkout identity resolution: guest promotion, returning-customer
//! matching and ownership isolation.

mod common;

use axum::http::Method;
use common::{guest_checkout_payload, response_json, TestApp};
use rust_decimal_macros::dec;
use sea_orm::EntityTrait;
use storefront_api::entities::{Identity, Order};
use uuid::Uuid;

#[tokio::test]
async fn guest_with_fresh_email_is_promoted_in_place() {
    let app = TestApp::new().await;
    let (guest_id, token) = app.create_guest().await;

    let variant = app.seed_variant("SKU-A", dec!(100), None, 5, None).await;
    app.add_to_cart(&token, variant.id, 1).await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/orders",
            Some(&token),
            Some(guest_checkout_payload("fresh@example.com")),
        )
        .await;
    assert_eq!(response.status(), 201);
    let placed = response_json(response).await;
    let order_id = Uuid::parse_str(placed["id"].as_str().unwrap()).unwrap();

    // Same row, now a permanent account with the checkout contact details.
    let promoted = Identity::find_by_id(guest_id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert!(!promoted.is_guest);
    assert_eq!(promoted.email, "fresh@example.com");
    assert_eq!(promoted.first_name, "Ada");

    // The order is owned by that same identity; no secondary guest ref.
    let order = Order::find_by_id(order_id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(order.identity_id, guest_id);
    assert_eq!(order.guest_identity_id, None);

    // The promoted account's token still works and sees the order.
    let detail = app
        .request(
            Method::GET,
            &format!("/api/v1/orders/{}", order_id),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(detail.status(), 200);
}

#[tokio::test]
async fn guest_matching_existing_account_is_not_promoted() {
    let app = TestApp::new().await;
    let (existing, existing_token) = app.seed_user("returning@example.com").await;
    let (guest_id, guest_token) = app.create_guest().await;

    let variant = app.seed_variant("SKU-B", dec!(100), None, 5, None).await;
    app.add_to_cart(&guest_token, variant.id, 1).await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/orders",
            Some(&guest_token),
            Some(guest_checkout_payload("returning@example.com")),
        )
        .await;
    assert_eq!(response.status(), 201);
    let placed = response_json(response).await;
    let order_id = Uuid::parse_str(placed["id"].as_str().unwrap()).unwrap();

    // The existing account owns the order; the caller stays a guest and is
    // recorded as the order's secondary reference.
    let order = Order::find_by_id(order_id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(order.identity_id, existing.id);
    assert_eq!(order.guest_identity_id, Some(guest_id));

    let guest = Identity::find_by_id(guest_id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert!(guest.is_guest);

    // Both the account and the still-logged-in guest session can see it.
    for token in [&existing_token, &guest_token] {
        let detail = app
            .request(
                Method::GET,
                &format!("/api/v1/orders/{}", order_id),
                Some(token),
                None,
            )
            .await;
        assert_eq!(detail.status(), 200);
    }

    // It appears in the account's history, not the guest's.
    let account_list = app
        .request(Method::GET, "/api/v1/orders", Some(&existing_token), None)
        .await;
    assert_eq!(response_json(account_list).await.as_array().unwrap().len(), 1);

    let guest_list = app
        .request(Method::GET, "/api/v1/orders", Some(&guest_token), None)
        .await;
    assert_eq!(response_json(guest_list).await.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn strangers_get_not_found_never_forbidden() {
    let app = TestApp::new().await;
    let (_, token) = app.create_guest().await;

    let variant = app.seed_variant("SKU-C", dec!(100), None, 5, None).await;
    app.add_to_cart(&token, variant.id, 1).await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/orders",
            Some(&token),
            Some(guest_checkout_payload("owner@example.com")),
        )
        .await;
    let placed = response_json(response).await;
    let order_id = placed["id"].as_str().unwrap().to_string();

    let (_, stranger_token) = app.seed_user("stranger@example.com").await;
    let detail = app
        .request(
            Method::GET,
            &format!("/api/v1/orders/{}", order_id),
            Some(&stranger_token),
            None,
        )
        .await;
    assert_eq!(detail.status(), 404);

    // Unauthenticated callers are rejected outright.
    let anonymous = app
        .request(Method::GET, &format!("/api/v1/orders/{}", order_id), None, None)
        .await;
    assert_eq!(anonymous.status(), 401);
}

#[tokio::test]
async fn two_accounts_are_never_created_for_one_email() {
    let app = TestApp::new().await;
    let (_, token) = app.create_guest().await;

    let variant = app.seed_variant("SKU-D", dec!(100), None, 10, None).await;
    app.add_to_cart(&token, variant.id, 1).await;

    app.request(
        Method::POST,
        "/api/v1/orders",
        Some(&token),
        Some(guest_checkout_payload("once@example.com")),
    )
    .await;

    // A second guest checks out with the same email: matched, not promoted.
    let (second_guest, second_token) = app.create_guest().await;
    app.add_to_cart(&second_token, variant.id, 1).await;
    let response = app
        .request(
            Method::POST,
            "/api/v1/orders",
            Some(&second_token),
            Some(guest_checkout_payload("once@example.com")),
        )
        .await;
    assert_eq!(response.status(), 201);

    let second = Identity::find_by_id(second_guest)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert!(second.is_guest);

    let with_email = Identity::find()
        .all(&*app.state.db)
        .await
        .unwrap()
        .into_iter()
        .filter(|i| i.email == "once@example.com")
        .count();
    assert_eq!(with_email, 1);
}
