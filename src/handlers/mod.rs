//! HTTP handlers, one router per domain.

pub mod auth;
pub mod carts;
pub mod common;
pub mod health;
pub mod orders;
pub mod payment_webhooks;
pub mod payments;

use axum::Router;
use std::sync::Arc;

use crate::AppState;

/// Versioned API surface.
pub fn api_v1_routes() -> Router<Arc<AppState>> {
    Router::new()
        .nest("/auth", auth::auth_routes())
        .nest("/cart", carts::cart_routes())
        .nest("/orders", orders::order_routes())
        .nest("/payments", payments::payment_routes())
        .nest("/webhooks", payment_webhooks::webhook_routes())
}
