use axum::{
    extract::{Json, Path, State},
    response::IntoResponse,
    routing::get,
    Router,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    auth::CurrentIdentity,
    errors::ServiceError,
    handlers::common::{created_response, success_response},
    services::orders::CheckoutRequest,
    AppState,
};

pub fn order_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_orders).post(place_order))
        .route("/:id", get(get_order))
}

/// Materialize the caller's cart into an order. 400 when the cart is
/// empty; nothing is written in that case.
async fn place_order(
    State(state): State<Arc<AppState>>,
    CurrentIdentity(identity): CurrentIdentity,
    Json(payload): Json<CheckoutRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let placed = state
        .services
        .orders
        .place_order(&identity, payload)
        .await?;

    Ok(created_response(placed))
}

/// List the caller's orders, newest first
async fn list_orders(
    State(state): State<Arc<AppState>>,
    CurrentIdentity(identity): CurrentIdentity,
) -> Result<impl IntoResponse, ServiceError> {
    let orders = state.services.orders.list_orders(identity.id).await?;
    Ok(success_response(orders))
}

/// Order detail, visible only to its owner or recorded guest
async fn get_order(
    State(state): State<Arc<AppState>>,
    CurrentIdentity(identity): CurrentIdentity,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let detail = state.services.orders.get_order(identity.id, id).await?;
    Ok(success_response(detail))
}
