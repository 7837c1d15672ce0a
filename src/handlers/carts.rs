use axum::{
    extract::{Json, Path, State},
    response::IntoResponse,
    routing::{delete, get, post, put},
    Router,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::CurrentIdentity,
    errors::ServiceError,
    handlers::common::{created_response, no_content_response, success_response, validate_input},
    AppState,
};

pub fn cart_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_cart))
        .route("/items", post(add_item))
        .route("/items/:item_id", put(update_item))
        .route("/items/:item_id", delete(remove_item))
}

/// Get the caller's cart with current pricing
async fn list_cart(
    State(state): State<Arc<AppState>>,
    CurrentIdentity(identity): CurrentIdentity,
) -> Result<impl IntoResponse, ServiceError> {
    let lines = state.services.carts.list(identity.id).await?;
    Ok(success_response(lines))
}

/// Add a variant to the caller's cart
async fn add_item(
    State(state): State<Arc<AppState>>,
    CurrentIdentity(identity): CurrentIdentity,
    Json(payload): Json<AddItemRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;

    let item = state
        .services
        .carts
        .add_item(identity.id, payload.variant_id, payload.quantity)
        .await?;

    Ok(created_response(item))
}

/// Replace a cart line's quantity
async fn update_item(
    State(state): State<Arc<AppState>>,
    CurrentIdentity(identity): CurrentIdentity,
    Path(item_id): Path<Uuid>,
    Json(payload): Json<UpdateQuantityRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;

    let item = state
        .services
        .carts
        .update_item(identity.id, item_id, payload.quantity)
        .await?;

    Ok(success_response(item))
}

/// Remove a line from the caller's cart
async fn remove_item(
    State(state): State<Arc<AppState>>,
    CurrentIdentity(identity): CurrentIdentity,
    Path(item_id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    state
        .services
        .carts
        .remove_item(identity.id, item_id)
        .await?;

    Ok(no_content_response())
}

// Request DTOs

#[derive(Debug, Deserialize, Validate)]
pub struct AddItemRequest {
    pub variant_id: Uuid,
    #[validate(range(min = 1))]
    pub quantity: i32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateQuantityRequest {
    #[validate(range(min = 1))]
    pub quantity: i32,
}
