use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    auth::CurrentIdentity,
    errors::ServiceError,
    handlers::common::{created_response, success_response},
    AppState,
};

pub fn payment_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/:order_id/checkout", post(open_checkout_session))
        .route("/:order_id/checkout", get(get_checkout_session))
}

/// Open a gateway checkout session for an unpaid order. 400 when a
/// session is already open or the order is already paid.
async fn open_checkout_session(
    State(state): State<Arc<AppState>>,
    CurrentIdentity(identity): CurrentIdentity,
    Path(order_id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let session = state
        .services
        .payments
        .open_session(identity.id, order_id)
        .await?;

    Ok(created_response(session))
}

/// Re-fetch the open session so a page reload does not open a duplicate.
/// 400 when none is open or the gateway reports it expired.
async fn get_checkout_session(
    State(state): State<Arc<AppState>>,
    CurrentIdentity(identity): CurrentIdentity,
    Path(order_id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let session = state
        .services
        .payments
        .get_session(identity.id, order_id)
        .await?;

    Ok(success_response(session))
}
