use axum::{extract::State, response::IntoResponse, routing::post, Router};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::{errors::ServiceError, handlers::common::created_response, AppState};

pub fn auth_routes() -> Router<Arc<AppState>> {
    Router::new().route("/guest", post(create_guest))
}

#[derive(Debug, Serialize)]
struct GuestSessionResponse {
    identity_id: Uuid,
    token: String,
    expires_in: u64,
}

/// Mint a guest identity and a bearer token for it. This is how an
/// anonymous shopper gets a cart to fill.
async fn create_guest(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ServiceError> {
    let guest = state.services.identities.create_guest().await?;
    let token = state.auth.issue_token(guest.id)?;

    Ok(created_response(GuestSessionResponse {
        identity_id: guest.id,
        token,
        expires_in: state.config.jwt_expiration,
    }))
}
