use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
    Router,
};
use bytes::Bytes;
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

use crate::{errors::ServiceError, gateway::verify_webhook_signature, AppState};

pub fn webhook_routes() -> Router<Arc<AppState>> {
    Router::new().route("/payment", post(payment_webhook))
}

/// Inbound payment gateway webhook.
///
/// Authenticates by signature, not by bearer token. Responds 204 to every
/// accepted event — including unknown sessions and duplicates — because
/// any error status makes the gateway retry; 400 is reserved for payloads
/// that fail signature verification or cannot be parsed at all.
async fn payment_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ServiceError> {
    let signature = headers
        .get("Stripe-Signature")
        .and_then(|v| v.to_str().ok());

    verify_webhook_signature(
        signature,
        &body,
        &state.config.gateway_webhook_secret,
        state.config.gateway_webhook_tolerance_secs,
    )
    .map_err(|e| {
        warn!("Payment webhook signature verification failed");
        e
    })?;

    let event: Value = serde_json::from_slice(&body)
        .map_err(|e| ServiceError::ValidationError(format!("invalid webhook payload: {}", e)))?;

    let event_type = event.get("type").and_then(|v| v.as_str()).unwrap_or("");
    let session_id = event
        .pointer("/data/object/id")
        .and_then(|v| v.as_str())
        .unwrap_or("");

    state
        .services
        .settlement
        .handle_event(event_type, session_id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
