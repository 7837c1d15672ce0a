//! Storefront API Library
//!
//! Cart checkout, order placement and payment reconciliation for the
//! storefront backend.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod gateway;
pub mod handlers;
pub mod migrator;
pub mod notifications;
pub mod services;

use axum::{routing::get, Router};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::warn;

use crate::{config::AppConfig, events::EventSender, gateway::PaymentGateway};

/// Shared application state.
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<AppConfig>,
    pub auth: auth::AuthService,
    pub event_sender: EventSender,
    pub services: services::AppServices,
}

impl AppState {
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: AppConfig,
        event_sender: EventSender,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        let auth = auth::AuthService::new(config.jwt_secret.clone(), config.jwt_expiration);
        let services = services::AppServices::new(db.clone(), &config, event_sender.clone(), gateway);

        Self {
            db,
            config: Arc::new(config),
            auth,
            event_sender,
            services,
        }
    }
}

/// Builds the full application router: root, health, versioned API and the
/// shared middleware stack.
pub fn app_router(state: Arc<AppState>) -> Router {
    let cors = build_cors(&state.config);

    Router::new()
        .route("/", get(|| async { "storefront-api up" }))
        .merge(handlers::health::health_routes())
        .nest("/api/v1", handlers::api_v1_routes())
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(cors)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .with_state(state)
}

fn build_cors(config: &AppConfig) -> CorsLayer {
    let configured: Option<Vec<http::HeaderValue>> = config
        .cors_allowed_origins
        .as_ref()
        .map(|raw| {
            raw.split(',')
                .filter_map(|origin| {
                    let trimmed = origin.trim();
                    if trimmed.is_empty() {
                        None
                    } else {
                        http::HeaderValue::from_str(trimmed).ok()
                    }
                })
                .collect::<Vec<_>>()
        })
        .filter(|origins| !origins.is_empty());

    match configured {
        Some(origins) => CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any),
        None => {
            if !config.is_development() {
                warn!("No CORS origins configured; falling back to permissive CORS");
            }
            CorsLayer::permissive()
        }
    }
}
