//! Test harness: application state over an in-memory SQLite database, a
//! stub payment gateway and a counting notification sink.
#![allow(dead_code)] // each test crate uses a different subset of the harness

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request},
    response::Response,
    Router,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, Set};
use sea_orm_migration::MigratorTrait;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

use storefront_api::{
    app_router,
    config::AppConfig,
    entities::{address, identity, product_variant},
    errors::ServiceError,
    events::{process_events, EventSender},
    gateway::{
        compute_signature, CheckoutLineItem, GatewaySession, PaymentGateway, RetrievedSession,
        SessionStatus,
    },
    migrator::Migrator,
    notifications::{NotificationError, NotificationSink, OrderReceipt},
    AppState,
};

pub const WEBHOOK_SECRET: &str = "whsec_integration_test";

/// Gateway stub: hands out sequential session ids and reports whatever
/// status the test configured for a session (default: open).
pub struct StubGateway {
    counter: AtomicUsize,
    pub created: Mutex<Vec<Vec<CheckoutLineItem>>>,
    pub statuses: Mutex<HashMap<String, SessionStatus>>,
}

impl StubGateway {
    pub fn new() -> Self {
        Self {
            counter: AtomicUsize::new(0),
            created: Mutex::new(Vec::new()),
            statuses: Mutex::new(HashMap::new()),
        }
    }

    pub fn mark_expired(&self, session_id: &str) {
        self.statuses
            .lock()
            .unwrap()
            .insert(session_id.to_string(), SessionStatus::Expired);
    }

    pub fn sessions_created(&self) -> usize {
        self.created.lock().unwrap().len()
    }
}

#[async_trait]
impl PaymentGateway for StubGateway {
    async fn create_session(
        &self,
        line_items: Vec<CheckoutLineItem>,
        _success_url: &str,
        _cancel_url: &str,
    ) -> Result<GatewaySession, ServiceError> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        self.created.lock().unwrap().push(line_items);
        let id = format!("cs_test_{}", n);
        Ok(GatewaySession {
            url: format!("https://gateway.test/pay/{}", id),
            id,
        })
    }

    async fn retrieve_session(&self, session_id: &str) -> Result<RetrievedSession, ServiceError> {
        let status = self
            .statuses
            .lock()
            .unwrap()
            .get(session_id)
            .copied()
            .unwrap_or(SessionStatus::Open);
        Ok(RetrievedSession {
            id: session_id.to_string(),
            url: Some(format!("https://gateway.test/pay/{}", session_id)),
            status,
        })
    }
}

/// Notification sink that records every delivered receipt.
pub struct CountingSink {
    pub receipts: Mutex<Vec<OrderReceipt>>,
}

#[async_trait]
impl NotificationSink for CountingSink {
    async fn deliver(&self, receipt: &OrderReceipt) -> Result<(), NotificationError> {
        self.receipts.lock().unwrap().push(receipt.clone());
        Ok(())
    }
}

fn test_config() -> AppConfig {
    AppConfig {
        database_url: "sqlite::memory:".into(),
        db_max_connections: 1,
        db_min_connections: 1,
        auto_migrate: true,
        jwt_secret: "test_secret_key_for_testing_purposes_only".into(),
        jwt_expiration: 3600,
        host: "127.0.0.1".into(),
        port: 0,
        environment: "test".into(),
        log_level: "warn".into(),
        log_json: false,
        gateway_api_base: "https://gateway.test/v1".into(),
        gateway_secret_key: "sk_test".into(),
        gateway_webhook_secret: WEBHOOK_SECRET.into(),
        gateway_webhook_tolerance_secs: 300,
        checkout_success_url: "https://shop.test/orders".into(),
        checkout_cancel_url: "https://shop.test/cart".into(),
        cors_allowed_origins: None,
    }
}

/// Application harness over a fresh in-memory database.
pub struct TestApp {
    router: Router,
    pub state: Arc<AppState>,
    pub gateway: Arc<StubGateway>,
    pub sink: Arc<CountingSink>,
}

impl TestApp {
    pub async fn new() -> Self {
        let mut opt = ConnectOptions::new("sqlite::memory:");
        opt.max_connections(1).sqlx_logging(false);
        let db = Database::connect(opt)
            .await
            .expect("failed to open in-memory database");
        Migrator::up(&db, None)
            .await
            .expect("failed to run migrations");
        let db = Arc::new(db);

        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = EventSender::new(event_tx);

        let sink = Arc::new(CountingSink {
            receipts: Mutex::new(Vec::new()),
        });
        tokio::spawn(process_events(event_rx, sink.clone()));

        let gateway = Arc::new(StubGateway::new());

        let state = Arc::new(AppState::new(
            db,
            test_config(),
            event_sender,
            gateway.clone(),
        ));
        let router = app_router(state.clone());

        Self {
            router,
            state,
            gateway,
            sink,
        }
    }

    pub fn router_clone(&self) -> Router {
        self.router.clone()
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }

        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("request failed")
    }

    /// Mints a guest session via the API.
    pub async fn create_guest(&self) -> (Uuid, String) {
        let response = self
            .request(Method::POST, "/api/v1/auth/guest", None, None)
            .await;
        assert_eq!(response.status(), 201);
        let body = response_json(response).await;
        (
            Uuid::parse_str(body["identity_id"].as_str().unwrap()).unwrap(),
            body["token"].as_str().unwrap().to_string(),
        )
    }

    /// Seeds a permanent account directly and returns it with a token.
    pub async fn seed_user(&self, email: &str) -> (identity::Model, String) {
        let user = identity::ActiveModel {
            id: Set(Uuid::new_v4()),
            email: Set(email.to_string()),
            first_name: Set("Test".into()),
            last_name: Set("User".into()),
            password_hash: Set("test-hash".into()),
            is_guest: Set(false),
            is_active: Set(true),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.state.db)
        .await
        .expect("failed to seed user");

        let token = self.state.auth.issue_token(user.id).unwrap();
        (user, token)
    }

    pub async fn seed_variant(
        &self,
        sku: &str,
        unit_price: Decimal,
        discount_percent: Option<i32>,
        available_qty: i32,
        gateway_price_id: Option<&str>,
    ) -> product_variant::Model {
        product_variant::ActiveModel {
            id: Set(Uuid::new_v4()),
            sku: Set(sku.to_string()),
            display_name: Set(format!("Variant {}", sku)),
            unit_price: Set(unit_price),
            discount_percent: Set(discount_percent),
            available_qty: Set(available_qty),
            gateway_price_id: Set(gateway_price_id.map(str::to_string)),
        }
        .insert(&*self.state.db)
        .await
        .expect("failed to seed variant")
    }

    pub async fn seed_address(&self, identity_id: Uuid) -> address::Model {
        address::ActiveModel {
            id: Set(Uuid::new_v4()),
            identity_id: Set(identity_id),
            first_name: Set("Ada".into()),
            last_name: Set("Lovelace".into()),
            region: Set("Greater London".into()),
            street: Set("12 St James Sq".into()),
            unit_number: Set(None),
            city: Set("London".into()),
            country: Set("UK".into()),
            phone_number: Set(Some("+44 20 0000 0000".into())),
        }
        .insert(&*self.state.db)
        .await
        .expect("failed to seed address")
    }

    pub async fn add_to_cart(&self, token: &str, variant_id: Uuid, quantity: i32) {
        let response = self
            .request(
                Method::POST,
                "/api/v1/cart/items",
                Some(token),
                Some(json!({ "variant_id": variant_id, "quantity": quantity })),
            )
            .await;
        assert_eq!(response.status(), 201, "add_to_cart failed");
    }

    /// Delivers a signed webhook event and returns the response.
    pub async fn deliver_webhook(&self, event_type: &str, session_id: &str) -> Response {
        let body = json!({
            "id": format!("evt_{}", Uuid::new_v4().simple()),
            "type": event_type,
            "data": { "object": { "id": session_id } }
        })
        .to_string();
        let ts = Utc::now().timestamp().to_string();
        let signature = format!(
            "t={},v1={}",
            ts,
            compute_signature(WEBHOOK_SECRET, &ts, body.as_bytes())
        );

        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/v1/webhooks/payment")
            .header(header::CONTENT_TYPE, "application/json")
            .header("Stripe-Signature", signature)
            .body(Body::from(body))
            .unwrap();

        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("webhook request failed")
    }

    /// Waits for the event worker to drain up to `n` receipt deliveries.
    pub async fn wait_for_receipts(&self, n: usize) -> usize {
        for _ in 0..100 {
            let len = self.sink.receipts.lock().unwrap().len();
            if len >= n {
                return len;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.sink.receipts.lock().unwrap().len()
    }
}

/// Guest checkout payload with a fresh shipping address.
pub fn guest_checkout_payload(email: &str) -> Value {
    json!({
        "kind": "guest",
        "email": email,
        "shipping_address": {
            "first_name": "Ada",
            "last_name": "Lovelace",
            "region": "Greater London",
            "street": "12 St James Sq",
            "city": "London",
            "country": "UK"
        },
        "shipping_method": "ups",
        "payment_method": "card"
    })
}

pub async fn response_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}
