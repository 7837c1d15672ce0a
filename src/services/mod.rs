//! Domain services for the order engine.

pub mod carts;
pub mod catalog;
pub mod identities;
pub mod orders;
pub mod payments;
pub mod settlement;

use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::{config::AppConfig, events::EventSender, gateway::PaymentGateway};

/// Aggregated services shared by the HTTP handlers.
#[derive(Clone)]
pub struct AppServices {
    pub catalog: Arc<catalog::CatalogService>,
    pub carts: Arc<carts::CartService>,
    pub identities: Arc<identities::IdentityService>,
    pub orders: Arc<orders::OrderService>,
    pub payments: Arc<payments::PaymentService>,
    pub settlement: Arc<settlement::SettlementService>,
}

impl AppServices {
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: &AppConfig,
        event_sender: EventSender,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        let catalog = Arc::new(catalog::CatalogService::new());
        let carts = Arc::new(carts::CartService::new(db.clone(), catalog.clone()));
        let identities = Arc::new(identities::IdentityService::new(
            db.clone(),
            event_sender.clone(),
        ));
        let orders = Arc::new(orders::OrderService::new(
            db.clone(),
            catalog.clone(),
            identities.clone(),
            event_sender.clone(),
        ));
        let payments = Arc::new(payments::PaymentService::new(
            db.clone(),
            catalog.clone(),
            gateway,
            event_sender.clone(),
            config.checkout_success_url.clone(),
            config.checkout_cancel_url.clone(),
        ));
        let settlement = Arc::new(settlement::SettlementService::new(db, event_sender));

        Self {
            catalog,
            carts,
            identities,
            orders,
            payments,
            settlement,
        }
    }
}
