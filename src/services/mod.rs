//! Service layer: business logic between the HTTP handlers and the
//! persistence gateway.

pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod orders;

use crate::events::EventSender;
use sea_orm::DatabaseConnection;
use std::sync::Arc;

pub use cart::CartService;
pub use catalog::CatalogService;
pub use checkout::CheckoutService;
pub use orders::OrderService;

/// Bundle of all services handed to the HTTP layer through `AppState`.
#[derive(Clone)]
pub struct AppServices {
    pub cart: Arc<CartService>,
    pub catalog: Arc<CatalogService>,
    pub checkout: Arc<CheckoutService>,
    pub orders: Arc<OrderService>,
}

impl AppServices {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self {
            cart: Arc::new(CartService::new(db.clone(), event_sender.clone())),
            catalog: Arc::new(CatalogService::new(db.clone(), event_sender.clone())),
            checkout: Arc::new(CheckoutService::new(db.clone(), event_sender.clone())),
            orders: Arc::new(OrderService::new(db, event_sender)),
        }
    }
}
