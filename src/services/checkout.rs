use crate::{
    auth::Identity,
    entities::{cart_item, order, order_item, CartItem, OrderStatus, Product},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Checkout orchestrator: converts the authenticated user's cart into an
/// order in a single transaction.
#[derive(Clone)]
pub struct CheckoutService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl CheckoutService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Converts the user's cart into an order.
    ///
    /// Guest-session lines never check out: the cart is resolved by user id
    /// only, so authentication is required here even though adding to the
    /// cart is not. Every line is re-validated against live stock, totals
    /// and per-line prices are taken from the product at this moment (not
    /// from any cached cart price), and order creation, stock decrement,
    /// and cart deletion commit together or not at all.
    #[instrument(skip(self))]
    pub async fn checkout(&self, identity: &Identity) -> Result<order::Model, ServiceError> {
        let user_id = identity.require_user()?;

        let txn = self.db.begin().await?;

        let lines = CartItem::find()
            .filter(cart_item::Column::UserId.eq(user_id))
            .find_also_related(Product)
            .all(&txn)
            .await?;

        if lines.is_empty() {
            return Err(ServiceError::EmptyCart);
        }

        // Validate the whole cart before touching anything; the first
        // violation aborts with nothing written.
        for (item, product) in &lines {
            let product = product.as_ref().ok_or_else(|| {
                ServiceError::NotFound(format!("Product {} no longer exists", item.product_id))
            })?;
            if product.stock < item.quantity {
                return Err(ServiceError::InsufficientStock(product.name.clone()));
            }
        }

        let total_amount: Decimal = lines
            .iter()
            .map(|(item, product)| {
                // Presence checked above.
                let price = product.as_ref().map(|p| p.price).unwrap_or(Decimal::ZERO);
                price * Decimal::from(item.quantity)
            })
            .sum();

        let order_id = Uuid::new_v4();
        let order = order::ActiveModel {
            id: Set(order_id),
            user_id: Set(user_id),
            total_amount: Set(total_amount),
            order_date: Set(Utc::now()),
            status: Set(OrderStatus::AwaitingPayment),
        };
        let order = order.insert(&txn).await?;

        for (item, product) in &lines {
            let Some(product) = product.as_ref() else {
                // Presence was validated above; bail rather than guess.
                return Err(ServiceError::NotFound(format!(
                    "Product {} no longer exists",
                    item.product_id
                )));
            };

            let order_item = order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(item.product_id),
                quantity: Set(item.quantity),
                // Snapshot: later price changes must not touch this order.
                price: Set(product.price),
            };
            order_item.insert(&txn).await?;

            let remaining = product.stock - item.quantity;
            let mut active: crate::entities::product::ActiveModel = product.clone().into();
            active.stock = Set(remaining);
            active.update(&txn).await?;
        }

        CartItem::delete_many()
            .filter(cart_item::Column::UserId.eq(user_id))
            .exec(&txn)
            .await?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::OrderCreated(order_id))
            .await;

        info!(%order_id, %user_id, %total_amount, "checkout completed");
        Ok(order)
    }
}
