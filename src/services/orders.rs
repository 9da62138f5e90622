use crate::{
    entities::{order, order_item, Order, OrderItem, OrderItemModel, OrderModel, OrderStatus, Product},
    errors::ServiceError,
    events::{Event, EventSender},
};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, FromQueryResult,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

const RECENT_ORDERS_LIMIT: u64 = 10;

/// Order read side plus the one post-creation mutation: validated status
/// transitions.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

#[derive(Debug, Serialize)]
pub struct OrderWithItems {
    pub order: OrderModel,
    pub items: Vec<OrderItemModel>,
}

/// Aggregates for the back-office dashboard.
#[derive(Debug, Serialize)]
pub struct DashboardStats {
    pub total_products: u64,
    pub total_orders: u64,
    pub total_users: u64,
    pub total_revenue: Decimal,
    pub recent_orders: Vec<OrderWithItems>,
}

#[derive(FromQueryResult)]
struct RevenueSum {
    total: Option<Decimal>,
}

impl OrderService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Every order with its items, newest first.
    #[instrument(skip(self))]
    pub async fn list_orders(&self) -> Result<Vec<OrderWithItems>, ServiceError> {
        let rows = Order::find()
            .order_by_desc(order::Column::OrderDate)
            .find_with_related(OrderItem)
            .all(&*self.db)
            .await?;
        Ok(rows
            .into_iter()
            .map(|(order, items)| OrderWithItems { order, items })
            .collect())
    }

    /// The user's own orders for the profile view, newest first.
    #[instrument(skip(self))]
    pub async fn orders_for_user(&self, user_id: Uuid) -> Result<Vec<OrderWithItems>, ServiceError> {
        let rows = Order::find()
            .filter(order::Column::UserId.eq(user_id))
            .order_by_desc(order::Column::OrderDate)
            .find_with_related(OrderItem)
            .all(&*self.db)
            .await?;
        Ok(rows
            .into_iter()
            .map(|(order, items)| OrderWithItems { order, items })
            .collect())
    }

    #[instrument(skip(self))]
    pub async fn get_order(&self, order_id: Uuid) -> Result<OrderWithItems, ServiceError> {
        let order = Order::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;
        let items = OrderItem::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(&*self.db)
            .await?;
        Ok(OrderWithItems { order, items })
    }

    /// Moves an order to a new status.
    ///
    /// Setting the status it already has is an idempotent no-op; anything
    /// not in the transition table is rejected without touching the row.
    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        order_id: Uuid,
        new_status: OrderStatus,
    ) -> Result<OrderModel, ServiceError> {
        let order = Order::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let old_status = order.status;
        if old_status == new_status {
            return Ok(order);
        }
        if !old_status.can_transition_to(new_status) {
            return Err(ServiceError::InvalidStatus(format!(
                "Cannot move order from '{}' to '{}'",
                old_status, new_status
            )));
        }

        let mut active: order::ActiveModel = order.into();
        active.status = Set(new_status);
        let updated = active.update(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::OrderStatusChanged {
                order_id,
                old_status,
                new_status,
            })
            .await;
        info!(%order_id, %old_status, %new_status, "order status changed");
        Ok(updated)
    }

    /// Dashboard aggregates. The user count comes from the external
    /// identity store, so the caller supplies it.
    #[instrument(skip(self))]
    pub async fn dashboard(&self, total_users: u64) -> Result<DashboardStats, ServiceError> {
        let total_products = Product::find().count(&*self.db).await?;
        let total_orders = Order::find().count(&*self.db).await?;

        let revenue = Order::find()
            .select_only()
            .column_as(order::Column::TotalAmount.sum(), "total")
            .into_model::<RevenueSum>()
            .one(&*self.db)
            .await?;
        let total_revenue = revenue.and_then(|r| r.total).unwrap_or(Decimal::ZERO);

        let recent = Order::find()
            .order_by_desc(order::Column::OrderDate)
            .limit(RECENT_ORDERS_LIMIT)
            .find_with_related(OrderItem)
            .all(&*self.db)
            .await?;

        Ok(DashboardStats {
            total_products,
            total_orders,
            total_users,
            total_revenue,
            recent_orders: recent
                .into_iter()
                .map(|(order, items)| OrderWithItems { order, items })
                .collect(),
        })
    }
}
