use crate::{
    auth::Identity,
    entities::{cart_item, CartItem, CartItemModel, Category, CategoryModel, Product, ProductModel},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, FromQueryResult,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Largest quantity accepted for a single add-to-cart request, and the cap
/// applied when merging guest lines into a user cart.
pub const MAX_LINE_QUANTITY: i32 = 100;

/// Quantity bounds enforced by the +/- controls on the cart page.
pub const MIN_QUANTITY: i32 = 1;
pub const MAX_QUANTITY: i32 = 10;

/// Cart service owning the CartItem lifecycle: add, adjust, remove, clear,
/// count, view, and the login-time guest merge.
#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

/// Result of a cart mutation: the recomputed owned item count, for the
/// cart badge.
#[derive(Debug, Serialize)]
pub struct CartMutation {
    pub count: i64,
}

/// One cart line joined with its product and the product's category.
#[derive(Debug, Serialize)]
pub struct CartLine {
    pub item: CartItemModel,
    pub product: Option<ProductModel>,
    pub category: Option<CategoryModel>,
}

/// Cart view: lines newest-first plus the running total.
#[derive(Debug, Serialize)]
pub struct CartView {
    pub items: Vec<CartLine>,
    pub total: Decimal,
}

#[derive(FromQueryResult)]
struct QuantitySum {
    total: Option<i64>,
}

impl CartService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Ownership predicate used by every cart lookup: a row belongs to the
    /// request if it matches the user id OR the guest session id.
    fn owner_condition(identity: &Identity) -> Condition {
        Condition::any()
            .add_option(identity.user_id.map(|uid| cart_item::Column::UserId.eq(uid)))
            .add_option(
                identity
                    .session_id
                    .as_deref()
                    .map(|sid| cart_item::Column::SessionId.eq(sid)),
            )
    }

    fn has_owner_key(identity: &Identity) -> bool {
        identity.user_id.is_some() || identity.session_id.is_some()
    }

    /// Sum of quantities across the identity's cart rows.
    ///
    /// Propagates lookup failures; the cart-count endpoint fail-opens to 0
    /// at the edge.
    #[instrument(skip(self))]
    pub async fn item_count(&self, identity: &Identity) -> Result<i64, ServiceError> {
        if !Self::has_owner_key(identity) {
            return Ok(0);
        }

        let sum = CartItem::find()
            .select_only()
            .column_as(cart_item::Column::Quantity.sum(), "total")
            .filter(Self::owner_condition(identity))
            .into_model::<QuantitySum>()
            .one(&*self.db)
            .await?;

        Ok(sum.and_then(|s| s.total).unwrap_or(0))
    }

    /// Adds a product to the cart, incrementing an existing owned line for
    /// the same product when one exists. The combined line is capped at
    /// MAX_LINE_QUANTITY, the same ceiling the merge path applies.
    ///
    /// Stock is validated against the requested quantity only, not the
    /// resulting line total; checkout re-validates every line against live
    /// stock anyway.
    #[instrument(skip(self))]
    pub async fn add_item(
        &self,
        identity: &Identity,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<CartMutation, ServiceError> {
        if !(MIN_QUANTITY..=MAX_LINE_QUANTITY).contains(&quantity) {
            return Err(ServiceError::ValidationError(format!(
                "Quantity must be between {} and {}",
                MIN_QUANTITY, MAX_LINE_QUANTITY
            )));
        }
        if !Self::has_owner_key(identity) {
            return Err(ServiceError::InvalidOperation(
                "Request carries no cart identity".to_string(),
            ));
        }

        let product = Product::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        if product.stock < quantity {
            return Err(ServiceError::InsufficientStock(product.name.clone()));
        }

        let existing = CartItem::find()
            .filter(cart_item::Column::ProductId.eq(product_id))
            .filter(Self::owner_condition(identity))
            .one(&*self.db)
            .await?;

        let (item_id, new_quantity) = if let Some(item) = existing {
            let item_id = item.id;
            let new_quantity = item
                .quantity
                .saturating_add(quantity)
                .min(MAX_LINE_QUANTITY);
            let mut item: cart_item::ActiveModel = item.into();
            item.quantity = Set(new_quantity);
            item.update(&*self.db).await?;
            (item_id, new_quantity)
        } else {
            let item_id = Uuid::new_v4();
            let item = cart_item::ActiveModel {
                id: Set(item_id),
                product_id: Set(product_id),
                quantity: Set(quantity),
                session_id: Set(identity.session_id.clone()),
                user_id: Set(identity.user_id),
                added_at: Set(Utc::now()),
            };
            item.insert(&*self.db).await?;
            (item_id, quantity)
        };

        self.event_sender
            .send_or_log(Event::CartItemAdded {
                cart_item_id: item_id,
                product_id,
                quantity,
            })
            .await;

        info!(%product_id, new_quantity, "added item to cart");

        let count = self.item_count(identity).await?;
        Ok(CartMutation { count })
    }

    /// Applies a quantity delta to a cart line, clamping the result into
    /// [MIN_QUANTITY, MAX_QUANTITY]. A missing line is a no-op; a result
    /// above the product's current stock is rejected with the stored
    /// quantity unchanged.
    #[instrument(skip(self))]
    pub async fn update_quantity(
        &self,
        cart_item_id: Uuid,
        delta: i32,
    ) -> Result<(), ServiceError> {
        let Some((item, product)) = CartItem::find_by_id(cart_item_id)
            .find_also_related(Product)
            .one(&*self.db)
            .await?
        else {
            return Ok(());
        };
        let Some(product) = product else {
            return Ok(());
        };

        let new_quantity = clamp_quantity(item.quantity.saturating_add(delta));

        if product.stock < new_quantity {
            return Err(ServiceError::InsufficientStock(product.name));
        }

        let mut item: cart_item::ActiveModel = item.into();
        item.quantity = Set(new_quantity);
        item.update(&*self.db).await?;
        Ok(())
    }

    /// Removes a cart line. Deleting an absent id is a no-op, not an error.
    #[instrument(skip(self))]
    pub async fn remove_item(&self, cart_item_id: Uuid) -> Result<(), ServiceError> {
        let result = CartItem::delete_by_id(cart_item_id).exec(&*self.db).await?;
        if result.rows_affected > 0 {
            self.event_sender
                .send_or_log(Event::CartItemRemoved(cart_item_id))
                .await;
        }
        Ok(())
    }

    /// Deletes every cart row owned by the identity.
    #[instrument(skip(self))]
    pub async fn clear(&self, identity: &Identity) -> Result<(), ServiceError> {
        if !Self::has_owner_key(identity) {
            return Ok(());
        }

        let result = CartItem::delete_many()
            .filter(Self::owner_condition(identity))
            .exec(&*self.db)
            .await?;

        if result.rows_affected > 0 {
            self.event_sender
                .send_or_log(Event::CartCleared {
                    items_removed: result.rows_affected,
                })
                .await;
            info!(items_removed = result.rows_affected, "cleared cart");
        }
        Ok(())
    }

    /// Loads the identity's cart: lines newest-first, each joined with its
    /// product and category, plus the total. A line whose product is gone
    /// contributes price 0 rather than failing the page.
    #[instrument(skip(self))]
    pub async fn get_cart(&self, identity: &Identity) -> Result<CartView, ServiceError> {
        if !Self::has_owner_key(identity) {
            return Ok(CartView {
                items: Vec::new(),
                total: Decimal::ZERO,
            });
        }

        let rows = CartItem::find()
            .filter(Self::owner_condition(identity))
            .order_by_desc(cart_item::Column::AddedAt)
            .find_also_related(Product)
            .all(&*self.db)
            .await?;

        let category_ids: Vec<Uuid> = rows
            .iter()
            .filter_map(|(_, p)| p.as_ref().and_then(|p| p.category_id))
            .collect();
        let categories: HashMap<Uuid, CategoryModel> = if category_ids.is_empty() {
            HashMap::new()
        } else {
            Category::find()
                .filter(crate::entities::category::Column::Id.is_in(category_ids))
                .all(&*self.db)
                .await?
                .into_iter()
                .map(|c| (c.id, c))
                .collect()
        };

        let mut total = Decimal::ZERO;
        let items = rows
            .into_iter()
            .map(|(item, product)| {
                let price = product.as_ref().map(|p| p.price).unwrap_or(Decimal::ZERO);
                total += price * Decimal::from(item.quantity);
                let category = product
                    .as_ref()
                    .and_then(|p| p.category_id)
                    .and_then(|cid| categories.get(&cid).cloned());
                CartLine {
                    item,
                    product,
                    category,
                }
            })
            .collect();

        Ok(CartView { items, total })
    }

    /// Folds guest-session cart rows into the authenticated user's cart.
    ///
    /// On product collision the quantities are summed (capped at
    /// MAX_LINE_QUANTITY) and the guest row deleted; otherwise the row is
    /// reassigned to the user. Runs in one transaction so a returning guest
    /// never sees a half-merged cart.
    #[instrument(skip(self))]
    pub async fn merge_guest_cart(
        &self,
        user_id: Uuid,
        session_id: &str,
    ) -> Result<u64, ServiceError> {
        let txn = self.db.begin().await?;

        let guest_items = CartItem::find()
            .filter(cart_item::Column::SessionId.eq(session_id))
            .filter(cart_item::Column::UserId.is_null())
            .all(&txn)
            .await?;

        if guest_items.is_empty() {
            txn.commit().await?;
            return Ok(0);
        }

        let user_items: HashMap<Uuid, CartItemModel> = CartItem::find()
            .filter(cart_item::Column::UserId.eq(user_id))
            .all(&txn)
            .await?
            .into_iter()
            .map(|i| (i.product_id, i))
            .collect();

        let merged = guest_items.len() as u64;
        for guest in guest_items {
            if let Some(owned) = user_items.get(&guest.product_id) {
                let combined = owned
                    .quantity
                    .saturating_add(guest.quantity)
                    .min(MAX_LINE_QUANTITY);
                let mut owned: cart_item::ActiveModel = owned.clone().into();
                owned.quantity = Set(combined);
                owned.update(&txn).await?;
                CartItem::delete_by_id(guest.id).exec(&txn).await?;
            } else {
                let mut guest: cart_item::ActiveModel = guest.into();
                guest.user_id = Set(Some(user_id));
                guest.session_id = Set(None);
                guest.update(&txn).await?;
            }
        }

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartMerged {
                user_id,
                items_merged: merged,
            })
            .await;

        info!(%user_id, items_merged = merged, "merged guest cart");
        Ok(merged)
    }
}

/// Clamp a cart quantity into the range the cart page allows.
fn clamp_quantity(quantity: i32) -> i32 {
    quantity.clamp(MIN_QUANTITY, MAX_QUANTITY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn quantity_clamps_into_allowed_range() {
        assert_eq!(clamp_quantity(0), 1);
        assert_eq!(clamp_quantity(-5), 1);
        assert_eq!(clamp_quantity(1), 1);
        assert_eq!(clamp_quantity(7), 7);
        assert_eq!(clamp_quantity(10), 10);
        assert_eq!(clamp_quantity(11), 10);
        assert_eq!(clamp_quantity(i32::MAX), 10);
    }

    #[test]
    fn owner_condition_matches_user_or_session() {
        let both = Identity {
            user_id: Some(Uuid::new_v4()),
            session_id: Some("sess-1".to_string()),
        };
        // Two alternatives when both keys are present, one otherwise.
        assert_eq!(CartService::owner_condition(&both).len(), 2);
        assert_eq!(
            CartService::owner_condition(&Identity::for_session("sess-1")).len(),
            1
        );
        assert!(CartService::has_owner_key(&both));
        assert!(!CartService::has_owner_key(&Identity::default()));
    }

    #[test]
    fn line_total_uses_zero_for_missing_product() {
        let price = None::<Decimal>.unwrap_or(Decimal::ZERO);
        assert_eq!(price * Decimal::from(3), Decimal::ZERO);

        let price = Some(dec!(19.99)).unwrap_or(Decimal::ZERO);
        assert_eq!(price * Decimal::from(3), dec!(59.97));
    }

    #[test]
    fn merge_cap_respects_line_maximum() {
        let combined = 70i32.saturating_add(80).min(MAX_LINE_QUANTITY);
        assert_eq!(combined, 100);
        let combined = 2i32.saturating_add(3).min(MAX_LINE_QUANTITY);
        assert_eq!(combined, 5);
    }
}
