use crate::{
    entities::{category, product, Category, CategoryModel, Product, ProductModel},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, FromQueryResult,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

pub const DEFAULT_PAGE_SIZE: u64 = 12;

/// How many products the home view shows.
pub const FEATURED_LIMIT: u64 = 8;

/// Catalog service: read-side product listing plus the admin CRUD over
/// products and categories.
#[derive(Clone)]
pub struct CatalogService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

/// Sort options for the product listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    NameAsc,
    NameDesc,
    PriceAsc,
    PriceDesc,
    #[default]
    Newest,
}

impl ProductSort {
    /// Parses a query-string sort key; unknown keys fall back to `Newest`.
    pub fn from_param(param: &str) -> Self {
        match param {
            "name_asc" => ProductSort::NameAsc,
            "name_desc" => ProductSort::NameDesc,
            "price_asc" => ProductSort::PriceAsc,
            "price_desc" => ProductSort::PriceDesc,
            _ => ProductSort::Newest,
        }
    }
}

/// Filter, sort, and pagination parameters for the product listing. Filters
/// are independently optional and compose with AND.
#[derive(Debug, Clone, Default)]
pub struct ProductListQuery {
    pub search: Option<String>,
    pub category_id: Option<Uuid>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub in_stock: bool,
    pub sort_by: ProductSort,
    pub page: u64,
    pub page_size: u64,
}

#[derive(Debug, Serialize)]
pub struct ProductListing {
    pub product: ProductModel,
    pub category: Option<CategoryModel>,
}

#[derive(Debug, Serialize)]
pub struct ProductPage {
    pub products: Vec<ProductListing>,
    pub total_products: u64,
    pub total_pages: u64,
    pub current_page: u64,
}

#[derive(Debug, Serialize)]
pub struct CategoryListing {
    pub category: CategoryModel,
    pub product_count: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateProductInput {
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub image_url: Option<String>,
    pub category_id: Option<Uuid>,
    pub stock: i32,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateProductInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub image_url: Option<String>,
    pub category_id: Option<Uuid>,
    pub stock: Option<i32>,
}

#[derive(FromQueryResult)]
struct CategoryProductCount {
    category_id: Option<Uuid>,
    count: i64,
}

impl CatalogService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Builds the filtered, sorted, paginated product listing.
    ///
    /// `total_pages` is computed over the filtered set; the requested page
    /// is clamped into `[1, total_pages]` (1 when the set is empty).
    #[instrument(skip(self))]
    pub async fn list_products(
        &self,
        query: ProductListQuery,
    ) -> Result<ProductPage, ServiceError> {
        let mut select = Product::find();

        if let Some(term) = query.search.as_deref().filter(|t| !t.is_empty()) {
            select = select.filter(
                Condition::any()
                    .add(product::Column::Name.contains(term))
                    .add(product::Column::Description.contains(term)),
            );
        }
        if let Some(category_id) = query.category_id {
            select = select.filter(product::Column::CategoryId.eq(category_id));
        }
        if let Some(min_price) = query.min_price {
            select = select.filter(product::Column::Price.gte(min_price));
        }
        if let Some(max_price) = query.max_price {
            select = select.filter(product::Column::Price.lte(max_price));
        }
        if query.in_stock {
            select = select.filter(product::Column::Stock.gt(0));
        }

        select = match query.sort_by {
            ProductSort::NameAsc => select.order_by_asc(product::Column::Name),
            ProductSort::NameDesc => select.order_by_desc(product::Column::Name),
            ProductSort::PriceAsc => select.order_by_asc(product::Column::Price),
            ProductSort::PriceDesc => select.order_by_desc(product::Column::Price),
            ProductSort::Newest => select.order_by_desc(product::Column::CreatedAt),
        };

        let page_size = if query.page_size == 0 {
            DEFAULT_PAGE_SIZE
        } else {
            query.page_size
        };

        let paginator = select
            .find_also_related(Category)
            .paginate(&*self.db, page_size);
        let totals = paginator.num_items_and_pages().await?;

        let current_page = clamp_page(query.page, totals.number_of_pages);
        let rows = paginator.fetch_page(current_page - 1).await?;

        Ok(ProductPage {
            products: rows
                .into_iter()
                .map(|(product, category)| ProductListing { product, category })
                .collect(),
            total_products: totals.number_of_items,
            total_pages: totals.number_of_pages,
            current_page,
        })
    }

    #[instrument(skip(self))]
    pub async fn get_product(&self, product_id: Uuid) -> Result<ProductModel, ServiceError> {
        Product::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))
    }

    /// All categories ordered by name, with per-category product counts for
    /// the filter sidebar and the back-office listing.
    #[instrument(skip(self))]
    pub async fn list_categories(&self) -> Result<Vec<CategoryListing>, ServiceError> {
        let categories = Category::find()
            .order_by_asc(category::Column::Name)
            .all(&*self.db)
            .await?;

        let counts: HashMap<Uuid, i64> = Product::find()
            .select_only()
            .column(product::Column::CategoryId)
            .column_as(product::Column::Id.count(), "count")
            .group_by(product::Column::CategoryId)
            .into_model::<CategoryProductCount>()
            .all(&*self.db)
            .await?
            .into_iter()
            .filter_map(|row| row.category_id.map(|id| (id, row.count)))
            .collect();

        Ok(categories
            .into_iter()
            .map(|c| {
                let product_count = counts.get(&c.id).copied().unwrap_or(0);
                CategoryListing {
                    category: c,
                    product_count,
                }
            })
            .collect())
    }

    /// Featured products for the home view: in-stock only, best-stocked
    /// first, capped at `limit`.
    #[instrument(skip(self))]
    pub async fn featured_products(
        &self,
        limit: u64,
    ) -> Result<Vec<ProductListing>, ServiceError> {
        let rows = Product::find()
            .filter(product::Column::Stock.gt(0))
            .order_by_desc(product::Column::Stock)
            .limit(limit)
            .find_also_related(Category)
            .all(&*self.db)
            .await?;
        Ok(rows
            .into_iter()
            .map(|(product, category)| ProductListing { product, category })
            .collect())
    }

    /// Products as the back-office sees them: every product, name order.
    #[instrument(skip(self))]
    pub async fn list_all_products(&self) -> Result<Vec<ProductListing>, ServiceError> {
        let rows = Product::find()
            .order_by_asc(product::Column::Name)
            .find_also_related(Category)
            .all(&*self.db)
            .await?;
        Ok(rows
            .into_iter()
            .map(|(product, category)| ProductListing { product, category })
            .collect())
    }

    #[instrument(skip(self))]
    pub async fn create_product(
        &self,
        input: CreateProductInput,
    ) -> Result<ProductModel, ServiceError> {
        validate_product_fields(&input.name, input.price, input.stock)?;
        if let Some(category_id) = input.category_id {
            self.ensure_category_exists(category_id).await?;
        }

        let product_id = Uuid::new_v4();
        let product = product::ActiveModel {
            id: Set(product_id),
            name: Set(input.name),
            description: Set(input.description),
            price: Set(input.price),
            image_url: Set(input.image_url),
            category_id: Set(input.category_id),
            stock: Set(input.stock),
            created_at: Set(Utc::now()),
        };
        let product = product.insert(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::ProductCreated(product_id))
            .await;
        info!(%product_id, "created product");
        Ok(product)
    }

    #[instrument(skip(self))]
    pub async fn update_product(
        &self,
        product_id: Uuid,
        input: UpdateProductInput,
    ) -> Result<ProductModel, ServiceError> {
        let current = self.get_product(product_id).await?;

        let name = input.name.as_deref().unwrap_or(&current.name);
        let price = input.price.unwrap_or(current.price);
        let stock = input.stock.unwrap_or(current.stock);
        validate_product_fields(name, price, stock)?;

        if let Some(category_id) = input.category_id {
            self.ensure_category_exists(category_id).await?;
        }

        let mut active: product::ActiveModel = current.into();
        if let Some(name) = input.name {
            active.name = Set(name);
        }
        if let Some(description) = input.description {
            active.description = Set(description);
        }
        if let Some(price) = input.price {
            active.price = Set(price);
        }
        if let Some(image_url) = input.image_url {
            active.image_url = Set(Some(image_url));
        }
        if let Some(category_id) = input.category_id {
            active.category_id = Set(Some(category_id));
        }
        if let Some(stock) = input.stock {
            active.stock = Set(stock);
        }

        let product = active.update(&*self.db).await?;
        self.event_sender
            .send_or_log(Event::ProductUpdated(product_id))
            .await;
        info!(%product_id, "updated product");
        Ok(product)
    }

    /// Deletes a product; absent ids are a no-op.
    #[instrument(skip(self))]
    pub async fn delete_product(&self, product_id: Uuid) -> Result<(), ServiceError> {
        let result = Product::delete_by_id(product_id).exec(&*self.db).await?;
        if result.rows_affected > 0 {
            self.event_sender
                .send_or_log(Event::ProductDeleted(product_id))
                .await;
            info!(%product_id, "deleted product");
        }
        Ok(())
    }

    /// Creates a category, or renames one when `id` is given. A rename
    /// whose target has vanished is a silent no-op (`Ok(None)`).
    #[instrument(skip(self))]
    pub async fn save_category(
        &self,
        id: Option<Uuid>,
        name: &str,
    ) -> Result<Option<CategoryModel>, ServiceError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ServiceError::ValidationError(
                "Category name must not be empty".to_string(),
            ));
        }

        let saved = match id {
            Some(category_id) => {
                let Some(existing) = Category::find_by_id(category_id).one(&*self.db).await?
                else {
                    return Ok(None);
                };
                let mut active: category::ActiveModel = existing.into();
                active.name = Set(name.to_string());
                Some(active.update(&*self.db).await?)
            }
            None => {
                let category = category::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    name: Set(name.to_string()),
                };
                Some(category.insert(&*self.db).await?)
            }
        };

        if let Some(category) = &saved {
            self.event_sender
                .send_or_log(Event::CategorySaved(category.id))
                .await;
            info!(category_id = %category.id, "saved category");
        }
        Ok(saved)
    }

    /// Deletes a category; absent ids are a no-op. Products referencing it
    /// fall back to "no category" via the set-null foreign key.
    #[instrument(skip(self))]
    pub async fn delete_category(&self, category_id: Uuid) -> Result<(), ServiceError> {
        let result = Category::delete_by_id(category_id).exec(&*self.db).await?;
        if result.rows_affected > 0 {
            self.event_sender
                .send_or_log(Event::CategoryDeleted(category_id))
                .await;
            info!(%category_id, "deleted category");
        }
        Ok(())
    }

    async fn ensure_category_exists(&self, category_id: Uuid) -> Result<(), ServiceError> {
        Category::find_by_id(category_id)
            .one(&*self.db)
            .await?
            .map(|_| ())
            .ok_or_else(|| ServiceError::NotFound(format!("Category {} not found", category_id)))
    }
}

fn validate_product_fields(name: &str, price: Decimal, stock: i32) -> Result<(), ServiceError> {
    if name.trim().is_empty() {
        return Err(ServiceError::ValidationError(
            "Product name must not be empty".to_string(),
        ));
    }
    if price <= Decimal::ZERO {
        return Err(ServiceError::ValidationError(
            "Price must be positive".to_string(),
        ));
    }
    if stock < 0 {
        return Err(ServiceError::ValidationError(
            "Stock must not be negative".to_string(),
        ));
    }
    Ok(())
}

/// Clamp a 1-based page number into the valid range for the result set.
fn clamp_page(requested: u64, total_pages: u64) -> u64 {
    if total_pages == 0 {
        return 1;
    }
    requested.clamp(1, total_pages)
}
