use crate::handlers::common::{created_response, no_content_response, success_response, validate_input};
use crate::{
    auth::AdminUser,
    entities::{order, Order, OrderStatus},
    errors::ApiError,
    services::catalog::{CreateProductInput, UpdateProductInput},
    ApiResponse, AppState,
};
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{delete, get, post, put},
    Json, Router,
};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, EntityTrait, FromQueryResult, QuerySelect};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

/// Creates the router for the admin back-office. Every handler takes the
/// `AdminUser` guard; role enforcement itself lives upstream.
pub fn admin_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route("/products", get(list_products))
        .route("/products", post(create_product))
        .route("/products/:product_id", put(update_product))
        .route("/products/:product_id", delete(delete_product))
        .route("/categories", get(list_categories))
        .route("/categories", post(save_category))
        .route("/categories/:category_id", delete(delete_category))
        .route("/orders", get(list_orders))
        .route("/orders/:order_id/status", put(update_order_status))
        .route("/users", get(list_users))
        .route("/users/:user_id/toggle-admin", post(toggle_admin))
}

async fn dashboard(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
) -> Result<impl IntoResponse, ApiError> {
    let total_users = state.users.count_users().await?;
    let stats = state.services.orders.dashboard(total_users).await?;
    Ok(success_response(stats))
}

async fn list_products(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
) -> Result<impl IntoResponse, ApiError> {
    let products = state.services.catalog.list_all_products().await?;
    Ok(success_response(products))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProductRequest {
    #[validate(length(min = 1))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    pub image_url: Option<String>,
    pub category_id: Option<Uuid>,
    #[validate(range(min = 0))]
    pub stock: i32,
}

async fn create_product(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Json(payload): Json<CreateProductRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let input = CreateProductInput {
        name: payload.name,
        description: payload.description,
        price: payload.price,
        image_url: payload.image_url,
        category_id: payload.category_id,
        stock: payload.stock,
    };
    let product = state.services.catalog.create_product(input).await?;
    Ok(created_response(product))
}

async fn update_product(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(product_id): Path<Uuid>,
    Json(payload): Json<UpdateProductInput>,
) -> Result<impl IntoResponse, ApiError> {
    let product = state
        .services
        .catalog
        .update_product(product_id, payload)
        .await?;
    Ok(success_response(product))
}

/// Deleting an absent product succeeds; the action is idempotent.
async fn delete_product(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(product_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.services.catalog.delete_product(product_id).await?;
    Ok(no_content_response())
}

async fn list_categories(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
) -> Result<impl IntoResponse, ApiError> {
    let categories = state.services.catalog.list_categories().await?;
    Ok(success_response(categories))
}

#[derive(Debug, Deserialize)]
pub struct SaveCategoryRequest {
    /// Present for a rename, absent for a create.
    pub id: Option<Uuid>,
    pub name: String,
}

async fn save_category(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Json(payload): Json<SaveCategoryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let saved = state
        .services
        .catalog
        .save_category(payload.id, &payload.name)
        .await?;

    let message = match (&saved, payload.id) {
        (Some(_), Some(_)) => "Category updated",
        (Some(_), None) => "Category created",
        (None, _) => "Category no longer exists",
    };
    Ok(success_response(ApiResponse {
        success: true,
        message: Some(message.to_string()),
        data: saved,
    }))
}

async fn delete_category(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(category_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.services.catalog.delete_category(category_id).await?;
    Ok(no_content_response())
}

async fn list_orders(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
) -> Result<impl IntoResponse, ApiError> {
    let orders = state.services.orders.list_orders().await?;
    Ok(success_response(orders))
}

#[derive(Debug, Deserialize)]
pub struct UpdateOrderStatusRequest {
    pub status: String,
}

async fn update_order_status(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(order_id): Path<Uuid>,
    Json(payload): Json<UpdateOrderStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let status = OrderStatus::from_str(&payload.status).map_err(|_| ApiError::Validation {
        message: format!("Unknown order status '{}'", payload.status),
    })?;

    let order = state.services.orders.update_status(order_id, status).await?;
    Ok(success_response(order))
}

/// User row for the back-office listing: directory record enriched with the
/// user's order count.
#[derive(Debug, Serialize)]
struct AdminUserRow {
    id: Uuid,
    email: String,
    is_admin: bool,
    order_count: i64,
}

#[derive(FromQueryResult)]
struct UserOrderCount {
    user_id: Uuid,
    count: i64,
}

async fn list_users(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
) -> Result<impl IntoResponse, ApiError> {
    let users = state.users.list_users().await?;

    let counts: HashMap<Uuid, i64> = Order::find()
        .select_only()
        .column(order::Column::UserId)
        .column_as(order::Column::Id.count(), "count")
        .group_by(order::Column::UserId)
        .into_model::<UserOrderCount>()
        .all(&*state.db)
        .await
        .map_err(crate::errors::ServiceError::from)?
        .into_iter()
        .map(|row| (row.user_id, row.count))
        .collect();

    let rows: Vec<AdminUserRow> = users
        .into_iter()
        .map(|u| AdminUserRow {
            order_count: counts.get(&u.id).copied().unwrap_or(0),
            id: u.id,
            email: u.email,
            is_admin: u.is_admin,
        })
        .collect();

    Ok(success_response(rows))
}

async fn toggle_admin(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let is_admin = state.users.toggle_admin(user_id).await?;
    let message = if is_admin {
        "Admin role granted"
    } else {
        "Admin role revoked"
    };
    Ok(success_response(ApiResponse {
        success: true,
        message: Some(message.to_string()),
        data: Some(serde_json::json!({ "is_admin": is_admin })),
    }))
}
