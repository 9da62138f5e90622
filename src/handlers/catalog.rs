use crate::handlers::common::success_response;
use crate::{
    errors::ApiError,
    services::catalog::{ProductListQuery, ProductSort, FEATURED_LIMIT},
    AppState,
};
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::get,
    Router,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;
use utoipa::IntoParams;
use uuid::Uuid;

/// Creates the router for the public catalog endpoints
pub fn catalog_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/products", get(list_products))
        .route("/products/:product_id", get(get_product))
        .route("/featured", get(featured_products))
        .route("/categories", get(list_categories))
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ProductListParams {
    /// Substring match on product name or description.
    pub search: Option<String>,
    pub category_id: Option<Uuid>,
    /// Inclusive lower price bound.
    pub min_price: Option<Decimal>,
    /// Inclusive upper price bound.
    pub max_price: Option<Decimal>,
    /// Restrict to products with stock > 0.
    pub in_stock: Option<bool>,
    /// One of name_asc, name_desc, price_asc, price_desc, newest.
    /// Unknown keys fall back to newest.
    pub sort_by: Option<String>,
    /// 1-based page, clamped into the valid range.
    pub page: Option<u64>,
}

/// Filtered, sorted, paginated product listing.
#[utoipa::path(
    get,
    path = "/api/catalog/products",
    tag = "catalog",
    params(ProductListParams),
    responses(
        (status = 200, description = "Page of products with totals for pagination")
    )
)]
pub async fn list_products(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ProductListParams>,
) -> Result<impl IntoResponse, ApiError> {
    let query = ProductListQuery {
        search: params.search,
        category_id: params.category_id,
        min_price: params.min_price,
        max_price: params.max_price,
        in_stock: params.in_stock.unwrap_or(false),
        sort_by: params
            .sort_by
            .as_deref()
            .map(ProductSort::from_param)
            .unwrap_or_default(),
        page: params.page.unwrap_or(1),
        page_size: state.config.catalog_page_size,
    };

    let page = state.services.catalog.list_products(query).await?;
    Ok(success_response(page))
}

/// Home-view product strip: in-stock products, best-stocked first.
#[utoipa::path(
    get,
    path = "/api/catalog/featured",
    tag = "catalog",
    responses(
        (status = 200, description = "Up to eight in-stock products, best-stocked first")
    )
)]
pub async fn featured_products(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let products = state
        .services
        .catalog
        .featured_products(FEATURED_LIMIT)
        .await?;
    Ok(success_response(products))
}

/// Single product for the detail view.
async fn get_product(
    State(state): State<Arc<AppState>>,
    Path(product_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let product = state.services.catalog.get_product(product_id).await?;
    Ok(success_response(product))
}

/// Categories ordered by name, with product counts for the filter sidebar.
async fn list_categories(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let categories = state.services.catalog.list_categories().await?;
    Ok(success_response(categories))
}
