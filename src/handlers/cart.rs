use crate::handlers::common::{no_content_response, success_response};
use crate::{
    auth::Identity,
    errors::{ApiError, ServiceError},
    ApiResponse, AppState,
};
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::warn;
use utoipa::IntoParams;
use uuid::Uuid;

/// Creates the router for cart endpoints
pub fn cart_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(get_cart))
        .route("/count", get(cart_count))
        .route("/add/:product_id", post(add_to_cart))
        .route("/items/:item_id", put(update_quantity))
        .route("/items/:item_id", delete(remove_item))
        .route("/clear", post(clear_cart))
        .route("/merge", post(merge_cart))
}

/// Cart view: lines newest-first with products and the running total.
async fn get_cart(
    State(state): State<Arc<AppState>>,
    identity: Identity,
) -> Result<impl IntoResponse, ApiError> {
    let view = state.services.cart.get_cart(&identity).await?;
    Ok(success_response(view))
}

/// Item count for the cart badge.
///
/// Deliberately fail-open: the badge is not worth an error page, so any
/// lookup failure is logged and reported as zero.
#[utoipa::path(
    get,
    path = "/api/cart/count",
    tag = "cart",
    responses(
        (status = 200, description = "Sum of quantities in the caller's cart; 0 on any failure", body = i64)
    )
)]
pub async fn cart_count(State(state): State<Arc<AppState>>, identity: Identity) -> Json<i64> {
    let count = match state.services.cart.item_count(&identity).await {
        Ok(count) => count,
        Err(err) => {
            warn!(error = %err, "cart count failed, reporting 0");
            0
        }
    };
    Json(count)
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct AddToCartParams {
    /// Units to add; defaults to 1.
    pub quantity: Option<i32>,
}

/// Adds a product to the caller's cart.
#[utoipa::path(
    post,
    path = "/api/cart/add/{product_id}",
    tag = "cart",
    params(
        ("product_id" = Uuid, Path, description = "Product to add"),
        AddToCartParams
    ),
    responses(
        (status = 200, description = "Item added; returns the new cart count"),
        (status = 400, description = "Unknown product or insufficient stock", body = crate::errors::ErrorResponse)
    )
)]
pub async fn add_to_cart(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(product_id): Path<Uuid>,
    Query(params): Query<AddToCartParams>,
) -> Result<impl IntoResponse, ApiError> {
    let quantity = params.quantity.unwrap_or(1);
    let mutation = state
        .services
        .cart
        .add_item(&identity, product_id, quantity)
        .await
        .map_err(|err| match err {
            // The add control treats an unknown product like any other bad
            // request; it never 404s.
            ServiceError::NotFound(message) => ApiError::Validation { message },
            other => ApiError::Service(other),
        })?;

    Ok(success_response(ApiResponse {
        success: true,
        message: Some("Item added to cart".to_string()),
        data: Some(serde_json::json!({ "count": mutation.count })),
    }))
}

#[derive(Debug, Deserialize)]
pub struct UpdateQuantityRequest {
    /// Signed quantity change from the +/- cart controls.
    pub delta: i32,
}

/// Applies a quantity delta to a cart line (clamped server-side).
async fn update_quantity(
    State(state): State<Arc<AppState>>,
    Path(item_id): Path<Uuid>,
    Json(payload): Json<UpdateQuantityRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .services
        .cart
        .update_quantity(item_id, payload.delta)
        .await?;
    Ok(success_response(ApiResponse::<()> {
        success: true,
        message: Some("Quantity updated".to_string()),
        data: None,
    }))
}

/// Removes a cart line; removing an absent line succeeds.
async fn remove_item(
    State(state): State<Arc<AppState>>,
    Path(item_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.services.cart.remove_item(item_id).await?;
    Ok(no_content_response())
}

/// Empties the caller's cart.
async fn clear_cart(
    State(state): State<Arc<AppState>>,
    identity: Identity,
) -> Result<impl IntoResponse, ApiError> {
    state.services.cart.clear(&identity).await?;
    Ok(success_response(ApiResponse::<()> {
        success: true,
        message: Some("Cart cleared".to_string()),
        data: None,
    }))
}

/// Folds the guest-session cart into the just-authenticated user's cart.
/// Intended to be called by the login flow; requires both identity keys.
async fn merge_cart(
    State(state): State<Arc<AppState>>,
    identity: Identity,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = identity.require_user().map_err(ApiError::Service)?;
    let Some(session_id) = identity.session_id.as_deref() else {
        return Ok(success_response(serde_json::json!({ "merged": 0 })));
    };

    let merged = state
        .services
        .cart
        .merge_guest_cart(user_id, session_id)
        .await?;
    Ok(success_response(serde_json::json!({ "merged": merged })))
}
