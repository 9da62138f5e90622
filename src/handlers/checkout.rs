use crate::handlers::common::{created_response, success_response};
use crate::{auth::Identity, errors::ApiError, ApiResponse, AppState};
use axum::{extract::State, response::IntoResponse, routing::{get, post}, Router};
use std::sync::Arc;

/// Creates the router for checkout and the user's order history
pub fn checkout_routes() -> Router<Arc<AppState>> {
    Router::new().route("/", post(checkout))
}

pub fn order_routes() -> Router<Arc<AppState>> {
    Router::new().route("/", get(my_orders))
}

/// Converts the authenticated user's cart into an order.
#[utoipa::path(
    post,
    path = "/api/checkout",
    tag = "checkout",
    responses(
        (status = 201, description = "Order created from the cart"),
        (status = 400, description = "Empty cart or insufficient stock", body = crate::errors::ErrorResponse),
        (status = 401, description = "Guest sessions cannot check out", body = crate::errors::ErrorResponse)
    )
)]
pub async fn checkout(
    State(state): State<Arc<AppState>>,
    identity: Identity,
) -> Result<impl IntoResponse, ApiError> {
    let order = state.services.checkout.checkout(&identity).await?;

    Ok(created_response(ApiResponse {
        success: true,
        message: Some(format!(
            "Order {} placed, total {}",
            order.id, order.total_amount
        )),
        data: Some(order),
    }))
}

/// The caller's order history for the profile view.
async fn my_orders(
    State(state): State<Arc<AppState>>,
    identity: Identity,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = identity.require_user().map_err(ApiError::Service)?;
    let orders = state.services.orders.orders_for_user(user_id).await?;
    Ok(success_response(orders))
}
