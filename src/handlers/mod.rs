//! HTTP handlers: thin axum adapters over the service layer.

pub mod admin;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod common;

pub use admin::admin_routes;
pub use cart::cart_routes;
pub use catalog::catalog_routes;
pub use checkout::{checkout_routes, order_routes};
