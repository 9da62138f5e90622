//! OpenAPI documentation for the public storefront surface.

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Storefront API",
        description = "Catalog browsing, cart management, and checkout"
    ),
    paths(
        crate::handlers::cart::cart_count,
        crate::handlers::cart::add_to_cart,
        crate::handlers::catalog::list_products,
        crate::handlers::catalog::featured_products,
        crate::handlers::checkout::checkout,
    ),
    components(schemas(crate::errors::ErrorResponse)),
    tags(
        (name = "cart", description = "Guest and user cart operations"),
        (name = "catalog", description = "Product listing and categories"),
        (name = "checkout", description = "Cart-to-order conversion")
    )
)]
pub struct ApiDoc;
