mod common;

use axum::http::Method;
use common::{decimal, Caller, TestApp};
use rust_decimal_macros::dec;
use sea_orm::EntityTrait;
use serde_json::json;
use uuid::Uuid;

use storefront_api::entities::{OrderStatus, Product};

#[tokio::test]
async fn admin_routes_reject_callers_without_the_role() {
    let app = TestApp::new().await;

    for caller in [Caller::anonymous(), Caller::user(Uuid::new_v4())] {
        let response = app
            .request(Method::GET, "/api/admin/products", &caller, None)
            .await;
        assert_eq!(response.status().as_u16(), 403);
    }
}

#[tokio::test]
async fn product_crud_lifecycle() {
    let app = TestApp::new().await;
    let admin = Caller::admin();

    let created = app
        .request_json(
            Method::POST,
            "/api/admin/products",
            &admin,
            Some(json!({
                "name": "Standing Desk",
                "description": "Adjustable height",
                "price": "499.00",
                "stock": 4
            })),
            201,
        )
        .await;
    let product_id = created["id"].as_str().unwrap().to_string();
    assert_eq!(created["name"], "Standing Desk");
    assert_eq!(decimal(&created["price"]), dec!(499.00));

    let updated = app
        .request_json(
            Method::PUT,
            &format!("/api/admin/products/{}", product_id),
            &admin,
            Some(json!({ "price": "459.00", "stock": 7 })),
            200,
        )
        .await;
    assert_eq!(decimal(&updated["price"]), dec!(459.00));
    assert_eq!(updated["stock"], 7);
    // Untouched fields survive a partial update.
    assert_eq!(updated["name"], "Standing Desk");

    let listing = app
        .request_json(Method::GET, "/api/admin/products", &admin, None, 200)
        .await;
    assert_eq!(listing.as_array().unwrap().len(), 1);

    let uri = format!("/api/admin/products/{}", product_id);
    let response = app.request(Method::DELETE, &uri, &admin, None).await;
    assert_eq!(response.status().as_u16(), 204);
    // Deleting again is still a success.
    let response = app.request(Method::DELETE, &uri, &admin, None).await;
    assert_eq!(response.status().as_u16(), 204);
}

#[tokio::test]
async fn invalid_product_payloads_are_rejected() {
    let app = TestApp::new().await;
    let admin = Caller::admin();

    app.request_json(
        Method::POST,
        "/api/admin/products",
        &admin,
        Some(json!({ "name": "", "price": "10.00", "stock": 1 })),
        400,
    )
    .await;

    app.request_json(
        Method::POST,
        "/api/admin/products",
        &admin,
        Some(json!({ "name": "Free Stuff", "price": "0", "stock": 1 })),
        400,
    )
    .await;

    // Assigning an unknown category fails the lookup.
    app.request_json(
        Method::POST,
        "/api/admin/products",
        &admin,
        Some(json!({
            "name": "Orphan",
            "price": "10.00",
            "stock": 1,
            "category_id": Uuid::new_v4()
        })),
        404,
    )
    .await;
}

#[tokio::test]
async fn category_create_rename_and_vanished_target() {
    let app = TestApp::new().await;
    let admin = Caller::admin();

    let created = app
        .request_json(
            Method::POST,
            "/api/admin/categories",
            &admin,
            Some(json!({ "name": "Audio" })),
            200,
        )
        .await;
    assert_eq!(created["message"], "Category created");
    let category_id = created["data"]["id"].as_str().unwrap().to_string();

    let renamed = app
        .request_json(
            Method::POST,
            "/api/admin/categories",
            &admin,
            Some(json!({ "id": category_id, "name": "Audio Gear" })),
            200,
        )
        .await;
    assert_eq!(renamed["message"], "Category updated");
    assert_eq!(renamed["data"]["name"], "Audio Gear");

    let vanished = app
        .request_json(
            Method::POST,
            "/api/admin/categories",
            &admin,
            Some(json!({ "id": Uuid::new_v4(), "name": "Ghost" })),
            200,
        )
        .await;
    assert_eq!(vanished["message"], "Category no longer exists");
    assert!(vanished["data"].is_null());

    app.request_json(
        Method::POST,
        "/api/admin/categories",
        &admin,
        Some(json!({ "name": "   " })),
        400,
    )
    .await;
}

#[tokio::test]
async fn deleting_a_category_detaches_its_products() {
    let app = TestApp::new().await;
    let admin = Caller::admin();
    let category = app.seed_category("Doomed").await;
    let product = app
        .seed_product("Survivor", dec!(10.00), 3, Some(category.id))
        .await;

    let response = app
        .request(
            Method::DELETE,
            &format!("/api/admin/categories/{}", category.id),
            &admin,
            None,
        )
        .await;
    assert_eq!(response.status().as_u16(), 204);

    let stored = Product::find_by_id(product.id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.category_id, None);
}

#[tokio::test]
async fn order_status_follows_the_transition_table() {
    let app = TestApp::new().await;
    let admin = Caller::admin();
    let order = app
        .seed_order(Uuid::new_v4(), dec!(120.00), OrderStatus::AwaitingPayment)
        .await;
    let uri = format!("/api/admin/orders/{}/status", order.id);

    let body = app
        .request_json(Method::PUT, &uri, &admin, Some(json!({ "status": "paid" })), 200)
        .await;
    assert_eq!(body["status"], "paid");

    app.request_json(Method::PUT, &uri, &admin, Some(json!({ "status": "shipped" })), 200)
        .await;

    // Backwards moves are refused.
    app.request_json(
        Method::PUT,
        &uri,
        &admin,
        Some(json!({ "status": "awaiting_payment" })),
        409,
    )
    .await;

    app.request_json(Method::PUT, &uri, &admin, Some(json!({ "status": "delivered" })), 200)
        .await;

    // Setting the current status again is an idempotent no-op.
    let body = app
        .request_json(Method::PUT, &uri, &admin, Some(json!({ "status": "delivered" })), 200)
        .await;
    assert_eq!(body["status"], "delivered");

    // Terminal states accept nothing else.
    app.request_json(Method::PUT, &uri, &admin, Some(json!({ "status": "paid" })), 409)
        .await;

    let body = app
        .request_json(Method::PUT, &uri, &admin, Some(json!({ "status": "teleported" })), 400)
        .await;
    assert!(body["message"].as_str().unwrap().contains("teleported"));
}

#[tokio::test]
async fn status_update_for_unknown_order_is_not_found() {
    let app = TestApp::new().await;
    app.request_json(
        Method::PUT,
        &format!("/api/admin/orders/{}/status", Uuid::new_v4()),
        &Caller::admin(),
        Some(json!({ "status": "paid" })),
        404,
    )
    .await;
}

#[tokio::test]
async fn user_listing_carries_order_counts_admins_first() {
    let app = TestApp::new().await;
    let admin = Caller::admin();
    let alice = app.seed_user("alice@example.com", false).await;
    app.seed_user("zoe@example.com", true).await;
    app.seed_order(alice, dec!(10.00), OrderStatus::Paid).await;
    app.seed_order(alice, dec!(20.00), OrderStatus::Delivered).await;

    let body = app
        .request_json(Method::GET, "/api/admin/users", &admin, None, 200)
        .await;
    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["email"], "zoe@example.com");
    assert_eq!(rows[0]["is_admin"], true);
    assert_eq!(rows[0]["order_count"], 0);
    assert_eq!(rows[1]["email"], "alice@example.com");
    assert_eq!(rows[1]["order_count"], 2);
}

#[tokio::test]
async fn toggling_admin_flips_the_role() {
    let app = TestApp::new().await;
    let admin = Caller::admin();
    let user_id = app.seed_user("bob@example.com", false).await;
    let uri = format!("/api/admin/users/{}/toggle-admin", user_id);

    let body = app
        .request_json(Method::POST, &uri, &admin, None, 200)
        .await;
    assert_eq!(body["data"]["is_admin"], true);
    assert_eq!(body["message"], "Admin role granted");

    let body = app
        .request_json(Method::POST, &uri, &admin, None, 200)
        .await;
    assert_eq!(body["data"]["is_admin"], false);

    app.request_json(
        Method::POST,
        &format!("/api/admin/users/{}/toggle-admin", Uuid::new_v4()),
        &admin,
        None,
        404,
    )
    .await;
}

#[tokio::test]
async fn dashboard_reports_catalog_order_and_revenue_totals() {
    let app = TestApp::new().await;
    let admin = Caller::admin();
    app.seed_product("One", dec!(10.00), 5, None).await;
    app.seed_product("Two", dec!(20.00), 5, None).await;
    let user_id = app.seed_user("carol@example.com", false).await;
    app.seed_order(user_id, dec!(100.00), OrderStatus::Paid).await;
    app.seed_order(user_id, dec!(50.00), OrderStatus::AwaitingPayment)
        .await;

    let body = app
        .request_json(Method::GET, "/api/admin/dashboard", &admin, None, 200)
        .await;
    assert_eq!(body["total_products"], 2);
    assert_eq!(body["total_orders"], 2);
    assert_eq!(body["total_users"], 1);
    assert_eq!(decimal(&body["total_revenue"]), dec!(150.00));
    assert_eq!(body["recent_orders"].as_array().unwrap().len(), 2);
}
