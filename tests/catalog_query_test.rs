mod common;

use axum::http::Method;
use chrono::{Duration, Utc};
use common::{decimal, Caller, TestApp};
use rust_decimal_macros::dec;
use uuid::Uuid;

use storefront_api::entities::ProductModel;

/// Five products with staggered creation times; "Echo" is out of stock.
async fn seed_fixture(app: &TestApp) -> Vec<ProductModel> {
    let base = Utc::now() - Duration::hours(5);
    let mut products = Vec::new();
    for (i, (name, price, stock)) in [
        ("Alpha", dec!(50.00), 10),
        ("Bravo", dec!(100.00), 10),
        ("Charlie", dec!(200.00), 10),
        ("Delta", dec!(500.00), 10),
        ("Echo", dec!(800.00), 0),
    ]
    .into_iter()
    .enumerate()
    {
        products.push(
            app.seed_product_at(name, price, stock, None, base + Duration::hours(i as i64))
                .await,
        );
    }
    products
}

fn names(body: &serde_json::Value) -> Vec<String> {
    body["products"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["product"]["name"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn price_window_is_sorted_and_paginated() {
    let app = TestApp::with_page_size(2).await;
    seed_fixture(&app).await;

    let body = app
        .request_json(
            Method::GET,
            "/api/catalog/products?min_price=100&max_price=500&sort_by=price_asc&page=2",
            &Caller::anonymous(),
            None,
            200,
        )
        .await;

    assert_eq!(body["total_products"], 3);
    assert_eq!(body["total_pages"], 2);
    assert_eq!(body["current_page"], 2);
    assert_eq!(names(&body), vec!["Delta"]);
}

#[tokio::test]
async fn unknown_sort_key_falls_back_to_newest() {
    let app = TestApp::new().await;
    seed_fixture(&app).await;

    let body = app
        .request_json(
            Method::GET,
            "/api/catalog/products?sort_by=by_rating",
            &Caller::anonymous(),
            None,
            200,
        )
        .await;

    assert_eq!(names(&body)[0], "Echo");
}

#[tokio::test]
async fn out_of_range_page_is_clamped() {
    let app = TestApp::with_page_size(2).await;
    seed_fixture(&app).await;

    let body = app
        .request_json(
            Method::GET,
            "/api/catalog/products?page=99",
            &Caller::anonymous(),
            None,
            200,
        )
        .await;

    assert_eq!(body["total_pages"], 3);
    assert_eq!(body["current_page"], 3);
    assert_eq!(names(&body).len(), 1);
}

#[tokio::test]
async fn search_matches_name_and_description() {
    let app = TestApp::new().await;
    seed_fixture(&app).await;

    let body = app
        .request_json(
            Method::GET,
            "/api/catalog/products?search=Bravo",
            &Caller::anonymous(),
            None,
            200,
        )
        .await;
    assert_eq!(body["total_products"], 1);
    assert_eq!(names(&body), vec!["Bravo"]);

    // Every fixture description carries this suffix.
    let body = app
        .request_json(
            Method::GET,
            "/api/catalog/products?search=description",
            &Caller::anonymous(),
            None,
            200,
        )
        .await;
    assert_eq!(body["total_products"], 5);
}

#[tokio::test]
async fn in_stock_filter_hides_depleted_products() {
    let app = TestApp::new().await;
    seed_fixture(&app).await;

    let body = app
        .request_json(
            Method::GET,
            "/api/catalog/products?in_stock=true",
            &Caller::anonymous(),
            None,
            200,
        )
        .await;

    assert_eq!(body["total_products"], 4);
    assert!(!names(&body).contains(&"Echo".to_string()));
}

#[tokio::test]
async fn category_filter_and_listing_counts() {
    let app = TestApp::new().await;
    let audio = app.seed_category("Audio").await;
    let video = app.seed_category("Video").await;
    app.seed_product("Amp", dec!(120.00), 5, Some(audio.id)).await;
    app.seed_product("Mixer", dec!(220.00), 5, Some(audio.id)).await;
    app.seed_product("Camera", dec!(900.00), 5, Some(video.id)).await;

    let body = app
        .request_json(
            Method::GET,
            &format!("/api/catalog/products?category_id={}", audio.id),
            &Caller::anonymous(),
            None,
            200,
        )
        .await;
    assert_eq!(body["total_products"], 2);

    let categories = app
        .request_json(Method::GET, "/api/catalog/categories", &Caller::anonymous(), None, 200)
        .await;
    let list = categories.as_array().unwrap();
    assert_eq!(list.len(), 2);
    // Ordered by name.
    assert_eq!(list[0]["category"]["name"], "Audio");
    assert_eq!(list[0]["product_count"], 2);
    assert_eq!(list[1]["product_count"], 1);
}

#[tokio::test]
async fn filters_compose_with_and() {
    let app = TestApp::new().await;
    let audio = app.seed_category("Audio").await;
    app.seed_product("Amp", dec!(120.00), 5, Some(audio.id)).await;
    app.seed_product("Amp XL", dec!(620.00), 5, Some(audio.id)).await;
    app.seed_product("Camera", dec!(120.00), 5, None).await;

    let body = app
        .request_json(
            Method::GET,
            &format!(
                "/api/catalog/products?category_id={}&max_price=500&search=Amp",
                audio.id
            ),
            &Caller::anonymous(),
            None,
            200,
        )
        .await;
    assert_eq!(names(&body), vec!["Amp"]);
}

#[tokio::test]
async fn featured_strip_is_best_stocked_in_stock_products() {
    let app = TestApp::new().await;
    // Ten in-stock products with distinct stock levels, one depleted.
    for stock in 1..=10 {
        app.seed_product(&format!("Item {:02}", stock), dec!(10.00), stock, None)
            .await;
    }
    app.seed_product("Depleted", dec!(10.00), 0, None).await;

    let body = app
        .request_json(
            Method::GET,
            "/api/catalog/featured",
            &Caller::anonymous(),
            None,
            200,
        )
        .await;

    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 8);
    assert_eq!(rows[0]["product"]["name"], "Item 10");
    assert_eq!(rows[7]["product"]["name"], "Item 03");
    let listed: Vec<&str> = rows
        .iter()
        .map(|r| r["product"]["name"].as_str().unwrap())
        .collect();
    assert!(!listed.contains(&"Depleted"));
}

#[tokio::test]
async fn product_detail_round_trip() {
    let app = TestApp::new().await;
    let product = app.seed_product("Solo", dec!(12.34), 3, None).await;

    let body = app
        .request_json(
            Method::GET,
            &format!("/api/catalog/products/{}", product.id),
            &Caller::anonymous(),
            None,
            200,
        )
        .await;
    assert_eq!(body["name"], "Solo");
    assert_eq!(decimal(&body["price"]), dec!(12.34));

    app.request_json(
        Method::GET,
        &format!("/api/catalog/products/{}", Uuid::new_v4()),
        &Caller::anonymous(),
        None,
        404,
    )
    .await;
}
