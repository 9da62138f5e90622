#![allow(dead_code)]

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{header, Method, Request, Response},
    Router,
};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set};
use serde_json::Value;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

use storefront_api::{
    app_router,
    auth::{InMemoryUserDirectory, UserSummary, ROLE_HEADER, SESSION_ID_HEADER, USER_ID_HEADER},
    config::AppConfig,
    db,
    entities::{cart_item, category, order, product, CategoryModel, OrderStatus, ProductModel},
    events::{self, EventSender},
    services::AppServices,
    AppState,
};

/// Test harness: application state over a throwaway sqlite database, with
/// seeding helpers and `oneshot` request plumbing.
pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub directory: Arc<InMemoryUserDirectory>,
    db_path: PathBuf,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_page_size(12).await
    }

    /// Build an app whose catalog listing uses the given page size.
    pub async fn with_page_size(page_size: u64) -> Self {
        let db_path =
            std::env::temp_dir().join(format!("storefront_test_{}.db", Uuid::new_v4()));

        let mut cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_path.display()),
            "127.0.0.1".to_string(),
            0,
            "test".to_string(),
        );
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        cfg.catalog_page_size = page_size;

        let pool = db::connect(&cfg).await.expect("test database");
        db::run_migrations(&pool).await.expect("migrations");
        let db_arc = Arc::new(pool);

        let (event_tx, event_rx) = mpsc::channel(64);
        let event_sender = EventSender::new(event_tx);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let services = AppServices::new(db_arc.clone(), Arc::new(event_sender.clone()));
        let directory = Arc::new(InMemoryUserDirectory::new());

        let state = Arc::new(AppState {
            db: db_arc,
            config: cfg,
            event_sender,
            services,
            users: directory.clone(),
        });

        TestApp {
            router: app_router(state.clone()),
            state,
            directory,
            db_path,
            _event_task: event_task,
        }
    }

    /// Issues a request and returns the raw response.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        caller: &Caller,
        body: Option<Value>,
    ) -> Response<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user_id) = caller.user_id {
            builder = builder.header(USER_ID_HEADER, user_id.to_string());
        }
        if let Some(session_id) = &caller.session_id {
            builder = builder.header(SESSION_ID_HEADER, session_id.clone());
        }
        if caller.admin {
            builder = builder.header(ROLE_HEADER, "admin");
        }

        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .expect("request"),
            None => builder.body(Body::empty()).expect("request"),
        };

        self.router.clone().oneshot(request).await.expect("response")
    }

    /// Issues a request and parses the JSON body, asserting the status.
    pub async fn request_json(
        &self,
        method: Method,
        uri: &str,
        caller: &Caller,
        body: Option<Value>,
        expected_status: u16,
    ) -> Value {
        let response = self.request(method, uri, caller, body).await;
        let status = response.status().as_u16();
        let bytes = body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        assert_eq!(
            status,
            expected_status,
            "unexpected status, body: {}",
            String::from_utf8_lossy(&bytes)
        );
        if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        }
    }

    pub async fn seed_category(&self, name: &str) -> CategoryModel {
        category::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed category")
    }

    pub async fn seed_product(
        &self,
        name: &str,
        price: Decimal,
        stock: i32,
        category_id: Option<Uuid>,
    ) -> ProductModel {
        self.seed_product_at(name, price, stock, category_id, Utc::now())
            .await
    }

    /// Seed a product with an explicit creation time (for newest-first
    /// ordering tests).
    pub async fn seed_product_at(
        &self,
        name: &str,
        price: Decimal,
        stock: i32,
        category_id: Option<Uuid>,
        created_at: DateTime<Utc>,
    ) -> ProductModel {
        product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            description: Set(format!("{} description", name)),
            price: Set(price),
            image_url: Set(None),
            category_id: Set(category_id),
            stock: Set(stock),
            created_at: Set(created_at),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed product")
    }

    pub async fn seed_cart_item(
        &self,
        caller: &Caller,
        product_id: Uuid,
        quantity: i32,
    ) -> cart_item::Model {
        cart_item::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(product_id),
            quantity: Set(quantity),
            session_id: Set(caller.session_id.clone()),
            user_id: Set(caller.user_id),
            added_at: Set(Utc::now()),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed cart item")
    }

    pub async fn seed_order(
        &self,
        user_id: Uuid,
        total: Decimal,
        status: OrderStatus,
    ) -> order::Model {
        order::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            total_amount: Set(total),
            order_date: Set(Utc::now() - Duration::minutes(1)),
            status: Set(status),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed order")
    }

    pub async fn seed_user(&self, email: &str, is_admin: bool) -> Uuid {
        let id = Uuid::new_v4();
        self.directory
            .insert(UserSummary {
                id,
                email: email.to_string(),
                is_admin,
                registered_at: Utc::now(),
            })
            .await;
        id
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.db_path);
    }
}

/// Parses a decimal field out of a JSON body; tolerates both string and
/// numeric encodings.
pub fn decimal(value: &Value) -> Decimal {
    match value {
        Value::String(s) => Decimal::from_str(s).expect("decimal string"),
        Value::Number(n) => Decimal::from_str(&n.to_string()).expect("decimal number"),
        other => panic!("expected a decimal, got {:?}", other),
    }
}

/// Request identity used by the harness: guest session, authenticated user,
/// or admin.
#[derive(Debug, Clone, Default)]
pub struct Caller {
    pub user_id: Option<Uuid>,
    pub session_id: Option<String>,
    pub admin: bool,
}

impl Caller {
    pub fn guest(session_id: &str) -> Self {
        Caller {
            session_id: Some(session_id.to_string()),
            ..Default::default()
        }
    }

    pub fn user(user_id: Uuid) -> Self {
        Caller {
            user_id: Some(user_id),
            ..Default::default()
        }
    }

    pub fn user_with_session(user_id: Uuid, session_id: &str) -> Self {
        Caller {
            user_id: Some(user_id),
            session_id: Some(session_id.to_string()),
            ..Default::default()
        }
    }

    pub fn admin() -> Self {
        Caller {
            user_id: Some(Uuid::new_v4()),
            admin: true,
            ..Default::default()
        }
    }

    pub fn anonymous() -> Self {
        Caller::default()
    }
}
