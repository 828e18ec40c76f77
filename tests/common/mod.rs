#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use chrono::Utc;
use coffee_commerce_api::{
    app_router,
    auth::{AuthConfig, AuthService, AuthUser, Role, SubRole},
    config::AppConfig,
    db,
    entities::{customer, exchange_rate, product, shipping_rate, stock_batch},
    errors::ServiceError,
    handlers::AppServices,
    services::notifications::{EmailMessage, Mailer},
    AppState,
};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;

pub const STRIPE_SECRET: &str = "whsec_test_coffee_commerce";
pub const PAYSTACK_SECRET: &str = "sk_test_coffee_commerce";

/// Mailer that keeps every message in memory
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<EmailMessage>>,
    fail: bool,
}

impl RecordingMailer {
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().expect("mailer lock").clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: EmailMessage) -> Result<(), ServiceError> {
        if self.fail {
            return Err(ServiceError::ExternalServiceError(
                "smtp unavailable".to_string(),
            ));
        }
        self.sent.lock().expect("mailer lock").push(message);
        Ok(())
    }
}

/// Application wired to a private SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub mailer: Arc<RecordingMailer>,
    _db_dir: Option<TempDir>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_mailer(RecordingMailer::default()).await
    }

    pub async fn with_mailer(mailer: RecordingMailer) -> Self {
        // One connection keeps every query on the same in-memory database
        Self::build(mailer, "sqlite::memory:".to_string(), 1, None).await
    }

    /// Database file behind a pool of `connections`, so transactions from
    /// separate tasks genuinely interleave
    pub async fn with_pool(connections: u32) -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let url = format!(
            "sqlite://{}?mode=rwc",
            dir.path().join("coffee.db").display()
        );
        Self::build(RecordingMailer::default(), url, connections, Some(dir)).await
    }

    async fn build(
        mailer: RecordingMailer,
        database_url: String,
        connections: u32,
        db_dir: Option<TempDir>,
    ) -> Self {
        let mut cfg = AppConfig::new(
            database_url,
            "coffee_commerce_test_secret_that_is_long_enough_for_hs256_signing_keys".to_string(),
            3600,
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.db_max_connections = connections;
        cfg.db_min_connections = 1;
        cfg.stripe_webhook_secret = Some(STRIPE_SECRET.to_string());
        cfg.paystack_secret_key = Some(PAYSTACK_SECRET.to_string());

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let db_arc = Arc::new(pool);
        let auth = Arc::new(AuthService::new(AuthConfig::from(&cfg)));
        let mailer = Arc::new(mailer);
        let services = AppServices::new(db_arc.clone(), &cfg, mailer.clone());

        let state = AppState {
            db: db_arc,
            config: cfg,
            auth,
            services,
        };

        Self {
            router: app_router(state.clone()),
            state,
            mailer,
            _db_dir: db_dir,
        }
    }

    /// Bearer token plus id for a staff member with `sub_role`
    pub fn staff(&self, sub_role: SubRole) -> (Uuid, String) {
        let id = Uuid::new_v4();
        let token = self
            .state
            .auth
            .issue_token(
                id,
                Role::Admin,
                Some(sub_role),
                Some(format!("{} staff", sub_role)),
                None,
            )
            .expect("issue staff token");
        (id, token)
    }

    /// Bearer token plus id for a website shopper
    pub fn shopper(&self) -> (Uuid, String) {
        let id = Uuid::new_v4();
        let token = self
            .state
            .auth
            .issue_token(
                id,
                Role::User,
                None,
                Some("Ada Shopper".to_string()),
                Some("ada@example.com".to_string()),
            )
            .expect("issue shopper token");
        (id, token)
    }

    /// Caller identity for invoking services directly
    pub fn actor(user_id: Uuid, sub_role: Option<SubRole>) -> AuthUser {
        AuthUser {
            user_id,
            name: None,
            email: None,
            role: if sub_role.is_some() {
                Role::Admin
            } else {
                Role::User
            },
            sub_role,
        }
    }

    /// Send a JSON request; returns the status and the parsed body (Null when empty)
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }

        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(serde_json::to_vec(&json).expect("serialize request body"))
            }
            None => Body::empty(),
        };

        self.send(builder.body(body).expect("build request")).await
    }

    /// Post raw bytes with extra headers, as a payment provider would
    pub async fn post_raw(
        &self,
        uri: &str,
        payload: &[u8],
        headers: &[(&str, &str)],
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("content-type", "application/json");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        self.send(builder.body(Body::from(payload.to_vec())).expect("build request"))
            .await
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read response body");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    /// Product on legacy stock only
    pub async fn seed_product(&self, name: &str, price: Decimal, stock: i32) -> product::Model {
        let now = Utc::now();
        product::ActiveModel {
            id: Set(Uuid::new_v4()),
            sku: Set(format!("SKU-{}", &Uuid::new_v4().simple().to_string()[..8])),
            name: Set(name.to_string()),
            description: Set(None),
            category: Set(Some("coffee".to_string())),
            price: Set(price),
            regular_price: Set(None),
            three_weeks_price: Set(None),
            five_weeks_price: Set(None),
            btb_price: Set(None),
            stock: Set(stock),
            warehouse_enabled: Set(false),
            stock_on_arrival: Set(0),
            damaged_qty: Set(0),
            expired_qty: Set(0),
            refurbished_qty: Set(0),
            final_stock: Set(0),
            online_stock: Set(0),
            offline_stock: Set(0),
            warehouse_notes: Set(None),
            warehouse_last_updated: Set(None),
            warehouse_updated_by: Set(None),
            stock_version: Set(0),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed product")
    }

    /// Product whose manual warehouse override is on
    pub async fn seed_warehouse_product(
        &self,
        name: &str,
        price: Decimal,
        final_stock: i32,
        online: i32,
        offline: i32,
    ) -> product::Model {
        let seeded = self.seed_product(name, price, final_stock).await;
        let mut active: product::ActiveModel = seeded.into();
        active.warehouse_enabled = Set(true);
        active.stock_on_arrival = Set(final_stock);
        active.final_stock = Set(final_stock);
        active.online_stock = Set(online);
        active.offline_stock = Set(offline);
        active.update(&*self.state.db).await.expect("enable override")
    }

    pub async fn seed_batch(
        &self,
        product_id: Uuid,
        status: stock_batch::BatchStatus,
        good: i32,
        refurbished: i32,
    ) -> stock_batch::Model {
        let now = Utc::now();
        stock_batch::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(product_id),
            batch_number: Set(format!("B-{}", &Uuid::new_v4().simple().to_string()[..6])),
            status: Set(status),
            original_quantity: Set(good + refurbished),
            good_quantity: Set(good),
            refurbished_quantity: Set(refurbished),
            damaged_quantity: Set(0),
            expired_quantity: Set(0),
            online_stock: Set(0),
            offline_stock: Set(0),
            received_at: Set(now),
            notes: Set(None),
            created_by: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed batch")
    }

    /// Offline customer created by `created_by`
    pub async fn seed_customer(
        &self,
        name: &str,
        created_by: Option<Uuid>,
        website_user: Option<Uuid>,
    ) -> customer::Model {
        let now = Utc::now();
        customer::ActiveModel {
            id: Set(Uuid::new_v4()),
            customer_type: Set(customer::CustomerType::Btc),
            name: Set(name.to_string()),
            email: Set(Some(format!(
                "{}@example.com",
                name.to_lowercase().replace(' ', ".")
            ))),
            phone: Set(None),
            company_name: Set(None),
            registration_number: Set(None),
            address: Set(None),
            website_customer: Set(website_user.is_some()),
            user_id: Set(website_user),
            created_by: Set(created_by),
            total_orders: Set(0),
            total_order_value: Set(Decimal::ZERO),
            is_deleted: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed customer")
    }

    pub async fn seed_shipping_rate(&self, zone: &str, method: &str, base: Decimal, per_item: Decimal) {
        shipping_rate::ActiveModel {
            id: Set(Uuid::new_v4()),
            zone: Set(zone.to_string()),
            method: Set(method.to_string()),
            base_cost: Set(base),
            per_item_cost: Set(per_item),
            estimated_days: Set(3),
            is_active: Set(true),
            updated_at: Set(Utc::now()),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed shipping rate");
    }

    pub async fn seed_exchange_rate(&self, currency: &str, rate: Decimal) {
        exchange_rate::ActiveModel {
            currency: Set(currency.to_string()),
            rate: Set(rate),
            updated_at: Set(Utc::now()),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed exchange rate");
    }

    pub async fn product(&self, id: Uuid) -> product::Model {
        product::Entity::find_by_id(id)
            .one(&*self.state.db)
            .await
            .expect("load product")
            .expect("product exists")
    }

    pub async fn customer(&self, id: Uuid) -> customer::Model {
        customer::Entity::find_by_id(id)
            .one(&*self.state.db)
            .await
            .expect("load customer")
            .expect("customer exists")
    }
}

/// Decimals travel as JSON strings; numbers are accepted too
pub fn decimal(value: &Value) -> Decimal {
    match value {
        Value::String(s) => s.parse().expect("decimal string"),
        Value::Number(n) => n.to_string().parse().expect("decimal number"),
        other => panic!("expected a decimal, got {}", other),
    }
}
