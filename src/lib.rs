//! Coffee Commerce API Library
//!
//! Catalog, cart and checkout for shoppers, manual orders for sales staff and
//! warehouse stock reconciliation, served over one axum router.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod handlers;
pub mod metrics;
pub mod middleware_helpers;
pub mod migrator;
pub mod openapi;
pub mod services;
pub mod tracing;

use axum::{
    response::Json,
    routing::{get, post, put},
    Extension, Router,
};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::auth::{AuthRouterExt, AuthService};

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub auth: Arc<AuthService>,
    pub services: handlers::AppServices,
}

// Common response wrappers
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub errors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
    pub total_pages: u64,
}

impl<T> PaginatedResponse<T> {
    pub fn new(items: Vec<T>, total: u64, page: u64, per_page: u64) -> Self {
        let total_pages = if per_page == 0 {
            0
        } else {
            total.div_ceil(per_page)
        };
        Self {
            items,
            total,
            page,
            per_page,
            total_pages,
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }
}

#[cfg(test)]
mod response_tests {
    use super::*;
    use chrono::DateTime;

    #[tokio::test]
    async fn success_response_includes_request_metadata() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("meta-123"), async {
                ApiResponse::success("ok")
            })
            .await;

        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-123"));
        DateTime::parse_from_rfc3339(&meta.timestamp).expect("timestamp should parse");
    }

    #[tokio::test]
    async fn meta_serializes_camel_case() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("meta-json"), async {
                ApiResponse::success(())
            })
            .await;
        let json = serde_json::to_value(response).unwrap();
        assert_eq!(json["meta"]["requestId"], "meta-json");
        assert!(json["meta"].get("request_id").is_none());
    }
}

/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

/// Every route under `/api`. Authorization beyond "has a valid token" is
/// decided per action inside the services.
pub fn api_routes() -> Router<AppState> {
    let public = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/products", get(handlers::products::list_products))
        .route("/products/:id", get(handlers::products::get_product))
        .route(
            "/exchange-rates",
            get(handlers::reference_data::list_exchange_rates),
        )
        .route(
            "/shipping/rates",
            get(handlers::reference_data::list_shipping_rates),
        )
        // Signed by the payment provider, not by a bearer token
        .route(
            "/payment/stripe/webhook",
            post(handlers::payment_webhooks::stripe_webhook),
        )
        .route(
            "/payment/paystack/webhook",
            post(handlers::payment_webhooks::paystack_webhook),
        );

    let warehouse = Router::new()
        .route(
            "/warehouse/stock/alerts",
            get(handlers::warehouse::stock_alerts),
        )
        .route(
            "/warehouse/stock/update",
            post(handlers::warehouse::update_stock),
        )
        .route(
            "/warehouse/stock/disable-override",
            post(handlers::warehouse::disable_override),
        )
        .route(
            "/warehouse/stock/reconcile",
            post(handlers::warehouse::reconcile),
        )
        .route(
            "/warehouse/stock/:product_id",
            get(handlers::warehouse::get_stock),
        )
        .route(
            "/warehouse/settings",
            get(handlers::warehouse::get_settings).put(handlers::warehouse::update_settings),
        )
        .route("/warehouse/activity", get(handlers::warehouse::list_activity))
        .route(
            "/warehouse/batches",
            get(handlers::warehouse::list_batches).post(handlers::warehouse::create_batch),
        )
        .route(
            "/warehouse/batches/:id/status",
            put(handlers::warehouse::update_batch_status),
        )
        .with_auth();

    let orders = Router::new()
        .route(
            "/admin-orders/create",
            post(handlers::admin_orders::create_admin_order),
        )
        .route("/orders", get(handlers::orders::list_orders))
        .route(
            "/orders/group/:group_id",
            get(handlers::orders::get_order_group),
        )
        .route("/orders/:order_id", get(handlers::orders::get_order))
        .route(
            "/orders/:order_id/status",
            put(handlers::orders::update_order_status),
        )
        .with_auth();

    let customers = Router::new()
        .route(
            "/customers",
            get(handlers::customers::list_customers).post(handlers::customers::create_customer),
        )
        .route(
            "/customers/register",
            post(handlers::customers::register_customer),
        )
        .route(
            "/customers/:id",
            get(handlers::customers::get_customer)
                .put(handlers::customers::update_customer)
                .delete(handlers::customers::delete_customer),
        )
        .with_auth();

    let catalog_admin = Router::new()
        .route("/products", post(handlers::products::create_product))
        .route("/products/:id", put(handlers::products::update_product))
        .route(
            "/exchange-rates/:currency",
            put(handlers::reference_data::set_exchange_rate),
        )
        .route(
            "/shipping/rates",
            post(handlers::reference_data::upsert_shipping_rate),
        )
        .with_auth();

    let storefront = Router::new()
        .route(
            "/cart",
            get(handlers::cart::get_cart)
                .post(handlers::cart::add_to_cart)
                .delete(handlers::cart::clear_cart),
        )
        .route(
            "/cart/:id",
            put(handlers::cart::update_cart_item).delete(handlers::cart::remove_cart_item),
        )
        .route("/payment/checkout", post(handlers::checkout::create_checkout))
        .with_auth();

    Router::new()
        .merge(public)
        .merge(warehouse)
        .merge(orders)
        .merge(customers)
        .merge(catalog_admin)
        .merge(storefront)
}

/// Full application router with request ids, HTTP tracing and Swagger UI.
/// CORS and compression are added by the binary.
pub fn app_router(state: AppState) -> Router {
    let auth = state.auth.clone();
    Router::<AppState>::new()
        .route("/", get(handlers::health::root))
        .nest("/api", api_routes())
        .merge(openapi::swagger_ui())
        .layer(crate::tracing::configure_http_tracing())
        // Auth middleware looks the token validator up in request extensions
        .layer(Extension(auth))
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id::request_id_middleware,
        ))
        .with_state(state)
}
