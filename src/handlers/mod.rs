pub mod admin_orders;
pub mod cart;
pub mod checkout;
pub mod common;
pub mod customers;
pub mod health;
pub mod orders;
pub mod payment_webhooks;
pub mod products;
pub mod reference_data;
pub mod warehouse;

use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::{
    config::AppConfig,
    services::{
        admin_orders::AdminOrderService, cart::CartService, catalog::CatalogService,
        checkout::CheckoutService, customers::CustomerService, notifications::Mailer,
        order_status::OrderStatusService, orders::OrderService, payments::PaymentService,
        reference_data::ReferenceDataService, warehouse::WarehouseService,
    },
};

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub warehouse: Arc<WarehouseService>,
    pub admin_orders: Arc<AdminOrderService>,
    pub orders: Arc<OrderService>,
    pub order_status: Arc<OrderStatusService>,
    pub customers: Arc<CustomerService>,
    pub catalog: Arc<CatalogService>,
    pub cart: Arc<CartService>,
    pub checkout: Arc<CheckoutService>,
    pub payments: Arc<PaymentService>,
    pub reference_data: Arc<ReferenceDataService>,
}

impl AppServices {
    pub fn new(db: Arc<DatabaseConnection>, config: &AppConfig, mailer: Arc<dyn Mailer>) -> Self {
        let checkout = CheckoutService::new(
            db.clone(),
            config.default_currency.clone(),
            config.default_tax_rate,
        );
        let payments = PaymentService::new(
            checkout.clone(),
            config.stripe_webhook_secret.clone(),
            config.paystack_secret_key.clone(),
            config.webhook_tolerance_secs,
        );

        Self {
            warehouse: Arc::new(WarehouseService::new(db.clone())),
            admin_orders: Arc::new(AdminOrderService::new(
                db.clone(),
                mailer,
                config.default_currency.clone(),
            )),
            orders: Arc::new(OrderService::new(db.clone())),
            order_status: Arc::new(OrderStatusService::new(db.clone())),
            customers: Arc::new(CustomerService::new(db.clone())),
            catalog: Arc::new(CatalogService::new(db.clone())),
            cart: Arc::new(CartService::new(db.clone())),
            checkout: Arc::new(checkout),
            payments: Arc::new(payments),
            reference_data: Arc::new(ReferenceDataService::new(db)),
        }
    }
}
