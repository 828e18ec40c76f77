//! Business counters.
//!
//! Counters go through the `metrics` facade; they are no-ops until a recorder is
//! installed by the embedding process.

pub const ORDERS_CREATED: &str = "coffee.orders.created";
pub const ORDERS_STOCK_REJECTED: &str = "coffee.orders.stock_rejected";
pub const ORDER_STATUS_CHANGED: &str = "coffee.orders.status_changed";
pub const WAREHOUSE_MANUAL_UPDATES: &str = "coffee.warehouse.manual_updates";
pub const WAREHOUSE_RECONCILIATIONS: &str = "coffee.warehouse.reconciliations";
pub const STOCK_GUARD_RETRIES: &str = "coffee.stock.guard_retries";
pub const WEBHOOKS_DUPLICATE: &str = "coffee.webhooks.duplicate";
pub const WEBHOOKS_REJECTED: &str = "coffee.webhooks.rejected";
pub const EMAIL_FAILED: &str = "coffee.email.failed";

pub fn increment(name: &'static str) {
    metrics::counter!(name, 1);
}

pub fn increment_with_source(name: &'static str, source: &'static str) {
    metrics::counter!(name, 1, "source" => source);
}
