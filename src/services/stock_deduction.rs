use std::{future::Future, time::Duration};

use chrono::Utc;
use rand::Rng;
use sea_orm::{
    sea_query::{Expr, SimpleExpr},
    ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{entities::product, errors::ServiceError, metrics};

/// Which allocation pool an order draws from first. Both pools are hints on
/// top of `final_stock`, which is the single sellable figure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOrder {
    /// Sales-agent orders
    OfflineFirst,
    /// Website checkouts
    OnlineFirst,
}

/// Stock columns after a deduction has been applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeductionPlan {
    pub available: i32,
    pub stock: i32,
    pub final_stock: i32,
    pub online_stock: i32,
    pub offline_stock: i32,
}

/// Before/after summary reported back to the caller of an order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StockChange {
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i32,
    pub before: i32,
    pub after: i32,
}

/// Units available for sale: the override's `final_stock` when enabled,
/// otherwise the legacy `stock` column.
pub fn available_for_sale(product: &product::Model) -> i32 {
    if product.warehouse_enabled {
        product.final_stock
    } else {
        product.stock
    }
}

pub fn insufficient_stock(product: &product::Model, available: i32, required: i32) -> ServiceError {
    ServiceError::InsufficientStock(format!(
        "Insufficient stock for {}. Available: {}, Required: {}",
        product.name, available, required
    ))
}

/// Compute the new stock columns for selling `quantity` units, or reject
/// with an insufficient-stock error naming the product.
pub fn plan_deduction(
    product: &product::Model,
    quantity: i32,
    order: DrainOrder,
) -> Result<DeductionPlan, ServiceError> {
    if quantity <= 0 {
        return Err(ServiceError::ValidationError(
            "Quantity must be at least 1".to_string(),
        ));
    }

    let available = available_for_sale(product);
    if quantity > available {
        return Err(insufficient_stock(product, available, quantity));
    }

    if !product.warehouse_enabled {
        return Ok(DeductionPlan {
            available,
            stock: product.stock - quantity,
            final_stock: product.final_stock,
            online_stock: product.online_stock,
            offline_stock: product.offline_stock,
        });
    }

    let (first, second) = match order {
        DrainOrder::OfflineFirst => (product.offline_stock, product.online_stock),
        DrainOrder::OnlineFirst => (product.online_stock, product.offline_stock),
    };
    let from_first = quantity.min(first.max(0));
    let from_second = (quantity - from_first).min(second.max(0));
    let (first, second) = (first - from_first, second - from_second);
    let (offline_stock, online_stock) = match order {
        DrainOrder::OfflineFirst => (first, second),
        DrainOrder::OnlineFirst => (second, first),
    };

    let final_stock = product.final_stock - quantity;
    Ok(DeductionPlan {
        available,
        stock: final_stock,
        final_stock,
        online_stock,
        offline_stock,
    })
}

fn next_version() -> SimpleExpr {
    Expr::col(product::Column::StockVersion).add(1)
}

fn version_conflict(product: &product::Model) -> ServiceError {
    metrics::increment(metrics::STOCK_GUARD_RETRIES);
    ServiceError::Conflict(format!(
        "Stock for {} was modified concurrently",
        product.name
    ))
}

/// Persist the `Set` columns of `changes` only while the row still carries the
/// version `read` was loaded with. The version is bumped in the same
/// statement, never written as an absolute value.
pub async fn save_versioned<C>(
    conn: &C,
    read: &product::Model,
    changes: product::ActiveModel,
) -> Result<product::Model, ServiceError>
where
    C: ConnectionTrait,
{
    let result = product::Entity::update_many()
        .set(changes)
        .col_expr(product::Column::StockVersion, next_version())
        .filter(product::Column::Id.eq(read.id))
        .filter(product::Column::StockVersion.eq(read.stock_version))
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        warn!(product_id = %read.id, "stock version moved before write");
        return Err(version_conflict(read));
    }

    product::Entity::find_by_id(read.id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", read.id)))
}

/// Attempts per stock-deducting transaction before a conflict is surfaced
pub const MAX_ATTEMPTS: u32 = 3;

/// Re-run a whole stock transaction while it reports `Conflict`, with a short
/// jittered pause between attempts. The last conflict is returned unchanged
/// once `MAX_ATTEMPTS` is reached.
pub async fn retry_on_conflict<T, F, Fut>(
    operation: &'static str,
    mut run: F,
) -> Result<T, ServiceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ServiceError>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match run().await {
            Err(ServiceError::Conflict(msg)) if attempt < MAX_ATTEMPTS => {
                warn!(attempt, operation, %msg, "retrying after stock conflict");
                let pause = 5 * u64::from(attempt) + rand::thread_rng().gen_range(0..10);
                tokio::time::sleep(Duration::from_millis(pause)).await;
            }
            outcome => return outcome,
        }
    }
}

/// Apply a deduction with an optimistic guard on `stock_version`.
///
/// `product` must have been read on the same connection. When another writer
/// bumped the version in between, nothing is written and `Conflict` is
/// returned so the caller can retry its whole transaction.
pub async fn deduct_stock<C>(
    conn: &C,
    product: &product::Model,
    quantity: i32,
    order: DrainOrder,
) -> Result<StockChange, ServiceError>
where
    C: ConnectionTrait,
{
    let plan = plan_deduction(product, quantity, order)?;

    let result = product::Entity::update_many()
        .col_expr(product::Column::Stock, Expr::value(plan.stock))
        .col_expr(product::Column::FinalStock, Expr::value(plan.final_stock))
        .col_expr(product::Column::OnlineStock, Expr::value(plan.online_stock))
        .col_expr(product::Column::OfflineStock, Expr::value(plan.offline_stock))
        .col_expr(product::Column::StockVersion, next_version())
        .col_expr(product::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(product::Column::Id.eq(product.id))
        .filter(product::Column::StockVersion.eq(product.stock_version))
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        warn!(product_id = %product.id, "stock version moved during deduction");
        return Err(version_conflict(product));
    }

    let after = if product.warehouse_enabled {
        plan.final_stock
    } else {
        plan.stock
    };
    debug!(product_id = %product.id, before = plan.available, after, "stock deducted");

    Ok(StockChange {
        product_id: product.id,
        product_name: product.name.clone(),
        quantity,
        before: plan.available,
        after,
    })
}
