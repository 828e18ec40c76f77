use std::collections::HashMap;

use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    entities::{product, stock_batch},
    errors::ServiceError,
};

/// Where an [`EffectiveStock`] snapshot was read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, strum::Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum StockSource {
    WarehouseManual,
    StockBatches,
    ProductDefault,
}

/// Canonical stock figures for one product. All seven quantities are always
/// populated, zero when the source has nothing to say about them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EffectiveStock {
    pub product_id: Uuid,
    pub source: StockSource,
    pub stock_on_arrival: i32,
    pub damaged_qty: i32,
    pub expired_qty: i32,
    pub refurbished_qty: i32,
    pub final_stock: i32,
    pub online_stock: i32,
    pub offline_stock: i32,
}

impl EffectiveStock {
    /// Snapshot of the stored manual override, verbatim
    pub fn from_override(product: &product::Model) -> Self {
        Self {
            product_id: product.id,
            source: StockSource::WarehouseManual,
            stock_on_arrival: product.stock_on_arrival,
            damaged_qty: product.damaged_qty,
            expired_qty: product.expired_qty,
            refurbished_qty: product.refurbished_qty,
            final_stock: product.final_stock,
            online_stock: product.online_stock,
            offline_stock: product.offline_stock,
        }
    }

    fn product_default(product: &product::Model) -> Self {
        Self {
            product_id: product.id,
            source: StockSource::ProductDefault,
            stock_on_arrival: product.stock,
            damaged_qty: 0,
            expired_qty: 0,
            refurbished_qty: 0,
            final_stock: product.stock,
            online_stock: 0,
            offline_stock: 0,
        }
    }
}

#[derive(Default)]
struct BatchTotals {
    original: i64,
    sellable: i64,
    damaged: i64,
    expired: i64,
    refurbished: i64,
    online: i64,
    offline: i64,
}

fn clamp_i32(value: i64) -> i32 {
    i32::try_from(value).unwrap_or(if value < 0 { i32::MIN } else { i32::MAX })
}

/// Resolve stock for a product whose override is disabled, given every batch
/// recorded for it (any status).
///
/// No batches at all falls back to the legacy `stock` column. Batches that
/// exist but are all inactive resolve to zeros from `STOCK_BATCHES`.
pub fn aggregate_batches(product: &product::Model, batches: &[stock_batch::Model]) -> EffectiveStock {
    if batches.is_empty() {
        return EffectiveStock::product_default(product);
    }

    let totals = batches
        .iter()
        .filter(|b| b.product_id == product.id && b.status.is_active())
        .fold(BatchTotals::default(), |mut acc, b| {
            acc.original += i64::from(b.original_quantity);
            acc.sellable += i64::from(b.good_quantity) + i64::from(b.refurbished_quantity);
            acc.damaged += i64::from(b.damaged_quantity);
            acc.expired += i64::from(b.expired_quantity);
            acc.refurbished += i64::from(b.refurbished_quantity);
            acc.online += i64::from(b.online_stock);
            acc.offline += i64::from(b.offline_stock);
            acc
        });

    EffectiveStock {
        product_id: product.id,
        source: StockSource::StockBatches,
        stock_on_arrival: clamp_i32(totals.original),
        damaged_qty: clamp_i32(totals.damaged),
        expired_qty: clamp_i32(totals.expired),
        refurbished_qty: clamp_i32(totals.refurbished),
        final_stock: clamp_i32(totals.sellable),
        online_stock: clamp_i32(totals.online),
        offline_stock: clamp_i32(totals.offline),
    }
}

/// Resolve the effective stock of one product. Runs on any connection so it
/// can participate in an open transaction.
pub async fn resolve_effective_stock<C>(
    conn: &C,
    product: &product::Model,
) -> Result<EffectiveStock, ServiceError>
where
    C: ConnectionTrait,
{
    if product.warehouse_enabled {
        return Ok(EffectiveStock::from_override(product));
    }

    let batches = stock_batch::Entity::find()
        .filter(stock_batch::Column::ProductId.eq(product.id))
        .all(conn)
        .await?;

    Ok(aggregate_batches(product, &batches))
}

/// Resolve many products with a single batch query
pub async fn resolve_many<C>(
    conn: &C,
    products: &[product::Model],
) -> Result<HashMap<Uuid, EffectiveStock>, ServiceError>
where
    C: ConnectionTrait,
{
    let computed_ids: Vec<Uuid> = products
        .iter()
        .filter(|p| !p.warehouse_enabled)
        .map(|p| p.id)
        .collect();

    let mut batches_by_product: HashMap<Uuid, Vec<stock_batch::Model>> = HashMap::new();
    if !computed_ids.is_empty() {
        let batches = stock_batch::Entity::find()
            .filter(stock_batch::Column::ProductId.is_in(computed_ids))
            .all(conn)
            .await?;
        for batch in batches {
            batches_by_product
                .entry(batch.product_id)
                .or_default()
                .push(batch);
        }
    }

    Ok(products
        .iter()
        .map(|p| {
            let snapshot = if p.warehouse_enabled {
                EffectiveStock::from_override(p)
            } else {
                let batches = batches_by_product
                    .get(&p.id)
                    .map(Vec::as_slice)
                    .unwrap_or_default();
                aggregate_batches(p, batches)
            };
            (p.id, snapshot)
        })
        .collect())
}

/// Sum of sellable units across active batches only; `None` when the
/// product has no batches at all.
pub async fn batch_sellable_total<C>(conn: &C, product_id: Uuid) -> Result<Option<i32>, ServiceError>
where
    C: ConnectionTrait,
{
    let batches = stock_batch::Entity::find()
        .filter(stock_batch::Column::ProductId.eq(product_id))
        .all(conn)
        .await?;
    if batches.is_empty() {
        return Ok(None);
    }
    let total: i64 = batches
        .iter()
        .filter(|b| b.status.is_active())
        .map(|b| i64::from(b.good_quantity) + i64::from(b.refurbished_quantity))
        .sum();
    Ok(Some(clamp_i32(total)))
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::entities::stock_batch::BatchStatus;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    pub fn product() -> product::Model {
        let now = Utc::now();
        product::Model {
            id: Uuid::new_v4(),
            sku: "ETH-YRG-250".into(),
            name: "Ethiopia Yirgacheffe 250g".into(),
            description: None,
            category: Some("single-origin".into()),
            price: dec!(5000),
            regular_price: Some(dec!(5500)),
            three_weeks_price: None,
            five_weeks_price: None,
            btb_price: Some(dec!(4200)),
            stock: 7,
            warehouse_enabled: false,
            stock_on_arrival: 0,
            damaged_qty: 0,
            expired_qty: 0,
            refurbished_qty: 0,
            final_stock: 0,
            online_stock: 0,
            offline_stock: 0,
            warehouse_notes: None,
            warehouse_last_updated: None,
            warehouse_updated_by: None,
            stock_version: 0,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn batch(product_id: Uuid, status: BatchStatus, good: i32, refurbished: i32) -> stock_batch::Model {
        let now = Utc::now();
        stock_batch::Model {
            id: Uuid::new_v4(),
            product_id,
            batch_number: format!("B-{}", &Uuid::new_v4().simple().to_string()[..6]),
            status,
            original_quantity: good + refurbished + 2,
            good_quantity: good,
            refurbished_quantity: refurbished,
            damaged_quantity: 1,
            expired_quantity: 1,
            online_stock: good / 2,
            offline_stock: 0,
            received_at: now,
            notes: None,
            created_by: None,
            created_at: now,
            updated_at: now,
        }
    }
}
