use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, SqlErr, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::{authorize, Action, AuthUser},
    entities::{
        product,
        stock_batch::{self, BatchStatus},
        warehouse_activity::{self, WarehouseAction},
        warehouse_settings::{self, SETTINGS_ROW_ID},
    },
    errors::ServiceError,
    metrics,
    services::{
        stock::{batch_sellable_total, resolve_effective_stock, resolve_many, EffectiveStock},
        stock_deduction::save_versioned,
    },
};

pub const DEFAULT_LOW_STOCK_THRESHOLD: i32 = 20;
pub const DEFAULT_CRITICAL_STOCK_THRESHOLD: i32 = 5;

/// A physical stock count recorded by warehouse staff
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ManualStockUpdate {
    pub product_id: Uuid,
    pub stock_on_arrival: i32,
    pub damaged_qty: i32,
    pub expired_qty: i32,
    pub refurbished_qty: i32,
    pub final_stock: i32,
    pub online_stock: i32,
    pub offline_stock: i32,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Check a manual update against the accounting identities. Every violation
/// is reported, not just the first.
pub fn validate_manual_update(update: &ManualStockUpdate) -> Vec<String> {
    let mut errors = Vec::new();

    let fields = [
        ("stockOnArrival", update.stock_on_arrival),
        ("damagedQty", update.damaged_qty),
        ("expiredQty", update.expired_qty),
        ("refurbishedQty", update.refurbished_qty),
        ("finalStock", update.final_stock),
        ("onlineStock", update.online_stock),
        ("offlineStock", update.offline_stock),
    ];
    for (name, value) in fields {
        if value < 0 {
            errors.push(format!("{} must be non-negative", name));
        }
    }

    let accounted = i64::from(update.damaged_qty)
        + i64::from(update.expired_qty)
        + i64::from(update.refurbished_qty)
        + i64::from(update.final_stock);
    if accounted != i64::from(update.stock_on_arrival) {
        errors.push(format!(
            "damagedQty + expiredQty + refurbishedQty + finalStock ({}) must equal stockOnArrival ({})",
            accounted, update.stock_on_arrival
        ));
    }

    let allocated = i64::from(update.online_stock) + i64::from(update.offline_stock);
    if allocated > i64::from(update.final_stock) {
        errors.push(format!(
            "onlineStock + offlineStock ({}) cannot exceed finalStock ({})",
            allocated, update.final_stock
        ));
    }

    errors
}

fn quantity_fields(stock: &EffectiveStock) -> [(&'static str, i32); 7] {
    [
        ("stockOnArrival", stock.stock_on_arrival),
        ("damagedQty", stock.damaged_qty),
        ("expiredQty", stock.expired_qty),
        ("refurbishedQty", stock.refurbished_qty),
        ("finalStock", stock.final_stock),
        ("onlineStock", stock.online_stock),
        ("offlineStock", stock.offline_stock),
    ]
}

/// Field-level before/after map containing only the fields that changed
pub fn stock_diff(before: &EffectiveStock, after: &EffectiveStock) -> Map<String, Value> {
    quantity_fields(before)
        .into_iter()
        .zip(quantity_fields(after))
        .filter(|((_, b), (_, a))| b != a)
        .map(|((name, b), (_, a))| (name.to_string(), json!({ "before": b, "after": a })))
        .collect()
}

pub(crate) struct NewActivity {
    pub action: WarehouseAction,
    pub product_id: Option<Uuid>,
    pub performed_by: Uuid,
    pub changes: Value,
    pub quantity_delta: Option<i32>,
    pub reference: Option<String>,
    pub notes: Option<String>,
}

/// Append one audit record on the given connection
pub(crate) async fn record_activity<C>(
    conn: &C,
    activity: NewActivity,
) -> Result<warehouse_activity::Model, ServiceError>
where
    C: ConnectionTrait,
{
    let model = warehouse_activity::ActiveModel {
        id: Set(Uuid::new_v4()),
        action: Set(activity.action),
        product_id: Set(activity.product_id),
        performed_by: Set(activity.performed_by),
        changes: Set(activity.changes),
        quantity_delta: Set(activity.quantity_delta),
        reference: Set(activity.reference),
        notes: Set(activity.notes),
        created_at: Set(Utc::now()),
    };
    Ok(model.insert(conn).await?)
}

/// Load the persisted settings row, creating it with defaults on first use
pub(crate) async fn load_settings<C>(conn: &C) -> Result<warehouse_settings::Model, ServiceError>
where
    C: ConnectionTrait,
{
    if let Some(existing) = warehouse_settings::Entity::find_by_id(SETTINGS_ROW_ID)
        .one(conn)
        .await?
    {
        return Ok(existing);
    }

    let defaults = warehouse_settings::ActiveModel {
        id: Set(SETTINGS_ROW_ID),
        alerts_enabled: Set(true),
        low_stock_threshold: Set(DEFAULT_LOW_STOCK_THRESHOLD),
        critical_stock_threshold: Set(DEFAULT_CRITICAL_STOCK_THRESHOLD),
        updated_by: Set(None),
        updated_at: Set(Utc::now()),
    };
    Ok(defaults.insert(conn).await?)
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DisableOverrideRequest {
    pub product_id: Uuid,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileRequest {
    pub product_id: Uuid,
    pub actual_count: i32,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileOutcome {
    pub product_id: Uuid,
    pub previous_final_stock: i32,
    pub actual_count: i32,
    /// Signed difference between the counted and the recorded figure
    pub delta: i32,
    pub stock: EffectiveStock,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StockAlertItem {
    pub product_id: Uuid,
    pub name: String,
    pub sku: String,
    pub final_stock: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StockAlerts {
    pub enabled: bool,
    pub low_stock_threshold: i32,
    pub critical_stock_threshold: i32,
    pub out_of_stock: Vec<StockAlertItem>,
    pub critical_stock: Vec<StockAlertItem>,
    pub low_stock: Vec<StockAlertItem>,
}

/// Bucket snapshots by the persisted thresholds. Each product lands in at
/// most one bucket, the most severe that applies.
pub fn partition_alerts(
    settings: &warehouse_settings::Model,
    products: &[(product::Model, EffectiveStock)],
) -> StockAlerts {
    let mut alerts = StockAlerts {
        enabled: settings.alerts_enabled,
        low_stock_threshold: settings.low_stock_threshold,
        critical_stock_threshold: settings.critical_stock_threshold,
        out_of_stock: Vec::new(),
        critical_stock: Vec::new(),
        low_stock: Vec::new(),
    };
    if !settings.alerts_enabled {
        return alerts;
    }

    for (product, stock) in products {
        let item = StockAlertItem {
            product_id: product.id,
            name: product.name.clone(),
            sku: product.sku.clone(),
            final_stock: stock.final_stock,
        };
        if stock.final_stock <= 0 {
            alerts.out_of_stock.push(item);
        } else if stock.final_stock <= settings.critical_stock_threshold {
            alerts.critical_stock.push(item);
        } else if stock.final_stock <= settings.low_stock_threshold {
            alerts.low_stock.push(item);
        }
    }
    alerts
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSettingsRequest {
    pub alerts_enabled: Option<bool>,
    pub low_stock_threshold: Option<i32>,
    pub critical_stock_threshold: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateBatchRequest {
    pub product_id: Uuid,
    #[validate(length(min = 1, max = 64, message = "batchNumber is required"))]
    pub batch_number: String,
    #[serde(default)]
    pub status: Option<BatchStatus>,
    pub original_quantity: i32,
    pub good_quantity: i32,
    #[serde(default)]
    pub refurbished_quantity: i32,
    #[serde(default)]
    pub damaged_quantity: i32,
    #[serde(default)]
    pub expired_quantity: i32,
    #[serde(default)]
    pub online_stock: i32,
    #[serde(default)]
    pub offline_stock: i32,
    #[serde(default)]
    pub received_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub notes: Option<String>,
}

pub fn validate_batch(request: &CreateBatchRequest) -> Vec<String> {
    let mut errors = Vec::new();
    let fields = [
        ("originalQuantity", request.original_quantity),
        ("goodQuantity", request.good_quantity),
        ("refurbishedQuantity", request.refurbished_quantity),
        ("damagedQuantity", request.damaged_quantity),
        ("expiredQuantity", request.expired_quantity),
        ("onlineStock", request.online_stock),
        ("offlineStock", request.offline_stock),
    ];
    for (name, value) in fields {
        if value < 0 {
            errors.push(format!("{} must be non-negative", name));
        }
    }

    let sellable = i64::from(request.good_quantity) + i64::from(request.refurbished_quantity);
    let accounted =
        sellable + i64::from(request.damaged_quantity) + i64::from(request.expired_quantity);
    if accounted != i64::from(request.original_quantity) {
        errors.push(format!(
            "goodQuantity + refurbishedQuantity + damagedQuantity + expiredQuantity ({}) must equal originalQuantity ({})",
            accounted, request.original_quantity
        ));
    }

    let allocated = i64::from(request.online_stock) + i64::from(request.offline_stock);
    if allocated > sellable {
        errors.push(format!(
            "onlineStock + offlineStock ({}) cannot exceed goodQuantity + refurbishedQuantity ({})",
            allocated, sellable
        ));
    }
    errors
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBatchStatusRequest {
    pub status: BatchStatus,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Warehouse operations on stock overrides, batches, settings and the
/// activity log. Every write runs in one transaction together with its audit
/// record.
#[derive(Clone)]
pub struct WarehouseService {
    db: Arc<DatabaseConnection>,
}

impl WarehouseService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self, actor), fields(user_id = %actor.user_id))]
    pub async fn get_stock(
        &self,
        actor: &AuthUser,
        product_id: Uuid,
    ) -> Result<EffectiveStock, ServiceError> {
        authorize(actor, Action::ViewWarehouse)?;
        let product = find_product(&*self.db, product_id).await?;
        resolve_effective_stock(&*self.db, &product).await
    }

    /// Record a manual count. The override becomes authoritative and the
    /// legacy `stock` column mirrors `final_stock`.
    #[instrument(skip(self, actor, update), fields(user_id = %actor.user_id, product_id = %update.product_id))]
    pub async fn update_stock(
        &self,
        actor: &AuthUser,
        update: ManualStockUpdate,
    ) -> Result<EffectiveStock, ServiceError> {
        authorize(actor, Action::UpdateWarehouseStock)?;

        let errors = validate_manual_update(&update);
        if !errors.is_empty() {
            return Err(ServiceError::InvalidFields(errors));
        }

        let txn = self.db.begin().await?;
        let product = find_product(&txn, update.product_id).await?;
        let before = resolve_effective_stock(&txn, &product).await?;
        let was_enabled = product.warehouse_enabled;
        let now = Utc::now();

        let mut active: product::ActiveModel = product.clone().into();
        active.warehouse_enabled = Set(true);
        active.stock_on_arrival = Set(update.stock_on_arrival);
        active.damaged_qty = Set(update.damaged_qty);
        active.expired_qty = Set(update.expired_qty);
        active.refurbished_qty = Set(update.refurbished_qty);
        active.final_stock = Set(update.final_stock);
        active.online_stock = Set(update.online_stock);
        active.offline_stock = Set(update.offline_stock);
        active.stock = Set(update.final_stock);
        active.warehouse_notes = Set(update.notes.clone());
        active.warehouse_last_updated = Set(Some(now));
        active.warehouse_updated_by = Set(Some(actor.user_id));
        active.updated_at = Set(now);
        let updated = save_versioned(&txn, &product, active).await?;

        let after = EffectiveStock::from_override(&updated);
        let mut changes = stock_diff(&before, &after);
        if !was_enabled {
            changes.insert(
                "warehouseEnabled".to_string(),
                json!({ "before": false, "after": true }),
            );
        }

        record_activity(
            &txn,
            NewActivity {
                action: WarehouseAction::ManualStockUpdate,
                product_id: Some(updated.id),
                performed_by: actor.user_id,
                changes: Value::Object(changes),
                quantity_delta: Some(after.final_stock - before.final_stock),
                reference: None,
                notes: update.notes,
            },
        )
        .await?;
        txn.commit().await?;

        metrics::increment(metrics::WAREHOUSE_MANUAL_UPDATES);
        info!(
            product_id = %updated.id,
            final_stock = after.final_stock,
            "manual warehouse stock recorded"
        );
        Ok(after)
    }

    /// Hand authority back to the batch resolver and re-sync legacy stock
    /// from the batch total. Products without batches keep their stock.
    #[instrument(skip(self, actor, request), fields(user_id = %actor.user_id, product_id = %request.product_id))]
    pub async fn disable_override(
        &self,
        actor: &AuthUser,
        request: DisableOverrideRequest,
    ) -> Result<EffectiveStock, ServiceError> {
        authorize(actor, Action::UpdateWarehouseStock)?;

        let txn = self.db.begin().await?;
        let product = find_product(&txn, request.product_id).await?;
        let was_enabled = product.warehouse_enabled;
        let previous_stock = product.stock;
        let batch_total = batch_sellable_total(&txn, product.id).await?;
        let new_stock = batch_total.unwrap_or(previous_stock);

        let mut active: product::ActiveModel = product.clone().into();
        active.warehouse_enabled = Set(false);
        active.stock = Set(new_stock);
        active.warehouse_last_updated = Set(Some(Utc::now()));
        active.warehouse_updated_by = Set(Some(actor.user_id));
        active.updated_at = Set(Utc::now());
        let updated = save_versioned(&txn, &product, active).await?;

        let after = resolve_effective_stock(&txn, &updated).await?;

        let mut changes = Map::new();
        changes.insert(
            "warehouseEnabled".to_string(),
            json!({ "before": was_enabled, "after": false }),
        );
        if previous_stock != new_stock {
            changes.insert(
                "stock".to_string(),
                json!({ "before": previous_stock, "after": new_stock }),
            );
        }

        record_activity(
            &txn,
            NewActivity {
                action: WarehouseAction::OverrideDisabled,
                product_id: Some(updated.id),
                performed_by: actor.user_id,
                changes: Value::Object(changes),
                quantity_delta: Some(new_stock - previous_stock),
                reference: None,
                notes: request.notes,
            },
        )
        .await?;
        txn.commit().await?;

        info!(product_id = %updated.id, source = %after.source, "warehouse override disabled");
        Ok(after)
    }

    /// Overwrite `final_stock` with a physically counted figure. A disabled
    /// override is first materialised from the resolver so the identity keeps
    /// holding afterwards.
    #[instrument(skip(self, actor, request), fields(user_id = %actor.user_id, product_id = %request.product_id))]
    pub async fn reconcile(
        &self,
        actor: &AuthUser,
        request: ReconcileRequest,
    ) -> Result<ReconcileOutcome, ServiceError> {
        authorize(actor, Action::UpdateWarehouseStock)?;
        if request.actual_count < 0 {
            return Err(ServiceError::InvalidFields(vec![
                "actualCount must be non-negative".to_string(),
            ]));
        }

        let txn = self.db.begin().await?;
        let product = find_product(&txn, request.product_id).await?;
        let current = resolve_effective_stock(&txn, &product).await?;
        let actual = request.actual_count;
        let delta = actual - current.final_stock;

        let mut online = current.online_stock.max(0);
        let mut offline = current.offline_stock.max(0);
        let excess = online + offline - actual;
        if excess > 0 {
            let from_offline = excess.min(offline);
            offline -= from_offline;
            online -= excess - from_offline;
        }
        let stock_on_arrival =
            current.damaged_qty + current.expired_qty + current.refurbished_qty + actual;

        let now = Utc::now();
        let mut active: product::ActiveModel = product.clone().into();
        active.warehouse_enabled = Set(true);
        active.stock_on_arrival = Set(stock_on_arrival);
        active.damaged_qty = Set(current.damaged_qty);
        active.expired_qty = Set(current.expired_qty);
        active.refurbished_qty = Set(current.refurbished_qty);
        active.final_stock = Set(actual);
        active.online_stock = Set(online);
        active.offline_stock = Set(offline);
        active.stock = Set(actual);
        active.warehouse_last_updated = Set(Some(now));
        active.warehouse_updated_by = Set(Some(actor.user_id));
        active.updated_at = Set(now);
        let updated = save_versioned(&txn, &product, active).await?;

        let after = EffectiveStock::from_override(&updated);
        record_activity(
            &txn,
            NewActivity {
                action: WarehouseAction::StockReconciled,
                product_id: Some(updated.id),
                performed_by: actor.user_id,
                changes: Value::Object(stock_diff(&current, &after)),
                quantity_delta: Some(delta),
                reference: None,
                notes: request.notes,
            },
        )
        .await?;
        txn.commit().await?;

        metrics::increment(metrics::WAREHOUSE_RECONCILIATIONS);
        info!(product_id = %updated.id, delta, "stock reconciled against physical count");

        Ok(ReconcileOutcome {
            product_id: updated.id,
            previous_final_stock: current.final_stock,
            actual_count: actual,
            delta,
            stock: after,
        })
    }

    #[instrument(skip(self, actor), fields(user_id = %actor.user_id))]
    pub async fn alerts(&self, actor: &AuthUser) -> Result<StockAlerts, ServiceError> {
        authorize(actor, Action::ViewWarehouse)?;
        let db = &*self.db;
        let settings = load_settings(db).await?;
        if !settings.alerts_enabled {
            return Ok(partition_alerts(&settings, &[]));
        }

        let products = product::Entity::find()
            .filter(product::Column::IsActive.eq(true))
            .order_by_asc(product::Column::Name)
            .all(db)
            .await?;
        let mut snapshots = resolve_many(db, &products).await?;
        let pairs: Vec<(product::Model, EffectiveStock)> = products
            .into_iter()
            .filter_map(|p| snapshots.remove(&p.id).map(|s| (p, s)))
            .collect();

        Ok(partition_alerts(&settings, &pairs))
    }

    pub async fn get_settings(
        &self,
        actor: &AuthUser,
    ) -> Result<warehouse_settings::Model, ServiceError> {
        authorize(actor, Action::ViewWarehouse)?;
        load_settings(&*self.db).await
    }

    #[instrument(skip(self, actor), fields(user_id = %actor.user_id))]
    pub async fn update_settings(
        &self,
        actor: &AuthUser,
        request: UpdateSettingsRequest,
    ) -> Result<warehouse_settings::Model, ServiceError> {
        authorize(actor, Action::ManageWarehouseSettings)?;

        let txn = self.db.begin().await?;
        let current = load_settings(&txn).await?;
        let alerts_enabled = request.alerts_enabled.unwrap_or(current.alerts_enabled);
        let low = request
            .low_stock_threshold
            .unwrap_or(current.low_stock_threshold);
        let critical = request
            .critical_stock_threshold
            .unwrap_or(current.critical_stock_threshold);

        let mut errors = Vec::new();
        if low < 0 {
            errors.push("lowStockThreshold must be non-negative".to_string());
        }
        if critical < 0 {
            errors.push("criticalStockThreshold must be non-negative".to_string());
        }
        if critical > low {
            errors.push(format!(
                "criticalStockThreshold ({}) cannot exceed lowStockThreshold ({})",
                critical, low
            ));
        }
        if !errors.is_empty() {
            return Err(ServiceError::InvalidFields(errors));
        }

        let mut changes = Map::new();
        if alerts_enabled != current.alerts_enabled {
            changes.insert(
                "alertsEnabled".into(),
                json!({ "before": current.alerts_enabled, "after": alerts_enabled }),
            );
        }
        if low != current.low_stock_threshold {
            changes.insert(
                "lowStockThreshold".into(),
                json!({ "before": current.low_stock_threshold, "after": low }),
            );
        }
        if critical != current.critical_stock_threshold {
            changes.insert(
                "criticalStockThreshold".into(),
                json!({ "before": current.critical_stock_threshold, "after": critical }),
            );
        }

        let mut active: warehouse_settings::ActiveModel = current.into();
        active.alerts_enabled = Set(alerts_enabled);
        active.low_stock_threshold = Set(low);
        active.critical_stock_threshold = Set(critical);
        active.updated_by = Set(Some(actor.user_id));
        active.updated_at = Set(Utc::now());
        let updated = active.update(&txn).await?;

        record_activity(
            &txn,
            NewActivity {
                action: WarehouseAction::SettingsUpdated,
                product_id: None,
                performed_by: actor.user_id,
                changes: Value::Object(changes),
                quantity_delta: None,
                reference: None,
                notes: None,
            },
        )
        .await?;
        txn.commit().await?;

        info!(alerts_enabled, low, critical, "warehouse settings updated");
        Ok(updated)
    }

    /// Newest-first activity page, optionally for one product
    pub async fn list_activity(
        &self,
        actor: &AuthUser,
        product_id: Option<Uuid>,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<warehouse_activity::Model>, u64), ServiceError> {
        authorize(actor, Action::ViewWarehouse)?;

        let mut query = warehouse_activity::Entity::find()
            .order_by_desc(warehouse_activity::Column::CreatedAt);
        if let Some(product_id) = product_id {
            query = query.filter(warehouse_activity::Column::ProductId.eq(product_id));
        }

        let paginator = query.paginate(&*self.db, per_page.max(1));
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((items, total))
    }

    #[instrument(skip(self, actor, request), fields(user_id = %actor.user_id, product_id = %request.product_id))]
    pub async fn create_batch(
        &self,
        actor: &AuthUser,
        request: CreateBatchRequest,
    ) -> Result<stock_batch::Model, ServiceError> {
        authorize(actor, Action::ManageBatches)?;
        request.validate()?;
        let errors = validate_batch(&request);
        if !errors.is_empty() {
            return Err(ServiceError::InvalidFields(errors));
        }

        let txn = self.db.begin().await?;
        let product = find_product(&txn, request.product_id).await?;
        let now = Utc::now();
        let sellable = request.good_quantity + request.refurbished_quantity;

        let batch = stock_batch::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(product.id),
            batch_number: Set(request.batch_number.trim().to_string()),
            status: Set(request.status.unwrap_or(BatchStatus::Received)),
            original_quantity: Set(request.original_quantity),
            good_quantity: Set(request.good_quantity),
            refurbished_quantity: Set(request.refurbished_quantity),
            damaged_quantity: Set(request.damaged_quantity),
            expired_quantity: Set(request.expired_quantity),
            online_stock: Set(request.online_stock),
            offline_stock: Set(request.offline_stock),
            received_at: Set(request.received_at.unwrap_or(now)),
            notes: Set(request.notes.clone()),
            created_by: Set(Some(actor.user_id)),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await
        .map_err(|err| match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => ServiceError::Conflict(format!(
                "Batch {} already exists for this product",
                request.batch_number.trim()
            )),
            _ => ServiceError::DatabaseError(err),
        })?;

        record_activity(
            &txn,
            NewActivity {
                action: WarehouseAction::BatchReceived,
                product_id: Some(product.id),
                performed_by: actor.user_id,
                changes: json!({
                    "batchNumber": batch.batch_number,
                    "status": batch.status,
                    "originalQuantity": batch.original_quantity,
                    "sellable": sellable,
                }),
                quantity_delta: Some(sellable),
                reference: Some(batch.id.to_string()),
                notes: request.notes,
            },
        )
        .await?;
        txn.commit().await?;

        info!(batch_id = %batch.id, sellable, "stock batch received");
        Ok(batch)
    }

    pub async fn list_batches(
        &self,
        actor: &AuthUser,
        product_id: Option<Uuid>,
    ) -> Result<Vec<stock_batch::Model>, ServiceError> {
        authorize(actor, Action::ViewWarehouse)?;
        let mut query =
            stock_batch::Entity::find().order_by_desc(stock_batch::Column::ReceivedAt);
        if let Some(product_id) = product_id {
            query = query.filter(stock_batch::Column::ProductId.eq(product_id));
        }
        Ok(query.all(&*self.db).await?)
    }

    #[instrument(skip(self, actor, request), fields(user_id = %actor.user_id))]
    pub async fn update_batch_status(
        &self,
        actor: &AuthUser,
        batch_id: Uuid,
        request: UpdateBatchStatusRequest,
    ) -> Result<stock_batch::Model, ServiceError> {
        authorize(actor, Action::ManageBatches)?;

        let txn = self.db.begin().await?;
        let batch = stock_batch::Entity::find_by_id(batch_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Stock batch {} not found", batch_id)))?;
        let previous = batch.status;

        let mut active: stock_batch::ActiveModel = batch.into();
        active.status = Set(request.status);
        active.updated_at = Set(Utc::now());
        let updated = active.update(&txn).await?;

        record_activity(
            &txn,
            NewActivity {
                action: WarehouseAction::BatchStatusChanged,
                product_id: Some(updated.product_id),
                performed_by: actor.user_id,
                changes: json!({ "status": { "before": previous, "after": updated.status } }),
                quantity_delta: None,
                reference: Some(updated.id.to_string()),
                notes: request.notes,
            },
        )
        .await?;
        txn.commit().await?;

        Ok(updated)
    }
}

async fn find_product<C>(conn: &C, product_id: Uuid) -> Result<product::Model, ServiceError>
where
    C: ConnectionTrait,
{
    product::Entity::find_by_id(product_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))
}
