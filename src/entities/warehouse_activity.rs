use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Append-only audit record of a stock-affecting action
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "warehouse_activities")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub action: WarehouseAction,
    #[sea_orm(nullable)]
    pub product_id: Option<Uuid>,
    pub performed_by: Uuid,
    /// Field name -> `{ "before": .., "after": .. }`
    #[sea_orm(column_type = "Json")]
    pub changes: Json,
    /// Signed quantity movement, when the action has one
    #[sea_orm(nullable)]
    pub quantity_delta: Option<i32>,
    #[sea_orm(nullable)]
    pub reference: Option<String>,
    #[sea_orm(nullable)]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WarehouseAction {
    #[sea_orm(string_value = "MANUAL_STOCK_UPDATE")]
    ManualStockUpdate,
    #[sea_orm(string_value = "OVERRIDE_DISABLED")]
    OverrideDisabled,
    #[sea_orm(string_value = "STOCK_RECONCILED")]
    StockReconciled,
    #[sea_orm(string_value = "ORDER_STOCK_DEDUCTION")]
    OrderStockDeduction,
    #[sea_orm(string_value = "BATCH_RECEIVED")]
    BatchReceived,
    #[sea_orm(string_value = "BATCH_STATUS_CHANGED")]
    BatchStatusChanged,
    #[sea_orm(string_value = "SETTINGS_UPDATED")]
    SettingsUpdated,
}
