use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Catalog product.
///
/// The `warehouse_*` columns plus the seven quantity columns form the manual
/// warehouse override. While `warehouse_enabled` is set they are the authoritative
/// stock figures; otherwise stock is derived from active batches.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub sku: String,
    pub name: String,
    #[sea_orm(nullable)]
    pub description: Option<String>,
    #[sea_orm(nullable)]
    pub category: Option<String>,

    /// Base price, last resort of every price chain
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub price: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))", nullable)]
    pub regular_price: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))", nullable)]
    pub three_weeks_price: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))", nullable)]
    pub five_weeks_price: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))", nullable)]
    pub btb_price: Option<Decimal>,

    /// Legacy single stock figure
    pub stock: i32,

    pub warehouse_enabled: bool,
    pub stock_on_arrival: i32,
    pub damaged_qty: i32,
    pub expired_qty: i32,
    pub refurbished_qty: i32,
    pub final_stock: i32,
    pub online_stock: i32,
    pub offline_stock: i32,
    #[sea_orm(nullable)]
    pub warehouse_notes: Option<String>,
    #[sea_orm(nullable)]
    pub warehouse_last_updated: Option<DateTime<Utc>>,
    #[sea_orm(nullable)]
    pub warehouse_updated_by: Option<Uuid>,

    /// Bumped on every stock write; guarded updates compare against it
    pub stock_version: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::stock_batch::Entity")]
    StockBatches,
}

impl Related<super::stock_batch::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StockBatches.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Delivery-option pricing tier chosen per cart/order line
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    EnumIter,
    DeriveActiveEnum,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PriceOption {
    #[default]
    #[sea_orm(string_value = "REGULAR")]
    Regular,
    #[sea_orm(string_value = "THREE_WEEKS")]
    ThreeWeeks,
    #[sea_orm(string_value = "FIVE_WEEKS")]
    FiveWeeks,
}
