use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Shipping price for a (zone, method) pair
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "shipping_rates")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub zone: String,
    pub method: String,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub base_cost: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub per_item_cost: Decimal,
    pub estimated_days: i32,
    pub is_active: bool,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
