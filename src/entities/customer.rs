use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// BTC or BTB customer profile, either created by a sales agent or
/// self-registered through the website.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "customers")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub customer_type: CustomerType,
    pub name: String,
    #[sea_orm(nullable)]
    pub email: Option<String>,
    #[sea_orm(nullable)]
    pub phone: Option<String>,
    #[sea_orm(nullable)]
    pub company_name: Option<String>,
    #[sea_orm(nullable)]
    pub registration_number: Option<String>,
    #[sea_orm(nullable)]
    pub address: Option<String>,
    pub website_customer: bool,
    #[sea_orm(nullable)]
    pub user_id: Option<Uuid>,
    #[sea_orm(nullable)]
    pub created_by: Option<Uuid>,
    pub total_orders: i32,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub total_order_value: Decimal,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order::Entity")]
    Orders,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Orders.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(3))")]
pub enum CustomerType {
    #[sea_orm(string_value = "BTC")]
    #[serde(rename = "BTC")]
    Btc,
    #[sea_orm(string_value = "BTB")]
    #[serde(rename = "BTB")]
    Btb,
}
