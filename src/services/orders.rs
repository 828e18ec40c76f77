use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::{distributions::Alphanumeric, Rng};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::{
    auth::{
        authorize,
        policy::{order_scope, OrderScope},
        Action, AuthUser, Resource,
    },
    entities::{
        order::{
            self, OrderMode, OrderSource, OrderStatus, OrderType, PaymentMethod, PaymentStatus,
        },
        product::PriceOption,
    },
    errors::ServiceError,
    services::pricing::{GroupTotals, LineAmounts},
};

/// Human-readable order number, `ORD-YYYYMMDD-XXXXXXXX`
pub fn generate_order_id(now: DateTime<Utc>) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect();
    format!("ORD-{}-{}", now.format("%Y%m%d"), suffix.to_uppercase())
}

/// A priced line ready to become one order row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricedLine {
    pub product_id: Uuid,
    pub product_name: String,
    pub product_sku: String,
    pub price_option: PriceOption,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub amounts: LineAmounts,
}

/// Attributes shared by every row of one order group
#[derive(Debug, Clone)]
pub(crate) struct GroupContext {
    pub group_id: Uuid,
    pub source: OrderSource,
    pub order_type: OrderType,
    pub order_mode: OrderMode,
    pub user_id: Option<Uuid>,
    pub customer_id: Option<Uuid>,
    pub created_by: Option<Uuid>,
    pub currency: String,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub payment_reference: Option<String>,
    pub order_status: OrderStatus,
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub totals: GroupTotals,
}

/// Insert one row per line. The first row is the parent and carries the
/// group aggregates.
pub(crate) async fn insert_order_group<C>(
    conn: &C,
    ctx: &GroupContext,
    lines: &[PricedLine],
) -> Result<Vec<order::Model>, ServiceError>
where
    C: ConnectionTrait,
{
    let now = Utc::now();
    let mut rows = Vec::with_capacity(lines.len());

    for (idx, line) in lines.iter().enumerate() {
        let is_parent = idx == 0;
        let group = |value: Decimal| if is_parent { Some(value) } else { None };

        let row = order::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(generate_order_id(now)),
            order_group_id: Set(ctx.group_id),
            is_parent: Set(is_parent),
            source: Set(ctx.source),
            order_type: Set(ctx.order_type),
            order_mode: Set(ctx.order_mode),
            user_id: Set(ctx.user_id),
            customer_id: Set(ctx.customer_id),
            created_by: Set(ctx.created_by),
            product_id: Set(line.product_id),
            product_name: Set(line.product_name.clone()),
            product_sku: Set(line.product_sku.clone()),
            price_option: Set(line.price_option),
            quantity: Set(line.quantity),
            unit_price: Set(line.unit_price),
            sub_total: Set(line.amounts.sub_total),
            discount_amount: Set(line.amounts.discount),
            tax_amount: Set(line.amounts.tax),
            shipping_cost: Set(line.amounts.shipping),
            total_amount: Set(line.amounts.total),
            group_sub_total: Set(group(ctx.totals.sub_total)),
            group_discount: Set(group(ctx.totals.discount)),
            group_tax: Set(group(ctx.totals.tax)),
            group_shipping: Set(group(ctx.totals.shipping)),
            group_total: Set(group(ctx.totals.total)),
            currency: Set(ctx.currency.clone()),
            payment_method: Set(ctx.payment_method),
            payment_status: Set(ctx.payment_status),
            payment_reference: Set(ctx.payment_reference.clone()),
            order_status: Set(ctx.order_status),
            estimated_delivery: Set(ctx.estimated_delivery),
            actual_delivery: Set(None),
            notes: Set(ctx.notes.clone()),
            created_at: Set(now),
            updated_at: Set(now),
        };
        rows.push(row.insert(conn).await?);
    }

    Ok(rows)
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct OrderListQuery {
    pub status: Option<OrderStatus>,
    pub source: Option<OrderSource>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

/// Read side of orders
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
}

impl OrderService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Orders visible to the actor, newest first
    #[instrument(skip(self, actor), fields(user_id = %actor.user_id))]
    pub async fn list_orders(
        &self,
        actor: &AuthUser,
        query: OrderListQuery,
    ) -> Result<(Vec<order::Model>, u64), ServiceError> {
        let mut select = order::Entity::find().order_by_desc(order::Column::CreatedAt);

        select = match order_scope(actor) {
            OrderScope::All => select,
            OrderScope::CreatedByOrWebsite(user_id) => select.filter(
                Condition::any()
                    .add(order::Column::CreatedBy.eq(user_id))
                    .add(order::Column::Source.eq(OrderSource::Website)),
            ),
            OrderScope::OwnedBy(user_id) => select.filter(order::Column::UserId.eq(user_id)),
        };
        if let Some(status) = query.status {
            select = select.filter(order::Column::OrderStatus.eq(status));
        }
        if let Some(source) = query.source {
            select = select.filter(order::Column::Source.eq(source));
        }

        let per_page = query.per_page.unwrap_or(20).clamp(1, 100);
        let page = query.page.unwrap_or(1).max(1);
        let paginator = select.paginate(&*self.db, per_page);
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page - 1).await?;
        Ok((items, total))
    }

    pub async fn get_order(
        &self,
        actor: &AuthUser,
        order_id: &str,
    ) -> Result<order::Model, ServiceError> {
        let order = order::Entity::find()
            .filter(order::Column::OrderId.eq(order_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        authorize(actor, Action::ViewOrder(Resource::order(&order)))?;
        Ok(order)
    }

    /// Every row of a group, parent first
    pub async fn get_group(
        &self,
        actor: &AuthUser,
        group_id: Uuid,
    ) -> Result<Vec<order::Model>, ServiceError> {
        let rows = order::Entity::find()
            .filter(order::Column::OrderGroupId.eq(group_id))
            .order_by_desc(order::Column::IsParent)
            .order_by_asc(order::Column::CreatedAt)
            .all(&*self.db)
            .await?;

        let first = rows
            .first()
            .ok_or_else(|| ServiceError::NotFound(format!("Order group {} not found", group_id)))?;
        authorize(actor, Action::ViewOrder(Resource::order(first)))?;
        Ok(rows)
    }
}
