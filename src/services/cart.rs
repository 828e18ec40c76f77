use std::{collections::HashMap, sync::Arc};

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, Set, SqlErr,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    auth::{authorize, Action, AuthUser},
    entities::{
        cart_item,
        order::OrderType,
        product::{self, PriceOption},
    },
    errors::ServiceError,
    services::{
        pricing::{line_sub_total, resolve_unit_price},
        stock::resolve_effective_stock,
        stock_deduction::insufficient_stock,
    },
};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartRequest {
    pub product_id: Uuid,
    pub quantity: i32,
    #[serde(default)]
    pub price_option: PriceOption,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCartItemRequest {
    pub quantity: i32,
}

/// One cart line priced at current consumer tiers
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub sku: String,
    pub price_option: PriceOption,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    pub items: Vec<CartLine>,
    pub item_count: i32,
    pub sub_total: Decimal,
}

fn check_quantity(quantity: i32) -> Result<(), ServiceError> {
    if quantity < 1 {
        return Err(ServiceError::ValidationError(
            "Quantity must be at least 1".to_string(),
        ));
    }
    Ok(())
}

fn map_unique_violation(err: DbErr) -> ServiceError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => ServiceError::Conflict(
            "Cart line was modified concurrently, please retry".to_string(),
        ),
        _ => ServiceError::DatabaseError(err),
    }
}

#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
}

impl CartService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Current cart contents, priced
    pub async fn get_cart(&self, actor: &AuthUser) -> Result<CartView, ServiceError> {
        authorize(actor, Action::Shop)?;
        let items = self.cart_items(actor.user_id).await?;
        let product_ids: Vec<Uuid> = items.iter().map(|i| i.product_id).collect();
        let products: HashMap<Uuid, product::Model> = product::Entity::find()
            .filter(product::Column::Id.is_in(product_ids))
            .all(&*self.db)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        let mut lines = Vec::with_capacity(items.len());
        for item in items {
            let Some(product) = products.get(&item.product_id) else {
                continue;
            };
            let unit_price = resolve_unit_price(product, OrderType::Btc, item.price_option)?;
            lines.push(CartLine {
                id: item.id,
                product_id: product.id,
                product_name: product.name.clone(),
                sku: product.sku.clone(),
                price_option: item.price_option,
                quantity: item.quantity,
                unit_price,
                line_total: line_sub_total(unit_price, item.quantity),
            });
        }

        Ok(CartView {
            item_count: lines.iter().map(|l| l.quantity).sum(),
            sub_total: lines.iter().map(|l| l.line_total).sum(),
            items: lines,
        })
    }

    pub(crate) async fn cart_items(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<cart_item::Model>, ServiceError> {
        Ok(cart_item::Entity::find()
            .filter(cart_item::Column::UserId.eq(user_id))
            .order_by_asc(cart_item::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }

    /// Add units; an existing line for the same product and option absorbs them
    #[instrument(skip(self, actor, request), fields(user_id = %actor.user_id, product_id = %request.product_id))]
    pub async fn add_item(
        &self,
        actor: &AuthUser,
        request: AddToCartRequest,
    ) -> Result<cart_item::Model, ServiceError> {
        authorize(actor, Action::Shop)?;
        check_quantity(request.quantity)?;

        let product = product::Entity::find_by_id(request.product_id)
            .one(&*self.db)
            .await?
            .filter(|p| p.is_active)
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Product {} not found", request.product_id))
            })?;
        resolve_unit_price(&product, OrderType::Btc, request.price_option)?;

        let existing = cart_item::Entity::find()
            .filter(cart_item::Column::UserId.eq(actor.user_id))
            .filter(cart_item::Column::ProductId.eq(product.id))
            .filter(cart_item::Column::PriceOption.eq(request.price_option))
            .one(&*self.db)
            .await?;

        let quantity = existing.as_ref().map_or(0, |e| e.quantity) + request.quantity;
        self.check_available(&product, quantity).await?;

        let now = Utc::now();
        match existing {
            Some(line) => {
                let mut active: cart_item::ActiveModel = line.into();
                active.quantity = Set(quantity);
                active.updated_at = Set(now);
                Ok(active.update(&*self.db).await?)
            }
            None => {
                let line = cart_item::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    user_id: Set(actor.user_id),
                    product_id: Set(product.id),
                    price_option: Set(request.price_option),
                    quantity: Set(quantity),
                    created_at: Set(now),
                    updated_at: Set(now),
                };
                line.insert(&*self.db).await.map_err(map_unique_violation)
            }
        }
    }

    /// Best-effort check; the authoritative one happens when orders are created
    async fn check_available(
        &self,
        product: &product::Model,
        quantity: i32,
    ) -> Result<(), ServiceError> {
        let stock = resolve_effective_stock(&*self.db, product).await?;
        if quantity > stock.final_stock {
            debug!(available = stock.final_stock, quantity, "cart quantity exceeds stock");
            return Err(insufficient_stock(product, stock.final_stock, quantity));
        }
        Ok(())
    }

    async fn own_line(&self, actor: &AuthUser, id: Uuid) -> Result<cart_item::Model, ServiceError> {
        cart_item::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .filter(|line| line.user_id == actor.user_id)
            .ok_or_else(|| ServiceError::NotFound(format!("Cart item {} not found", id)))
    }

    pub async fn update_item(
        &self,
        actor: &AuthUser,
        id: Uuid,
        request: UpdateCartItemRequest,
    ) -> Result<cart_item::Model, ServiceError> {
        authorize(actor, Action::Shop)?;
        check_quantity(request.quantity)?;
        let line = self.own_line(actor, id).await?;

        let product = product::Entity::find_by_id(line.product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", line.product_id)))?;
        self.check_available(&product, request.quantity).await?;

        let mut active: cart_item::ActiveModel = line.into();
        active.quantity = Set(request.quantity);
        active.updated_at = Set(Utc::now());
        Ok(active.update(&*self.db).await?)
    }

    pub async fn remove_item(&self, actor: &AuthUser, id: Uuid) -> Result<(), ServiceError> {
        authorize(actor, Action::Shop)?;
        let line = self.own_line(actor, id).await?;
        cart_item::Entity::delete_by_id(line.id)
            .exec(&*self.db)
            .await?;
        Ok(())
    }

    pub async fn clear(&self, actor: &AuthUser) -> Result<u64, ServiceError> {
        authorize(actor, Action::Shop)?;
        let result = cart_item::Entity::delete_many()
            .filter(cart_item::Column::UserId.eq(actor.user_id))
            .exec(&*self.db)
            .await?;
        Ok(result.rows_affected)
    }
}
