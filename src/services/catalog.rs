use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, instrument};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::{authorize, Action, AuthUser},
    entities::{product, warehouse_activity::WarehouseAction},
    errors::ServiceError,
    services::{
        pricing::money,
        stock::{resolve_effective_stock, resolve_many, EffectiveStock},
        stock_deduction::save_versioned,
        warehouse::{record_activity, NewActivity},
    },
};

/// Product with its resolved stock figures
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductView {
    #[serde(flatten)]
    pub product: product::Model,
    pub effective_stock: EffectiveStock,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductRequest {
    #[validate(length(min = 1, max = 64))]
    pub sku: String,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub price: Decimal,
    pub regular_price: Option<Decimal>,
    pub three_weeks_price: Option<Decimal>,
    pub five_weeks_price: Option<Decimal>,
    pub btb_price: Option<Decimal>,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub stock: i32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProductRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub price: Option<Decimal>,
    pub regular_price: Option<Decimal>,
    pub three_weeks_price: Option<Decimal>,
    pub five_weeks_price: Option<Decimal>,
    pub btb_price: Option<Decimal>,
    /// Legacy stock figure; rejected while the warehouse override is on
    #[validate(range(min = 0))]
    pub stock: Option<i32>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct ProductListQuery {
    pub category: Option<String>,
    pub search: Option<String>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

fn check_prices(prices: &[(&str, Option<Decimal>)]) -> Result<(), ServiceError> {
    let errors: Vec<String> = prices
        .iter()
        .filter(|(_, value)| value.map_or(false, |v| v < Decimal::ZERO))
        .map(|(name, _)| format!("{} must be non-negative", name))
        .collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ServiceError::InvalidFields(errors))
    }
}

#[derive(Clone)]
pub struct CatalogService {
    db: Arc<DatabaseConnection>,
}

impl CatalogService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Public listing of active products
    #[instrument(skip(self))]
    pub async fn list_products(
        &self,
        query: ProductListQuery,
    ) -> Result<(Vec<ProductView>, u64), ServiceError> {
        let mut select = product::Entity::find()
            .filter(product::Column::IsActive.eq(true))
            .order_by_asc(product::Column::Name);

        if let Some(category) = query.category.filter(|c| !c.trim().is_empty()) {
            select = select.filter(product::Column::Category.eq(category));
        }
        if let Some(term) = query.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            select = select.filter(
                Condition::any()
                    .add(product::Column::Name.contains(term))
                    .add(product::Column::Sku.contains(term)),
            );
        }

        let per_page = query.per_page.unwrap_or(20).clamp(1, 100);
        let page = query.page.unwrap_or(1).max(1);
        let paginator = select.paginate(&*self.db, per_page);
        let total = paginator.num_items().await?;
        let products = paginator.fetch_page(page - 1).await?;

        let mut stock = resolve_many(&*self.db, &products).await?;
        let views = products
            .into_iter()
            .filter_map(|product| {
                stock.remove(&product.id).map(|effective_stock| ProductView {
                    product,
                    effective_stock,
                })
            })
            .collect();
        Ok((views, total))
    }

    pub async fn get_product(&self, id: Uuid) -> Result<ProductView, ServiceError> {
        let product = product::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .filter(|p| p.is_active)
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", id)))?;
        let effective_stock = resolve_effective_stock(&*self.db, &product).await?;
        Ok(ProductView {
            product,
            effective_stock,
        })
    }

    #[instrument(skip(self, actor, request), fields(user_id = %actor.user_id, sku = %request.sku))]
    pub async fn create_product(
        &self,
        actor: &AuthUser,
        request: CreateProductRequest,
    ) -> Result<product::Model, ServiceError> {
        authorize(actor, Action::ManageCatalog)?;
        request.validate()?;
        check_prices(&[
            ("price", Some(request.price)),
            ("regularPrice", request.regular_price),
            ("threeWeeksPrice", request.three_weeks_price),
            ("fiveWeeksPrice", request.five_weeks_price),
            ("btbPrice", request.btb_price),
        ])?;

        let sku = request.sku.trim().to_uppercase();
        let taken = product::Entity::find()
            .filter(product::Column::Sku.eq(sku.clone()))
            .one(&*self.db)
            .await?;
        if taken.is_some() {
            return Err(ServiceError::Conflict(format!("SKU {} already exists", sku)));
        }

        let now = Utc::now();
        let model = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            sku: Set(sku),
            name: Set(request.name.trim().to_string()),
            description: Set(request.description),
            category: Set(request.category),
            price: Set(money(request.price)),
            regular_price: Set(request.regular_price.map(money)),
            three_weeks_price: Set(request.three_weeks_price.map(money)),
            five_weeks_price: Set(request.five_weeks_price.map(money)),
            btb_price: Set(request.btb_price.map(money)),
            stock: Set(request.stock),
            warehouse_enabled: Set(false),
            stock_on_arrival: Set(0),
            damaged_qty: Set(0),
            expired_qty: Set(0),
            refurbished_qty: Set(0),
            final_stock: Set(0),
            online_stock: Set(0),
            offline_stock: Set(0),
            warehouse_notes: Set(None),
            warehouse_last_updated: Set(None),
            warehouse_updated_by: Set(None),
            stock_version: Set(0),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let created = model.insert(&*self.db).await?;
        info!(product_id = %created.id, "product created");
        Ok(created)
    }

    #[instrument(skip(self, actor, request), fields(user_id = %actor.user_id, product_id = %id))]
    pub async fn update_product(
        &self,
        actor: &AuthUser,
        id: Uuid,
        request: UpdateProductRequest,
    ) -> Result<product::Model, ServiceError> {
        authorize(actor, Action::ManageCatalog)?;
        request.validate()?;
        check_prices(&[
            ("price", request.price),
            ("regularPrice", request.regular_price),
            ("threeWeeksPrice", request.three_weeks_price),
            ("fiveWeeksPrice", request.five_weeks_price),
            ("btbPrice", request.btb_price),
        ])?;

        let product = product::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", id)))?;

        if request.stock.is_some() && product.warehouse_enabled {
            return Err(ServiceError::BadRequest(format!(
                "Stock for {} is managed by the warehouse override; record a count through /api/warehouse/stock/reconcile",
                product.name
            )));
        }

        let mut active: product::ActiveModel = product.clone().into();
        if let Some(name) = request.name {
            active.name = Set(name.trim().to_string());
        }
        if let Some(description) = request.description {
            active.description = Set(Some(description));
        }
        if let Some(category) = request.category {
            active.category = Set(Some(category));
        }
        if let Some(price) = request.price {
            active.price = Set(money(price));
        }
        if let Some(price) = request.regular_price {
            active.regular_price = Set(Some(money(price)));
        }
        if let Some(price) = request.three_weeks_price {
            active.three_weeks_price = Set(Some(money(price)));
        }
        if let Some(price) = request.five_weeks_price {
            active.five_weeks_price = Set(Some(money(price)));
        }
        if let Some(price) = request.btb_price {
            active.btb_price = Set(Some(money(price)));
        }
        if let Some(is_active) = request.is_active {
            active.is_active = Set(is_active);
        }
        active.updated_at = Set(Utc::now());

        let Some(stock) = request.stock else {
            return Ok(active.update(&*self.db).await?);
        };

        // Legacy stock edits share the deduction guard and leave an audit row
        active.stock = Set(stock);
        let txn = self.db.begin().await?;
        let updated = save_versioned(&txn, &product, active).await?;
        record_activity(
            &txn,
            NewActivity {
                action: WarehouseAction::StockReconciled,
                product_id: Some(product.id),
                performed_by: actor.user_id,
                changes: json!({ "stock": { "before": product.stock, "after": stock } }),
                quantity_delta: Some(stock - product.stock),
                reference: None,
                notes: Some("catalog stock edit".to_string()),
            },
        )
        .await?;
        txn.commit().await?;

        info!(product_id = %updated.id, before = product.stock, after = stock, "legacy stock edited");
        Ok(updated)
    }
}
