use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    QueryFilter, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::{authorize, Action, AuthUser, Resource},
    entities::{
        customer,
        order::{self, OrderMode, OrderSource, OrderStatus, OrderType, PaymentMethod, PaymentStatus},
        product::{self, PriceOption},
        warehouse_activity::WarehouseAction,
    },
    errors::ServiceError,
    metrics,
    services::{
        notifications::{send_invoice, Mailer},
        orders::{insert_order_group, GroupContext, PricedLine},
        pricing::{line_sub_total, resolve_unit_price, split_group, GroupTotals},
        stock_deduction::{deduct_stock, retry_on_conflict, DrainOrder, StockChange},
        warehouse::{record_activity, NewActivity},
    },
};

/// Attempts made when a concurrent writer moves a product's stock version

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdminOrderItem {
    pub product_id: Uuid,
    pub quantity: i32,
    #[serde(default)]
    pub price_option: PriceOption,
}

/// Order keyed in by a sales agent on behalf of a customer
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateAdminOrderRequest {
    pub customer_id: Uuid,
    #[validate(length(min = 1, message = "At least one item is required"))]
    pub items: Vec<AdminOrderItem>,
    pub order_type: OrderType,
    #[serde(default)]
    pub order_mode: OrderMode,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub discount_amount: Decimal,
    #[serde(default)]
    pub tax_amount: Decimal,
    #[serde(default)]
    pub shipping_cost: Decimal,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub send_invoice_email: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdminOrderResponse {
    pub order_group_id: Uuid,
    #[schema(value_type = Vec<Object>)]
    pub orders: Vec<order::Model>,
    pub totals: GroupTotals,
    pub stock_updates: Vec<StockChange>,
    pub email_sent: bool,
}

/// Checks that need no database access
pub fn validate_request(request: &CreateAdminOrderRequest) -> Result<(), ServiceError> {
    request.validate()?;

    let mut errors = Vec::new();
    for (idx, item) in request.items.iter().enumerate() {
        if item.quantity < 1 {
            errors.push(format!("items[{}].quantity must be at least 1", idx));
        }
    }
    for (name, value) in [
        ("discountAmount", request.discount_amount),
        ("taxAmount", request.tax_amount),
        ("shippingCost", request.shipping_cost),
    ] {
        if value < Decimal::ZERO {
            errors.push(format!("{} must be non-negative", name));
        }
    }
    if matches!(
        request.payment_method,
        PaymentMethod::Stripe | PaymentMethod::Paystack
    ) {
        errors.push("paymentMethod must be CASH, POS, BANK_TRANSFER or CREDIT".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ServiceError::InvalidFields(errors))
    }
}

/// Credit sales are collected later; everything else is settled at the counter.
pub fn initial_payment_status(method: PaymentMethod) -> PaymentStatus {
    match method {
        PaymentMethod::Credit => PaymentStatus::Pending,
        _ => PaymentStatus::Paid,
    }
}

struct CommittedOrder {
    group_id: Uuid,
    orders: Vec<order::Model>,
    totals: GroupTotals,
    stock_updates: Vec<StockChange>,
}

#[derive(Clone)]
pub struct AdminOrderService {
    db: Arc<DatabaseConnection>,
    mailer: Arc<dyn Mailer>,
    currency: String,
}

impl AdminOrderService {
    pub fn new(db: Arc<DatabaseConnection>, mailer: Arc<dyn Mailer>, currency: String) -> Self {
        Self {
            db,
            mailer,
            currency,
        }
    }

    /// Create a manual order group, deducting stock for every line atomically.
    #[instrument(skip(self, actor, request), fields(user_id = %actor.user_id, customer_id = %request.customer_id))]
    pub async fn create_order(
        &self,
        actor: &AuthUser,
        request: CreateAdminOrderRequest,
    ) -> Result<AdminOrderResponse, ServiceError> {
        validate_request(&request)?;

        let customer = customer::Entity::find_by_id(request.customer_id)
            .one(&*self.db)
            .await?
            .filter(|c| !c.is_deleted)
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Customer {} not found", request.customer_id))
            })?;

        authorize(actor, Action::CreateManualOrder(Resource::customer(&customer)))?;

        let (buyer, order) = (&customer, &request);
        let committed = retry_on_conflict("manual order", move || {
            self.try_create(actor, buyer, order)
        })
        .await
        .map_err(|err| {
            if matches!(err, ServiceError::InsufficientStock(_)) {
                metrics::increment(metrics::ORDERS_STOCK_REJECTED);
            }
            err
        })?;

        metrics::increment_with_source(metrics::ORDERS_CREATED, "manual");
        info!(
            order_group_id = %committed.group_id,
            lines = committed.orders.len(),
            total = %committed.totals.total,
            "manual order created"
        );

        let email_sent = if request.send_invoice_email {
            send_invoice(
                self.mailer.as_ref(),
                customer.email.as_deref(),
                &customer.name,
                &committed.orders,
            )
            .await
        } else {
            false
        };

        Ok(AdminOrderResponse {
            order_group_id: committed.group_id,
            orders: committed.orders,
            totals: committed.totals,
            stock_updates: committed.stock_updates,
            email_sent,
        })
    }

    async fn try_create(
        &self,
        actor: &AuthUser,
        customer: &customer::Model,
        request: &CreateAdminOrderRequest,
    ) -> Result<CommittedOrder, ServiceError> {
        let txn = self.db.begin().await?;

        match self.create_in_txn(&txn, actor, customer, request).await {
            Ok(committed) => {
                txn.commit()
                    .await
                    .map_err(|e| ServiceError::from(e).in_transaction())?;
                Ok(committed)
            }
            Err(err) => {
                if let Err(rollback_err) = txn.rollback().await {
                    error!(error = %rollback_err, "rollback of manual order failed");
                }
                Err(err.in_transaction())
            }
        }
    }

    async fn create_in_txn(
        &self,
        txn: &DatabaseTransaction,
        actor: &AuthUser,
        customer: &customer::Model,
        request: &CreateAdminOrderRequest,
    ) -> Result<CommittedOrder, ServiceError> {
        let mut lines = Vec::with_capacity(request.items.len());
        let mut stock_updates = Vec::with_capacity(request.items.len());

        for item in &request.items {
            let product = product::Entity::find_by_id(item.product_id)
                .one(txn)
                .await?
                .filter(|p| p.is_active)
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Product {} not found", item.product_id))
                })?;

            let change =
                deduct_stock(txn, &product, item.quantity, DrainOrder::OfflineFirst).await?;
            let unit_price = resolve_unit_price(&product, request.order_type, item.price_option)?;

            lines.push((product, item, unit_price));
            stock_updates.push(change);
        }

        let sub_totals: Vec<Decimal> = lines
            .iter()
            .map(|(_, item, unit)| line_sub_total(*unit, item.quantity))
            .collect();
        let (amounts, totals) = split_group(
            &sub_totals,
            request.discount_amount,
            request.tax_amount,
            request.shipping_cost,
        )?;

        let priced: Vec<PricedLine> = lines
            .iter()
            .zip(amounts)
            .map(|((product, item, unit_price), amounts)| PricedLine {
                product_id: product.id,
                product_name: product.name.clone(),
                product_sku: product.sku.clone(),
                price_option: item.price_option,
                quantity: item.quantity,
                unit_price: *unit_price,
                amounts,
            })
            .collect();

        let group_id = Uuid::new_v4();
        let ctx = GroupContext {
            group_id,
            source: OrderSource::Manual,
            order_type: request.order_type,
            order_mode: request.order_mode,
            user_id: customer.user_id,
            customer_id: Some(customer.id),
            created_by: Some(actor.user_id),
            currency: self.currency.clone(),
            payment_method: request.payment_method,
            payment_status: initial_payment_status(request.payment_method),
            payment_reference: None,
            order_status: OrderStatus::Confirmed,
            estimated_delivery: None,
            notes: request.notes.clone(),
            totals,
        };
        let orders = insert_order_group(txn, &ctx, &priced).await?;

        customer::Entity::update_many()
            .col_expr(
                customer::Column::TotalOrders,
                Expr::col(customer::Column::TotalOrders).add(1),
            )
            .col_expr(
                customer::Column::TotalOrderValue,
                Expr::col(customer::Column::TotalOrderValue).add(totals.total),
            )
            .col_expr(customer::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(customer::Column::Id.eq(customer.id))
            .exec(txn)
            .await?;

        for (row, change) in orders.iter().zip(&stock_updates) {
            record_activity(
                txn,
                NewActivity {
                    action: WarehouseAction::OrderStockDeduction,
                    product_id: Some(change.product_id),
                    performed_by: actor.user_id,
                    changes: json!({
                        "finalStock": { "before": change.before, "after": change.after }
                    }),
                    quantity_delta: Some(-change.quantity),
                    reference: Some(row.order_id.clone()),
                    notes: None,
                },
            )
            .await?;
        }

        Ok(CommittedOrder {
            group_id,
            orders,
            totals,
            stock_updates,
        })
    }
}
