use std::sync::Arc;

use chrono::Utc;
use rust_decimal::{prelude::FromPrimitive, Decimal};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction,
    EntityTrait, QueryFilter, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::{authorize, Action, AuthUser},
    entities::{
        cart_item,
        checkout_session::{self, PaymentProvider, SessionStatus},
        customer,
        order::{self, OrderMode, OrderSource, OrderStatus, OrderType, PaymentMethod, PaymentStatus},
        product::{self, PriceOption},
        warehouse_activity::WarehouseAction,
    },
    errors::ServiceError,
    metrics,
    services::{
        cart::CartService,
        orders::{insert_order_group, GroupContext, PricedLine},
        pricing::{line_sub_total, money, resolve_unit_price, split_group},
        reference_data::{
            estimate_delivery, find_shipping_rate, lookup_rate, normalize_currency, shipping_cost,
        },
        stock_deduction::{
            available_for_sale, deduct_stock, insufficient_stock, retry_on_conflict, DrainOrder,
        },
        warehouse::{record_activity, NewActivity},
    },
};


#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub provider: PaymentProvider,
    /// Defaults to the base currency
    pub currency: Option<String>,
    #[validate(length(min = 1))]
    pub shipping_zone: String,
    #[validate(length(min = 1))]
    pub shipping_method: String,
}

/// Line snapshot stored on the session, priced in the session currency
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionLine {
    pub product_id: Uuid,
    pub product_name: String,
    pub product_sku: String,
    pub price_option: PriceOption,
    pub quantity: i32,
    pub unit_price: Decimal,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    pub reference: String,
    pub provider: PaymentProvider,
    pub status: SessionStatus,
    pub currency: String,
    pub exchange_rate: Decimal,
    pub sub_total: Decimal,
    pub tax_amount: Decimal,
    pub shipping_cost: Decimal,
    pub total_amount: Decimal,
    pub lines: Vec<SessionLine>,
    pub order_group_id: Option<Uuid>,
    #[schema(value_type = Vec<Object>)]
    pub orders: Vec<order::Model>,
}

/// How the payment that triggers materialisation was settled
#[derive(Debug, Clone)]
pub struct Settlement {
    pub payment_status: PaymentStatus,
    pub order_status: OrderStatus,
    pub payment_reference: Option<String>,
}

impl Settlement {
    pub fn paid(payment_reference: Option<String>) -> Self {
        Self {
            payment_status: PaymentStatus::Paid,
            order_status: OrderStatus::Confirmed,
            payment_reference,
        }
    }

    /// Bank transfers wait for manual confirmation
    pub fn awaiting_transfer() -> Self {
        Self {
            payment_status: PaymentStatus::Pending,
            order_status: OrderStatus::Pending,
            payment_reference: None,
        }
    }
}

#[derive(Debug)]
pub enum Materialized {
    Created {
        order_group_id: Uuid,
        orders: Vec<order::Model>,
    },
    /// The session was already turned into orders
    AlreadyCompleted { order_group_id: Option<Uuid> },
    /// Orders could not be created; the session is marked FAILED
    Failed { error: ServiceError },
}

fn payment_method_for(provider: PaymentProvider) -> PaymentMethod {
    match provider {
        PaymentProvider::Stripe => PaymentMethod::Stripe,
        PaymentProvider::Paystack => PaymentMethod::Paystack,
        PaymentProvider::BankTransfer => PaymentMethod::BankTransfer,
    }
}

fn session_reference() -> String {
    format!("CS-{}", Uuid::new_v4().simple()).to_uppercase()
}

fn session_lines(session: &checkout_session::Model) -> Result<Vec<SessionLine>, ServiceError> {
    serde_json::from_value(session.lines.clone()).map_err(|e| {
        ServiceError::InternalError(format!(
            "Corrupt line snapshot on session {}: {}",
            session.reference, e
        ))
    })
}

#[derive(Clone)]
pub struct CheckoutService {
    db: Arc<DatabaseConnection>,
    cart: CartService,
    base_currency: String,
    tax_rate: Decimal,
}

impl CheckoutService {
    pub fn new(db: Arc<DatabaseConnection>, base_currency: String, tax_rate: f64) -> Self {
        Self {
            cart: CartService::new(db.clone()),
            db,
            base_currency,
            tax_rate: Decimal::from_f64(tax_rate).unwrap_or(Decimal::ZERO),
        }
    }

    /// Price the actor's cart and open a payment session for it
    #[instrument(skip(self, actor, request), fields(user_id = %actor.user_id))]
    pub async fn create_session(
        &self,
        actor: &AuthUser,
        request: CheckoutRequest,
    ) -> Result<CheckoutResponse, ServiceError> {
        authorize(actor, Action::Shop)?;
        request.validate()?;

        let items = self.cart.cart_items(actor.user_id).await?;
        if items.is_empty() {
            return Err(ServiceError::BadRequest("Cart is empty".to_string()));
        }

        let currency = normalize_currency(
            request
                .currency
                .as_deref()
                .unwrap_or(self.base_currency.as_str()),
        )?;
        let rate = lookup_rate(&*self.db, &self.base_currency, &currency).await?;
        let shipping_rate =
            find_shipping_rate(&*self.db, &request.shipping_zone, &request.shipping_method).await?;

        let lines = self.price_cart(&items, rate).await?;
        let sub_total: Decimal = lines
            .iter()
            .map(|l| line_sub_total(l.unit_price, l.quantity))
            .sum();
        let units: i32 = lines.iter().map(|l| l.quantity).sum();
        let shipping = money(shipping_cost(&shipping_rate, units) * rate);
        let tax = money(sub_total * self.tax_rate);
        let total = sub_total + tax + shipping;

        let now = Utc::now();
        let session = checkout_session::ActiveModel {
            id: Set(Uuid::new_v4()),
            reference: Set(session_reference()),
            provider: Set(request.provider),
            user_id: Set(actor.user_id),
            lines: Set(json!(lines)),
            currency: Set(currency),
            exchange_rate: Set(rate),
            sub_total: Set(sub_total),
            tax_amount: Set(tax),
            shipping_cost: Set(shipping),
            total_amount: Set(total),
            shipping_zone: Set(shipping_rate.zone.clone()),
            shipping_method: Set(shipping_rate.method.clone()),
            status: Set(SessionStatus::Open),
            order_group_id: Set(None),
            failure_reason: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await?;
        info!(reference = %session.reference, total = %session.total_amount, "checkout session opened");

        let (status, order_group_id, orders) = if request.provider == PaymentProvider::BankTransfer {
            match self
                .materialize(&session.reference, Settlement::awaiting_transfer())
                .await?
            {
                Materialized::Created {
                    order_group_id,
                    orders,
                } => (SessionStatus::Completed, Some(order_group_id), orders),
                Materialized::AlreadyCompleted { order_group_id } => {
                    (SessionStatus::Completed, order_group_id, Vec::new())
                }
                Materialized::Failed { error } => return Err(error),
            }
        } else {
            (SessionStatus::Open, None, Vec::new())
        };

        Ok(CheckoutResponse {
            reference: session.reference,
            provider: session.provider,
            status,
            currency: session.currency,
            exchange_rate: session.exchange_rate,
            sub_total: session.sub_total,
            tax_amount: session.tax_amount,
            shipping_cost: session.shipping_cost,
            total_amount: session.total_amount,
            lines,
            order_group_id,
            orders,
        })
    }

    async fn price_cart(
        &self,
        items: &[cart_item::Model],
        rate: Decimal,
    ) -> Result<Vec<SessionLine>, ServiceError> {
        let mut lines = Vec::with_capacity(items.len());
        for item in items {
            let product = product::Entity::find_by_id(item.product_id)
                .one(&*self.db)
                .await?
                .filter(|p| p.is_active)
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Product {} not found", item.product_id))
                })?;

            let available = available_for_sale(&product);
            if item.quantity > available {
                return Err(insufficient_stock(&product, available, item.quantity));
            }

            let base_price = resolve_unit_price(&product, OrderType::Btc, item.price_option)?;
            lines.push(SessionLine {
                product_id: product.id,
                product_name: product.name,
                product_sku: product.sku,
                price_option: item.price_option,
                quantity: item.quantity,
                unit_price: money(base_price * rate),
            });
        }
        Ok(lines)
    }

    /// Turn a session into website orders. Safe to call repeatedly for the
    /// same reference: only the first call creates orders.
    #[instrument(skip(self, settlement))]
    pub async fn materialize(
        &self,
        reference: &str,
        settlement: Settlement,
    ) -> Result<Materialized, ServiceError> {
        let session = checkout_session::Entity::find()
            .filter(checkout_session::Column::Reference.eq(reference))
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Checkout session {} not found", reference))
            })?;

        match session.status {
            SessionStatus::Completed => {
                metrics::increment(metrics::WEBHOOKS_DUPLICATE);
                info!(reference, "session already completed");
                return Ok(Materialized::AlreadyCompleted {
                    order_group_id: session.order_group_id,
                });
            }
            SessionStatus::Failed => {
                warn!(reference, "session previously failed, not retrying");
                return Ok(Materialized::Failed {
                    error: ServiceError::Conflict(format!(
                        "Checkout session {} has failed: {}",
                        reference,
                        session.failure_reason.as_deref().unwrap_or("unknown reason")
                    )),
                });
            }
            SessionStatus::Open => {}
        }

        let (open_session, paid) = (&session, &settlement);
        let attempted = retry_on_conflict("checkout materialisation", move || {
            self.try_materialize(open_session, paid)
        })
        .await;
        match attempted {
            Ok(outcome) => Ok(outcome),
            Err(
                err @ (ServiceError::InsufficientStock(_)
                | ServiceError::BadRequest(_)
                | ServiceError::NotFound(_)
                | ServiceError::Conflict(_)),
            ) => {
                error!(
                    reference,
                    error = %err,
                    "orders could not be created for checkout session, manual follow-up required"
                );
                metrics::increment(metrics::ORDERS_STOCK_REJECTED);
                self.mark_failed(&session, &err.to_string()).await?;
                Ok(Materialized::Failed { error: err })
            }
            Err(err) => Err(err),
        }
    }

    async fn try_materialize(
        &self,
        session: &checkout_session::Model,
        settlement: &Settlement,
    ) -> Result<Materialized, ServiceError> {
        let txn = self.db.begin().await?;
        match self.materialize_in_txn(&txn, session, settlement).await {
            Ok(outcome) => {
                txn.commit()
                    .await
                    .map_err(|e| ServiceError::from(e).in_transaction())?;
                if let Materialized::Created { order_group_id, .. } = &outcome {
                    metrics::increment_with_source(metrics::ORDERS_CREATED, "website");
                    info!(reference = %session.reference, %order_group_id, "website order created");
                }
                Ok(outcome)
            }
            Err(err) => {
                if let Err(rollback_err) = txn.rollback().await {
                    error!(error = %rollback_err, "rollback of checkout materialisation failed");
                }
                Err(err.in_transaction())
            }
        }
    }

    async fn materialize_in_txn(
        &self,
        txn: &DatabaseTransaction,
        session: &checkout_session::Model,
        settlement: &Settlement,
    ) -> Result<Materialized, ServiceError> {
        // Another delivery of the same event may have won the race.
        let current = checkout_session::Entity::find_by_id(session.id)
            .one(txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Checkout session {} not found", session.reference))
            })?;
        if current.status == SessionStatus::Completed {
            return Ok(Materialized::AlreadyCompleted {
                order_group_id: current.order_group_id,
            });
        }

        let snapshot = session_lines(session)?;
        let mut priced = Vec::with_capacity(snapshot.len());
        let mut changes = Vec::with_capacity(snapshot.len());
        for line in &snapshot {
            let product = product::Entity::find_by_id(line.product_id)
                .one(txn)
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Product {} not found", line.product_id))
                })?;
            changes.push(deduct_stock(txn, &product, line.quantity, DrainOrder::OnlineFirst).await?);
            priced.push(line_sub_total(line.unit_price, line.quantity));
        }

        let (amounts, totals) = split_group(
            &priced,
            Decimal::ZERO,
            session.tax_amount,
            session.shipping_cost,
        )?;
        let lines: Vec<PricedLine> = snapshot
            .iter()
            .zip(amounts)
            .map(|(line, amounts)| PricedLine {
                product_id: line.product_id,
                product_name: line.product_name.clone(),
                product_sku: line.product_sku.clone(),
                price_option: line.price_option,
                quantity: line.quantity,
                unit_price: line.unit_price,
                amounts,
            })
            .collect();

        let customer = customer::Entity::find()
            .filter(customer::Column::UserId.eq(session.user_id))
            .filter(customer::Column::IsDeleted.eq(false))
            .one(txn)
            .await?;

        let estimated_delivery = estimate_delivery(
            txn,
            &session.shipping_zone,
            &session.shipping_method,
            Utc::now(),
        )
        .await?;

        let order_group_id = Uuid::new_v4();
        let ctx = GroupContext {
            group_id: order_group_id,
            source: OrderSource::Website,
            order_type: OrderType::Btc,
            order_mode: OrderMode::Online,
            user_id: Some(session.user_id),
            customer_id: customer.as_ref().map(|c| c.id),
            created_by: None,
            currency: session.currency.clone(),
            payment_method: payment_method_for(session.provider),
            payment_status: settlement.payment_status,
            payment_reference: settlement
                .payment_reference
                .clone()
                .or_else(|| Some(session.reference.clone())),
            order_status: settlement.order_status,
            estimated_delivery,
            notes: None,
            totals,
        };
        let orders = insert_order_group(txn, &ctx, &lines).await?;

        for (row, change) in orders.iter().zip(&changes) {
            record_activity(
                txn,
                NewActivity {
                    action: WarehouseAction::OrderStockDeduction,
                    product_id: Some(change.product_id),
                    performed_by: session.user_id,
                    changes: json!({
                        "finalStock": { "before": change.before, "after": change.after }
                    }),
                    quantity_delta: Some(-change.quantity),
                    reference: Some(row.order_id.clone()),
                    notes: Some(format!("Checkout {}", session.reference)),
                },
            )
            .await?;
        }

        if let Some(customer) = &customer {
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
        }

        cart_item::Entity::delete_many()
            .filter(cart_item::Column::UserId.eq(session.user_id))
            .exec(txn)
            .await?;

        let mut active: checkout_session::ActiveModel = current.into();
        active.status = Set(SessionStatus::Completed);
        active.order_group_id = Set(Some(order_group_id));
        active.updated_at = Set(Utc::now());
        active.update(txn).await?;

        Ok(Materialized::Created {
            order_group_id,
            orders,
        })
    }

    async fn mark_failed(
        &self,
        session: &checkout_session::Model,
        reason: &str,
    ) -> Result<(), ServiceError> {
        checkout_session::Entity::update_many()
            .col_expr(
                checkout_session::Column::Status,
                Expr::value(SessionStatus::Failed),
            )
            .col_expr(
                checkout_session::Column::FailureReason,
                Expr::value(reason.to_string()),
            )
            .col_expr(checkout_session::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(checkout_session::Column::Id.eq(session.id))
            .filter(checkout_session::Column::Status.eq(SessionStatus::Open))
            .exec(&*self.db)
            .await?;
        Ok(())
    }

    /// Mark an open session failed after the provider reported a failed payment
    pub async fn fail_open_session(&self, reference: &str, reason: &str) -> Result<bool, ServiceError> {
        let session = checkout_session::Entity::find()
            .filter(checkout_session::Column::Reference.eq(reference))
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Checkout session {} not found", reference))
            })?;
        if session.status != SessionStatus::Open {
            return Ok(false);
        }
        self.mark_failed(&session, reason).await?;
        Ok(true)
    }
}
