use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::{authorize, Action, AuthUser},
    entities::{exchange_rate, shipping_rate},
    errors::ServiceError,
    services::pricing::money,
};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SetExchangeRateRequest {
    /// Units of the currency per one unit of the base currency
    pub rate: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpsertShippingRateRequest {
    #[validate(length(min = 1, max = 50))]
    pub zone: String,
    #[validate(length(min = 1, max = 50))]
    pub method: String,
    pub base_cost: Decimal,
    #[serde(default)]
    pub per_item_cost: Decimal,
    #[validate(range(min = 0, max = 365))]
    pub estimated_days: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

/// Normalise an ISO 4217 code; anything but three ASCII letters is rejected
pub fn normalize_currency(code: &str) -> Result<String, ServiceError> {
    let code = code.trim();
    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(ServiceError::ValidationError(format!(
            "Invalid currency code: {}",
            code
        )));
    }
    Ok(code.to_ascii_uppercase())
}

/// Rate for converting base-currency amounts into `currency`. The base
/// currency itself always converts at 1.
pub async fn lookup_rate<C>(conn: &C, base: &str, currency: &str) -> Result<Decimal, ServiceError>
where
    C: ConnectionTrait,
{
    if currency.eq_ignore_ascii_case(base) {
        return Ok(Decimal::ONE);
    }
    exchange_rate::Entity::find_by_id(currency.to_string())
        .one(conn)
        .await?
        .map(|r| r.rate)
        .ok_or_else(|| ServiceError::BadRequest(format!("Unsupported currency: {}", currency)))
}

/// Active rate for a (zone, method) pair
pub async fn find_shipping_rate<C>(
    conn: &C,
    zone: &str,
    method: &str,
) -> Result<shipping_rate::Model, ServiceError>
where
    C: ConnectionTrait,
{
    shipping_rate::Entity::find()
        .filter(shipping_rate::Column::Zone.eq(zone.trim().to_lowercase()))
        .filter(shipping_rate::Column::Method.eq(method.trim().to_lowercase()))
        .filter(shipping_rate::Column::IsActive.eq(true))
        .one(conn)
        .await?
        .ok_or_else(|| {
            ServiceError::BadRequest(format!("No shipping rate for {} / {}", zone, method))
        })
}

/// Delivery date promised for a zone and method, if a rate still covers them
pub async fn estimate_delivery<C>(
    conn: &C,
    zone: &str,
    method: &str,
    from: DateTime<Utc>,
) -> Result<Option<DateTime<Utc>>, ServiceError>
where
    C: ConnectionTrait,
{
    let rate = shipping_rate::Entity::find()
        .filter(shipping_rate::Column::Zone.eq(zone.trim().to_lowercase()))
        .filter(shipping_rate::Column::Method.eq(method.trim().to_lowercase()))
        .one(conn)
        .await?;
    Ok(rate.map(|rate| from + Duration::days(i64::from(rate.estimated_days.max(0)))))
}

/// Shipping cost in the base currency for `items` units
pub fn shipping_cost(rate: &shipping_rate::Model, items: i32) -> Decimal {
    money(rate.base_cost + rate.per_item_cost * Decimal::from(items.max(0)))
}

#[derive(Clone)]
pub struct ReferenceDataService {
    db: Arc<DatabaseConnection>,
}

impl ReferenceDataService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn list_exchange_rates(&self) -> Result<Vec<exchange_rate::Model>, ServiceError> {
        Ok(exchange_rate::Entity::find()
            .order_by_asc(exchange_rate::Column::Currency)
            .all(&*self.db)
            .await?)
    }

    #[instrument(skip(self, actor), fields(user_id = %actor.user_id))]
    pub async fn set_exchange_rate(
        &self,
        actor: &AuthUser,
        currency: &str,
        request: SetExchangeRateRequest,
    ) -> Result<exchange_rate::Model, ServiceError> {
        authorize(actor, Action::ManageReferenceData)?;
        let currency = normalize_currency(currency)?;
        if request.rate <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "rate must be greater than zero".to_string(),
            ));
        }

        let existing = exchange_rate::Entity::find_by_id(currency.clone())
            .one(&*self.db)
            .await?;
        let now = Utc::now();
        let saved = match existing {
            Some(model) => {
                let mut active: exchange_rate::ActiveModel = model.into();
                active.rate = Set(request.rate);
                active.updated_at = Set(now);
                active.update(&*self.db).await?
            }
            None => {
                exchange_rate::ActiveModel {
                    currency: Set(currency.clone()),
                    rate: Set(request.rate),
                    updated_at: Set(now),
                }
                .insert(&*self.db)
                .await?
            }
        };
        info!(%currency, rate = %saved.rate, "exchange rate set");
        Ok(saved)
    }

    pub async fn list_shipping_rates(&self) -> Result<Vec<shipping_rate::Model>, ServiceError> {
        Ok(shipping_rate::Entity::find()
            .order_by_asc(shipping_rate::Column::Zone)
            .order_by_asc(shipping_rate::Column::Method)
            .all(&*self.db)
            .await?)
    }

    /// Insert or replace the rate for a (zone, method) pair
    #[instrument(skip(self, actor, request), fields(user_id = %actor.user_id))]
    pub async fn upsert_shipping_rate(
        &self,
        actor: &AuthUser,
        request: UpsertShippingRateRequest,
    ) -> Result<shipping_rate::Model, ServiceError> {
        authorize(actor, Action::ManageReferenceData)?;
        request.validate()?;
        if request.base_cost < Decimal::ZERO || request.per_item_cost < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "baseCost and perItemCost must be non-negative".to_string(),
            ));
        }

        let zone = request.zone.trim().to_lowercase();
        let method = request.method.trim().to_lowercase();
        let existing = shipping_rate::Entity::find()
            .filter(shipping_rate::Column::Zone.eq(zone.clone()))
            .filter(shipping_rate::Column::Method.eq(method.clone()))
            .one(&*self.db)
            .await?;

        let is_new = existing.is_none();
        let mut active: shipping_rate::ActiveModel = match existing {
            Some(model) => model.into(),
            None => shipping_rate::ActiveModel {
                id: Set(Uuid::new_v4()),
                zone: Set(zone),
                method: Set(method),
                ..Default::default()
            },
        };
        active.base_cost = Set(money(request.base_cost));
        active.per_item_cost = Set(money(request.per_item_cost));
        active.estimated_days = Set(request.estimated_days);
        active.is_active = Set(request.is_active);
        active.updated_at = Set(Utc::now());

        let saved = if is_new {
            active.insert(&*self.db).await?
        } else {
            active.update(&*self.db).await?
        };
        info!(zone = %saved.zone, method = %saved.method, "shipping rate saved");
        Ok(saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn currency_codes_are_normalized() {
        assert_eq!(normalize_currency(" usd ").unwrap(), "USD");
        assert!(normalize_currency("US").is_err());
        assert!(normalize_currency("U$D").is_err());
    }

    #[test]
    fn shipping_scales_per_item() {
        let rate = shipping_rate::Model {
            id: Uuid::new_v4(),
            zone: "lagos".into(),
            method: "standard".into(),
            base_cost: dec!(1500),
            per_item_cost: dec!(250.50),
            estimated_days: 3,
            is_active: true,
            updated_at: Utc::now(),
        };
        assert_eq!(shipping_cost(&rate, 3), dec!(2251.50));
        assert_eq!(shipping_cost(&rate, 0), dec!(1500));
    }
}
