use rust_decimal::{prelude::ToPrimitive, Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    entities::{
        order::OrderType,
        product::{self, PriceOption},
    },
    errors::ServiceError,
};

/// Round a money amount to cents, halves away from zero
pub fn money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

fn price_chain(
    product: &product::Model,
    order_type: OrderType,
    option: PriceOption,
) -> [Option<Decimal>; 3] {
    match (order_type, option) {
        (OrderType::Btb, _) => [product.btb_price, product.regular_price, Some(product.price)],
        (OrderType::Btc, PriceOption::Regular) => [product.regular_price, Some(product.price), None],
        (OrderType::Btc, PriceOption::ThreeWeeks) => [
            product.three_weeks_price,
            product.regular_price,
            Some(product.price),
        ],
        (OrderType::Btc, PriceOption::FiveWeeks) => [
            product.five_weeks_price,
            product.regular_price,
            Some(product.price),
        ],
    }
}

/// Unit price for a line: the first positive tier in the chain for the order
/// type and delivery option. Nothing positive rejects the whole order.
pub fn resolve_unit_price(
    product: &product::Model,
    order_type: OrderType,
    option: PriceOption,
) -> Result<Decimal, ServiceError> {
    price_chain(product, order_type, option)
        .into_iter()
        .flatten()
        .find(|p| *p > Decimal::ZERO)
        .map(money)
        .ok_or_else(|| ServiceError::BadRequest(format!("Invalid price for {}", product.name)))
}

pub fn line_sub_total(unit_price: Decimal, quantity: i32) -> Decimal {
    money(unit_price * Decimal::from(quantity))
}

/// Amounts carried by one order row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LineAmounts {
    pub sub_total: Decimal,
    pub discount: Decimal,
    pub tax: Decimal,
    pub shipping: Decimal,
    pub total: Decimal,
}

/// Aggregates stored on the parent row of a group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GroupTotals {
    pub sub_total: Decimal,
    pub discount: Decimal,
    pub tax: Decimal,
    pub shipping: Decimal,
    pub total: Decimal,
}

fn to_cents(amount: Decimal) -> Result<i64, ServiceError> {
    (money(amount) * Decimal::ONE_HUNDRED)
        .to_i64()
        .ok_or_else(|| ServiceError::BadRequest("Amount out of range".to_string()))
}

/// Distribute `amount` over `weights` in whole cents using largest
/// remainders, so the parts always sum to the rounded amount. Zero total
/// weight splits evenly.
pub fn allocate(amount: Decimal, weights: &[Decimal]) -> Result<Vec<Decimal>, ServiceError> {
    if weights.is_empty() {
        return Ok(Vec::new());
    }
    let cents = to_cents(amount)?;
    let total_weight: Decimal = weights.iter().copied().sum();
    let weights: Vec<Decimal> = if total_weight > Decimal::ZERO {
        weights.to_vec()
    } else {
        vec![Decimal::ONE; weights.len()]
    };
    let total_weight: Decimal = weights.iter().copied().sum();

    let mut shares: Vec<(usize, i64, Decimal)> = Vec::with_capacity(weights.len());
    for (idx, weight) in weights.iter().enumerate() {
        let exact = Decimal::from(cents) * *weight / total_weight;
        let floor = exact.floor();
        let base = floor
            .to_i64()
            .ok_or_else(|| ServiceError::BadRequest("Amount out of range".to_string()))?;
        shares.push((idx, base, exact - floor));
    }

    let assigned: i64 = shares.iter().map(|(_, base, _)| base).sum();
    let mut leftover = cents - assigned;

    let mut by_remainder: Vec<usize> = (0..shares.len()).collect();
    by_remainder.sort_by(|a, b| shares[*b].2.cmp(&shares[*a].2).then(a.cmp(b)));
    for idx in by_remainder {
        if leftover <= 0 {
            break;
        }
        shares[idx].1 += 1;
        leftover -= 1;
    }

    Ok(shares
        .into_iter()
        .map(|(_, base, _)| Decimal::new(base, 2))
        .collect())
}

/// Split group-level discount, tax and shipping across lines in proportion to
/// each line's sub-total. The line totals always add up to the group total.
pub fn split_group(
    line_sub_totals: &[Decimal],
    discount: Decimal,
    tax: Decimal,
    shipping: Decimal,
) -> Result<(Vec<LineAmounts>, GroupTotals), ServiceError> {
    if discount < Decimal::ZERO || tax < Decimal::ZERO || shipping < Decimal::ZERO {
        return Err(ServiceError::ValidationError(
            "discountAmount, taxAmount and shippingCost must be non-negative".to_string(),
        ));
    }

    let sub_totals: Vec<Decimal> = line_sub_totals.iter().copied().map(money).collect();
    let sub_total: Decimal = sub_totals.iter().copied().sum();
    let (discount, tax, shipping) = (money(discount), money(tax), money(shipping));

    if discount > sub_total + tax + shipping {
        return Err(ServiceError::BadRequest(format!(
            "Discount ({}) cannot exceed order total ({})",
            discount,
            sub_total + tax + shipping
        )));
    }

    let discounts = allocate(discount, &sub_totals)?;
    let taxes = allocate(tax, &sub_totals)?;
    let shippings = allocate(shipping, &sub_totals)?;

    let lines = sub_totals
        .iter()
        .zip(discounts)
        .zip(taxes)
        .zip(shippings)
        .map(|(((sub, discount), tax), shipping)| LineAmounts {
            sub_total: *sub,
            discount,
            tax,
            shipping,
            total: *sub + tax + shipping - discount,
        })
        .collect();

    let totals = GroupTotals {
        sub_total,
        discount,
        tax,
        shipping,
        total: sub_total + tax + shipping - discount,
    };
    Ok((lines, totals))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::stock::fixtures::product;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    #[test]
    fn btb_prefers_btb_tier() {
        let p = product();
        assert_eq!(
            resolve_unit_price(&p, OrderType::Btb, PriceOption::Regular).unwrap(),
            dec!(4200)
        );
    }

    #[test]
    fn delivery_tier_falls_back_to_regular_then_base() {
        let mut p = product();
        assert_eq!(
            resolve_unit_price(&p, OrderType::Btc, PriceOption::ThreeWeeks).unwrap(),
            dec!(5500)
        );
        p.regular_price = Some(Decimal::ZERO);
        assert_eq!(
            resolve_unit_price(&p, OrderType::Btc, PriceOption::FiveWeeks).unwrap(),
            dec!(5000)
        );
        p.five_weeks_price = Some(dec!(4800));
        assert_eq!(
            resolve_unit_price(&p, OrderType::Btc, PriceOption::FiveWeeks).unwrap(),
            dec!(4800)
        );
    }

    #[test]
    fn no_positive_price_is_rejected() {
        let mut p = product();
        p.price = Decimal::ZERO;
        p.regular_price = None;
        p.btb_price = Some(dec!(-1));
        assert_matches!(
            resolve_unit_price(&p, OrderType::Btb, PriceOption::Regular),
            Err(ServiceError::BadRequest(msg)) if msg == "Invalid price for Ethiopia Yirgacheffe 250g"
        );
    }

    #[test]
    fn three_line_split_is_exact() {
        let (lines, totals) = split_group(
            &[dec!(100.00), dec!(100.00), dec!(100.00)],
            dec!(10.00),
            dec!(7.50),
            dec!(5.00),
        )
        .unwrap();

        let sum: Decimal = lines.iter().map(|l| l.total).sum();
        assert_eq!(sum, totals.total);
        assert_eq!(totals.total, dec!(302.50));
        let discounts: Vec<Decimal> = lines.iter().map(|l| l.discount).collect();
        assert_eq!(discounts, vec![dec!(3.34), dec!(3.33), dec!(3.33)]);
    }

    #[test]
    fn zero_sub_total_splits_evenly() {
        let shares = allocate(dec!(1.00), &[Decimal::ZERO, Decimal::ZERO]).unwrap();
        assert_eq!(shares, vec![dec!(0.50), dec!(0.50)]);
    }

    #[test]
    fn discount_above_total_is_rejected() {
        assert_matches!(
            split_group(&[dec!(10)], dec!(20), dec!(1), dec!(1)),
            Err(ServiceError::BadRequest(_))
        );
    }

    #[test]
    fn rounding_is_half_away_from_zero() {
        assert_eq!(money(dec!(2.345)), dec!(2.35));
        assert_eq!(line_sub_total(dec!(3.333), 3), dec!(10.00));
    }
}
