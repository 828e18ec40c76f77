//! Property-based tests for the money split and stock identity rules.

use coffee_commerce_api::{
    entities::order::OrderStatus,
    services::{
        order_status::check_transition,
        pricing::{allocate, money, split_group},
        warehouse::{validate_manual_update, ManualStockUpdate},
    },
};
use proptest::prelude::*;
use rust_decimal::Decimal;
use uuid::Uuid;

fn amount_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..10_000_000).prop_map(|cents| Decimal::new(cents, 2))
}

fn weights_strategy() -> impl Strategy<Value = Vec<Decimal>> {
    prop::collection::vec(amount_strategy(), 1..8)
}

fn status_strategy() -> impl Strategy<Value = OrderStatus> {
    prop_oneof![
        Just(OrderStatus::Pending),
        Just(OrderStatus::Confirmed),
        Just(OrderStatus::Processing),
        Just(OrderStatus::Shipped),
        Just(OrderStatus::Delivered),
        Just(OrderStatus::Cancelled),
        Just(OrderStatus::Returned),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn allocation_never_loses_a_cent(amount in amount_strategy(), weights in weights_strategy()) {
        let parts = allocate(amount, &weights).unwrap();
        prop_assert_eq!(parts.len(), weights.len());
        prop_assert_eq!(parts.iter().copied().sum::<Decimal>(), money(amount));
        for part in &parts {
            prop_assert!(*part >= Decimal::ZERO);
            prop_assert_eq!(*part, money(*part));
        }
    }

    #[test]
    fn zero_weight_lines_get_nothing_when_others_carry_weight(
        amount in amount_strategy(),
        weights in weights_strategy(),
    ) {
        let total_weight: Decimal = weights.iter().copied().sum();
        prop_assume!(total_weight > Decimal::ZERO);
        let parts = allocate(amount, &weights).unwrap();
        for (weight, part) in weights.iter().zip(&parts) {
            if weight.is_zero() {
                prop_assert_eq!(*part, Decimal::ZERO);
            }
        }
    }

    #[test]
    fn group_lines_sum_to_the_group(
        sub_totals in weights_strategy(),
        tax in amount_strategy(),
        shipping in amount_strategy(),
        discount_share in 0u32..=100,
    ) {
        let gross: Decimal = sub_totals.iter().copied().sum::<Decimal>() + tax + shipping;
        let discount = money(gross * Decimal::from(discount_share) / Decimal::ONE_HUNDRED);

        let (lines, totals) = split_group(&sub_totals, discount, tax, shipping).unwrap();
        prop_assert_eq!(lines.len(), sub_totals.len());
        prop_assert_eq!(lines.iter().map(|l| l.total).sum::<Decimal>(), totals.total);
        prop_assert_eq!(lines.iter().map(|l| l.tax).sum::<Decimal>(), totals.tax);
        prop_assert_eq!(lines.iter().map(|l| l.shipping).sum::<Decimal>(), totals.shipping);
        prop_assert_eq!(lines.iter().map(|l| l.discount).sum::<Decimal>(), totals.discount);
        prop_assert_eq!(totals.total, gross - discount);
    }

    #[test]
    fn manual_update_accepted_iff_identities_hold(
        damaged in 0i32..50,
        expired in 0i32..50,
        refurbished in 0i32..50,
        final_stock in 0i32..200,
        online in 0i32..200,
        offline in 0i32..200,
        arrival_skew in -3i32..=3,
    ) {
        let update = ManualStockUpdate {
            product_id: Uuid::nil(),
            stock_on_arrival: damaged + expired + refurbished + final_stock + arrival_skew,
            damaged_qty: damaged,
            expired_qty: expired,
            refurbished_qty: refurbished,
            final_stock,
            online_stock: online,
            offline_stock: offline,
            notes: None,
        };

        let errors = validate_manual_update(&update);
        let consistent = arrival_skew == 0 && online + offline <= final_stock;
        prop_assert_eq!(errors.is_empty(), consistent, "errors: {:?}", errors);
    }

    #[test]
    fn terminal_statuses_never_move(from in status_strategy(), to in status_strategy()) {
        if from.is_terminal() {
            prop_assert!(check_transition(from, to).is_err());
        }
        prop_assert_eq!(check_transition(from, to).is_ok(), from.can_transition_to(to));
    }
}

#[test]
fn negative_quantities_are_each_reported() {
    let update = ManualStockUpdate {
        product_id: Uuid::nil(),
        stock_on_arrival: 0,
        damaged_qty: -1,
        expired_qty: 0,
        refurbished_qty: 0,
        final_stock: 1,
        online_stock: 0,
        offline_stock: -2,
        notes: None,
    };
    let errors = validate_manual_update(&update);
    assert!(errors.iter().any(|e| e.starts_with("damagedQty")));
    assert!(errors.iter().any(|e| e.starts_with("offlineStock")));
}
