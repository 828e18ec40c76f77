mod common;

use assert_matches::assert_matches;
use coffee_commerce_api::{
    auth::SubRole,
    entities::{
        order,
        product::{self, PriceOption},
    },
    errors::ServiceError,
    services::{
        admin_orders::{AdminOrderItem, CreateAdminOrderRequest},
        stock_deduction::{deduct_stock, save_versioned, DrainOrder},
        warehouse::ManualStockUpdate,
    },
};
use common::TestApp;
use futures::future::join_all;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{EntityTrait, PaginatorTrait, Set};
use uuid::Uuid;

fn single_line(customer_id: Uuid, product_id: Uuid, quantity: i32) -> CreateAdminOrderRequest {
    CreateAdminOrderRequest {
        customer_id,
        items: vec![AdminOrderItem {
            product_id,
            quantity,
            price_option: PriceOption::Regular,
        }],
        order_type: order::OrderType::Btc,
        order_mode: order::OrderMode::Offline,
        payment_method: order::PaymentMethod::Cash,
        discount_amount: Decimal::ZERO,
        tax_amount: Decimal::ZERO,
        shipping_cost: Decimal::ZERO,
        notes: None,
        send_invoice_email: false,
    }
}

#[tokio::test]
async fn concurrent_orders_for_the_last_units_sell_once() {
    let app = TestApp::new().await;
    let (first_agent, _) = app.staff(SubRole::Sales);
    let (second_agent, _) = app.staff(SubRole::Sales);
    let first_customer = app.seed_customer("Agent One Client", Some(first_agent), None).await;
    let second_customer = app.seed_customer("Agent Two Client", Some(second_agent), None).await;
    let product = app
        .seed_warehouse_product("Last Bag", dec!(5200), 5, 0, 5)
        .await;

    let service = app.state.services.admin_orders.clone();
    let first = {
        let service = service.clone();
        let actor = TestApp::actor(first_agent, Some(SubRole::Sales));
        let request = single_line(first_customer.id, product.id, 3);
        tokio::spawn(async move { service.create_order(&actor, request).await })
    };
    let second = {
        let service = service.clone();
        let actor = TestApp::actor(second_agent, Some(SubRole::Sales));
        let request = single_line(second_customer.id, product.id, 4);
        tokio::spawn(async move { service.create_order(&actor, request).await })
    };

    let results = vec![first.await.unwrap(), second.await.unwrap()];
    let successes: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    let failures: Vec<_> = results.iter().filter_map(|r| r.as_ref().err()).collect();

    assert_eq!(successes.len(), 1, "exactly one order should win");
    assert_eq!(failures.len(), 1);
    assert_matches!(failures[0], ServiceError::InsufficientStock(msg) if msg.starts_with("Insufficient stock for Last Bag"));

    let sold = successes[0].orders[0].quantity;
    let stored = app.product(product.id).await;
    assert_eq!(stored.final_stock, 5 - sold);
    assert_eq!(stored.stock, 5 - sold);
    assert_eq!(
        order::Entity::find().count(&*app.state.db).await.unwrap(),
        1
    );
}

#[tokio::test]
async fn many_single_unit_orders_never_oversell() {
    let app = TestApp::new().await;
    let (agent, _) = app.staff(SubRole::Sales);
    let customer = app.seed_customer("Busy Cafe", Some(agent), None).await;
    let product = app.seed_product("Popular Blend", dec!(3900), 4).await;

    let service = app.state.services.admin_orders.clone();
    let mut tasks = Vec::new();
    for _ in 0..10 {
        let service = service.clone();
        let actor = TestApp::actor(agent, Some(SubRole::Sales));
        let request = single_line(customer.id, product.id, 1);
        tasks.push(tokio::spawn(async move {
            service.create_order(&actor, request).await.is_ok()
        }));
    }

    let success = join_all(tasks)
        .await
        .into_iter()
        .filter(|joined| matches!(joined, Ok(true)))
        .count();

    assert_eq!(success, 4, "exactly 4 orders should succeed; got {}", success);
    assert_eq!(app.product(product.id).await.stock, 0);
    assert_eq!(app.customer(customer.id).await.total_orders, 4);
}

#[tokio::test]
async fn deduction_from_a_stale_read_is_refused() {
    let app = TestApp::new().await;
    let (agent, _) = app.staff(SubRole::Sales);
    let customer = app.seed_customer("Stale Reader", Some(agent), None).await;
    let product = app.seed_product("Moving Target", dec!(4100), 5).await;
    let stale = app.product(product.id).await;

    app.state
        .services
        .admin_orders
        .create_order(
            &TestApp::actor(agent, Some(SubRole::Sales)),
            single_line(customer.id, product.id, 1),
        )
        .await
        .expect("first order");

    let result = deduct_stock(&*app.state.db, &stale, 2, DrainOrder::OfflineFirst).await;
    assert_matches!(result, Err(ServiceError::Conflict(msg)) if msg.contains("Moving Target"));

    let stored = app.product(product.id).await;
    assert_eq!(stored.stock, 4);
    assert_eq!(stored.stock_version, stale.stock_version + 1);
}

#[tokio::test]
async fn stale_count_cannot_overwrite_a_committed_sale() {
    let app = TestApp::new().await;
    let (agent, _) = app.staff(SubRole::Sales);
    let (keeper, _) = app.staff(SubRole::Warehouse);
    let customer = app.seed_customer("Counting Cafe", Some(agent), None).await;
    let product = app
        .seed_warehouse_product("Counted Lot", dec!(4800), 10, 0, 10)
        .await;

    // A count is taken, then a sale commits before the count is saved
    let counted = app.product(product.id).await;
    app.state
        .services
        .admin_orders
        .create_order(
            &TestApp::actor(agent, Some(SubRole::Sales)),
            single_line(customer.id, product.id, 1),
        )
        .await
        .expect("sale");
    let after_sale = app.product(product.id).await;

    let mut recount: product::ActiveModel = counted.clone().into();
    recount.final_stock = Set(50);
    recount.stock = Set(50);
    assert_matches!(
        save_versioned(&*app.state.db, &counted, recount).await,
        Err(ServiceError::Conflict(_))
    );

    // A reader of the post-sale row still deducts against fresh figures
    deduct_stock(&*app.state.db, &after_sale, 2, DrainOrder::OfflineFirst)
        .await
        .expect("deduction after the sale");
    let stored = app.product(product.id).await;
    assert_eq!(stored.final_stock, 7);
    assert_eq!(stored.stock_version, counted.stock_version + 2);

    // Service writes bump the version relative to the row
    app.state
        .services
        .warehouse
        .update_stock(
            &TestApp::actor(keeper, Some(SubRole::Warehouse)),
            ManualStockUpdate {
                product_id: product.id,
                stock_on_arrival: 50,
                damaged_qty: 0,
                expired_qty: 0,
                refurbished_qty: 0,
                final_stock: 50,
                online_stock: 0,
                offline_stock: 50,
                notes: None,
            },
        )
        .await
        .expect("recount");
    assert_eq!(
        app.product(product.id).await.stock_version,
        stored.stock_version + 1
    );
}

#[tokio::test]
async fn interleaved_transactions_never_oversell() {
    let app = TestApp::with_pool(4).await;
    let (agent, _) = app.staff(SubRole::Sales);
    let customer = app.seed_customer("Rush Hour Cafe", Some(agent), None).await;
    let product = app
        .seed_warehouse_product("Rush Blend", dec!(4400), 3, 0, 3)
        .await;

    let service = app.state.services.admin_orders.clone();
    let tasks = (0..6).map(|_| {
        let service = service.clone();
        let actor = TestApp::actor(agent, Some(SubRole::Sales));
        let request = single_line(customer.id, product.id, 1);
        tokio::spawn(async move { service.create_order(&actor, request).await })
    });
    let results: Vec<_> = join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.expect("order task panicked"))
        .collect();

    let sold = results.iter().filter(|r| r.is_ok()).count();
    for failure in results.iter().filter_map(|r| r.as_ref().err()) {
        // Contention surfaces as a retryable 409, never as a server error
        assert_matches!(
            failure,
            ServiceError::InsufficientStock(_) | ServiceError::Conflict(_)
        );
    }
    assert!((1..=3).contains(&sold), "sold {}", sold);

    let stored = app.product(product.id).await;
    assert_eq!(stored.final_stock, 3 - sold as i32);
    assert_eq!(stored.stock, stored.final_stock);
    assert_eq!(
        order::Entity::find().count(&*app.state.db).await.unwrap(),
        sold as u64
    );
    assert_eq!(app.customer(customer.id).await.total_orders, sold as i32);
}
