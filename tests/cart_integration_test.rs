mod common;

use axum::http::{Method, StatusCode};
use chrono::{DateTime, Utc};
use coffee_commerce_api::auth::SubRole;
use common::{decimal, TestApp};
use rust_decimal_macros::dec;
use serde_json::json;

#[tokio::test]
async fn cart_lines_merge_and_reprice() {
    let app = TestApp::new().await;
    let (_, token) = app.shopper();
    let product = app.seed_product("Morning Blend", dec!(4500), 10).await;

    for quantity in [2, 3] {
        let (status, body) = app
            .request(
                Method::POST,
                "/api/cart",
                Some(json!({ "productId": product.id, "quantity": quantity })),
                Some(&token),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "body: {}", body);
    }

    let (status, cart) = app.request(Method::GET, "/api/cart", None, Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    let items = cart["data"]["items"].as_array().unwrap();
    assert_eq!(items.len(), 1, "same product and option share a line");
    assert_eq!(items[0]["quantity"], 5);
    assert_eq!(cart["data"]["itemCount"], 5);
    assert_eq!(decimal(&cart["data"]["subTotal"]), dec!(22500));

    let line_id = items[0]["id"].as_str().unwrap().to_string();
    let (status, _) = app
        .request(
            Method::PUT,
            &format!("/api/cart/{}", line_id),
            Some(json!({ "quantity": 1 })),
            Some(&token),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, cart) = app.request(Method::GET, "/api/cart", None, Some(&token)).await;
    assert_eq!(cart["data"]["itemCount"], 1);

    let (status, body) = app
        .request(
            Method::DELETE,
            &format!("/api/cart/{}", line_id),
            None,
            Some(&token),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["removed"], line_id.as_str());

    let (_, cart) = app.request(Method::GET, "/api/cart", None, Some(&token)).await;
    assert!(cart["data"]["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn delivery_options_are_separate_lines_with_their_own_price() {
    let app = TestApp::new().await;
    let (_, token) = app.shopper();
    let product = app.seed_product("Subscription Blend", dec!(4000), 20).await;
    let mut active: coffee_commerce_api::entities::product::ActiveModel = product.clone().into();
    active.three_weeks_price = sea_orm::Set(Some(dec!(3600)));
    sea_orm::ActiveModelTrait::update(active, &*app.state.db)
        .await
        .unwrap();

    for option in ["REGULAR", "THREE_WEEKS"] {
        let (status, _) = app
            .request(
                Method::POST,
                "/api/cart",
                Some(json!({ "productId": product.id, "quantity": 1, "priceOption": option })),
                Some(&token),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (_, cart) = app.request(Method::GET, "/api/cart", None, Some(&token)).await;
    assert_eq!(cart["data"]["items"].as_array().unwrap().len(), 2);
    assert_eq!(decimal(&cart["data"]["subTotal"]), dec!(7600));
}

#[tokio::test]
async fn cart_refuses_more_than_available_stock() {
    let app = TestApp::new().await;
    let (_, token) = app.shopper();
    let product = app
        .seed_warehouse_product("Scarce Lot", dec!(9000), 3, 1, 2)
        .await;

    let (status, body) = app
        .request(
            Method::POST,
            "/api/cart",
            Some(json!({ "productId": product.id, "quantity": 4 })),
            Some(&token),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["message"],
        "Insufficient stock for Scarce Lot. Available: 3, Required: 4"
    );

    let (status, _) = app
        .request(
            Method::POST,
            "/api/cart",
            Some(json!({ "productId": product.id, "quantity": 0 })),
            Some(&token),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn carts_are_private_and_shopper_only() {
    let app = TestApp::new().await;
    let (_, alice) = app.shopper();
    let (_, bob) = app.shopper();
    let (_, sales) = app.staff(SubRole::Sales);
    let product = app.seed_product("Shared Blend", dec!(4000), 10).await;

    let (_, added) = app
        .request(
            Method::POST,
            "/api/cart",
            Some(json!({ "productId": product.id, "quantity": 1 })),
            Some(&alice),
        )
        .await;
    let line_id = added["data"]["id"].as_str().unwrap().to_string();

    let (status, _) = app
        .request(
            Method::DELETE,
            &format!("/api/cart/{}", line_id),
            None,
            Some(&bob),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.request(Method::GET, "/api/cart", None, Some(&sales)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, cleared) = app
        .request(Method::DELETE, "/api/cart", None, Some(&alice))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cleared["data"]["removedItems"], 1);
}

#[tokio::test]
async fn checkout_prices_in_the_requested_currency() {
    let app = TestApp::new().await;
    let (_, token) = app.shopper();
    app.seed_shipping_rate("abuja", "express", dec!(1500), dec!(100))
        .await;
    app.seed_exchange_rate("USD", dec!(0.5)).await;
    let product = app.seed_product("Export Blend", dec!(5000), 10).await;

    app.request(
        Method::POST,
        "/api/cart",
        Some(json!({ "productId": product.id, "quantity": 2 })),
        Some(&token),
    )
    .await;

    let (status, body) = app
        .request(
            Method::POST,
            "/api/payment/checkout",
            Some(json!({
                "provider": "STRIPE",
                "currency": "usd",
                "shippingZone": "Abuja",
                "shippingMethod": "EXPRESS"
            })),
            Some(&token),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "body: {}", body);

    let data = &body["data"];
    assert_eq!(data["currency"], "USD");
    assert_eq!(data["status"], "OPEN");
    assert_eq!(decimal(&data["lines"][0]["unitPrice"]), dec!(2500));
    assert_eq!(decimal(&data["subTotal"]), dec!(5000));
    assert_eq!(decimal(&data["taxAmount"]), dec!(375));
    assert_eq!(decimal(&data["shippingCost"]), dec!(850));
    assert_eq!(decimal(&data["totalAmount"]), dec!(6225));

    // Nothing is sold until the provider confirms payment
    assert_eq!(app.product(product.id).await.stock, 10);
}

#[tokio::test]
async fn checkout_rejects_empty_carts_and_unknown_currencies() {
    let app = TestApp::new().await;
    let (_, token) = app.shopper();
    app.seed_shipping_rate("lagos", "standard", dec!(1000), dec!(0))
        .await;
    let checkout = |currency: &str| {
        json!({
            "provider": "PAYSTACK",
            "currency": currency,
            "shippingZone": "lagos",
            "shippingMethod": "standard"
        })
    };

    let (status, body) = app
        .request(Method::POST, "/api/payment/checkout", Some(checkout("NGN")), Some(&token))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Cart is empty");

    let product = app.seed_product("Any Blend", dec!(3000), 5).await;
    app.request(
        Method::POST,
        "/api/cart",
        Some(json!({ "productId": product.id, "quantity": 1 })),
        Some(&token),
    )
    .await;

    let (status, body) = app
        .request(Method::POST, "/api/payment/checkout", Some(checkout("JPY")), Some(&token))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("JPY"));
}

#[tokio::test]
async fn bank_transfer_creates_pending_orders_immediately() {
    let app = TestApp::new().await;
    let (shopper_id, token) = app.shopper();
    let customer = app.seed_customer("Web Shopper", None, Some(shopper_id)).await;
    app.seed_shipping_rate("lagos", "standard", dec!(1000), dec!(0))
        .await;
    let product = app
        .seed_warehouse_product("Transfer Blend", dec!(4000), 6, 3, 3)
        .await;

    app.request(
        Method::POST,
        "/api/cart",
        Some(json!({ "productId": product.id, "quantity": 2 })),
        Some(&token),
    )
    .await;

    let (status, body) = app
        .request(
            Method::POST,
            "/api/payment/checkout",
            Some(json!({
                "provider": "BANK_TRANSFER",
                "shippingZone": "lagos",
                "shippingMethod": "standard"
            })),
            Some(&token),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "body: {}", body);
    assert_eq!(body["data"]["status"], "COMPLETED");
    let orders = body["data"]["orders"].as_array().unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0]["orderStatus"], "PENDING");
    assert_eq!(orders[0]["paymentStatus"], "PENDING");
    assert_eq!(orders[0]["paymentMethod"], "BANK_TRANSFER");
    assert_eq!(orders[0]["customerId"], json!(customer.id));
    let promised: DateTime<Utc> = orders[0]["estimatedDelivery"]
        .as_str()
        .expect("estimated delivery stamped")
        .parse()
        .unwrap();
    let days_out = (promised - Utc::now()).num_hours();
    assert!((71..=72).contains(&days_out), "promised {}", promised);

    let stored = app.product(product.id).await;
    assert_eq!(stored.final_stock, 4);
    assert_eq!(stored.online_stock, 1);
    assert_eq!(app.customer(customer.id).await.total_orders, 1);

    let (_, cart) = app.request(Method::GET, "/api/cart", None, Some(&token)).await;
    assert!(cart["data"]["items"].as_array().unwrap().is_empty());

    let (status, mine) = app.request(Method::GET, "/api/orders", None, Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(mine["data"]["total"], 1);
}
