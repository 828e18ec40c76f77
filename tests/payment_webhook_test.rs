mod common;

use axum::http::{Method, StatusCode};
use chrono::Utc;
use coffee_commerce_api::{
    entities::{checkout_session, order},
    services::payments::{
        sign_paystack_payload, sign_stripe_payload, PAYSTACK_SIGNATURE_HEADER,
        STRIPE_SIGNATURE_HEADER,
    },
};
use common::{TestApp, PAYSTACK_SECRET, STRIPE_SECRET};
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use serde_json::json;
use uuid::Uuid;

const STRIPE_URI: &str = "/api/payment/stripe/webhook";
const PAYSTACK_URI: &str = "/api/payment/paystack/webhook";

/// Fill a shopper's cart and open a session with `provider`
async fn open_session(app: &TestApp, provider: &str, product_id: Uuid, quantity: i32) -> String {
    let (_, token) = app.shopper();
    let (status, body) = app
        .request(
            Method::POST,
            "/api/cart",
            Some(json!({ "productId": product_id, "quantity": quantity })),
            Some(&token),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "add to cart: {}", body);

    let (status, body) = app
        .request(
            Method::POST,
            "/api/payment/checkout",
            Some(json!({
                "provider": provider,
                "shippingZone": "lagos",
                "shippingMethod": "standard"
            })),
            Some(&token),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "checkout: {}", body);
    assert_eq!(body["data"]["status"], "OPEN");
    body["data"]["reference"].as_str().unwrap().to_string()
}

fn stripe_completed(reference: &str) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "id": "evt_1",
        "type": "checkout.session.completed",
        "data": { "object": {
            "id": "cs_test_1",
            "payment_intent": "pi_123",
            "metadata": { "reference": reference }
        }}
    }))
    .unwrap()
}

async fn post_stripe(app: &TestApp, payload: &[u8]) -> (StatusCode, serde_json::Value) {
    let signature = sign_stripe_payload(STRIPE_SECRET, Utc::now().timestamp(), payload).unwrap();
    app.post_raw(STRIPE_URI, payload, &[(STRIPE_SIGNATURE_HEADER, &signature)])
        .await
}

async fn setup() -> (TestApp, Uuid) {
    let app = TestApp::new().await;
    app.seed_shipping_rate("lagos", "standard", dec!(1500), dec!(100))
        .await;
    let product = app
        .seed_warehouse_product("Webshop Blend", dec!(5000), 10, 6, 4)
        .await;
    (app, product.id)
}

#[tokio::test]
async fn stripe_success_materializes_orders_once() {
    let (app, product_id) = setup().await;
    let reference = open_session(&app, "STRIPE", product_id, 3).await;
    let payload = stripe_completed(&reference);

    let (status, ack) = post_stripe(&app, &payload).await;
    assert_eq!(status, StatusCode::OK, "ack: {}", ack);
    assert_eq!(ack["received"], true);
    assert_eq!(ack["outcome"], "PROCESSED");
    assert_eq!(ack["reference"], reference.as_str());
    let group_id = ack["orderGroupId"].clone();
    assert!(group_id.is_string());

    let stored = app.product(product_id).await;
    assert_eq!(stored.final_stock, 7);
    assert_eq!(stored.online_stock, 3, "website orders drain the online pool first");
    assert_eq!(stored.offline_stock, 4);

    let orders = order::Entity::find().all(&*app.state.db).await.unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].order_status, order::OrderStatus::Confirmed);
    assert_eq!(orders[0].payment_status, order::PaymentStatus::Paid);
    assert_eq!(orders[0].source, order::OrderSource::Website);
    assert_eq!(orders[0].payment_reference.as_deref(), Some("pi_123"));

    let (status, again) = post_stripe(&app, &payload).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(again["outcome"], "DUPLICATE");
    assert_eq!(again["orderGroupId"], group_id);
    assert_eq!(app.product(product_id).await.final_stock, 7);
    assert_eq!(
        order::Entity::find().count(&*app.state.db).await.unwrap(),
        1
    );
}

#[tokio::test]
async fn stripe_rejects_bad_signatures() {
    let (app, product_id) = setup().await;
    let reference = open_session(&app, "STRIPE", product_id, 1).await;
    let payload = stripe_completed(&reference);

    let forged = sign_stripe_payload("whsec_wrong", Utc::now().timestamp(), &payload).unwrap();
    let (status, body) = app
        .post_raw(STRIPE_URI, &payload, &[(STRIPE_SIGNATURE_HEADER, &forged)])
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Unauthorized: Invalid webhook signature");

    let stale = sign_stripe_payload(STRIPE_SECRET, Utc::now().timestamp() - 3_600, &payload)
        .unwrap();
    let (status, _) = app
        .post_raw(STRIPE_URI, &payload, &[(STRIPE_SIGNATURE_HEADER, &stale)])
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.post_raw(STRIPE_URI, &payload, &[]).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    assert_eq!(app.product(product_id).await.final_stock, 10);
}

#[tokio::test]
async fn unknown_reference_is_not_found() {
    let (app, _) = setup().await;
    let payload = stripe_completed("CS-DOES-NOT-EXIST");

    let (status, _) = post_stripe(&app, &payload).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn irrelevant_events_are_acknowledged() {
    let (app, _) = setup().await;
    let payload = serde_json::to_vec(&json!({
        "type": "customer.created",
        "data": { "object": { "id": "cus_1" } }
    }))
    .unwrap();

    let (status, ack) = post_stripe(&app, &payload).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack["outcome"], "IGNORED");
}

#[tokio::test]
async fn paystack_charge_success_is_idempotent() {
    let (app, product_id) = setup().await;
    let reference = open_session(&app, "PAYSTACK", product_id, 2).await;
    let payload = serde_json::to_vec(&json!({
        "event": "charge.success",
        "data": { "id": 302961, "reference": reference, "status": "success" }
    }))
    .unwrap();
    let signature = sign_paystack_payload(PAYSTACK_SECRET, &payload).unwrap();
    let headers = [(PAYSTACK_SIGNATURE_HEADER, signature.as_str())];

    let (status, ack) = app.post_raw(PAYSTACK_URI, &payload, &headers).await;
    assert_eq!(status, StatusCode::OK, "ack: {}", ack);
    assert_eq!(ack["outcome"], "PROCESSED");

    let (status, ack) = app.post_raw(PAYSTACK_URI, &payload, &headers).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack["outcome"], "DUPLICATE");

    assert_eq!(app.product(product_id).await.final_stock, 8);
    let orders = order::Entity::find().all(&*app.state.db).await.unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].payment_method, order::PaymentMethod::Paystack);
    assert_eq!(orders[0].payment_reference.as_deref(), Some("302961"));

    let (status, _) = app
        .post_raw(PAYSTACK_URI, &payload, &[(PAYSTACK_SIGNATURE_HEADER, "deadbeef")])
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn failed_payment_closes_the_session() {
    let (app, product_id) = setup().await;
    let reference = open_session(&app, "PAYSTACK", product_id, 1).await;
    let payload = serde_json::to_vec(&json!({
        "event": "charge.failed",
        "data": { "reference": reference }
    }))
    .unwrap();
    let signature = sign_paystack_payload(PAYSTACK_SECRET, &payload).unwrap();

    let (status, ack) = app
        .post_raw(PAYSTACK_URI, &payload, &[(PAYSTACK_SIGNATURE_HEADER, &signature)])
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack["outcome"], "PAYMENT_FAILED");

    let session = checkout_session::Entity::find()
        .filter(checkout_session::Column::Reference.eq(reference.as_str()))
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(session.status, checkout_session::SessionStatus::Failed);
    assert_eq!(app.product(product_id).await.final_stock, 10);
}

#[tokio::test]
async fn stock_gone_after_payment_is_acknowledged_as_failed() {
    let (app, product_id) = setup().await;
    let reference = open_session(&app, "STRIPE", product_id, 4).await;

    // Someone else bought most of the stock between checkout and payment
    let (_, warehouse) = app.staff(coffee_commerce_api::auth::SubRole::Warehouse);
    let (status, _) = app
        .request(
            Method::POST,
            "/api/warehouse/stock/reconcile",
            Some(json!({ "productId": product_id, "actualCount": 2 })),
            Some(&warehouse),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let payload = stripe_completed(&reference);
    let (status, ack) = post_stripe(&app, &payload).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack["outcome"], "FAILED");
    assert_eq!(app.product(product_id).await.final_stock, 2);
    assert_eq!(
        order::Entity::find().count(&*app.state.db).await.unwrap(),
        0
    );

    let (status, again) = post_stripe(&app, &payload).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(again["outcome"], "FAILED");
}
