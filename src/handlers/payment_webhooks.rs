use axum::{extract::State, http::HeaderMap, response::Json};
use bytes::Bytes;

use crate::{
    errors::ServiceError,
    services::payments::{WebhookAck, PAYSTACK_SIGNATURE_HEADER, STRIPE_SIGNATURE_HEADER},
    AppState,
};

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

// POST /api/payment/stripe/webhook
#[utoipa::path(
    post,
    path = "/api/payment/stripe/webhook",
    request_body = String,
    responses(
        (status = 200, description = "Webhook accepted", body = WebhookAck),
        (status = 401, description = "Invalid signature", body = crate::errors::ErrorResponse),
        (status = 400, description = "Invalid payload", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown checkout reference", body = crate::errors::ErrorResponse)
    ),
    tag = "Payments"
)]
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, ServiceError> {
    let ack = state
        .services
        .payments
        .handle_stripe(header(&headers, STRIPE_SIGNATURE_HEADER), &body)
        .await?;
    Ok(Json(ack))
}

// POST /api/payment/paystack/webhook
#[utoipa::path(
    post,
    path = "/api/payment/paystack/webhook",
    request_body = String,
    responses(
        (status = 200, description = "Webhook accepted", body = WebhookAck),
        (status = 401, description = "Invalid signature", body = crate::errors::ErrorResponse),
        (status = 400, description = "Invalid payload", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown checkout reference", body = crate::errors::ErrorResponse)
    ),
    tag = "Payments"
)]
pub async fn paystack_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, ServiceError> {
    let ack = state
        .services
        .payments
        .handle_paystack(header(&headers, PAYSTACK_SIGNATURE_HEADER), &body)
        .await?;
    Ok(Json(ack))
}
