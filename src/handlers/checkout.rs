use axum::{extract::State, http::StatusCode, response::Json};

use crate::{
    auth::AuthUser,
    errors::ServiceError,
    services::checkout::{CheckoutRequest, CheckoutResponse},
    ApiResponse, AppState,
};

#[utoipa::path(
    post,
    path = "/api/payment/checkout",
    summary = "Start checkout",
    description = "Price the cart in the requested currency and open a payment session. Bank transfers create PENDING orders immediately.",
    request_body = CheckoutRequest,
    responses(
        (status = 201, description = "Checkout session opened", body = ApiResponse<CheckoutResponse>),
        (status = 400, description = "Empty cart, unsupported currency, missing shipping rate or insufficient stock", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Payments"
)]
pub async fn create_checkout(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CheckoutResponse>>), ServiceError> {
    let session = state
        .services
        .checkout
        .create_session(&auth_user, payload)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(session))))
}
