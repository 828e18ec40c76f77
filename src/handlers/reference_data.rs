use axum::{
    extract::{Path, State},
    response::Json,
};

use crate::{
    auth::AuthUser,
    entities::{exchange_rate, shipping_rate},
    services::reference_data::{SetExchangeRateRequest, UpsertShippingRateRequest},
    ApiResponse, ApiResult, AppState,
};

#[utoipa::path(
    get,
    path = "/api/exchange-rates",
    summary = "List exchange rates",
    responses((status = 200, description = "Rates against the base currency")),
    tag = "Reference Data"
)]
pub async fn list_exchange_rates(
    State(state): State<AppState>,
) -> ApiResult<Vec<exchange_rate::Model>> {
    let rates = state.services.reference_data.list_exchange_rates().await?;
    Ok(Json(ApiResponse::success(rates)))
}

#[utoipa::path(
    put,
    path = "/api/exchange-rates/{currency}",
    summary = "Set an exchange rate",
    params(("currency" = String, Path, description = "ISO 4217 code")),
    request_body = SetExchangeRateRequest,
    responses(
        (status = 200, description = "Rate saved"),
        (status = 400, description = "Invalid currency or rate", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Reference Data"
)]
pub async fn set_exchange_rate(
    State(state): State<AppState>,
    Path(currency): Path<String>,
    auth_user: AuthUser,
    Json(payload): Json<SetExchangeRateRequest>,
) -> ApiResult<exchange_rate::Model> {
    let rate = state
        .services
        .reference_data
        .set_exchange_rate(&auth_user, &currency, payload)
        .await?;
    Ok(Json(ApiResponse::success(rate)))
}

#[utoipa::path(
    get,
    path = "/api/shipping/rates",
    summary = "List shipping rates",
    responses((status = 200, description = "Rates per zone and method")),
    tag = "Reference Data"
)]
pub async fn list_shipping_rates(
    State(state): State<AppState>,
) -> ApiResult<Vec<shipping_rate::Model>> {
    let rates = state.services.reference_data.list_shipping_rates().await?;
    Ok(Json(ApiResponse::success(rates)))
}

#[utoipa::path(
    post,
    path = "/api/shipping/rates",
    summary = "Create or replace a shipping rate",
    request_body = UpsertShippingRateRequest,
    responses(
        (status = 200, description = "Rate saved"),
        (status = 400, description = "Invalid rate", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Reference Data"
)]
pub async fn upsert_shipping_rate(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<UpsertShippingRateRequest>,
) -> ApiResult<shipping_rate::Model> {
    let rate = state
        .services
        .reference_data
        .upsert_shipping_rate(&auth_user, payload)
        .await?;
    Ok(Json(ApiResponse::success(rate)))
}
