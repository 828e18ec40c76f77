use axum::{extract::State, response::Json};

use crate::{
    auth::AuthUser,
    services::admin_orders::{AdminOrderResponse, CreateAdminOrderRequest},
    ApiResponse, ApiResult, AppState,
};

#[utoipa::path(
    post,
    path = "/api/admin-orders/create",
    summary = "Create a manual order",
    description = "Create an order group on behalf of a customer. Stock for every line is deducted in one transaction; any shortfall rejects the whole order.",
    request_body = CreateAdminOrderRequest,
    responses(
        (status = 200, description = "Order group created", body = ApiResponse<AdminOrderResponse>,
            headers(("X-Request-Id" = String, description = "Unique request id"))
        ),
        (status = 400, description = "Invalid request or insufficient stock", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Customer or product not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Concurrent stock update, retry", body = crate::errors::ErrorResponse),
        (status = 500, description = "Transaction failed", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn create_admin_order(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<CreateAdminOrderRequest>,
) -> ApiResult<AdminOrderResponse> {
    let created = state
        .services
        .admin_orders
        .create_order(&auth_user, payload)
        .await?;
    let message = format!("Created {} order(s)", created.orders.len());
    let mut response = ApiResponse::success(created);
    response.message = Some(message);
    Ok(Json(response))
}
