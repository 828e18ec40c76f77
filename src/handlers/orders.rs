use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use uuid::Uuid;

use super::common::paginated;
use crate::{
    auth::AuthUser,
    entities::order,
    services::{order_status::UpdateOrderStatusRequest, orders::OrderListQuery},
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};

#[utoipa::path(
    get,
    path = "/api/orders",
    summary = "List orders",
    description = "Orders visible to the caller: all for managers, own and website orders for sales, own orders for shoppers",
    params(OrderListQuery),
    responses(
        (status = 200, description = "One page of orders"),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<OrderListQuery>,
    auth_user: AuthUser,
) -> ApiResult<PaginatedResponse<order::Model>> {
    let (page, per_page) = (query.page, query.per_page);
    let (orders, total) = state.services.orders.list_orders(&auth_user, query).await?;
    Ok(Json(ApiResponse::success(paginated(
        orders, total, page, per_page,
    ))))
}

#[utoipa::path(
    get,
    path = "/api/orders/{order_id}",
    summary = "Get order",
    params(("order_id" = String, Path, description = "Public order id, e.g. ORD-20240115-AB12CD34")),
    responses(
        (status = 200, description = "Order found"),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
    auth_user: AuthUser,
) -> ApiResult<order::Model> {
    let order = state.services.orders.get_order(&auth_user, &order_id).await?;
    Ok(Json(ApiResponse::success(order)))
}

#[utoipa::path(
    get,
    path = "/api/orders/group/{group_id}",
    summary = "Get order group",
    description = "Every row of an order group, parent first",
    params(("group_id" = Uuid, Path, description = "Order group id")),
    responses(
        (status = 200, description = "Order group rows"),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order group not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn get_order_group(
    State(state): State<AppState>,
    Path(group_id): Path<Uuid>,
    auth_user: AuthUser,
) -> ApiResult<Vec<order::Model>> {
    let rows = state.services.orders.get_group(&auth_user, group_id).await?;
    Ok(Json(ApiResponse::success(rows)))
}

#[utoipa::path(
    put,
    path = "/api/orders/{order_id}/status",
    summary = "Update order status",
    description = "Move an order along its lifecycle. Illegal transitions are rejected.",
    params(("order_id" = String, Path, description = "Public order id")),
    request_body = UpdateOrderStatusRequest,
    responses(
        (status = 200, description = "Status updated"),
        (status = 400, description = "Invalid status transition", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn update_order_status(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
    auth_user: AuthUser,
    Json(payload): Json<UpdateOrderStatusRequest>,
) -> ApiResult<order::Model> {
    let order = state
        .services
        .order_status
        .update_status(&auth_user, &order_id, payload)
        .await?;
    Ok(Json(ApiResponse::success(order)))
}
