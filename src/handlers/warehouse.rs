use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use uuid::Uuid;

use super::common::{created_response, paginated, ProductFilter};
use crate::{
    auth::AuthUser,
    entities::{stock_batch, warehouse_activity, warehouse_settings},
    errors::ServiceError,
    services::{
        stock::EffectiveStock,
        warehouse::{
            CreateBatchRequest, DisableOverrideRequest, ManualStockUpdate, ReconcileOutcome,
            ReconcileRequest, StockAlerts, UpdateBatchStatusRequest, UpdateSettingsRequest,
        },
    },
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};

#[utoipa::path(
    get,
    path = "/api/warehouse/stock/{product_id}",
    summary = "Effective stock",
    description = "Resolve the stock figures currently in force for a product",
    params(("product_id" = Uuid, Path, description = "Product id")),
    responses(
        (status = 200, description = "Stock snapshot", body = ApiResponse<EffectiveStock>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Warehouse"
)]
pub async fn get_stock(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
    auth_user: AuthUser,
) -> ApiResult<EffectiveStock> {
    let stock = state
        .services
        .warehouse
        .get_stock(&auth_user, product_id)
        .await?;
    Ok(Json(ApiResponse::success(stock)))
}

#[utoipa::path(
    post,
    path = "/api/warehouse/stock/update",
    summary = "Record a manual stock count",
    description = "Enable the warehouse override and persist a physical count. Every accounting violation is itemized.",
    request_body = ManualStockUpdate,
    responses(
        (status = 200, description = "Stock updated", body = ApiResponse<EffectiveStock>),
        (status = 400, description = "Accounting identity violated", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Warehouse"
)]
pub async fn update_stock(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<ManualStockUpdate>,
) -> ApiResult<EffectiveStock> {
    let stock = state
        .services
        .warehouse
        .update_stock(&auth_user, payload)
        .await?;
    Ok(Json(ApiResponse::success(stock)))
}

#[utoipa::path(
    post,
    path = "/api/warehouse/stock/disable-override",
    summary = "Disable the warehouse override",
    request_body = DisableOverrideRequest,
    responses(
        (status = 200, description = "Override disabled", body = ApiResponse<EffectiveStock>),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Warehouse"
)]
pub async fn disable_override(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<DisableOverrideRequest>,
) -> ApiResult<EffectiveStock> {
    let stock = state
        .services
        .warehouse
        .disable_override(&auth_user, payload)
        .await?;
    Ok(Json(ApiResponse::success(stock)))
}

#[utoipa::path(
    post,
    path = "/api/warehouse/stock/reconcile",
    summary = "Reconcile against a physical count",
    request_body = ReconcileRequest,
    responses(
        (status = 200, description = "Stock reconciled", body = ApiResponse<ReconcileOutcome>),
        (status = 400, description = "Invalid count", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Warehouse"
)]
pub async fn reconcile(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<ReconcileRequest>,
) -> ApiResult<ReconcileOutcome> {
    let outcome = state
        .services
        .warehouse
        .reconcile(&auth_user, payload)
        .await?;
    Ok(Json(ApiResponse::success(outcome)))
}

#[utoipa::path(
    get,
    path = "/api/warehouse/stock/alerts",
    summary = "Stock alerts",
    description = "Active products partitioned into out-of-stock, critical and low buckets",
    responses(
        (status = 200, description = "Alert buckets", body = ApiResponse<StockAlerts>),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Warehouse"
)]
pub async fn stock_alerts(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> ApiResult<StockAlerts> {
    let alerts = state.services.warehouse.alerts(&auth_user).await?;
    Ok(Json(ApiResponse::success(alerts)))
}

#[utoipa::path(
    get,
    path = "/api/warehouse/settings",
    summary = "Warehouse settings",
    responses(
        (status = 200, description = "Current settings"),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Warehouse"
)]
pub async fn get_settings(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> ApiResult<warehouse_settings::Model> {
    let settings = state.services.warehouse.get_settings(&auth_user).await?;
    Ok(Json(ApiResponse::success(settings)))
}

#[utoipa::path(
    put,
    path = "/api/warehouse/settings",
    summary = "Update warehouse settings",
    request_body = UpdateSettingsRequest,
    responses(
        (status = 200, description = "Settings saved"),
        (status = 400, description = "Invalid thresholds", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Warehouse"
)]
pub async fn update_settings(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<UpdateSettingsRequest>,
) -> ApiResult<warehouse_settings::Model> {
    let settings = state
        .services
        .warehouse
        .update_settings(&auth_user, payload)
        .await?;
    Ok(Json(ApiResponse::success(settings)))
}

#[utoipa::path(
    get,
    path = "/api/warehouse/activity",
    summary = "Warehouse activity log",
    description = "Audit trail of stock changes, newest first",
    params(ProductFilter),
    responses(
        (status = 200, description = "One page of activity"),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Warehouse"
)]
pub async fn list_activity(
    State(state): State<AppState>,
    Query(filter): Query<ProductFilter>,
    auth_user: AuthUser,
) -> ApiResult<PaginatedResponse<warehouse_activity::Model>> {
    let pagination = filter.pagination();
    let (entries, total) = state
        .services
        .warehouse
        .list_activity(
            &auth_user,
            filter.product_id,
            pagination.page(),
            pagination.per_page(),
        )
        .await?;
    Ok(Json(ApiResponse::success(paginated(
        entries,
        total,
        filter.page,
        filter.per_page,
    ))))
}

#[utoipa::path(
    post,
    path = "/api/warehouse/batches",
    summary = "Receive a stock batch",
    request_body = CreateBatchRequest,
    responses(
        (status = 201, description = "Batch recorded"),
        (status = 400, description = "Batch quantities do not add up", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 409, description = "Duplicate batch number", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Warehouse"
)]
pub async fn create_batch(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<CreateBatchRequest>,
) -> Result<(StatusCode, Json<ApiResponse<stock_batch::Model>>), ServiceError> {
    let batch = state
        .services
        .warehouse
        .create_batch(&auth_user, payload)
        .await?;
    Ok(created_response(batch))
}

#[utoipa::path(
    get,
    path = "/api/warehouse/batches",
    summary = "List stock batches",
    params(ProductFilter),
    responses(
        (status = 200, description = "Batches, most recently received first"),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Warehouse"
)]
pub async fn list_batches(
    State(state): State<AppState>,
    Query(filter): Query<ProductFilter>,
    auth_user: AuthUser,
) -> ApiResult<Vec<stock_batch::Model>> {
    let batches = state
        .services
        .warehouse
        .list_batches(&auth_user, filter.product_id)
        .await?;
    Ok(Json(ApiResponse::success(batches)))
}

#[utoipa::path(
    put,
    path = "/api/warehouse/batches/{id}/status",
    summary = "Change a batch status",
    params(("id" = Uuid, Path, description = "Batch id")),
    request_body = UpdateBatchStatusRequest,
    responses(
        (status = 200, description = "Status changed"),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Batch not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Warehouse"
)]
pub async fn update_batch_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    auth_user: AuthUser,
    Json(payload): Json<UpdateBatchStatusRequest>,
) -> ApiResult<stock_batch::Model> {
    let batch = state
        .services
        .warehouse
        .update_batch_status(&auth_user, id, payload)
        .await?;
    Ok(Json(ApiResponse::success(batch)))
}
