use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use uuid::Uuid;

use super::common::{created_response, paginated};
use crate::{
    auth::AuthUser,
    entities::product,
    errors::ServiceError,
    services::catalog::{CreateProductRequest, ProductListQuery, ProductView, UpdateProductRequest},
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};

#[utoipa::path(
    get,
    path = "/api/products",
    summary = "List products",
    description = "Active products with their effective stock",
    params(ProductListQuery),
    responses((status = 200, description = "One page of products")),
    tag = "Catalog"
)]
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductListQuery>,
) -> ApiResult<PaginatedResponse<ProductView>> {
    let (page, per_page) = (query.page, query.per_page);
    let (products, total) = state.services.catalog.list_products(query).await?;
    Ok(Json(ApiResponse::success(paginated(
        products, total, page, per_page,
    ))))
}

#[utoipa::path(
    get,
    path = "/api/products/{id}",
    summary = "Get product",
    params(("id" = Uuid, Path, description = "Product id")),
    responses(
        (status = 200, description = "Product with effective stock"),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Catalog"
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<ProductView> {
    let product = state.services.catalog.get_product(id).await?;
    Ok(Json(ApiResponse::success(product)))
}

#[utoipa::path(
    post,
    path = "/api/products",
    summary = "Create product",
    request_body = CreateProductRequest,
    responses(
        (status = 201, description = "Product created"),
        (status = 400, description = "Invalid product data", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 409, description = "SKU already exists", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Catalog"
)]
pub async fn create_product(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<ApiResponse<product::Model>>), ServiceError> {
    let product = state
        .services
        .catalog
        .create_product(&auth_user, payload)
        .await?;
    Ok(created_response(product))
}

#[utoipa::path(
    put,
    path = "/api/products/{id}",
    summary = "Update product",
    params(("id" = Uuid, Path, description = "Product id")),
    request_body = UpdateProductRequest,
    responses(
        (status = 200, description = "Product updated"),
        (status = 400, description = "Invalid product data", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Catalog"
)]
pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    auth_user: AuthUser,
    Json(payload): Json<UpdateProductRequest>,
) -> ApiResult<product::Model> {
    let product = state
        .services
        .catalog
        .update_product(&auth_user, id, payload)
        .await?;
    Ok(Json(ApiResponse::success(product)))
}
