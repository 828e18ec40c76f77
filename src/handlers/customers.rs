use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use uuid::Uuid;

use super::common::{created_response, paginated};
use crate::{
    auth::AuthUser,
    entities::customer,
    errors::ServiceError,
    services::customers::{CreateCustomerRequest, CustomerListQuery, UpdateCustomerRequest},
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};

type Created = (StatusCode, Json<ApiResponse<customer::Model>>);

#[utoipa::path(
    post,
    path = "/api/customers",
    summary = "Create an offline customer",
    request_body = CreateCustomerRequest,
    responses(
        (status = 201, description = "Customer created"),
        (status = 400, description = "Invalid customer data", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Customers"
)]
pub async fn create_customer(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<CreateCustomerRequest>,
) -> Result<Created, ServiceError> {
    let customer = state
        .services
        .customers
        .create_customer(&auth_user, payload)
        .await?;
    Ok(created_response(customer))
}

#[utoipa::path(
    post,
    path = "/api/customers/register",
    summary = "Register a website customer profile",
    request_body = CreateCustomerRequest,
    responses(
        (status = 201, description = "Profile created"),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 409, description = "Profile already exists", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Customers"
)]
pub async fn register_customer(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<CreateCustomerRequest>,
) -> Result<Created, ServiceError> {
    let customer = state.services.customers.register(&auth_user, payload).await?;
    Ok(created_response(customer))
}

#[utoipa::path(
    get,
    path = "/api/customers",
    summary = "List customers",
    params(CustomerListQuery),
    responses(
        (status = 200, description = "One page of customers"),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Customers"
)]
pub async fn list_customers(
    State(state): State<AppState>,
    Query(query): Query<CustomerListQuery>,
    auth_user: AuthUser,
) -> ApiResult<PaginatedResponse<customer::Model>> {
    let (page, per_page) = (query.page, query.per_page);
    let (customers, total) = state
        .services
        .customers
        .list_customers(&auth_user, query)
        .await?;
    Ok(Json(ApiResponse::success(paginated(
        customers, total, page, per_page,
    ))))
}

#[utoipa::path(
    get,
    path = "/api/customers/{id}",
    summary = "Get customer",
    params(("id" = Uuid, Path, description = "Customer id")),
    responses(
        (status = 200, description = "Customer found"),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Customer not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Customers"
)]
pub async fn get_customer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    auth_user: AuthUser,
) -> ApiResult<customer::Model> {
    let customer = state.services.customers.get_customer(&auth_user, id).await?;
    Ok(Json(ApiResponse::success(customer)))
}

#[utoipa::path(
    put,
    path = "/api/customers/{id}",
    summary = "Update customer",
    params(("id" = Uuid, Path, description = "Customer id")),
    request_body = UpdateCustomerRequest,
    responses(
        (status = 200, description = "Customer updated"),
        (status = 400, description = "Invalid customer data", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Customer not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Customers"
)]
pub async fn update_customer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    auth_user: AuthUser,
    Json(payload): Json<UpdateCustomerRequest>,
) -> ApiResult<customer::Model> {
    let customer = state
        .services
        .customers
        .update_customer(&auth_user, id, payload)
        .await?;
    Ok(Json(ApiResponse::success(customer)))
}

#[utoipa::path(
    delete,
    path = "/api/customers/{id}",
    summary = "Delete customer",
    description = "Soft delete; existing orders keep their reference",
    params(("id" = Uuid, Path, description = "Customer id")),
    responses(
        (status = 204, description = "Customer deleted"),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Customer not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Customers"
)]
pub async fn delete_customer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    auth_user: AuthUser,
) -> Result<StatusCode, ServiceError> {
    state
        .services
        .customers
        .delete_customer(&auth_user, id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
