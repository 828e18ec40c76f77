use axum::{
    extract::{Path, State},
    response::Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    entities::cart_item,
    services::cart::{AddToCartRequest, CartView, UpdateCartItemRequest},
    ApiResponse, ApiResult, AppState,
};

#[utoipa::path(
    get,
    path = "/api/cart",
    summary = "Current cart",
    responses(
        (status = 200, description = "Cart priced at current consumer tiers", body = ApiResponse<CartView>),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Cart"
)]
pub async fn get_cart(State(state): State<AppState>, auth_user: AuthUser) -> ApiResult<CartView> {
    let cart = state.services.cart.get_cart(&auth_user).await?;
    Ok(Json(ApiResponse::success(cart)))
}

#[utoipa::path(
    post,
    path = "/api/cart",
    summary = "Add to cart",
    description = "Units for a product and price option already in the cart are merged into that line",
    request_body = AddToCartRequest,
    responses(
        (status = 200, description = "Cart line saved"),
        (status = 400, description = "Invalid quantity or insufficient stock", body = crate::errors::ErrorResponse),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Concurrent cart update", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Cart"
)]
pub async fn add_to_cart(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<AddToCartRequest>,
) -> ApiResult<cart_item::Model> {
    let line = state.services.cart.add_item(&auth_user, payload).await?;
    Ok(Json(ApiResponse::success(line)))
}

#[utoipa::path(
    put,
    path = "/api/cart/{id}",
    summary = "Change a cart line quantity",
    params(("id" = Uuid, Path, description = "Cart line id")),
    request_body = UpdateCartItemRequest,
    responses(
        (status = 200, description = "Cart line updated"),
        (status = 400, description = "Invalid quantity or insufficient stock", body = crate::errors::ErrorResponse),
        (status = 404, description = "Cart line not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Cart"
)]
pub async fn update_cart_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    auth_user: AuthUser,
    Json(payload): Json<UpdateCartItemRequest>,
) -> ApiResult<cart_item::Model> {
    let line = state
        .services
        .cart
        .update_item(&auth_user, id, payload)
        .await?;
    Ok(Json(ApiResponse::success(line)))
}

#[utoipa::path(
    delete,
    path = "/api/cart/{id}",
    summary = "Remove a cart line",
    params(("id" = Uuid, Path, description = "Cart line id")),
    responses(
        (status = 200, description = "Cart line removed"),
        (status = 404, description = "Cart line not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Cart"
)]
pub async fn remove_cart_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    auth_user: AuthUser,
) -> ApiResult<Value> {
    state.services.cart.remove_item(&auth_user, id).await?;
    Ok(Json(ApiResponse::success(json!({ "removed": id }))))
}

#[utoipa::path(
    delete,
    path = "/api/cart",
    summary = "Empty the cart",
    responses((status = 200, description = "Cart emptied")),
    security(("Bearer" = [])),
    tag = "Cart"
)]
pub async fn clear_cart(State(state): State<AppState>, auth_user: AuthUser) -> ApiResult<Value> {
    let removed = state.services.cart.clear(&auth_user).await?;
    Ok(Json(ApiResponse::success(json!({ "removedItems": removed }))))
}
