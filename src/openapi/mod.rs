use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

/// Registers the bearer scheme referenced by `security(("Bearer" = []))`
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "Bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Coffee Commerce API",
        version = "0.3.0",
        description = r#"
# Coffee Commerce API

Backend for a coffee e-commerce business: public catalog, shopper cart and checkout,
payment webhooks, sales-agent orders and warehouse stock reconciliation.

## Authentication

Protected endpoints require a JWT bearer token:

```
Authorization: Bearer <your-jwt-token>
```

## Errors

Every failure uses the same envelope. Accounting violations are itemized in `errors`:

```json
{
  "success": false,
  "error": true,
  "message": "Validation failed",
  "errors": ["onlineStock + offlineStock (12) cannot exceed finalStock (10)"],
  "requestId": "2f1c...",
  "timestamp": "2024-01-01T00:00:00Z"
}
```

## Pagination

List endpoints accept `page` (default 1) and `perPage` (default 20, max 100).
        "#
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "Warehouse", description = "Effective stock, manual counts, reconciliation, batches and alerts"),
        (name = "Orders", description = "Manual orders, order reads and the status lifecycle"),
        (name = "Customers", description = "Offline and website customer profiles"),
        (name = "Catalog", description = "Products and prices"),
        (name = "Cart", description = "Shopper cart"),
        (name = "Payments", description = "Checkout sessions and payment webhooks"),
        (name = "Reference Data", description = "Exchange and shipping rates"),
        (name = "Health", description = "Health check endpoints")
    ),
    paths(
        // Warehouse
        crate::handlers::warehouse::get_stock,
        crate::handlers::warehouse::update_stock,
        crate::handlers::warehouse::disable_override,
        crate::handlers::warehouse::reconcile,
        crate::handlers::warehouse::stock_alerts,
        crate::handlers::warehouse::get_settings,
        crate::handlers::warehouse::update_settings,
        crate::handlers::warehouse::list_activity,
        crate::handlers::warehouse::create_batch,
        crate::handlers::warehouse::list_batches,
        crate::handlers::warehouse::update_batch_status,

        // Orders
        crate::handlers::admin_orders::create_admin_order,
        crate::handlers::orders::list_orders,
        crate::handlers::orders::get_order,
        crate::handlers::orders::get_order_group,
        crate::handlers::orders::update_order_status,

        // Customers
        crate::handlers::customers::create_customer,
        crate::handlers::customers::register_customer,
        crate::handlers::customers::list_customers,
        crate::handlers::customers::get_customer,
        crate::handlers::customers::update_customer,
        crate::handlers::customers::delete_customer,

        // Catalog
        crate::handlers::products::list_products,
        crate::handlers::products::get_product,
        crate::handlers::products::create_product,
        crate::handlers::products::update_product,

        // Cart and checkout
        crate::handlers::cart::get_cart,
        crate::handlers::cart::add_to_cart,
        crate::handlers::cart::update_cart_item,
        crate::handlers::cart::remove_cart_item,
        crate::handlers::cart::clear_cart,
        crate::handlers::checkout::create_checkout,

        // Webhooks
        crate::handlers::payment_webhooks::stripe_webhook,
        crate::handlers::payment_webhooks::paystack_webhook,

        // Reference data
        crate::handlers::reference_data::list_exchange_rates,
        crate::handlers::reference_data::set_exchange_rate,
        crate::handlers::reference_data::list_shipping_rates,
        crate::handlers::reference_data::upsert_shipping_rate,

        crate::handlers::health::health_check,
    ),
    components(
        schemas(
            crate::errors::ErrorResponse,
            crate::services::stock::EffectiveStock,
            crate::services::stock::StockSource,
            crate::services::stock_deduction::StockChange,
            crate::services::pricing::GroupTotals,
            crate::services::pricing::LineAmounts,
            crate::services::warehouse::ManualStockUpdate,
            crate::services::warehouse::ReconcileRequest,
            crate::services::warehouse::ReconcileOutcome,
            crate::services::warehouse::StockAlerts,
            crate::services::admin_orders::CreateAdminOrderRequest,
            crate::services::admin_orders::AdminOrderResponse,
            crate::services::checkout::CheckoutRequest,
            crate::services::checkout::CheckoutResponse,
            crate::services::payments::WebhookAck,
            crate::services::payments::WebhookOutcome,
            crate::entities::order::OrderStatus,
        )
    ),
    modifiers(&BearerAuth)
)]
pub struct ApiDoc;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_document_lists_core_paths() {
        let json = ApiDoc::openapi().to_json().unwrap();
        assert!(json.contains("Coffee Commerce API"));
        assert!(json.contains("/api/admin-orders/create"));
        assert!(json.contains("/api/warehouse/stock/update"));
        assert!(json.contains("/api/payment/stripe/webhook"));
        assert!(json.contains("Bearer"));
    }
}
