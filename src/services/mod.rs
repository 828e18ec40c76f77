// Stock and warehouse
pub mod stock;
pub mod stock_deduction;
pub mod warehouse;

// Pricing and reference data
pub mod pricing;
pub mod reference_data;

// Orders
pub mod admin_orders;
pub mod order_status;
pub mod orders;

// Customers and catalog
pub mod catalog;
pub mod customers;

// Storefront
pub mod cart;
pub mod checkout;
pub mod payments;

// Outbound email
pub mod notifications;
