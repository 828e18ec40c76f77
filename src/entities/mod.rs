pub mod cart_item;
pub mod checkout_session;
pub mod customer;
pub mod exchange_rate;
pub mod order;
pub mod product;
pub mod shipping_rate;
pub mod stock_batch;
pub mod warehouse_activity;
pub mod warehouse_settings;
