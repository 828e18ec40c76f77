use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240301_000001_create_products_table::Migration),
            Box::new(m20240301_000002_create_stock_batches_table::Migration),
            Box::new(m20240301_000003_create_customers_table::Migration),
            Box::new(m20240301_000004_create_orders_table::Migration),
            Box::new(m20240301_000005_create_cart_items_table::Migration),
            Box::new(m20240301_000006_create_warehouse_tables::Migration),
            Box::new(m20240301_000007_create_checkout_sessions_table::Migration),
            Box::new(m20240301_000008_create_reference_data_tables::Migration),
        ]
    }
}

// Migration implementations

mod m20240301_000001_create_products_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000001_create_products_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Aligned with entities::product Model
            manager
                .create_table(
                    Table::create()
                        .table(Products::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Products::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Products::Sku).string().not_null())
                        .col(ColumnDef::new(Products::Name).string().not_null())
                        .col(ColumnDef::new(Products::Description).text().null())
                        .col(ColumnDef::new(Products::Category).string().null())
                        .col(
                            ColumnDef::new(Products::Price)
                                .decimal_len(19, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Products::RegularPrice).decimal_len(19, 4).null())
                        .col(
                            ColumnDef::new(Products::ThreeWeeksPrice)
                                .decimal_len(19, 4)
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Products::FiveWeeksPrice)
                                .decimal_len(19, 4)
                                .null(),
                        )
                        .col(ColumnDef::new(Products::BtbPrice).decimal_len(19, 4).null())
                        .col(ColumnDef::new(Products::Stock).integer().not_null().default(0))
                        .col(
                            ColumnDef::new(Products::WarehouseEnabled)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(Products::StockOnArrival)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Products::DamagedQty).integer().not_null().default(0))
                        .col(ColumnDef::new(Products::ExpiredQty).integer().not_null().default(0))
                        .col(
                            ColumnDef::new(Products::RefurbishedQty)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Products::FinalStock).integer().not_null().default(0))
                        .col(ColumnDef::new(Products::OnlineStock).integer().not_null().default(0))
                        .col(
                            ColumnDef::new(Products::OfflineStock)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Products::WarehouseNotes).text().null())
                        .col(
                            ColumnDef::new(Products::WarehouseLastUpdated)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(ColumnDef::new(Products::WarehouseUpdatedBy).uuid().null())
                        .col(
                            ColumnDef::new(Products::StockVersion)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Products::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Products::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Products::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_products_sku")
                        .table(Products::Table)
                        .col(Products::Sku)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Products::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Products {
        Table,
        Id,
        Sku,
        Name,
        Description,
        Category,
        Price,
        RegularPrice,
        ThreeWeeksPrice,
        FiveWeeksPrice,
        BtbPrice,
        Stock,
        WarehouseEnabled,
        StockOnArrival,
        DamagedQty,
        ExpiredQty,
        RefurbishedQty,
        FinalStock,
        OnlineStock,
        OfflineStock,
        WarehouseNotes,
        WarehouseLastUpdated,
        WarehouseUpdatedBy,
        StockVersion,
        IsActive,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240301_000002_create_stock_batches_table {

    use super::m20240301_000001_create_products_table::Products;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000002_create_stock_batches_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(StockBatches::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StockBatches::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockBatches::ProductId).uuid().not_null())
                        .col(ColumnDef::new(StockBatches::BatchNumber).string().not_null())
                        .col(ColumnDef::new(StockBatches::Status).string_len(24).not_null())
                        .col(
                            ColumnDef::new(StockBatches::OriginalQuantity)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(StockBatches::GoodQuantity)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(StockBatches::RefurbishedQuantity)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(StockBatches::DamagedQuantity)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(StockBatches::ExpiredQuantity)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(StockBatches::OnlineStock)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(StockBatches::OfflineStock)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(StockBatches::ReceivedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockBatches::Notes).text().null())
                        .col(ColumnDef::new(StockBatches::CreatedBy).uuid().null())
                        .col(
                            ColumnDef::new(StockBatches::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockBatches::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_stock_batches_product")
                                .from(StockBatches::Table, StockBatches::ProductId)
                                .to(Products::Table, Products::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_batches_product_status")
                        .table(StockBatches::Table)
                        .col(StockBatches::ProductId)
                        .col(StockBatches::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_batches_product_batch_number")
                        .table(StockBatches::Table)
                        .col(StockBatches::ProductId)
                        .col(StockBatches::BatchNumber)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(StockBatches::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum StockBatches {
        Table,
        Id,
        ProductId,
        BatchNumber,
        Status,
        OriginalQuantity,
        GoodQuantity,
        RefurbishedQuantity,
        DamagedQuantity,
        ExpiredQuantity,
        OnlineStock,
        OfflineStock,
        ReceivedAt,
        Notes,
        CreatedBy,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240301_000003_create_customers_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000003_create_customers_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Customers::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Customers::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Customers::CustomerType).string_len(3).not_null())
                        .col(ColumnDef::new(Customers::Name).string().not_null())
                        .col(ColumnDef::new(Customers::Email).string().null())
                        .col(ColumnDef::new(Customers::Phone).string().null())
                        .col(ColumnDef::new(Customers::CompanyName).string().null())
                        .col(ColumnDef::new(Customers::RegistrationNumber).string().null())
                        .col(ColumnDef::new(Customers::Address).text().null())
                        .col(
                            ColumnDef::new(Customers::WebsiteCustomer)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(Customers::UserId).uuid().null())
                        .col(ColumnDef::new(Customers::CreatedBy).uuid().null())
                        .col(
                            ColumnDef::new(Customers::TotalOrders)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Customers::TotalOrderValue)
                                .decimal_len(19, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Customers::IsDeleted)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(Customers::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Customers::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_customers_created_by")
                        .table(Customers::Table)
                        .col(Customers::CreatedBy)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_customers_user_id")
                        .table(Customers::Table)
                        .col(Customers::UserId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Customers::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Customers {
        Table,
        Id,
        CustomerType,
        Name,
        Email,
        Phone,
        CompanyName,
        RegistrationNumber,
        Address,
        WebsiteCustomer,
        UserId,
        CreatedBy,
        TotalOrders,
        TotalOrderValue,
        IsDeleted,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240301_000004_create_orders_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000004_create_orders_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // One row per (order group, product line)
            manager
                .create_table(
                    Table::create()
                        .table(Orders::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Orders::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Orders::OrderId).string().not_null())
                        .col(ColumnDef::new(Orders::OrderGroupId).uuid().not_null())
                        .col(
                            ColumnDef::new(Orders::IsParent)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(Orders::Source).string_len(10).not_null())
                        .col(ColumnDef::new(Orders::OrderType).string_len(3).not_null())
                        .col(ColumnDef::new(Orders::OrderMode).string_len(10).not_null())
                        .col(ColumnDef::new(Orders::UserId).uuid().null())
                        .col(ColumnDef::new(Orders::CustomerId).uuid().null())
                        .col(ColumnDef::new(Orders::CreatedBy).uuid().null())
                        .col(ColumnDef::new(Orders::ProductId).uuid().not_null())
                        .col(ColumnDef::new(Orders::ProductName).string().not_null())
                        .col(ColumnDef::new(Orders::ProductSku).string().not_null())
                        .col(ColumnDef::new(Orders::PriceOption).string_len(20).not_null())
                        .col(ColumnDef::new(Orders::Quantity).integer().not_null())
                        .col(money(Orders::UnitPrice))
                        .col(money(Orders::SubTotal))
                        .col(money(Orders::DiscountAmount))
                        .col(money(Orders::TaxAmount))
                        .col(money(Orders::ShippingCost))
                        .col(money(Orders::TotalAmount))
                        .col(ColumnDef::new(Orders::GroupSubTotal).decimal_len(19, 4).null())
                        .col(ColumnDef::new(Orders::GroupDiscount).decimal_len(19, 4).null())
                        .col(ColumnDef::new(Orders::GroupTax).decimal_len(19, 4).null())
                        .col(ColumnDef::new(Orders::GroupShipping).decimal_len(19, 4).null())
                        .col(ColumnDef::new(Orders::GroupTotal).decimal_len(19, 4).null())
                        .col(ColumnDef::new(Orders::Currency).string_len(3).not_null())
                        .col(ColumnDef::new(Orders::PaymentMethod).string_len(20).not_null())
                        .col(ColumnDef::new(Orders::PaymentStatus).string_len(20).not_null())
                        .col(ColumnDef::new(Orders::PaymentReference).string().null())
                        .col(ColumnDef::new(Orders::OrderStatus).string_len(20).not_null())
                        .col(
                            ColumnDef::new(Orders::EstimatedDelivery)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Orders::ActualDelivery)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(ColumnDef::new(Orders::Notes).text().null())
                        .col(
                            ColumnDef::new(Orders::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Orders::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_order_id")
                        .table(Orders::Table)
                        .col(Orders::OrderId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_group_id")
                        .table(Orders::Table)
                        .col(Orders::OrderGroupId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_customer_id")
                        .table(Orders::Table)
                        .col(Orders::CustomerId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_created_at")
                        .table(Orders::Table)
                        .col(Orders::CreatedAt)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Orders::Table).to_owned())
                .await
        }
    }

    fn money(column: Orders) -> ColumnDef {
        ColumnDef::new(column)
            .decimal_len(19, 4)
            .not_null()
            .default(0)
            .to_owned()
    }

    #[derive(DeriveIden)]
    enum Orders {
        Table,
        Id,
        OrderId,
        OrderGroupId,
        IsParent,
        Source,
        OrderType,
        OrderMode,
        UserId,
        CustomerId,
        CreatedBy,
        ProductId,
        ProductName,
        ProductSku,
        PriceOption,
        Quantity,
        UnitPrice,
        SubTotal,
        DiscountAmount,
        TaxAmount,
        ShippingCost,
        TotalAmount,
        GroupSubTotal,
        GroupDiscount,
        GroupTax,
        GroupShipping,
        GroupTotal,
        Currency,
        PaymentMethod,
        PaymentStatus,
        PaymentReference,
        OrderStatus,
        EstimatedDelivery,
        ActualDelivery,
        Notes,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240301_000005_create_cart_items_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000005_create_cart_items_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(CartItems::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(CartItems::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(CartItems::UserId).uuid().not_null())
                        .col(ColumnDef::new(CartItems::ProductId).uuid().not_null())
                        .col(ColumnDef::new(CartItems::PriceOption).string_len(20).not_null())
                        .col(ColumnDef::new(CartItems::Quantity).integer().not_null())
                        .col(
                            ColumnDef::new(CartItems::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CartItems::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            // One line per (user, product, price option)
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_cart_items_user_product_option")
                        .table(CartItems::Table)
                        .col(CartItems::UserId)
                        .col(CartItems::ProductId)
                        .col(CartItems::PriceOption)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(CartItems::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum CartItems {
        Table,
        Id,
        UserId,
        ProductId,
        PriceOption,
        Quantity,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240301_000006_create_warehouse_tables {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000006_create_warehouse_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(WarehouseActivities::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(WarehouseActivities::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(WarehouseActivities::Action)
                                .string_len(32)
                                .not_null(),
                        )
                        .col(ColumnDef::new(WarehouseActivities::ProductId).uuid().null())
                        .col(
                            ColumnDef::new(WarehouseActivities::PerformedBy)
                                .uuid()
                                .not_null(),
                        )
                        .col(ColumnDef::new(WarehouseActivities::Changes).json().not_null())
                        .col(
                            ColumnDef::new(WarehouseActivities::QuantityDelta)
                                .integer()
                                .null(),
                        )
                        .col(ColumnDef::new(WarehouseActivities::Reference).string().null())
                        .col(ColumnDef::new(WarehouseActivities::Notes).text().null())
                        .col(
                            ColumnDef::new(WarehouseActivities::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_warehouse_activities_product_created")
                        .table(WarehouseActivities::Table)
                        .col(WarehouseActivities::ProductId)
                        .col(WarehouseActivities::CreatedAt)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(WarehouseSettings::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(WarehouseSettings::Id)
                                .integer()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(WarehouseSettings::AlertsEnabled)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(WarehouseSettings::LowStockThreshold)
                                .integer()
                                .not_null()
                                .default(20),
                        )
                        .col(
                            ColumnDef::new(WarehouseSettings::CriticalStockThreshold)
                                .integer()
                                .not_null()
                                .default(5),
                        )
                        .col(ColumnDef::new(WarehouseSettings::UpdatedBy).uuid().null())
                        .col(
                            ColumnDef::new(WarehouseSettings::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(WarehouseSettings::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(WarehouseActivities::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum WarehouseActivities {
        Table,
        Id,
        Action,
        ProductId,
        PerformedBy,
        Changes,
        QuantityDelta,
        Reference,
        Notes,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum WarehouseSettings {
        Table,
        Id,
        AlertsEnabled,
        LowStockThreshold,
        CriticalStockThreshold,
        UpdatedBy,
        UpdatedAt,
    }
}

mod m20240301_000007_create_checkout_sessions_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000007_create_checkout_sessions_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(CheckoutSessions::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(CheckoutSessions::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(CheckoutSessions::Reference).string().not_null())
                        .col(
                            ColumnDef::new(CheckoutSessions::Provider)
                                .string_len(20)
                                .not_null(),
                        )
                        .col(ColumnDef::new(CheckoutSessions::UserId).uuid().not_null())
                        .col(ColumnDef::new(CheckoutSessions::Lines).json().not_null())
                        .col(
                            ColumnDef::new(CheckoutSessions::Currency)
                                .string_len(3)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CheckoutSessions::ExchangeRate)
                                .decimal_len(19, 6)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CheckoutSessions::SubTotal)
                                .decimal_len(19, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CheckoutSessions::TaxAmount)
                                .decimal_len(19, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CheckoutSessions::ShippingCost)
                                .decimal_len(19, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CheckoutSessions::TotalAmount)
                                .decimal_len(19, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CheckoutSessions::ShippingZone)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CheckoutSessions::ShippingMethod)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CheckoutSessions::Status)
                                .string_len(12)
                                .not_null(),
                        )
                        .col(ColumnDef::new(CheckoutSessions::OrderGroupId).uuid().null())
                        .col(ColumnDef::new(CheckoutSessions::FailureReason).text().null())
                        .col(
                            ColumnDef::new(CheckoutSessions::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CheckoutSessions::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_checkout_sessions_reference")
                        .table(CheckoutSessions::Table)
                        .col(CheckoutSessions::Reference)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(CheckoutSessions::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum CheckoutSessions {
        Table,
        Id,
        Reference,
        Provider,
        UserId,
        Lines,
        Currency,
        ExchangeRate,
        SubTotal,
        TaxAmount,
        ShippingCost,
        TotalAmount,
        ShippingZone,
        ShippingMethod,
        Status,
        OrderGroupId,
        FailureReason,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240301_000008_create_reference_data_tables {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000008_create_reference_data_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(ExchangeRates::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ExchangeRates::Currency)
                                .string_len(3)
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ExchangeRates::Rate)
                                .decimal_len(19, 6)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ExchangeRates::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ShippingRates::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ShippingRates::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ShippingRates::Zone).string().not_null())
                        .col(ColumnDef::new(ShippingRates::Method).string().not_null())
                        .col(
                            ColumnDef::new(ShippingRates::BaseCost)
                                .decimal_len(19, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(ShippingRates::PerItemCost)
                                .decimal_len(19, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(ShippingRates::EstimatedDays)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(ShippingRates::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(ShippingRates::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_shipping_rates_zone_method")
                        .table(ShippingRates::Table)
                        .col(ShippingRates::Zone)
                        .col(ShippingRates::Method)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ShippingRates::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(ExchangeRates::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum ExchangeRates {
        Table,
        Currency,
        Rate,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum ShippingRates {
        Table,
        Id,
        Zone,
        Method,
        BaseCost,
        PerItemCost,
        EstimatedDays,
        IsActive,
        UpdatedAt,
    }
}
