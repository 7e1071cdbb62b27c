use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240301_000001_create_products_table::Migration),
            Box::new(m20240301_000002_create_store_inventory_table::Migration),
            Box::new(m20240301_000003_create_movement_logs_table::Migration),
            Box::new(m20240301_000004_create_discount_programs_table::Migration),
            Box::new(m20240301_000005_create_warehouse_outbox_table::Migration),
        ]
    }
}

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
            manager
                .create_table(
                    Table::create()
                        .table(Products::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Products::Id)
                                .big_integer()
                                .auto_increment()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Products::SkuCode)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Products::Name).string().not_null())
                        .col(
                            ColumnDef::new(Products::BufferQuantity)
                                .decimal_len(19, 3)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Products::MaxOrderableQuantity)
                                .decimal_len(19, 3)
                                .null(),
                        )
                        .col(ColumnDef::new(Products::DisplayQty).string().null())
                        .col(ColumnDef::new(Products::ProcurementTag).string().null())
                        .col(
                            ColumnDef::new(Products::ProcurementTagExpiry)
                                .timestamp_with_time_zone()
                                .null(),
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
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Products::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum Products {
        Table,
        Id,
        SkuCode,
        Name,
        BufferQuantity,
        MaxOrderableQuantity,
        DisplayQty,
        ProcurementTag,
        ProcurementTagExpiry,
        IsActive,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240301_000002_create_store_inventory_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000002_create_store_inventory_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(StoreInventory::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StoreInventory::Id)
                                .big_integer()
                                .auto_increment()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StoreInventory::StoreId).integer().not_null())
                        .col(ColumnDef::new(StoreInventory::SkuCode).string().not_null())
                        .col(
                            ColumnDef::new(StoreInventory::AvailableQuantity)
                                .decimal_len(19, 3)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(StoreInventory::CommittedTotal)
                                .decimal_len(19, 3)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(StoreInventory::HoldQuantity)
                                .decimal_len(19, 3)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(StoreInventory::DumpQuantity)
                                .decimal_len(19, 3)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(StoreInventory::MarketPrice)
                                .decimal_len(19, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(StoreInventory::SalePrice)
                                .decimal_len(19, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(StoreInventory::MaxPrice)
                                .decimal_len(19, 2)
                                .null(),
                        )
                        .col(
                            ColumnDef::new(StoreInventory::MarketingSalePrice)
                                .decimal_len(19, 2)
                                .null(),
                        )
                        .col(ColumnDef::new(StoreInventory::PriceBrackets).json().null())
                        .col(
                            ColumnDef::new(StoreInventory::ResetQuantity)
                                .decimal_len(19, 3)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(StoreInventory::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(StoreInventory::IsComplimentary)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(StoreInventory::Version)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .col(
                            ColumnDef::new(StoreInventory::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StoreInventory::UpdatedAt)
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
                        .name("uq_store_inventory_store_sku")
                        .table(StoreInventory::Table)
                        .col(StoreInventory::StoreId)
                        .col(StoreInventory::SkuCode)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_store_inventory_sku")
                        .table(StoreInventory::Table)
                        .col(StoreInventory::SkuCode)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(StoreInventory::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum StoreInventory {
        Table,
        Id,
        StoreId,
        SkuCode,
        AvailableQuantity,
        CommittedTotal,
        HoldQuantity,
        DumpQuantity,
        MarketPrice,
        SalePrice,
        MaxPrice,
        MarketingSalePrice,
        PriceBrackets,
        ResetQuantity,
        IsActive,
        IsComplimentary,
        Version,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240301_000003_create_movement_logs_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000003_create_movement_logs_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(MovementLogs::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(MovementLogs::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(MovementLogs::StoreId).integer().not_null())
                        .col(ColumnDef::new(MovementLogs::SkuCode).string().not_null())
                        .col(ColumnDef::new(MovementLogs::Source).string().not_null())
                        .col(
                            ColumnDef::new(MovementLogs::Delta)
                                .decimal_len(19, 3)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(MovementLogs::FromQuantity)
                                .decimal_len(19, 3)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(MovementLogs::ToQuantity)
                                .decimal_len(19, 3)
                                .not_null(),
                        )
                        .col(ColumnDef::new(MovementLogs::Bucket).string().not_null())
                        .col(
                            ColumnDef::new(MovementLogs::MovementType)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(MovementLogs::Remarks).string().null())
                        .col(ColumnDef::new(MovementLogs::Actor).string().not_null())
                        .col(
                            ColumnDef::new(MovementLogs::CreatedAt)
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
                        .name("idx_movement_logs_store_sku")
                        .table(MovementLogs::Table)
                        .col(MovementLogs::StoreId)
                        .col(MovementLogs::SkuCode)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(MovementLogs::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum MovementLogs {
        #[iden = "inventory_movement_logs"]
        Table,
        Id,
        StoreId,
        SkuCode,
        Source,
        Delta,
        FromQuantity,
        ToQuantity,
        Bucket,
        MovementType,
        Remarks,
        Actor,
        CreatedAt,
    }
}

mod m20240301_000004_create_discount_programs_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000004_create_discount_programs_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(DiscountPrograms::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(DiscountPrograms::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(DiscountPrograms::Scope).string().not_null())
                        .col(
                            ColumnDef::new(DiscountPrograms::ScopeId)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DiscountPrograms::ValidDeliveryDate)
                                .date()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DiscountPrograms::DefaultDiscountPercent)
                                .decimal_len(19, 2)
                                .null(),
                        )
                        .col(
                            ColumnDef::new(DiscountPrograms::SkuDiscounts)
                                .json()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DiscountPrograms::IsMaximumPrice)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(DiscountPrograms::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(DiscountPrograms::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DiscountPrograms::UpdatedAt)
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
                        .name("idx_discount_programs_scope")
                        .table(DiscountPrograms::Table)
                        .col(DiscountPrograms::Scope)
                        .col(DiscountPrograms::ScopeId)
                        .col(DiscountPrograms::IsActive)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(DiscountPrograms::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum DiscountPrograms {
        Table,
        Id,
        Scope,
        ScopeId,
        ValidDeliveryDate,
        DefaultDiscountPercent,
        SkuDiscounts,
        IsMaximumPrice,
        IsActive,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240301_000005_create_warehouse_outbox_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000005_create_warehouse_outbox_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(WarehouseOutbox::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(WarehouseOutbox::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(WarehouseOutbox::StoreId).integer().not_null())
                        .col(ColumnDef::new(WarehouseOutbox::SkuCode).string().not_null())
                        .col(
                            ColumnDef::new(WarehouseOutbox::EventType)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(WarehouseOutbox::Payload).json().not_null())
                        .col(
                            ColumnDef::new(WarehouseOutbox::Status)
                                .string()
                                .not_null()
                                .default("pending"),
                        )
                        .col(
                            ColumnDef::new(WarehouseOutbox::Attempts)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(WarehouseOutbox::AvailableAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(WarehouseOutbox::LastError).string().null())
                        .col(
                            ColumnDef::new(WarehouseOutbox::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(WarehouseOutbox::UpdatedAt)
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
                        .name("idx_warehouse_outbox_status")
                        .table(WarehouseOutbox::Table)
                        .col(WarehouseOutbox::Status)
                        .col(WarehouseOutbox::AvailableAt)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(WarehouseOutbox::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum WarehouseOutbox {
        Table,
        Id,
        StoreId,
        SkuCode,
        EventType,
        Payload,
        Status,
        Attempts,
        AvailableAt,
        LastError,
        CreatedAt,
        UpdatedAt,
    }
}
