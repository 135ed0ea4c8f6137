use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240601_000001_create_taxonomy_tables::Migration),
            Box::new(m20240601_000002_create_products_table::Migration),
            Box::new(m20240601_000003_create_sales_tables::Migration),
            Box::new(m20240601_000004_create_service_order_tables::Migration),
        ]
    }
}

// Child tables reference their parent without ON DELETE CASCADE; parent
// deletes remove children explicitly inside the same transaction.

mod m20240601_000001_create_taxonomy_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000001_create_taxonomy_tables"
        }
    }

    fn named_table<T>(table: T, id: T, name: T, created_at: T) -> TableCreateStatement
    where
        T: Iden + 'static,
    {
        Table::create()
            .table(table)
            .if_not_exists()
            .col(
                ColumnDef::new(id)
                    .integer()
                    .not_null()
                    .auto_increment()
                    .primary_key(),
            )
            .col(ColumnDef::new(name).string_len(120).not_null().unique_key())
            .col(
                ColumnDef::new(created_at)
                    .timestamp_with_time_zone()
                    .not_null(),
            )
            .to_owned()
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(named_table(
                    Brands::Table,
                    Brands::Id,
                    Brands::Name,
                    Brands::CreatedAt,
                ))
                .await?;
            manager
                .create_table(named_table(
                    PartTypes::Table,
                    PartTypes::Id,
                    PartTypes::Name,
                    PartTypes::CreatedAt,
                ))
                .await?;
            manager
                .create_table(named_table(
                    EquipmentTypes::Table,
                    EquipmentTypes::Id,
                    EquipmentTypes::Name,
                    EquipmentTypes::CreatedAt,
                ))
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(BrandPartTypes::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(BrandPartTypes::BrandId).integer().not_null())
                        .col(
                            ColumnDef::new(BrandPartTypes::PartTypeId)
                                .integer()
                                .not_null(),
                        )
                        .primary_key(
                            Index::create()
                                .col(BrandPartTypes::BrandId)
                                .col(BrandPartTypes::PartTypeId),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_brand_part_types_brand_id")
                                .from(BrandPartTypes::Table, BrandPartTypes::BrandId)
                                .to(Brands::Table, Brands::Id),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_brand_part_types_part_type_id")
                                .from(BrandPartTypes::Table, BrandPartTypes::PartTypeId)
                                .to(PartTypes::Table, PartTypes::Id),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(BrandPartTypes::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(EquipmentTypes::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(PartTypes::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Brands::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Brands {
        Table,
        Id,
        Name,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    pub(super) enum PartTypes {
        Table,
        Id,
        Name,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    pub(super) enum EquipmentTypes {
        Table,
        Id,
        Name,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum BrandPartTypes {
        Table,
        BrandId,
        PartTypeId,
    }
}

mod m20240601_000002_create_products_table {
    use super::m20240601_000001_create_taxonomy_tables::{Brands, PartTypes};
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000002_create_products_table"
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
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Products::Sku).string_len(64).not_null())
                        .col(ColumnDef::new(Products::Name).string().not_null())
                        .col(ColumnDef::new(Products::Description).text().null())
                        .col(ColumnDef::new(Products::Price).decimal_len(12, 2).null())
                        .col(
                            ColumnDef::new(Products::WholesalePrice)
                                .decimal_len(12, 2)
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Products::ClientPrice)
                                .decimal_len(12, 2)
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Products::Stock)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Products::BrandId).integer().null())
                        .col(ColumnDef::new(Products::PartTypeId).integer().null())
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
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_products_brand_id")
                                .from(Products::Table, Products::BrandId)
                                .to(Brands::Table, Brands::Id),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_products_part_type_id")
                                .from(Products::Table, Products::PartTypeId)
                                .to(PartTypes::Table, PartTypes::Id),
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
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_products_name")
                        .table(Products::Table)
                        .col(Products::Name)
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
        Price,
        WholesalePrice,
        ClientPrice,
        Stock,
        BrandId,
        PartTypeId,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240601_000003_create_sales_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000003_create_sales_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Sales::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Sales::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(Sales::ReceiptNumber)
                                .string_len(64)
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(Sales::SoldAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Sales::Seller).string().not_null())
                        .col(ColumnDef::new(Sales::PaymentMethod).string().not_null())
                        .col(ColumnDef::new(Sales::Total).decimal_len(12, 2).not_null())
                        .col(
                            ColumnDef::new(Sales::AmountReceived)
                                .decimal_len(12, 2)
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Sales::ChangeDue)
                                .decimal_len(12, 2)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Sales::CreatedAt)
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
                        .name("idx_sales_sold_at")
                        .table(Sales::Table)
                        .col(Sales::SoldAt)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(SaleItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(SaleItems::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(SaleItems::SaleId).integer().not_null())
                        .col(ColumnDef::new(SaleItems::Position).integer().not_null())
                        .col(ColumnDef::new(SaleItems::Sku).string_len(64).not_null())
                        .col(ColumnDef::new(SaleItems::Description).string().not_null())
                        .col(ColumnDef::new(SaleItems::Quantity).integer().not_null())
                        .col(
                            ColumnDef::new(SaleItems::UnitPrice)
                                .decimal_len(12, 2)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(SaleItems::Subtotal)
                                .decimal_len(12, 2)
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_sale_items_sale_id")
                                .from(SaleItems::Table, SaleItems::SaleId)
                                .to(Sales::Table, Sales::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_sale_items_sale_id")
                        .table(SaleItems::Table)
                        .col(SaleItems::SaleId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_sale_items_sku")
                        .table(SaleItems::Table)
                        .col(SaleItems::Sku)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(SaleItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Sales::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Sales {
        Table,
        Id,
        ReceiptNumber,
        SoldAt,
        Seller,
        PaymentMethod,
        Total,
        AmountReceived,
        ChangeDue,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum SaleItems {
        Table,
        Id,
        SaleId,
        Position,
        Sku,
        Description,
        Quantity,
        UnitPrice,
        Subtotal,
    }
}

mod m20240601_000004_create_service_order_tables {
    use super::m20240601_000001_create_taxonomy_tables::{Brands, EquipmentTypes};
    use super::m20240601_000002_create_products_table::Products;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000004_create_service_order_tables"
        }
    }

    fn order_fk<T, C>(name: &str, table: T, column: C) -> ForeignKeyCreateStatement
    where
        T: Iden + 'static,
        C: Iden + 'static,
    {
        ForeignKey::create()
            .name(name)
            .from(table, column)
            .to(ServiceOrders::Table, ServiceOrders::Id)
            .to_owned()
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(ServiceOrders::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ServiceOrders::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(ServiceOrders::Code)
                                .string_len(32)
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(ServiceOrders::CustomerName)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ServiceOrders::CustomerPhone).string().null())
                        .col(ColumnDef::new(ServiceOrders::CustomerEmail).string().null())
                        .col(ColumnDef::new(ServiceOrders::BrandId).integer().null())
                        .col(
                            ColumnDef::new(ServiceOrders::EquipmentTypeId)
                                .integer()
                                .null(),
                        )
                        .col(ColumnDef::new(ServiceOrders::Model).string().null())
                        .col(ColumnDef::new(ServiceOrders::Diagnosis).text().null())
                        .col(ColumnDef::new(ServiceOrders::Observations).text().null())
                        .col(
                            ColumnDef::new(ServiceOrders::RepairCost)
                                .decimal_len(12, 2)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ServiceOrders::AdvancePayment)
                                .decimal_len(12, 2)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ServiceOrders::Total)
                                .decimal_len(12, 2)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ServiceOrders::RepairStatus)
                                .string_len(16)
                                .not_null()
                                .default("PENDING"),
                        )
                        .col(
                            ColumnDef::new(ServiceOrders::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ServiceOrders::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_service_orders_brand_id")
                                .from(ServiceOrders::Table, ServiceOrders::BrandId)
                                .to(Brands::Table, Brands::Id),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_service_orders_equipment_type_id")
                                .from(ServiceOrders::Table, ServiceOrders::EquipmentTypeId)
                                .to(EquipmentTypes::Table, EquipmentTypes::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_service_orders_created_at")
                        .table(ServiceOrders::Table)
                        .col(ServiceOrders::CreatedAt)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(EquipmentChecks::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(EquipmentChecks::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(EquipmentChecks::OrderId)
                                .integer()
                                .not_null()
                                .unique_key(),
                        )
                        .col(flag(EquipmentChecks::PowersOn))
                        .col(flag(EquipmentChecks::SimTray))
                        .col(flag(EquipmentChecks::ImpactDamage))
                        .col(flag(EquipmentChecks::Moisture))
                        .col(flag(EquipmentChecks::Speaker))
                        .col(flag(EquipmentChecks::Microphone))
                        .col(flag(EquipmentChecks::Earpiece))
                        .col(ColumnDef::new(EquipmentChecks::Other).text().null())
                        .foreign_key(&mut order_fk(
                            "fk_equipment_checks_order_id",
                            EquipmentChecks::Table,
                            EquipmentChecks::OrderId,
                        ))
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(OrderFaults::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OrderFaults::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(OrderFaults::OrderId).integer().not_null())
                        .col(ColumnDef::new(OrderFaults::Position).integer().not_null())
                        .col(ColumnDef::new(OrderFaults::Description).text().not_null())
                        .col(ColumnDef::new(OrderFaults::Status).string_len(16).null())
                        .foreign_key(&mut order_fk(
                            "fk_order_faults_order_id",
                            OrderFaults::Table,
                            OrderFaults::OrderId,
                        ))
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(OrderParts::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OrderParts::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(OrderParts::OrderId).integer().not_null())
                        .col(ColumnDef::new(OrderParts::Position).integer().not_null())
                        .col(ColumnDef::new(OrderParts::ProductId).integer().null())
                        .col(ColumnDef::new(OrderParts::Description).string().null())
                        .col(ColumnDef::new(OrderParts::Quantity).integer().not_null())
                        .col(
                            ColumnDef::new(OrderParts::UnitPrice)
                                .decimal_len(12, 2)
                                .not_null(),
                        )
                        .foreign_key(&mut order_fk(
                            "fk_order_parts_order_id",
                            OrderParts::Table,
                            OrderParts::OrderId,
                        ))
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_order_parts_product_id")
                                .from(OrderParts::Table, OrderParts::ProductId)
                                .to(Products::Table, Products::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(OrderPhotos::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OrderPhotos::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(OrderPhotos::OrderId).integer().not_null())
                        .col(ColumnDef::new(OrderPhotos::Position).integer().not_null())
                        .col(ColumnDef::new(OrderPhotos::Path).string().not_null())
                        .foreign_key(&mut order_fk(
                            "fk_order_photos_order_id",
                            OrderPhotos::Table,
                            OrderPhotos::OrderId,
                        ))
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_order_faults_order_id")
                        .table(OrderFaults::Table)
                        .col(OrderFaults::OrderId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_order_parts_order_id")
                        .table(OrderParts::Table)
                        .col(OrderParts::OrderId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_order_photos_order_id")
                        .table(OrderPhotos::Table)
                        .col(OrderPhotos::OrderId)
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(OrderPhotos::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(OrderParts::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(OrderFaults::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(EquipmentChecks::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(ServiceOrders::Table).to_owned())
                .await
        }
    }

    fn flag(column: EquipmentChecks) -> ColumnDef {
        ColumnDef::new(column)
            .boolean()
            .not_null()
            .default(false)
            .to_owned()
    }

    #[derive(DeriveIden)]
    enum ServiceOrders {
        Table,
        Id,
        Code,
        CustomerName,
        CustomerPhone,
        CustomerEmail,
        BrandId,
        EquipmentTypeId,
        Model,
        Diagnosis,
        Observations,
        RepairCost,
        AdvancePayment,
        Total,
        RepairStatus,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum EquipmentChecks {
        Table,
        Id,
        OrderId,
        PowersOn,
        SimTray,
        ImpactDamage,
        Moisture,
        Speaker,
        Microphone,
        Earpiece,
        Other,
    }

    #[derive(DeriveIden)]
    enum OrderFaults {
        Table,
        Id,
        OrderId,
        Position,
        Description,
        Status,
    }

    #[derive(DeriveIden)]
    enum OrderParts {
        Table,
        Id,
        OrderId,
        Position,
        ProductId,
        Description,
        Quantity,
        UnitPrice,
    }

    #[derive(DeriveIden)]
    enum OrderPhotos {
        Table,
        Id,
        OrderId,
        Position,
        Path,
    }
}
