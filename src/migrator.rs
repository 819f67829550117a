use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_customers_table::Migration),
            Box::new(m20240101_000002_create_admins_table::Migration),
            Box::new(m20240101_000003_create_sub_areas_table::Migration),
            Box::new(m20240101_000004_create_orders_table::Migration),
            Box::new(m20240101_000005_create_notifications_table::Migration),
        ]
    }
}

mod m20240101_000001_create_customers_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_customers_table"
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
                        .col(ColumnDef::new(Customers::StoreName).string().not_null())
                        .col(ColumnDef::new(Customers::PhoneNumber).string_len(32).not_null())
                        .col(ColumnDef::new(Customers::PasswordHash).string().not_null())
                        .col(ColumnDef::new(Customers::Area).string_len(32).not_null())
                        .col(
                            ColumnDef::new(Customers::Status)
                                .string_len(16)
                                .not_null()
                                .default("active"),
                        )
                        .col(
                            ColumnDef::new(Customers::TotalOrders)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Customers::LastOrderDate)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(ColumnDef::new(Customers::PushToken).string().null())
                        .col(ColumnDef::new(Customers::CreatedBy).uuid().null())
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
                        .name("idx_customers_phone_number")
                        .table(Customers::Table)
                        .col(Customers::PhoneNumber)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_customers_push_token")
                        .table(Customers::Table)
                        .col(Customers::PushToken)
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
    pub(crate) enum Customers {
        Table,
        Id,
        StoreName,
        PhoneNumber,
        PasswordHash,
        Area,
        Status,
        TotalOrders,
        LastOrderDate,
        PushToken,
        CreatedBy,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000002_create_admins_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000002_create_admins_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Admins::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Admins::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Admins::AdminId).string_len(64).not_null())
                        .col(ColumnDef::new(Admins::CodeHash).string().not_null())
                        .col(ColumnDef::new(Admins::Name).string().not_null())
                        .col(
                            ColumnDef::new(Admins::Role)
                                .string_len(16)
                                .not_null()
                                .default("admin"),
                        )
                        .col(
                            ColumnDef::new(Admins::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(ColumnDef::new(Admins::PushToken).string().null())
                        .col(
                            ColumnDef::new(Admins::LastLogin)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Admins::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Admins::UpdatedAt)
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
                        .name("idx_admins_admin_id")
                        .table(Admins::Table)
                        .col(Admins::AdminId)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Admins::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Admins {
        Table,
        Id,
        AdminId,
        CodeHash,
        Name,
        Role,
        IsActive,
        PushToken,
        LastLogin,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000003_create_sub_areas_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000003_create_sub_areas_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(SubAreas::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(SubAreas::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(SubAreas::Name).string().not_null())
                        .col(ColumnDef::new(SubAreas::MainArea).string_len(32).not_null())
                        .col(
                            ColumnDef::new(SubAreas::Price)
                                .decimal_len(12, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(SubAreas::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(SubAreas::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            // Fee lookup goes by (name, main_area, is_active), then by (name, is_active).
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_sub_areas_name_main_area")
                        .table(SubAreas::Table)
                        .col(SubAreas::Name)
                        .col(SubAreas::MainArea)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(SubAreas::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(crate) enum SubAreas {
        Table,
        Id,
        Name,
        MainArea,
        Price,
        IsActive,
        CreatedAt,
    }
}

mod m20240101_000004_create_orders_table {

    use super::m20240101_000001_create_customers_table::Customers;
    use super::m20240101_000003_create_sub_areas_table::SubAreas;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000004_create_orders_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Orders::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Orders::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Orders::OrderNumber).string_len(32).not_null())
                        .col(ColumnDef::new(Orders::CustomerId).uuid().not_null())
                        .col(ColumnDef::new(Orders::CustomerPhone).string_len(32).not_null())
                        .col(ColumnDef::new(Orders::ClientPhone).string_len(32).not_null())
                        .col(ColumnDef::new(Orders::StoreName).string().not_null())
                        .col(ColumnDef::new(Orders::Items).json().not_null())
                        .col(
                            ColumnDef::new(Orders::TotalAmount)
                                .decimal_len(12, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Orders::DeliveryFee)
                                .decimal_len(12, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Orders::DeliveryAddress).text().not_null())
                        .col(ColumnDef::new(Orders::DeliveryTime).string().null())
                        .col(ColumnDef::new(Orders::SubArea).string().not_null())
                        .col(ColumnDef::new(Orders::SubAreaId).uuid().null())
                        .col(
                            ColumnDef::new(Orders::SubAreaPrice)
                                .decimal_len(12, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Orders::Notes).string_len(500).null())
                        .col(ColumnDef::new(Orders::Area).string_len(32).not_null())
                        .col(
                            ColumnDef::new(Orders::Status)
                                .string_len(32)
                                .not_null()
                                .default("pending"),
                        )
                        .col(ColumnDef::new(Orders::Timeline).json().not_null())
                        .col(
                            ColumnDef::new(Orders::DeliveredAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
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
                        .col(
                            ColumnDef::new(Orders::Version)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_orders_customer_id")
                                .from(Orders::Table, Orders::CustomerId)
                                .to(Customers::Table, Customers::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_orders_sub_area_id")
                                .from(Orders::Table, Orders::SubAreaId)
                                .to(SubAreas::Table, SubAreas::Id)
                                .on_delete(ForeignKeyAction::SetNull),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_order_number")
                        .table(Orders::Table)
                        .col(Orders::OrderNumber)
                        .unique()
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
                        .name("idx_orders_status")
                        .table(Orders::Table)
                        .col(Orders::Status)
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

    #[derive(DeriveIden)]
    enum Orders {
        Table,
        Id,
        OrderNumber,
        CustomerId,
        CustomerPhone,
        ClientPhone,
        StoreName,
        Items,
        TotalAmount,
        DeliveryFee,
        DeliveryAddress,
        DeliveryTime,
        SubArea,
        SubAreaId,
        SubAreaPrice,
        Notes,
        Area,
        Status,
        Timeline,
        DeliveredAt,
        CreatedAt,
        UpdatedAt,
        Version,
    }
}

mod m20240101_000005_create_notifications_table {

    use super::m20240101_000001_create_customers_table::Customers;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000005_create_notifications_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Notifications::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Notifications::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Notifications::NotificationType)
                                .string_len(32)
                                .not_null(),
                        )
                        .col(ColumnDef::new(Notifications::Title).string().not_null())
                        .col(ColumnDef::new(Notifications::Message).text().not_null())
                        .col(ColumnDef::new(Notifications::Data).json().not_null())
                        .col(
                            ColumnDef::new(Notifications::Recipient)
                                .string_len(16)
                                .not_null(),
                        )
                        .col(ColumnDef::new(Notifications::CustomerId).uuid().null())
                        .col(ColumnDef::new(Notifications::OrderId).uuid().null())
                        .col(
                            ColumnDef::new(Notifications::IsRead)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(Notifications::Priority)
                                .string_len(16)
                                .not_null()
                                .default("normal"),
                        )
                        .col(
                            ColumnDef::new(Notifications::ExpiresAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Notifications::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_notifications_customer_id")
                                .from(Notifications::Table, Notifications::CustomerId)
                                .to(Customers::Table, Customers::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_notifications_recipient_customer")
                        .table(Notifications::Table)
                        .col(Notifications::Recipient)
                        .col(Notifications::CustomerId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_notifications_created_at")
                        .table(Notifications::Table)
                        .col(Notifications::CreatedAt)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Notifications::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Notifications {
        Table,
        Id,
        NotificationType,
        Title,
        Message,
        Data,
        Recipient,
        CustomerId,
        OrderId,
        IsRead,
        Priority,
        ExpiresAt,
        CreatedAt,
    }
}
