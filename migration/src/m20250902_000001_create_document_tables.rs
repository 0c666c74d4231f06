use sea_orm_migration::prelude::extension::postgres::Type;
use sea_orm_migration::prelude::*;

#[derive(DeriveIden)]
enum Solicitudes {
    Table,
    Id,
    ClientId,
    Description,
    Status,
    RequestedBy,
    ReviewedBy,
    ReviewNote,
    ReviewedAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum ServiceOrders {
    Table,
    Id,
    SolicitudId,
    ClientId,
    Status,
    Total,
    PaidTotal,
    Notes,
    CreatedBy,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum ServiceOrderItems {
    Table,
    Id,
    OrderId,
    ItemId,
    Description,
    Quantity,
    UnitPrice,
    LineTotal,
}

#[derive(DeriveIden)]
enum Deliveries {
    Table,
    Id,
    OrderId,
    DeliveredBy,
    ReceivedBy,
    Notes,
    DeliveredAt,
}

#[derive(DeriveIden)]
enum Clients {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Items {
    Table,
    Id,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_type(
                Type::create()
                    .as_enum(Alias::new("solicitud_status"))
                    .values(vec![
                        Alias::new("pending"),
                        Alias::new("authorized"),
                        Alias::new("rejected"),
                        Alias::new("converted"),
                    ])
                    .to_owned(),
            )
            .await?;
        manager
            .create_type(
                Type::create()
                    .as_enum(Alias::new("service_order_status"))
                    .values(vec![
                        Alias::new("pending"),
                        Alias::new("in_progress"),
                        Alias::new("completed"),
                        Alias::new("delivered"),
                        Alias::new("cancelled"),
                    ])
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Solicitudes::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Solicitudes::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Solicitudes::ClientId).big_integer().not_null())
                    .col(ColumnDef::new(Solicitudes::Description).text().not_null())
                    .col(
                        ColumnDef::new(Solicitudes::Status)
                            .custom(Alias::new("solicitud_status"))
                            .not_null()
                            .default(Expr::cust("'pending'::solicitud_status")),
                    )
                    .col(
                        ColumnDef::new(Solicitudes::RequestedBy)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Solicitudes::ReviewedBy).big_integer().null())
                    .col(ColumnDef::new(Solicitudes::ReviewNote).text().null())
                    .col(
                        ColumnDef::new(Solicitudes::ReviewedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Solicitudes::CreatedAt)
                            .timestamp_with_time_zone()
                            .default(Expr::cust("NOW()"))
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Solicitudes::UpdatedAt)
                            .timestamp_with_time_zone()
                            .default(Expr::cust("NOW()"))
                            .null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_solicitudes_client")
                            .from(Solicitudes::Table, Solicitudes::ClientId)
                            .to(Clients::Table, Clients::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ServiceOrders::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ServiceOrders::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ServiceOrders::SolicitudId)
                            .big_integer()
                            .null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(ServiceOrders::ClientId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ServiceOrders::Status)
                            .custom(Alias::new("service_order_status"))
                            .not_null()
                            .default(Expr::cust("'pending'::service_order_status")),
                    )
                    .col(
                        ColumnDef::new(ServiceOrders::Total)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(ServiceOrders::PaidTotal)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(ServiceOrders::Notes).text().null())
                    .col(
                        ColumnDef::new(ServiceOrders::CreatedBy)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ServiceOrders::CreatedAt)
                            .timestamp_with_time_zone()
                            .default(Expr::cust("NOW()"))
                            .null(),
                    )
                    .col(
                        ColumnDef::new(ServiceOrders::UpdatedAt)
                            .timestamp_with_time_zone()
                            .default(Expr::cust("NOW()"))
                            .null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_service_orders_solicitud")
                            .from(ServiceOrders::Table, ServiceOrders::SolicitudId)
                            .to(Solicitudes::Table, Solicitudes::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_service_orders_client")
                            .from(ServiceOrders::Table, ServiceOrders::ClientId)
                            .to(Clients::Table, Clients::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ServiceOrderItems::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ServiceOrderItems::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ServiceOrderItems::OrderId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ServiceOrderItems::ItemId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ServiceOrderItems::Description)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ServiceOrderItems::Quantity)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ServiceOrderItems::UnitPrice)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ServiceOrderItems::LineTotal)
                            .big_integer()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_service_order_items_order")
                            .from(ServiceOrderItems::Table, ServiceOrderItems::OrderId)
                            .to(ServiceOrders::Table, ServiceOrders::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_service_order_items_item")
                            .from(ServiceOrderItems::Table, ServiceOrderItems::ItemId)
                            .to(Items::Table, Items::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Deliveries::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Deliveries::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Deliveries::OrderId)
                            .big_integer()
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(Deliveries::DeliveredBy)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Deliveries::ReceivedBy)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Deliveries::Notes).text().null())
                    .col(
                        ColumnDef::new(Deliveries::DeliveredAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::cust("NOW()")),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_deliveries_order")
                            .from(Deliveries::Table, Deliveries::OrderId)
                            .to(ServiceOrders::Table, ServiceOrders::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Deliveries::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(
                Table::drop()
                    .table(ServiceOrderItems::Table)
                    .if_exists()
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(ServiceOrders::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Solicitudes::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_type(
                Type::drop()
                    .if_exists()
                    .name(Alias::new("service_order_status"))
                    .to_owned(),
            )
            .await?;
        manager
            .drop_type(
                Type::drop()
                    .if_exists()
                    .name(Alias::new("solicitud_status"))
                    .to_owned(),
            )
            .await?;
        Ok(())
    }
}
