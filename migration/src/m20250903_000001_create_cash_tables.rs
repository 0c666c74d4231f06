use sea_orm_migration::prelude::extension::postgres::Type;
use sea_orm_migration::prelude::*;

#[derive(DeriveIden)]
enum CashRegisters {
    Table,
    Id,
    Name,
    BaseAmount,
    RequiresAuthorization,
    IsActive,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum CashSessions {
    Table,
    Id,
    RegisterId,
    UserId,
    Status,
    OpeningAmount,
    SalesTotal,
    ExpensesTotal,
    MovementsNet,
    ExpectedAmount,
    ClosingAmount,
    Difference,
    OpenedAt,
    ClosedAt,
}

#[derive(DeriveIden)]
enum CashMovements {
    Table,
    Id,
    SessionId,
    UserId,
    Kind,
    Amount,
    Concept,
    CreatedAt,
}

#[derive(DeriveIden)]
enum CashExpenses {
    Table,
    Id,
    SessionId,
    UserId,
    Description,
    Category,
    Amount,
    CreatedAt,
}

#[derive(DeriveIden)]
enum CashDiscrepancies {
    Table,
    Id,
    SessionId,
    Expected,
    Actual,
    Difference,
    SupervisorId,
    Justification,
    CreatedAt,
}

#[derive(DeriveIden)]
enum DailyKeys {
    Table,
    Id,
    Code,
    ValidOn,
    IssuedBy,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Payments {
    Table,
    Id,
    OrderId,
    SessionId,
    Amount,
    Method,
    Reference,
    ReceivedBy,
    CreatedAt,
}

#[derive(DeriveIden)]
enum ServiceOrders {
    Table,
    Id,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // enums
        manager
            .create_type(
                Type::create()
                    .as_enum(Alias::new("cash_session_status"))
                    .values(vec![Alias::new("open"), Alias::new("closed")])
                    .to_owned(),
            )
            .await?;
        manager
            .create_type(
                Type::create()
                    .as_enum(Alias::new("cash_movement_kind"))
                    .values(vec![Alias::new("ingress"), Alias::new("egress")])
                    .to_owned(),
            )
            .await?;
        manager
            .create_type(
                Type::create()
                    .as_enum(Alias::new("payment_method"))
                    .values(vec![
                        Alias::new("cash"),
                        Alias::new("card"),
                        Alias::new("transfer"),
                    ])
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(CashRegisters::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CashRegisters::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(CashRegisters::Name)
                            .string_len(128)
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(CashRegisters::BaseAmount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(CashRegisters::RequiresAuthorization)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(CashRegisters::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(CashRegisters::CreatedAt)
                            .timestamp_with_time_zone()
                            .default(Expr::cust("NOW()"))
                            .null(),
                    )
                    .col(
                        ColumnDef::new(CashRegisters::UpdatedAt)
                            .timestamp_with_time_zone()
                            .default(Expr::cust("NOW()"))
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(CashSessions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CashSessions::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(CashSessions::RegisterId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(CashSessions::UserId).big_integer().not_null())
                    .col(
                        ColumnDef::new(CashSessions::Status)
                            .custom(Alias::new("cash_session_status"))
                            .not_null()
                            .default(Expr::cust("'open'::cash_session_status")),
                    )
                    .col(
                        ColumnDef::new(CashSessions::OpeningAmount)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CashSessions::SalesTotal)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(CashSessions::ExpensesTotal)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(CashSessions::MovementsNet)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(CashSessions::ExpectedAmount)
                            .big_integer()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(CashSessions::ClosingAmount)
                            .big_integer()
                            .null(),
                    )
                    .col(ColumnDef::new(CashSessions::Difference).big_integer().null())
                    .col(
                        ColumnDef::new(CashSessions::OpenedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::cust("NOW()")),
                    )
                    .col(
                        ColumnDef::new(CashSessions::ClosedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_cash_sessions_register")
                            .from(CashSessions::Table, CashSessions::RegisterId)
                            .to(CashRegisters::Table, CashRegisters::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        // 同一用户、同一收银台最多一个 open 班次
        manager
            .get_connection()
            .execute_unprepared(
                "CREATE UNIQUE INDEX IF NOT EXISTS uq_cash_sessions_open_user \
                 ON cash_sessions (user_id) WHERE status = 'open'",
            )
            .await?;
        manager
            .get_connection()
            .execute_unprepared(
                "CREATE UNIQUE INDEX IF NOT EXISTS uq_cash_sessions_open_register \
                 ON cash_sessions (register_id) WHERE status = 'open'",
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(CashMovements::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CashMovements::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(CashMovements::SessionId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(CashMovements::UserId).big_integer().not_null())
                    .col(
                        ColumnDef::new(CashMovements::Kind)
                            .custom(Alias::new("cash_movement_kind"))
                            .not_null(),
                    )
                    .col(ColumnDef::new(CashMovements::Amount).big_integer().not_null())
                    .col(ColumnDef::new(CashMovements::Concept).string_len(255).not_null())
                    .col(
                        ColumnDef::new(CashMovements::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::cust("NOW()")),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_cash_movements_session")
                            .from(CashMovements::Table, CashMovements::SessionId)
                            .to(CashSessions::Table, CashSessions::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(CashExpenses::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CashExpenses::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(CashExpenses::SessionId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(CashExpenses::UserId).big_integer().not_null())
                    .col(
                        ColumnDef::new(CashExpenses::Description)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(ColumnDef::new(CashExpenses::Category).string_len(64).null())
                    .col(ColumnDef::new(CashExpenses::Amount).big_integer().not_null())
                    .col(
                        ColumnDef::new(CashExpenses::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::cust("NOW()")),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_cash_expenses_session")
                            .from(CashExpenses::Table, CashExpenses::SessionId)
                            .to(CashSessions::Table, CashSessions::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(CashDiscrepancies::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CashDiscrepancies::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(CashDiscrepancies::SessionId)
                            .big_integer()
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(CashDiscrepancies::Expected)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CashDiscrepancies::Actual)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CashDiscrepancies::Difference)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CashDiscrepancies::SupervisorId)
                            .big_integer()
                            .null(),
                    )
                    .col(ColumnDef::new(CashDiscrepancies::Justification).text().null())
                    .col(
                        ColumnDef::new(CashDiscrepancies::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::cust("NOW()")),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_cash_discrepancies_session")
                            .from(CashDiscrepancies::Table, CashDiscrepancies::SessionId)
                            .to(CashSessions::Table, CashSessions::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(DailyKeys::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DailyKeys::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(DailyKeys::Code).string_len(6).not_null())
                    .col(ColumnDef::new(DailyKeys::ValidOn).date().not_null())
                    .col(ColumnDef::new(DailyKeys::IssuedBy).big_integer().not_null())
                    .col(
                        ColumnDef::new(DailyKeys::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::cust("NOW()")),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_daily_keys_valid_on")
                    .table(DailyKeys::Table)
                    .col(DailyKeys::ValidOn)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Payments::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Payments::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Payments::OrderId).big_integer().not_null())
                    .col(ColumnDef::new(Payments::SessionId).big_integer().null())
                    .col(ColumnDef::new(Payments::Amount).big_integer().not_null())
                    .col(
                        ColumnDef::new(Payments::Method)
                            .custom(Alias::new("payment_method"))
                            .not_null(),
                    )
                    .col(ColumnDef::new(Payments::Reference).string_len(128).null())
                    .col(ColumnDef::new(Payments::ReceivedBy).big_integer().not_null())
                    .col(
                        ColumnDef::new(Payments::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::cust("NOW()")),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_payments_order")
                            .from(Payments::Table, Payments::OrderId)
                            .to(ServiceOrders::Table, ServiceOrders::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_payments_session")
                            .from(Payments::Table, Payments::SessionId)
                            .to(CashSessions::Table, CashSessions::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for table in [
            Payments::Table.into_iden(),
            DailyKeys::Table.into_iden(),
            CashDiscrepancies::Table.into_iden(),
            CashExpenses::Table.into_iden(),
            CashMovements::Table.into_iden(),
            CashSessions::Table.into_iden(),
            CashRegisters::Table.into_iden(),
        ] {
            manager
                .drop_table(Table::drop().table(table).if_exists().to_owned())
                .await?;
        }
        for name in ["payment_method", "cash_movement_kind", "cash_session_status"] {
            manager
                .drop_type(Type::drop().if_exists().name(Alias::new(name)).to_owned())
                .await?;
        }
        Ok(())
    }
}
