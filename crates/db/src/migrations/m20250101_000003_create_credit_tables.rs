//! Create `credit` and `credit_record` tables migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Credit::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Credit::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Credit::UserId)
                            .string_len(32)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Credit::Balance).big_integer().not_null().default(0))
                    .col(ColumnDef::new(Credit::Total).big_integer().not_null().default(0))
                    .col(ColumnDef::new(Credit::Used).big_integer().not_null().default(0))
                    .col(
                        ColumnDef::new(Credit::PersonalBalance)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Credit::LockedBalance)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Credit::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(Credit::UpdatedAt).timestamp_with_time_zone())
                    .check(Expr::col(Credit::Balance).gte(0))
                    .check(Expr::col(Credit::LockedBalance).lte(Expr::col(Credit::Balance)))
                    .check(Expr::col(Credit::PersonalBalance).lte(Expr::col(Credit::Balance)))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_credit_user")
                            .from(Credit::Table, Credit::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(CreditRecord::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CreditRecord::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(CreditRecord::CreditId).string_len(32).not_null())
                    .col(ColumnDef::new(CreditRecord::UserId).string_len(32).not_null())
                    .col(ColumnDef::new(CreditRecord::RecordType).string_len(32).not_null())
                    .col(ColumnDef::new(CreditRecord::Amount).big_integer().not_null())
                    .col(ColumnDef::new(CreditRecord::BalanceAfter).big_integer().not_null())
                    .col(ColumnDef::new(CreditRecord::Remark).text())
                    .col(ColumnDef::new(CreditRecord::OperatorId).string_len(32))
                    .col(ColumnDef::new(CreditRecord::RelatedId).string_len(32))
                    .col(
                        ColumnDef::new(CreditRecord::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_credit_record_credit")
                            .from(CreditRecord::Table, CreditRecord::CreditId)
                            .to(Credit::Table, Credit::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: (user_id, id) - ledger listing per user, newest first
        manager
            .create_index(
                Index::create()
                    .name("idx_credit_record_user_id")
                    .table(CreditRecord::Table)
                    .col(CreditRecord::UserId)
                    .col(CreditRecord::Id)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(CreditRecord::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Credit::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Credit {
    Table,
    Id,
    UserId,
    Balance,
    Total,
    Used,
    PersonalBalance,
    LockedBalance,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum CreditRecord {
    Table,
    Id,
    CreditId,
    UserId,
    RecordType,
    Amount,
    BalanceAfter,
    Remark,
    OperatorId,
    RelatedId,
    CreatedAt,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}
