//! Create `permission` and `role_permission` tables migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Permission::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Permission::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Permission::Code)
                            .string_len(64)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Permission::Name).string_len(128).not_null())
                    .col(ColumnDef::new(Permission::Description).text())
                    .col(
                        ColumnDef::new(Permission::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(RolePermission::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(RolePermission::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(RolePermission::Role).string_len(16).not_null())
                    .col(
                        ColumnDef::new(RolePermission::PermissionCode)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RolePermission::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_role_permission_code")
                            .from(RolePermission::Table, RolePermission::PermissionCode)
                            .to(Permission::Table, Permission::Code)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique index: (role, permission_code)
        manager
            .create_index(
                Index::create()
                    .name("idx_role_permission_role_code")
                    .table(RolePermission::Table)
                    .col(RolePermission::Role)
                    .col(RolePermission::PermissionCode)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(RolePermission::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Permission::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Permission {
    Table,
    Id,
    Code,
    Name,
    Description,
    CreatedAt,
}

#[derive(Iden)]
enum RolePermission {
    Table,
    Id,
    Role,
    PermissionCode,
    CreatedAt,
}
