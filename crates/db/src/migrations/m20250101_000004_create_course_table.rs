//! Create `course` table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Course::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Course::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Course::OrganizationId).string_len(32))
                    .col(ColumnDef::new(Course::TeacherId).string_len(32))
                    .col(ColumnDef::new(Course::Title).string_len(256).not_null())
                    .col(ColumnDef::new(Course::Description).text())
                    .col(ColumnDef::new(Course::CreditCost).big_integer().not_null().default(0))
                    .col(ColumnDef::new(Course::Capacity).integer().not_null().default(0))
                    .col(ColumnDef::new(Course::EnrolledCount).integer().not_null().default(0))
                    .col(
                        ColumnDef::new(Course::Status)
                            .string_len(16)
                            .not_null()
                            .default("DRAFT"),
                    )
                    .col(
                        ColumnDef::new(Course::ApprovalStatus)
                            .string_len(16)
                            .not_null()
                            .default("PENDING_REVIEW"),
                    )
                    .col(
                        ColumnDef::new(Course::EnrollStatus)
                            .string_len(16)
                            .not_null()
                            .default("CLOSED"),
                    )
                    .col(ColumnDef::new(Course::AllowTrial).boolean().not_null().default(false))
                    .col(
                        ColumnDef::new(Course::RequiresApproval)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Course::StartAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Course::EndAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Course::ReviewedBy).string_len(32))
                    .col(ColumnDef::new(Course::ReviewNote).text())
                    .col(
                        ColumnDef::new(Course::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(Course::UpdatedAt).timestamp_with_time_zone())
                    .check(Expr::col(Course::CreditCost).gte(0))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_course_organization")
                            .from(Course::Table, Course::OrganizationId)
                            .to(Organization::Table, Organization::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_course_teacher")
                            .from(Course::Table, Course::TeacherId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: (status, approval_status) - catalog listing
        manager
            .create_index(
                Index::create()
                    .name("idx_course_status")
                    .table(Course::Table)
                    .col(Course::Status)
                    .col(Course::ApprovalStatus)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_course_teacher_id")
                    .table(Course::Table)
                    .col(Course::TeacherId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Course::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Course {
    Table,
    Id,
    OrganizationId,
    TeacherId,
    Title,
    Description,
    CreditCost,
    Capacity,
    EnrolledCount,
    Status,
    ApprovalStatus,
    EnrollStatus,
    AllowTrial,
    RequiresApproval,
    StartAt,
    EndAt,
    ReviewedBy,
    ReviewNote,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Organization {
    Table,
    Id,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}
