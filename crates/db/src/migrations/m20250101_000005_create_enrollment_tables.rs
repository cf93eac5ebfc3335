//! Create `enrollment`, `check_in` and `evaluation` tables migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Enrollment::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Enrollment::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Enrollment::UserId).string_len(32).not_null())
                    .col(ColumnDef::new(Enrollment::CourseId).string_len(32).not_null())
                    .col(
                        ColumnDef::new(Enrollment::Status)
                            .string_len(16)
                            .not_null()
                            .default("ENROLLED"),
                    )
                    .col(
                        ColumnDef::new(Enrollment::CreditCost)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Enrollment::CheckedIn)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Enrollment::CheckedInAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Enrollment::Rated).boolean().not_null().default(false))
                    .col(ColumnDef::new(Enrollment::IsTrial).boolean().not_null().default(false))
                    .col(
                        ColumnDef::new(Enrollment::TrialStatus)
                            .string_len(16)
                            .not_null()
                            .default("NONE"),
                    )
                    .col(
                        ColumnDef::new(Enrollment::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(Enrollment::UpdatedAt).timestamp_with_time_zone())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_enrollment_user")
                            .from(Enrollment::Table, Enrollment::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_enrollment_course")
                            .from(Enrollment::Table, Enrollment::CourseId)
                            .to(Course::Table, Course::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique index: (user_id, course_id) - one enrollment per course
        manager
            .create_index(
                Index::create()
                    .name("idx_enrollment_user_course")
                    .table(Enrollment::Table)
                    .col(Enrollment::UserId)
                    .col(Enrollment::CourseId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_enrollment_course_id")
                    .table(Enrollment::Table)
                    .col(Enrollment::CourseId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(CheckIn::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CheckIn::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(CheckIn::EnrollmentId)
                            .string_len(32)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(CheckIn::UserId).string_len(32).not_null())
                    .col(ColumnDef::new(CheckIn::CourseId).string_len(32).not_null())
                    .col(ColumnDef::new(CheckIn::OperatorId).string_len(32).not_null())
                    .col(
                        ColumnDef::new(CheckIn::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_check_in_enrollment")
                            .from(CheckIn::Table, CheckIn::EnrollmentId)
                            .to(Enrollment::Table, Enrollment::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Evaluation::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Evaluation::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Evaluation::EnrollmentId)
                            .string_len(32)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Evaluation::UserId).string_len(32).not_null())
                    .col(ColumnDef::new(Evaluation::CourseId).string_len(32).not_null())
                    .col(ColumnDef::new(Evaluation::Rating).small_integer().not_null())
                    .col(ColumnDef::new(Evaluation::Comment).text())
                    .col(
                        ColumnDef::new(Evaluation::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .check(Expr::col(Evaluation::Rating).between(1, 5))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_evaluation_enrollment")
                            .from(Evaluation::Table, Evaluation::EnrollmentId)
                            .to(Enrollment::Table, Enrollment::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: course_id (course rating summaries)
        manager
            .create_index(
                Index::create()
                    .name("idx_evaluation_course_id")
                    .table(Evaluation::Table)
                    .col(Evaluation::CourseId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Evaluation::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(CheckIn::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Enrollment::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Enrollment {
    Table,
    Id,
    UserId,
    CourseId,
    Status,
    CreditCost,
    CheckedIn,
    CheckedInAt,
    Rated,
    IsTrial,
    TrialStatus,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum CheckIn {
    Table,
    Id,
    EnrollmentId,
    UserId,
    CourseId,
    OperatorId,
    CreatedAt,
}

#[derive(Iden)]
enum Evaluation {
    Table,
    Id,
    EnrollmentId,
    UserId,
    CourseId,
    Rating,
    Comment,
    CreatedAt,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}

#[derive(Iden)]
enum Course {
    Table,
    Id,
}
