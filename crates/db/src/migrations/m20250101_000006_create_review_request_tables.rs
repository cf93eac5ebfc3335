//! Create the review workflow tables migration.
//!
//! `credit_request`, `refund_request`, `enrollment_request` and
//! `course_completion_request` share the same review columns.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

/// Adds the id column and the columns every review request carries.
fn request_table<T: Iden + 'static>(table: T, id: impl Iden + 'static) -> TableCreateStatement {
    let mut stmt = Table::create();
    stmt.table(table)
        .if_not_exists()
        .col(ColumnDef::new(id).string_len(32).not_null().primary_key())
        .col(ColumnDef::new(Review::UserId).string_len(32).not_null())
        .col(
            ColumnDef::new(Review::Status)
                .string_len(16)
                .not_null()
                .default("PENDING"),
        )
        .col(ColumnDef::new(Review::ReviewerId).string_len(32))
        .col(ColumnDef::new(Review::ReviewNote).text())
        .col(
            ColumnDef::new(Review::CreatedAt)
                .timestamp_with_time_zone()
                .not_null()
                .default(Expr::current_timestamp()),
        )
        .col(ColumnDef::new(Review::ReviewedAt).timestamp_with_time_zone());
    stmt
}

/// Index on (`user_id`, status) for "my pending requests" lookups.
fn user_status_index<T: Iden + 'static>(name: &str, table: T) -> IndexCreateStatement {
    Index::create()
        .name(name)
        .table(table)
        .col(Review::UserId)
        .col(Review::Status)
        .to_owned()
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // credit_request
        let mut credit_request = request_table(CreditRequest::Table, CreditRequest::Id);
        credit_request
            .col(ColumnDef::new(CreditRequest::Amount).big_integer().not_null())
            .col(ColumnDef::new(CreditRequest::Reason).text())
            .foreign_key(
                ForeignKey::create()
                    .name("fk_credit_request_user")
                    .from(CreditRequest::Table, Review::UserId)
                    .to(User::Table, User::Id)
                    .on_delete(ForeignKeyAction::Cascade),
            );
        manager.create_table(credit_request).await?;
        manager
            .create_index(user_status_index(
                "idx_credit_request_user_status",
                CreditRequest::Table,
            ))
            .await?;

        // refund_request
        let mut refund_request = request_table(RefundRequest::Table, RefundRequest::Id);
        refund_request
            .col(ColumnDef::new(RefundRequest::EnrollmentId).string_len(32).not_null())
            .col(ColumnDef::new(RefundRequest::Amount).big_integer().not_null())
            .col(ColumnDef::new(RefundRequest::Reason).text())
            .foreign_key(
                ForeignKey::create()
                    .name("fk_refund_request_user")
                    .from(RefundRequest::Table, Review::UserId)
                    .to(User::Table, User::Id)
                    .on_delete(ForeignKeyAction::Cascade),
            )
            .foreign_key(
                ForeignKey::create()
                    .name("fk_refund_request_enrollment")
                    .from(RefundRequest::Table, RefundRequest::EnrollmentId)
                    .to(Enrollment::Table, Enrollment::Id)
                    .on_delete(ForeignKeyAction::Cascade),
            );
        manager.create_table(refund_request).await?;
        manager
            .create_index(user_status_index(
                "idx_refund_request_user_status",
                RefundRequest::Table,
            ))
            .await?;

        // enrollment_request
        let mut enrollment_request =
            request_table(EnrollmentRequest::Table, EnrollmentRequest::Id);
        enrollment_request
            .col(ColumnDef::new(EnrollmentRequest::CourseId).string_len(32).not_null())
            .col(
                ColumnDef::new(EnrollmentRequest::LockedAmount)
                    .big_integer()
                    .not_null()
                    .default(0),
            )
            .col(ColumnDef::new(EnrollmentRequest::Reason).text())
            .col(ColumnDef::new(EnrollmentRequest::EnrollmentId).string_len(32))
            .foreign_key(
                ForeignKey::create()
                    .name("fk_enrollment_request_user")
                    .from(EnrollmentRequest::Table, Review::UserId)
                    .to(User::Table, User::Id)
                    .on_delete(ForeignKeyAction::Cascade),
            )
            .foreign_key(
                ForeignKey::create()
                    .name("fk_enrollment_request_course")
                    .from(EnrollmentRequest::Table, EnrollmentRequest::CourseId)
                    .to(Course::Table, Course::Id)
                    .on_delete(ForeignKeyAction::Cascade),
            );
        manager.create_table(enrollment_request).await?;
        manager
            .create_index(user_status_index(
                "idx_enrollment_request_user_status",
                EnrollmentRequest::Table,
            ))
            .await?;

        // course_completion_request
        let mut completion_request = request_table(
            CourseCompletionRequest::Table,
            CourseCompletionRequest::Id,
        );
        completion_request
            .col(
                ColumnDef::new(CourseCompletionRequest::EnrollmentId)
                    .string_len(32)
                    .not_null(),
            )
            .col(
                ColumnDef::new(CourseCompletionRequest::CourseId)
                    .string_len(32)
                    .not_null(),
            )
            .col(ColumnDef::new(CourseCompletionRequest::Summary).text())
            .foreign_key(
                ForeignKey::create()
                    .name("fk_course_completion_request_enrollment")
                    .from(
                        CourseCompletionRequest::Table,
                        CourseCompletionRequest::EnrollmentId,
                    )
                    .to(Enrollment::Table, Enrollment::Id)
                    .on_delete(ForeignKeyAction::Cascade),
            );
        manager.create_table(completion_request).await?;
        manager
            .create_index(user_status_index(
                "idx_course_completion_request_user_status",
                CourseCompletionRequest::Table,
            ))
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(
                Table::drop()
                    .table(CourseCompletionRequest::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(EnrollmentRequest::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(RefundRequest::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(CreditRequest::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Review {
    UserId,
    Status,
    ReviewerId,
    ReviewNote,
    CreatedAt,
    ReviewedAt,
}

#[derive(Iden)]
enum CreditRequest {
    Table,
    Id,
    Amount,
    Reason,
}

#[derive(Iden)]
enum RefundRequest {
    Table,
    Id,
    EnrollmentId,
    Amount,
    Reason,
}

#[derive(Iden)]
enum EnrollmentRequest {
    Table,
    Id,
    CourseId,
    LockedAmount,
    Reason,
    EnrollmentId,
}

#[derive(Iden)]
enum CourseCompletionRequest {
    Table,
    Id,
    EnrollmentId,
    CourseId,
    Summary,
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

#[derive(Iden)]
enum Enrollment {
    Table,
    Id,
}
