//! Database migrations.
//!
//! Schema migrations for the database.

#![allow(missing_docs)]

use sea_orm_migration::prelude::*;

mod m20250101_000001_create_organization_table;
mod m20250101_000002_create_user_table;
mod m20250101_000003_create_credit_tables;
mod m20250101_000004_create_course_table;
mod m20250101_000005_create_enrollment_tables;
mod m20250101_000006_create_review_request_tables;
mod m20250101_000007_create_achievement_notification_tables;
mod m20250101_000008_create_permission_tables;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250101_000001_create_organization_table::Migration),
            Box::new(m20250101_000002_create_user_table::Migration),
            Box::new(m20250101_000003_create_credit_tables::Migration),
            Box::new(m20250101_000004_create_course_table::Migration),
            Box::new(m20250101_000005_create_enrollment_tables::Migration),
            Box::new(m20250101_000006_create_review_request_tables::Migration),
            Box::new(m20250101_000007_create_achievement_notification_tables::Migration),
            Box::new(m20250101_000008_create_permission_tables::Migration),
        ]
    }
}
