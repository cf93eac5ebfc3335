//! Course entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Publication status.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CourseStatus {
    #[sea_orm(string_value = "DRAFT")]
    #[default]
    Draft,
    #[sea_orm(string_value = "PUBLISHED")]
    Published,
    #[sea_orm(string_value = "ARCHIVED")]
    Archived,
}

/// Content review status.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalStatus {
    #[sea_orm(string_value = "PENDING_REVIEW")]
    #[default]
    PendingReview,
    #[sea_orm(string_value = "APPROVED")]
    Approved,
    #[sea_orm(string_value = "REJECTED")]
    Rejected,
}

/// Whether new enrollments are accepted.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnrollStatus {
    #[sea_orm(string_value = "OPEN")]
    Open,
    #[sea_orm(string_value = "CLOSED")]
    #[default]
    Closed,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "course")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(nullable)]
    pub organization_id: Option<String>,

    #[sea_orm(nullable)]
    pub teacher_id: Option<String>,

    pub title: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,

    /// Credits charged per enrollment
    pub credit_cost: i64,

    /// Maximum number of students, 0 = unlimited
    pub capacity: i32,

    /// Active enrollments (denormalized)
    #[sea_orm(default_value = 0)]
    pub enrolled_count: i32,

    pub status: CourseStatus,

    pub approval_status: ApprovalStatus,

    pub enroll_status: EnrollStatus,

    /// Free trial enrollments allowed
    #[sea_orm(default_value = false)]
    pub allow_trial: bool,

    /// Enrollment goes through an enrollment request
    #[sea_orm(default_value = false)]
    pub requires_approval: bool,

    #[sea_orm(nullable)]
    pub start_at: Option<DateTimeWithTimeZone>,

    #[sea_orm(nullable)]
    pub end_at: Option<DateTimeWithTimeZone>,

    #[sea_orm(nullable)]
    pub reviewed_by: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub review_note: Option<String>,

    pub created_at: DateTimeWithTimeZone,

    #[sea_orm(nullable)]
    pub updated_at: Option<DateTimeWithTimeZone>,
}

impl Model {
    /// Whether the course has no seats left.
    #[must_use]
    pub const fn is_full(&self) -> bool {
        self.capacity > 0 && self.enrolled_count >= self.capacity
    }

    /// Whether students can see and enroll in this course.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.status == CourseStatus::Published && self.approval_status == ApprovalStatus::Approved
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::organization::Entity",
        from = "Column::OrganizationId",
        to = "super::organization::Column::Id",
        on_delete = "SetNull"
    )]
    Organization,

    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::TeacherId",
        to = "super::user::Column::Id",
        on_delete = "SetNull"
    )]
    Teacher,

    #[sea_orm(has_many = "super::enrollment::Entity")]
    Enrollments,
}

impl Related<super::organization::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Organization.def()
    }
}

impl Related<super::enrollment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Enrollments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
