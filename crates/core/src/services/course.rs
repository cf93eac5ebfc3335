//! Course service.

use coursehub_common::{AppError, AppResult, IdGenerator};
use coursehub_db::{
    entities::{
        course::{self, ApprovalStatus, CourseStatus, EnrollStatus},
        user::{self, Role},
    },
    repositories::{CourseFilter, CourseRepository},
};
use sea_orm::{Set, prelude::DateTimeWithTimeZone};
use serde::Deserialize;
use tracing::info;
use validator::Validate;

/// Input for creating a course.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCourseInput {
    #[validate(length(min = 1, max = 200))]
    pub title: String,

    #[validate(length(max = 10000))]
    pub description: Option<String>,

    #[validate(range(min = 0, max = 1_000_000_000))]
    pub credit_cost: i64,

    /// 0 = unlimited
    #[validate(range(min = 0))]
    #[serde(default)]
    pub capacity: i32,

    pub organization_id: Option<String>,

    /// Defaults to the creator when a teacher creates the course.
    pub teacher_id: Option<String>,

    #[serde(default)]
    pub allow_trial: bool,

    #[serde(default)]
    pub requires_approval: bool,

    pub start_at: Option<DateTimeWithTimeZone>,
    pub end_at: Option<DateTimeWithTimeZone>,
}

/// Input for updating a course.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCourseInput {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,

    #[validate(length(max = 10000))]
    pub description: Option<String>,

    #[validate(range(min = 0, max = 1_000_000_000))]
    pub credit_cost: Option<i64>,

    #[validate(range(min = 0))]
    pub capacity: Option<i32>,

    pub teacher_id: Option<String>,
    pub allow_trial: Option<bool>,
    pub requires_approval: Option<bool>,
    pub start_at: Option<DateTimeWithTimeZone>,
    pub end_at: Option<DateTimeWithTimeZone>,
}

fn check_schedule(
    start_at: Option<DateTimeWithTimeZone>,
    end_at: Option<DateTimeWithTimeZone>,
) -> AppResult<()> {
    if let (Some(start), Some(end)) = (start_at, end_at) {
        if end <= start {
            return Err(AppError::Validation(
                "endAt must be after startAt".to_string(),
            ));
        }
    }
    Ok(())
}

/// Course service for business logic.
#[derive(Clone)]
pub struct CourseService {
    course_repo: CourseRepository,
    id_gen: IdGenerator,
}

impl CourseService {
    /// Create a new course service.
    #[must_use]
    pub const fn new(course_repo: CourseRepository) -> Self {
        Self {
            course_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Create a course as a draft awaiting content review.
    pub async fn create(
        &self,
        creator: &user::Model,
        input: CreateCourseInput,
    ) -> AppResult<course::Model> {
        input.validate()?;
        check_schedule(input.start_at, input.end_at)?;

        let teacher_id = match input.teacher_id {
            Some(id) => Some(id),
            None if creator.role == Role::Teacher => Some(creator.id.clone()),
            None => None,
        };

        let model = course::ActiveModel {
            id: Set(self.id_gen.generate()),
            organization_id: Set(input
                .organization_id
                .or_else(|| creator.organization_id.clone())),
            teacher_id: Set(teacher_id),
            title: Set(input.title),
            description: Set(input.description),
            credit_cost: Set(input.credit_cost),
            capacity: Set(input.capacity),
            enrolled_count: Set(0),
            status: Set(CourseStatus::Draft),
            approval_status: Set(ApprovalStatus::PendingReview),
            enroll_status: Set(EnrollStatus::Closed),
            allow_trial: Set(input.allow_trial),
            requires_approval: Set(input.requires_approval),
            start_at: Set(input.start_at),
            end_at: Set(input.end_at),
            reviewed_by: Set(None),
            review_note: Set(None),
            created_at: Set(chrono::Utc::now().into()),
            updated_at: Set(None),
        };

        let course = self.course_repo.create(model).await?;
        info!(course_id = %course.id, creator = %creator.id, "Created course");
        Ok(course)
    }

    /// Update a course. A rejected course goes back to content review.
    pub async fn update(
        &self,
        actor: &user::Model,
        id: &str,
        input: UpdateCourseInput,
    ) -> AppResult<course::Model> {
        input.validate()?;

        let course = self.course_repo.get_by_id(id).await?;
        if course.status == CourseStatus::Archived {
            return Err(AppError::BadRequest(
                "Archived courses cannot be edited".to_string(),
            ));
        }
        if actor.role == Role::Teacher && course.teacher_id.as_deref() != Some(actor.id.as_str()) {
            return Err(AppError::Forbidden(
                "Teachers can only edit their own courses".to_string(),
            ));
        }
        if let Some(capacity) = input.capacity {
            if capacity > 0 && capacity < course.enrolled_count {
                return Err(AppError::Validation(format!(
                    "capacity {capacity} is below current enrollment {}",
                    course.enrolled_count
                )));
            }
        }
        check_schedule(
            input.start_at.or(course.start_at),
            input.end_at.or(course.end_at),
        )?;

        let was_rejected = course.approval_status == ApprovalStatus::Rejected;
        let mut active: course::ActiveModel = course.into();

        if let Some(title) = input.title {
            active.title = Set(title);
        }
        if let Some(description) = input.description {
            active.description = Set(Some(description));
        }
        if let Some(cost) = input.credit_cost {
            active.credit_cost = Set(cost);
        }
        if let Some(capacity) = input.capacity {
            active.capacity = Set(capacity);
        }
        if let Some(teacher_id) = input.teacher_id {
            active.teacher_id = Set(Some(teacher_id));
        }
        if let Some(allow_trial) = input.allow_trial {
            active.allow_trial = Set(allow_trial);
        }
        if let Some(requires_approval) = input.requires_approval {
            active.requires_approval = Set(requires_approval);
        }
        if input.start_at.is_some() {
            active.start_at = Set(input.start_at);
        }
        if input.end_at.is_some() {
            active.end_at = Set(input.end_at);
        }
        if was_rejected {
            active.approval_status = Set(ApprovalStatus::PendingReview);
        }
        active.updated_at = Set(Some(chrono::Utc::now().into()));

        self.course_repo.update(active).await
    }

    /// Get a course by ID.
    pub async fn get(&self, id: &str) -> AppResult<course::Model> {
        self.course_repo.get_by_id(id).await
    }

    /// List courses.
    pub async fn list(
        &self,
        filter: &CourseFilter,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<course::Model>> {
        self.course_repo.list(filter, limit.min(100), offset).await
    }

    /// Approve or reject course content.
    pub async fn review(
        &self,
        reviewer_id: &str,
        id: &str,
        approved: bool,
        note: Option<String>,
    ) -> AppResult<course::Model> {
        let course = self.course_repo.get_by_id(id).await?;
        if course.approval_status != ApprovalStatus::PendingReview {
            return Err(AppError::BadRequest(
                "Course already reviewed".to_string(),
            ));
        }

        let mut active: course::ActiveModel = course.into();
        active.approval_status = Set(if approved {
            ApprovalStatus::Approved
        } else {
            ApprovalStatus::Rejected
        });
        active.reviewed_by = Set(Some(reviewer_id.to_string()));
        active.review_note = Set(note);
        active.updated_at = Set(Some(chrono::Utc::now().into()));

        let course = self.course_repo.update(active).await?;
        info!(course_id = %id, approved, reviewer = %reviewer_id, "Reviewed course");
        Ok(course)
    }

    /// Make an approved course visible.
    pub async fn publish(&self, id: &str) -> AppResult<course::Model> {
        let course = self.course_repo.get_by_id(id).await?;
        if course.status == CourseStatus::Archived {
            return Err(AppError::BadRequest(
                "Archived courses cannot be published".to_string(),
            ));
        }
        if course.approval_status != ApprovalStatus::Approved {
            return Err(AppError::CourseNotAvailable(
                "Course has not passed review".to_string(),
            ));
        }

        let mut active: course::ActiveModel = course.into();
        active.status = Set(CourseStatus::Published);
        active.updated_at = Set(Some(chrono::Utc::now().into()));
        self.course_repo.update(active).await
    }

    /// Archive a course and stop enrollments.
    pub async fn archive(&self, id: &str) -> AppResult<course::Model> {
        let course = self.course_repo.get_by_id(id).await?;

        let mut active: course::ActiveModel = course.into();
        active.status = Set(CourseStatus::Archived);
        active.enroll_status = Set(EnrollStatus::Closed);
        active.updated_at = Set(Some(chrono::Utc::now().into()));
        self.course_repo.update(active).await
    }

    /// Open or close enrollment.
    pub async fn set_enroll_status(&self, id: &str, open: bool) -> AppResult<course::Model> {
        let course = self.course_repo.get_by_id(id).await?;
        if open && !course.is_available() {
            return Err(AppError::CourseNotAvailable(
                "Only published, approved courses can open enrollment".to_string(),
            ));
        }

        let mut active: course::ActiveModel = course.into();
        active.enroll_status = Set(if open {
            EnrollStatus::Open
        } else {
            EnrollStatus::Closed
        });
        active.updated_at = Set(Some(chrono::Utc::now().into()));
        self.course_repo.update(active).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use std::sync::Arc;

    pub(crate) fn test_course(id: &str) -> course::Model {
        course::Model {
            id: id.to_string(),
            organization_id: None,
            teacher_id: Some("teacher1".to_string()),
            title: "Rust 101".to_string(),
            description: None,
            credit_cost: 10,
            capacity: 30,
            enrolled_count: 0,
            status: CourseStatus::Published,
            approval_status: ApprovalStatus::Approved,
            enroll_status: EnrollStatus::Open,
            allow_trial: false,
            requires_approval: false,
            start_at: None,
            end_at: None,
            reviewed_by: None,
            review_note: None,
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    pub(crate) fn test_user(id: &str, role: Role) -> user::Model {
        user::Model {
            id: id.to_string(),
            username: id.to_string(),
            password_hash: String::new(),
            name: None,
            phone: None,
            role,
            status: user::UserStatus::Active,
            organization_id: None,
            advisor_id: None,
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    fn service(db: MockDatabase) -> CourseService {
        CourseService::new(CourseRepository::new(Arc::new(db.into_connection())))
    }

    #[tokio::test]
    async fn test_publish_requires_approval() {
        let course = course::Model {
            status: CourseStatus::Draft,
            approval_status: ApprovalStatus::PendingReview,
            ..test_course("c1")
        };
        let db = MockDatabase::new(DatabaseBackend::Postgres).append_query_results([[course]]);

        let result = service(db).publish("c1").await;

        assert!(matches!(result, Err(AppError::CourseNotAvailable(_))));
    }

    #[tokio::test]
    async fn test_review_only_once() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[test_course("c1")]]);

        let result = service(db).review("staff1", "c1", false, None).await;

        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_teacher_cannot_edit_foreign_course() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[test_course("c1")]]);
        let other = test_user("teacher2", Role::Teacher);

        let result = service(db)
            .update(&other, "c1", UpdateCourseInput::default())
            .await;

        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_open_enrollment_on_draft_fails() {
        let course = course::Model {
            status: CourseStatus::Draft,
            enroll_status: EnrollStatus::Closed,
            ..test_course("c1")
        };
        let db = MockDatabase::new(DatabaseBackend::Postgres).append_query_results([[course]]);

        let result = service(db).set_enroll_status("c1", true).await;

        assert!(matches!(result, Err(AppError::CourseNotAvailable(_))));
    }

    #[tokio::test]
    async fn test_create_rejects_empty_title() {
        let creator = test_user("teacher1", Role::Teacher);
        let input = CreateCourseInput {
            title: String::new(),
            description: None,
            credit_cost: 10,
            capacity: 0,
            organization_id: None,
            teacher_id: None,
            allow_trial: false,
            requires_approval: false,
            start_at: None,
            end_at: None,
        };

        let result = service(MockDatabase::new(DatabaseBackend::Postgres))
            .create(&creator, input)
            .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}
