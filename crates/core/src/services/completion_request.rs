//! Course completion workflow: a checked-in student asks to complete a course
//! and receives an achievement on approval.

use std::sync::Arc;

use crate::services::review::{self, ReviewDecision};
use coursehub_common::{AppError, AppResult, IdGenerator};
use coursehub_db::{
    entities::{
        ReviewStatus, achievement, course_completion_request, enrollment::EnrollmentStatus,
        user::{self, Role},
    },
    repositories::{
        AchievementRepository, CompletionRequestRepository, CourseRepository,
        EnrollmentRepository, ReviewFilter, ReviewUpdate,
    },
};
use sea_orm::{DatabaseConnection, Set, TransactionTrait};
use serde::Deserialize;
use tracing::info;
use validator::Validate;

/// Input for asking to complete a course.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCompletionRequestInput {
    #[validate(length(min = 1))]
    pub enrollment_id: String,

    #[validate(length(max = 5000))]
    pub summary: Option<String>,
}

fn closed(
    request: course_completion_request::Model,
    update: &ReviewUpdate,
) -> course_completion_request::Model {
    course_completion_request::Model {
        status: update.status,
        reviewer_id: update.reviewer_id.clone(),
        review_note: update.note.clone(),
        reviewed_at: Some(update.closed_at),
        ..request
    }
}

/// Course completion request service.
#[derive(Clone)]
pub struct CompletionRequestService {
    db: Arc<DatabaseConnection>,
    request_repo: CompletionRequestRepository,
    enrollment_repo: EnrollmentRepository,
    course_repo: CourseRepository,
    achievement_repo: AchievementRepository,
    id_gen: IdGenerator,
}

impl CompletionRequestService {
    /// Create a new completion request service.
    #[must_use]
    pub const fn new(
        db: Arc<DatabaseConnection>,
        request_repo: CompletionRequestRepository,
        enrollment_repo: EnrollmentRepository,
        course_repo: CourseRepository,
        achievement_repo: AchievementRepository,
    ) -> Self {
        Self {
            db,
            request_repo,
            enrollment_repo,
            course_repo,
            achievement_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Ask to complete an own, active, checked-in enrollment.
    pub async fn create(
        &self,
        user_id: &str,
        input: CreateCompletionRequestInput,
    ) -> AppResult<course_completion_request::Model> {
        input.validate()?;

        let enrollment = self.enrollment_repo.get_by_id(&input.enrollment_id).await?;
        if enrollment.user_id != user_id {
            return Err(AppError::Forbidden("Not your enrollment".to_string()));
        }
        if enrollment.status != EnrollmentStatus::Enrolled {
            return Err(AppError::BadRequest(
                "Only active enrollments can be completed".to_string(),
            ));
        }
        if !enrollment.checked_in {
            return Err(AppError::BadRequest(
                "Check in before requesting completion".to_string(),
            ));
        }
        if self
            .request_repo
            .find_pending_by_enrollment(&enrollment.id)
            .await?
            .is_some()
        {
            return Err(AppError::DuplicatePendingRequest);
        }

        let model = course_completion_request::ActiveModel {
            id: Set(self.id_gen.generate()),
            user_id: Set(user_id.to_string()),
            enrollment_id: Set(enrollment.id),
            course_id: Set(enrollment.course_id),
            summary: Set(input.summary),
            status: Set(ReviewStatus::Pending),
            reviewer_id: Set(None),
            review_note: Set(None),
            created_at: Set(chrono::Utc::now().into()),
            reviewed_at: Set(None),
        };

        self.request_repo.create(model).await
    }

    /// Approve (complete + achievement) or reject a request.
    ///
    /// Teachers can only decide for their own courses.
    pub async fn review(
        &self,
        reviewer: &user::Model,
        id: &str,
        decision: ReviewDecision,
    ) -> AppResult<course_completion_request::Model> {
        let request = self.request_repo.get_by_id(id).await?;
        let update = review::decide(request.status, &reviewer.id, &decision)?;

        let course = self.course_repo.get_by_id(&request.course_id).await?;
        if reviewer.role == Role::Teacher
            && course.teacher_id.as_deref() != Some(reviewer.id.as_str())
        {
            return Err(AppError::Forbidden(
                "Not the teacher of this course".to_string(),
            ));
        }

        let txn = self.db.begin().await?;
        review::ensure_closed(self.request_repo.close(&txn, id, &update).await?)?;

        if update.status == ReviewStatus::Approved {
            let completed = self
                .enrollment_repo
                .transition(
                    &txn,
                    &request.enrollment_id,
                    EnrollmentStatus::Enrolled,
                    EnrollmentStatus::Completed,
                )
                .await?;
            if !completed {
                return Err(AppError::BadRequest(
                    "Enrollment is no longer active".to_string(),
                ));
            }

            let achievement = achievement::ActiveModel {
                id: Set(self.id_gen.generate()),
                user_id: Set(request.user_id.clone()),
                course_id: Set(course.id.clone()),
                title: Set(format!("Completed {}", course.title)),
                issued_by: Set(reviewer.id.clone()),
                completion_request_id: Set(Some(request.id.clone())),
                created_at: Set(chrono::Utc::now().into()),
            };
            self.achievement_repo.create(&txn, achievement).await?;
        }
        txn.commit().await?;

        info!(request_id = %id, status = update.status.as_str(), "Reviewed completion request");
        Ok(closed(request, &update))
    }

    /// Withdraw an own pending request.
    pub async fn cancel(
        &self,
        user_id: &str,
        id: &str,
    ) -> AppResult<course_completion_request::Model> {
        let request = self.request_repo.get_by_id(id).await?;
        let update = review::cancel(request.status, &request.user_id, user_id)?;

        review::ensure_closed(
            self.request_repo
                .close(self.db.as_ref(), id, &update)
                .await?,
        )?;

        Ok(closed(request, &update))
    }

    /// Get a request by ID.
    pub async fn get(&self, id: &str) -> AppResult<course_completion_request::Model> {
        self.request_repo.get_by_id(id).await
    }

    /// Requests matching `filter`, newest first.
    pub async fn list(
        &self,
        filter: &ReviewFilter,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<course_completion_request::Model>> {
        self.request_repo.list(filter, limit.min(100), offset).await
    }

    /// Achievements earned by a user.
    pub async fn list_achievements(&self, user_id: &str) -> AppResult<Vec<achievement::Model>> {
        self.achievement_repo.find_by_user(user_id).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::{
        course::tests::{test_course, test_user},
        enrollment::tests::test_enrollment,
    };
    use coursehub_db::entities::enrollment;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn service(db: MockDatabase) -> CompletionRequestService {
        let db = Arc::new(db.into_connection());
        CompletionRequestService::new(
            db.clone(),
            CompletionRequestRepository::new(db.clone()),
            EnrollmentRepository::new(db.clone()),
            CourseRepository::new(db.clone()),
            AchievementRepository::new(db),
        )
    }

    fn test_request() -> course_completion_request::Model {
        course_completion_request::Model {
            id: "r1".to_string(),
            user_id: "u1".to_string(),
            enrollment_id: "e1".to_string(),
            course_id: "c1".to_string(),
            summary: None,
            status: ReviewStatus::Pending,
            reviewer_id: None,
            review_note: None,
            created_at: chrono::Utc::now().into(),
            reviewed_at: None,
        }
    }

    fn test_achievement() -> achievement::Model {
        achievement::Model {
            id: "a1".to_string(),
            user_id: "u1".to_string(),
            course_id: "c1".to_string(),
            title: "Completed Rust 101".to_string(),
            issued_by: "teacher1".to_string(),
            completion_request_id: Some("r1".to_string()),
            created_at: chrono::Utc::now().into(),
        }
    }

    fn rows(n: u64) -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected: n,
        }
    }

    #[tokio::test]
    async fn test_completion_requires_check_in() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[test_enrollment("e1", "u1")]]);
        let input = CreateCompletionRequestInput {
            enrollment_id: "e1".to_string(),
            summary: None,
        };

        let result = service(db).create("u1", input).await;

        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_completion_duplicate_pending() {
        let checked_in = enrollment::Model {
            checked_in: true,
            ..test_enrollment("e1", "u1")
        };
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[checked_in]])
            .append_query_results([[test_request()]]);
        let input = CreateCompletionRequestInput {
            enrollment_id: "e1".to_string(),
            summary: None,
        };

        let result = service(db).create("u1", input).await;

        assert!(matches!(result, Err(AppError::DuplicatePendingRequest)));
    }

    #[tokio::test]
    async fn test_other_teacher_cannot_review() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[test_request()]])
            .append_query_results([[test_course("c1")]]);
        let other = test_user("teacher2", Role::Teacher);
        let decision = ReviewDecision {
            approved: true,
            note: None,
        };

        let result = service(db).review(&other, "r1", decision).await;

        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_approve_issues_achievement() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[test_request()]])
            .append_query_results([[test_course("c1")]])
            .append_exec_results([rows(1), rows(1)])
            .append_query_results([[test_achievement()]]);
        let teacher = test_user("teacher1", Role::Teacher);
        let decision = ReviewDecision {
            approved: true,
            note: None,
        };

        let request = service(db).review(&teacher, "r1", decision).await.unwrap();

        assert_eq!(request.status, ReviewStatus::Approved);
    }
}
