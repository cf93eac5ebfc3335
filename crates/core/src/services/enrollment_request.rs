//! Enrollment request workflow for courses that need approval.
//!
//! Creating a request locks the course cost on the student's account.
//! Approval unlocks it and enrolls (consuming the cost); rejection and
//! cancellation only unlock.

use std::sync::Arc;

use crate::services::{
    credit::CreditService,
    enrollment::{EnrollmentService, ensure_enrollable},
    review::{self, ReviewDecision},
};
use coursehub_common::{AppError, AppResult, IdGenerator};
use coursehub_db::{
    entities::{ReviewStatus, enrollment::EnrollmentStatus, enrollment_request, user},
    repositories::{
        CourseRepository, EnrollmentRepository, EnrollmentRequestRepository, ReviewFilter,
        ReviewUpdate,
    },
};
use sea_orm::{DatabaseConnection, Set, TransactionTrait};
use serde::Deserialize;
use tracing::info;
use validator::Validate;

/// Input for asking to join a course.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateEnrollmentRequestInput {
    #[validate(length(min = 1))]
    pub course_id: String,

    #[validate(length(max = 1000))]
    pub reason: Option<String>,
}

fn closed(
    request: enrollment_request::Model,
    update: &ReviewUpdate,
) -> enrollment_request::Model {
    enrollment_request::Model {
        status: update.status,
        reviewer_id: update.reviewer_id.clone(),
        review_note: update.note.clone(),
        reviewed_at: Some(update.closed_at),
        ..request
    }
}

/// Enrollment request service.
#[derive(Clone)]
pub struct EnrollmentRequestService {
    db: Arc<DatabaseConnection>,
    request_repo: EnrollmentRequestRepository,
    course_repo: CourseRepository,
    enrollment_repo: EnrollmentRepository,
    enrollment_service: EnrollmentService,
    credit_service: CreditService,
    id_gen: IdGenerator,
}

impl EnrollmentRequestService {
    /// Create a new enrollment request service.
    #[must_use]
    pub const fn new(
        db: Arc<DatabaseConnection>,
        request_repo: EnrollmentRequestRepository,
        course_repo: CourseRepository,
        enrollment_repo: EnrollmentRepository,
        enrollment_service: EnrollmentService,
        credit_service: CreditService,
    ) -> Self {
        Self {
            db,
            request_repo,
            course_repo,
            enrollment_repo,
            enrollment_service,
            credit_service,
            id_gen: IdGenerator::new(),
        }
    }

    /// Ask to join a course and reserve its cost.
    pub async fn create(
        &self,
        user_id: &str,
        input: CreateEnrollmentRequestInput,
    ) -> AppResult<enrollment_request::Model> {
        input.validate()?;

        let course = self.course_repo.get_by_id(&input.course_id).await?;
        ensure_enrollable(&course)?;
        if !course.requires_approval {
            return Err(AppError::BadRequest(
                "Course does not require approval, enroll directly".to_string(),
            ));
        }
        if self
            .enrollment_repo
            .find_by_pair(user_id, &course.id)
            .await?
            .is_some_and(|e| e.status != EnrollmentStatus::Refunded)
        {
            return Err(AppError::AlreadyEnrolled);
        }
        if self
            .request_repo
            .find_pending_by_pair(user_id, &course.id)
            .await?
            .is_some()
        {
            return Err(AppError::DuplicatePendingRequest);
        }
        if course.is_full() {
            return Err(AppError::CourseFull);
        }

        let txn = self.db.begin().await?;
        if course.credit_cost > 0 {
            self.credit_service
                .lock_in(&txn, user_id, course.credit_cost)
                .await?;
        }
        let model = enrollment_request::ActiveModel {
            id: Set(self.id_gen.generate()),
            user_id: Set(user_id.to_string()),
            course_id: Set(course.id.clone()),
            locked_amount: Set(course.credit_cost),
            reason: Set(input.reason),
            status: Set(ReviewStatus::Pending),
            reviewer_id: Set(None),
            review_note: Set(None),
            enrollment_id: Set(None),
            created_at: Set(chrono::Utc::now().into()),
            reviewed_at: Set(None),
        };
        let request = self.request_repo.create(&txn, model).await?;
        txn.commit().await?;

        info!(
            request_id = %request.id,
            locked = request.locked_amount,
            "Created enrollment request"
        );
        Ok(request)
    }

    /// Approve (enroll) or reject a request.
    pub async fn review(
        &self,
        reviewer: &user::Model,
        id: &str,
        decision: ReviewDecision,
    ) -> AppResult<enrollment_request::Model> {
        let request = self.request_repo.get_by_id(id).await?;
        let update = review::decide(request.status, &reviewer.id, &decision)?;

        let txn = self.db.begin().await?;
        review::ensure_closed(self.request_repo.close(&txn, id, &update).await?)?;
        if request.locked_amount > 0 {
            self.credit_service
                .unlock_in(&txn, &request.user_id, request.locked_amount)
                .await?;
        }

        let mut enrollment_id = None;
        if update.status == ReviewStatus::Approved {
            let course = self.course_repo.get_by_id(&request.course_id).await?;
            let existing = self
                .enrollment_repo
                .find_by_pair(&request.user_id, &course.id)
                .await?;
            if existing
                .as_ref()
                .is_some_and(|e| e.status != EnrollmentStatus::Refunded)
            {
                return Err(AppError::AlreadyEnrolled);
            }
            if course.is_full() {
                return Err(AppError::CourseFull);
            }

            let enrollment = self
                .enrollment_service
                .enroll_paid_in(&txn, &request.user_id, &course, existing, &reviewer.id)
                .await?;
            self.request_repo
                .attach_enrollment(&txn, id, &enrollment.id)
                .await?;
            enrollment_id = Some(enrollment.id);
        }
        txn.commit().await?;

        info!(request_id = %id, status = update.status.as_str(), "Reviewed enrollment request");
        Ok(enrollment_request::Model {
            enrollment_id: enrollment_id.or(request.enrollment_id.clone()),
            ..closed(request, &update)
        })
    }

    /// Withdraw an own pending request and release the reservation.
    pub async fn cancel(&self, user_id: &str, id: &str) -> AppResult<enrollment_request::Model> {
        let request = self.request_repo.get_by_id(id).await?;
        let update = review::cancel(request.status, &request.user_id, user_id)?;

        let txn = self.db.begin().await?;
        review::ensure_closed(self.request_repo.close(&txn, id, &update).await?)?;
        if request.locked_amount > 0 {
            self.credit_service
                .unlock_in(&txn, &request.user_id, request.locked_amount)
                .await?;
        }
        txn.commit().await?;

        Ok(closed(request, &update))
    }

    /// Get a request by ID.
    pub async fn get(&self, id: &str) -> AppResult<enrollment_request::Model> {
        self.request_repo.get_by_id(id).await
    }

    /// Requests matching `filter`, newest first.
    pub async fn list(
        &self,
        filter: &ReviewFilter,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<enrollment_request::Model>> {
        self.request_repo.list(filter, limit.min(100), offset).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::{
        course::tests::{test_course, test_user},
        credit::tests::statements,
        enrollment::tests::{test_account, test_enrollment, test_record},
    };
    use coursehub_db::{
        entities::{course, credit, enrollment},
        repositories::{CheckInRepository, CreditRepository, EvaluationRepository},
    };
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult, Value};

    fn service(db: MockDatabase) -> EnrollmentRequestService {
        service_over(&Arc::new(db.into_connection()))
    }

    fn service_over(db: &Arc<DatabaseConnection>) -> EnrollmentRequestService {
        let credit = CreditService::new(db.clone(), CreditRepository::new(db.clone()), 0);
        let enrollments = EnrollmentService::new(
            db.clone(),
            CourseRepository::new(db.clone()),
            EnrollmentRepository::new(db.clone()),
            CheckInRepository::new(db.clone()),
            EvaluationRepository::new(db.clone()),
            credit.clone(),
        );
        EnrollmentRequestService::new(
            db.clone(),
            EnrollmentRequestRepository::new(db.clone()),
            CourseRepository::new(db.clone()),
            EnrollmentRepository::new(db.clone()),
            enrollments,
            credit,
        )
    }

    fn exec(rows_affected: u64) -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected,
        }
    }

    fn locked(balance: i64, locked: i64) -> credit::Model {
        credit::Model {
            locked_balance: locked,
            ..test_account("u1", balance)
        }
    }

    fn approval_course() -> course::Model {
        course::Model {
            requires_approval: true,
            ..test_course("c1")
        }
    }

    fn test_request(status: ReviewStatus) -> enrollment_request::Model {
        enrollment_request::Model {
            id: "r1".to_string(),
            user_id: "u1".to_string(),
            course_id: "c1".to_string(),
            locked_amount: 10,
            reason: None,
            status,
            reviewer_id: None,
            review_note: None,
            enrollment_id: None,
            created_at: chrono::Utc::now().into(),
            reviewed_at: None,
        }
    }

    fn input() -> CreateEnrollmentRequestInput {
        CreateEnrollmentRequestInput {
            course_id: "c1".to_string(),
            reason: None,
        }
    }

    #[tokio::test]
    async fn test_request_for_open_course() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[test_course("c1")]]);

        let result = service(db).create("u1", input()).await;

        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_request_locks_cost_or_fails() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[approval_course()]])
            .append_query_results([Vec::<enrollment::Model>::new()])
            .append_query_results([Vec::<enrollment_request::Model>::new()])
            .append_query_results([[test_account("u1", 4)]]);

        let result = service(db).create("u1", input()).await;

        assert!(matches!(
            result,
            Err(AppError::CreditNotEnough {
                available: 4,
                required: 10
            })
        ));
    }

    #[tokio::test]
    async fn test_reject_releases_lock() {
        let locked = credit::Model {
            locked_balance: 10,
            ..test_account("u1", 30)
        };
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[test_request(ReviewStatus::Pending)]])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .append_query_results([[locked]])
            .append_query_results([[test_account("u1", 30)]]);
        let reviewer = test_user("adv", user::Role::Advisor);
        let decision = ReviewDecision {
            approved: false,
            note: Some("schedule conflict".to_string()),
        };

        let request = service(db).review(&reviewer, "r1", decision).await.unwrap();

        assert_eq!(request.status, ReviewStatus::Rejected);
        assert!(request.enrollment_id.is_none());
    }

    #[tokio::test]
    async fn test_approve_unlocks_then_consumes() {
        let consumed = credit::Model {
            balance: 20,
            used: 10,
            personal_balance: 20,
            ..test_account("u1", 30)
        };
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[test_request(ReviewStatus::Pending)]])
                .append_exec_results([exec(1)])
                .append_query_results([[locked(30, 10)]])
                .append_query_results([[locked(30, 0)]])
                .append_query_results([[approval_course()]])
                .append_query_results([Vec::<enrollment::Model>::new()])
                .append_query_results([[locked(30, 0)]])
                .append_query_results([[consumed]])
                .append_query_results([[test_record("u1", -10, 20)]])
                .append_exec_results([exec(1)])
                .append_query_results([[test_enrollment("e1", "u1")]])
                .append_exec_results([exec(1)])
                .into_connection(),
        );
        let reviewer = test_user("adv", user::Role::Advisor);
        let decision = ReviewDecision {
            approved: true,
            note: None,
        };

        let requests = service_over(&db);
        let request = requests.review(&reviewer, "r1", decision).await.unwrap();
        drop(requests);

        assert_eq!(request.status, ReviewStatus::Approved);
        assert_eq!(request.enrollment_id.as_deref(), Some("e1"));

        let stmts = statements(db);
        let position = |prefix: &str| stmts.iter().position(|s| s.sql.starts_with(prefix));
        let unlock = position(r#"UPDATE "credit" "#).unwrap();
        let consume = position(r#"INSERT INTO "credit_record""#).unwrap();
        let enroll = position(r#"INSERT INTO "enrollment""#).unwrap();
        assert!(unlock < consume && consume < enroll);
        let record_values = &stmts[consume].values.as_ref().unwrap().0;
        assert_eq!(record_values[3], Value::from("CONSUME"));
        assert_eq!(record_values[4], Value::from(-10i64));
        assert!(
            stmts
                .iter()
                .any(|s| s.sql.starts_with(r#"UPDATE "enrollment_request" SET "enrollment_id""#))
        );
    }

    #[tokio::test]
    async fn test_cancel_releases_lock_without_record() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[test_request(ReviewStatus::Pending)]])
                .append_exec_results([exec(1)])
                .append_query_results([[locked(30, 10)]])
                .append_query_results([[locked(30, 0)]])
                .into_connection(),
        );

        let requests = service_over(&db);
        let request = requests.cancel("u1", "r1").await.unwrap();
        drop(requests);

        assert_eq!(request.status, ReviewStatus::Cancelled);
        let stmts = statements(db);
        let unlock = stmts
            .iter()
            .find(|s| s.sql.starts_with(r#"UPDATE "credit" "#))
            .unwrap();
        assert!(
            unlock
                .values
                .as_ref()
                .unwrap()
                .0
                .contains(&Value::from(0i64))
        );
        assert!(
            !stmts
                .iter()
                .any(|s| s.sql.starts_with(r#"INSERT INTO "credit_record""#))
        );
    }

    #[tokio::test]
    async fn test_cancel_someone_elses_request() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[test_request(ReviewStatus::Pending)]]);

        let result = service(db).cancel("u2", "r1").await;

        assert!(matches!(result, Err(AppError::RequestNotOwned)));
    }
}
