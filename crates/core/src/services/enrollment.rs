//! Enrollment service: paid and trial enrollment, check-in and evaluation.

use std::sync::Arc;

use crate::services::credit::{CreditService, LedgerContext, LedgerOp};
use coursehub_common::{AppError, AppResult, IdGenerator};
use coursehub_db::{
    entities::{
        check_in, course,
        course::EnrollStatus,
        enrollment::{self, EnrollmentStatus, TrialStatus},
        evaluation,
        user::{self, Role},
    },
    repositories::{
        CheckInRepository, CourseRepository, EnrollmentRepository, EvaluationRepository,
    },
};
use sea_orm::{ConnectionTrait, DatabaseConnection, Set, TransactionTrait};
use serde::Deserialize;
use tracing::info;
use validator::Validate;

/// Input for rating a course.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateInput {
    #[validate(range(min = 1, max = 5))]
    pub rating: i16,

    #[validate(length(max = 2000))]
    pub comment: Option<String>,
}

/// Closed before unavailable, as students see it.
pub(crate) fn ensure_enrollable(course: &course::Model) -> AppResult<()> {
    if course.enroll_status == EnrollStatus::Closed {
        return Err(AppError::CourseClosed);
    }
    if !course.is_available() {
        return Err(AppError::CourseNotAvailable(
            "Course is not published".to_string(),
        ));
    }
    Ok(())
}

/// Enrollment service for business logic.
#[derive(Clone)]
pub struct EnrollmentService {
    db: Arc<DatabaseConnection>,
    course_repo: CourseRepository,
    enrollment_repo: EnrollmentRepository,
    check_in_repo: CheckInRepository,
    evaluation_repo: EvaluationRepository,
    credit_service: CreditService,
    id_gen: IdGenerator,
}

impl EnrollmentService {
    /// Create a new enrollment service.
    #[must_use]
    pub const fn new(
        db: Arc<DatabaseConnection>,
        course_repo: CourseRepository,
        enrollment_repo: EnrollmentRepository,
        check_in_repo: CheckInRepository,
        evaluation_repo: EvaluationRepository,
        credit_service: CreditService,
    ) -> Self {
        Self {
            db,
            course_repo,
            enrollment_repo,
            check_in_repo,
            evaluation_repo,
            credit_service,
            id_gen: IdGenerator::new(),
        }
    }

    /// Enroll a user in a course, paying its credit cost.
    pub async fn enroll(&self, user_id: &str, course_id: &str) -> AppResult<enrollment::Model> {
        let course = self.course_repo.get_by_id(course_id).await?;
        ensure_enrollable(&course)?;
        if course.requires_approval {
            return Err(AppError::BadRequest(
                "Course requires an enrollment request".to_string(),
            ));
        }

        let existing = self.enrollment_repo.find_by_pair(user_id, course_id).await?;
        if existing
            .as_ref()
            .is_some_and(|e| e.status != EnrollmentStatus::Refunded)
        {
            return Err(AppError::AlreadyEnrolled);
        }
        if course.is_full() {
            return Err(AppError::CourseFull);
        }

        let txn = self.db.begin().await?;
        let enrollment = self
            .enroll_paid_in(&txn, user_id, &course, existing, user_id)
            .await?;
        txn.commit().await?;

        info!(
            user_id = %user_id,
            course_id = %course_id,
            cost = course.credit_cost,
            "Enrolled in course"
        );
        Ok(enrollment)
    }

    /// Charge the course cost, take a seat and write the enrollment.
    ///
    /// `existing` is a refunded enrollment of the same pair to reactivate.
    pub async fn enroll_paid_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        user_id: &str,
        course: &course::Model,
        existing: Option<enrollment::Model>,
        operator_id: &str,
    ) -> AppResult<enrollment::Model> {
        let enrollment_id = existing
            .as_ref()
            .map_or_else(|| self.id_gen.generate(), |e| e.id.clone());

        // Claim the refunded row before charging, so a racing enroll loses here.
        if existing.is_some()
            && !self
                .enrollment_repo
                .reactivate(conn, &enrollment_id, course.credit_cost)
                .await?
        {
            return Err(AppError::AlreadyEnrolled);
        }

        if course.credit_cost > 0 {
            let remark = format!("Enrolled in {}", course.title);
            let ctx = LedgerContext::new(operator_id, Some(remark)).related_to(&enrollment_id);
            self.credit_service
                .apply_in(conn, user_id, LedgerOp::Consume, course.credit_cost, ctx)
                .await?;
        }

        if !self.course_repo.claim_seat(conn, &course.id).await? {
            return Err(AppError::CourseFull);
        }

        let now = chrono::Utc::now();
        match existing {
            Some(previous) => Ok(enrollment::Model {
                status: EnrollmentStatus::Enrolled,
                credit_cost: course.credit_cost,
                is_trial: false,
                trial_status: TrialStatus::None,
                updated_at: Some(now.into()),
                ..previous
            }),
            None => {
                let model = enrollment::ActiveModel {
                    id: Set(enrollment_id),
                    user_id: Set(user_id.to_string()),
                    course_id: Set(course.id.clone()),
                    status: Set(EnrollmentStatus::Enrolled),
                    credit_cost: Set(course.credit_cost),
                    checked_in: Set(false),
                    checked_in_at: Set(None),
                    rated: Set(false),
                    is_trial: Set(false),
                    trial_status: Set(TrialStatus::None),
                    created_at: Set(now.into()),
                    updated_at: Set(None),
                };
                self.enrollment_repo.create(conn, model).await
            }
        }
    }

    /// Join a course for free on trial.
    pub async fn enroll_trial(
        &self,
        user_id: &str,
        course_id: &str,
    ) -> AppResult<enrollment::Model> {
        let course = self.course_repo.get_by_id(course_id).await?;
        ensure_enrollable(&course)?;
        if !course.allow_trial {
            return Err(AppError::TrialNotAllowed);
        }
        if self
            .enrollment_repo
            .find_by_pair(user_id, course_id)
            .await?
            .is_some()
        {
            return Err(AppError::AlreadyEnrolled);
        }
        if course.is_full() {
            return Err(AppError::CourseFull);
        }

        let txn = self.db.begin().await?;
        if !self.course_repo.claim_seat(&txn, course_id).await? {
            return Err(AppError::CourseFull);
        }
        let model = enrollment::ActiveModel {
            id: Set(self.id_gen.generate()),
            user_id: Set(user_id.to_string()),
            course_id: Set(course_id.to_string()),
            status: Set(EnrollmentStatus::Enrolled),
            credit_cost: Set(0),
            checked_in: Set(false),
            checked_in_at: Set(None),
            rated: Set(false),
            is_trial: Set(true),
            trial_status: Set(TrialStatus::Trial),
            created_at: Set(chrono::Utc::now().into()),
            updated_at: Set(None),
        };
        let enrollment = self.enrollment_repo.create(&txn, model).await?;
        txn.commit().await?;

        info!(user_id = %user_id, course_id = %course_id, "Started trial");
        Ok(enrollment)
    }

    /// Turn a trial into a paid enrollment.
    pub async fn convert_trial(
        &self,
        user_id: &str,
        enrollment_id: &str,
    ) -> AppResult<enrollment::Model> {
        let enrollment = self.enrollment_repo.get_by_id(enrollment_id).await?;
        if enrollment.user_id != user_id {
            return Err(AppError::Forbidden("Not your enrollment".to_string()));
        }
        if enrollment.trial_status != TrialStatus::Trial
            || enrollment.status != EnrollmentStatus::Enrolled
        {
            return Err(AppError::BadRequest(
                "Enrollment is not an active trial".to_string(),
            ));
        }

        let course = self.course_repo.get_by_id(&enrollment.course_id).await?;

        let txn = self.db.begin().await?;
        if !self
            .enrollment_repo
            .convert_trial(&txn, enrollment_id, course.credit_cost)
            .await?
        {
            return Err(AppError::BadRequest(
                "Enrollment is not an active trial".to_string(),
            ));
        }
        if course.credit_cost > 0 {
            let remark = format!("Converted trial of {}", course.title);
            let ctx = LedgerContext::new(user_id, Some(remark)).related_to(enrollment_id);
            self.credit_service
                .apply_in(&txn, user_id, LedgerOp::Consume, course.credit_cost, ctx)
                .await?;
        }
        txn.commit().await?;

        let enrollment = enrollment::Model {
            trial_status: TrialStatus::Converted,
            credit_cost: course.credit_cost,
            updated_at: Some(chrono::Utc::now().into()),
            ..enrollment
        };

        info!(enrollment_id = %enrollment_id, "Converted trial enrollment");
        Ok(enrollment)
    }

    /// Record attendance. Teachers can only check in their own courses.
    pub async fn check_in(
        &self,
        operator: &user::Model,
        enrollment_id: &str,
    ) -> AppResult<check_in::Model> {
        let enrollment = self.enrollment_repo.get_by_id(enrollment_id).await?;
        if enrollment.status != EnrollmentStatus::Enrolled {
            return Err(AppError::BadRequest(
                "Only active enrollments can check in".to_string(),
            ));
        }
        if enrollment.checked_in {
            return Err(AppError::AlreadyCheckedIn);
        }

        if operator.role == Role::Teacher {
            let course = self.course_repo.get_by_id(&enrollment.course_id).await?;
            if course.teacher_id.as_deref() != Some(operator.id.as_str()) {
                return Err(AppError::Forbidden(
                    "Not the teacher of this course".to_string(),
                ));
            }
        }

        let now = chrono::Utc::now();
        let txn = self.db.begin().await?;
        let record = check_in::ActiveModel {
            id: Set(self.id_gen.generate()),
            enrollment_id: Set(enrollment.id.clone()),
            user_id: Set(enrollment.user_id.clone()),
            course_id: Set(enrollment.course_id.clone()),
            operator_id: Set(operator.id.clone()),
            created_at: Set(now.into()),
        };
        let record = match self.check_in_repo.create(&txn, record).await {
            Err(AppError::Conflict(_)) => return Err(AppError::AlreadyCheckedIn),
            other => other?,
        };

        let mut active: enrollment::ActiveModel = enrollment.into();
        active.checked_in = Set(true);
        active.checked_in_at = Set(Some(now.into()));
        active.updated_at = Set(Some(now.into()));
        self.enrollment_repo.update(&txn, active).await?;
        txn.commit().await?;

        Ok(record)
    }

    /// Rate a course once per enrollment.
    pub async fn evaluate(
        &self,
        user_id: &str,
        enrollment_id: &str,
        input: EvaluateInput,
    ) -> AppResult<evaluation::Model> {
        input.validate()?;

        let enrollment = self.enrollment_repo.get_by_id(enrollment_id).await?;
        if enrollment.user_id != user_id {
            return Err(AppError::Forbidden("Not your enrollment".to_string()));
        }
        if enrollment.status == EnrollmentStatus::Refunded {
            return Err(AppError::BadRequest(
                "Refunded enrollments cannot be rated".to_string(),
            ));
        }
        if enrollment.rated {
            return Err(AppError::AlreadyRated);
        }

        let txn = self.db.begin().await?;
        let model = evaluation::ActiveModel {
            id: Set(self.id_gen.generate()),
            enrollment_id: Set(enrollment.id.clone()),
            user_id: Set(user_id.to_string()),
            course_id: Set(enrollment.course_id.clone()),
            rating: Set(input.rating),
            comment: Set(input.comment),
            created_at: Set(chrono::Utc::now().into()),
        };
        let evaluation = match self.evaluation_repo.create(&txn, model).await {
            Err(AppError::Conflict(_)) => return Err(AppError::AlreadyRated),
            other => other?,
        };

        let mut active: enrollment::ActiveModel = enrollment.into();
        active.rated = Set(true);
        active.updated_at = Set(Some(chrono::Utc::now().into()));
        self.enrollment_repo.update(&txn, active).await?;
        txn.commit().await?;

        Ok(evaluation)
    }

    /// Get an enrollment by ID.
    pub async fn get(&self, id: &str) -> AppResult<enrollment::Model> {
        self.enrollment_repo.get_by_id(id).await
    }

    /// Enrollments of a user, newest first.
    pub async fn list_by_user(
        &self,
        user_id: &str,
        limit: u64,
        until_id: Option<&str>,
    ) -> AppResult<Vec<enrollment::Model>> {
        self.enrollment_repo
            .find_by_user(user_id, limit.min(100), until_id)
            .await
    }

    /// Enrollments in a course.
    pub async fn list_by_course(
        &self,
        course_id: &str,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<enrollment::Model>> {
        self.enrollment_repo
            .find_by_course(course_id, limit.min(100), offset)
            .await
    }

    /// Evaluations of a course.
    pub async fn list_evaluations(
        &self,
        course_id: &str,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<evaluation::Model>> {
        self.evaluation_repo
            .find_by_course(course_id, limit.min(100), offset)
            .await
    }

    /// Check-ins of a course.
    pub async fn list_check_ins(&self, course_id: &str) -> AppResult<Vec<check_in::Model>> {
        self.check_in_repo.find_by_course(course_id).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;
    use crate::services::course::tests::{test_course, test_user};
    use chrono::Utc;
    use coursehub_db::{
        entities::{credit, credit_record},
        repositories::CreditRepository,
    };
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    pub(crate) fn test_enrollment(id: &str, user_id: &str) -> enrollment::Model {
        enrollment::Model {
            id: id.to_string(),
            user_id: user_id.to_string(),
            course_id: "c1".to_string(),
            status: EnrollmentStatus::Enrolled,
            credit_cost: 10,
            checked_in: false,
            checked_in_at: None,
            rated: false,
            is_trial: false,
            trial_status: TrialStatus::None,
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    pub(crate) fn test_account(user_id: &str, balance: i64) -> credit::Model {
        credit::Model {
            id: format!("credit-{user_id}"),
            user_id: user_id.to_string(),
            balance,
            total: balance,
            used: 0,
            personal_balance: balance,
            locked_balance: 0,
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    pub(crate) fn test_record(user_id: &str, amount: i64, after: i64) -> credit_record::Model {
        credit_record::Model {
            id: "rec1".to_string(),
            credit_id: format!("credit-{user_id}"),
            user_id: user_id.to_string(),
            record_type: LedgerOp::Consume.record_type(),
            amount,
            balance_after: after,
            remark: None,
            operator_id: Some(user_id.to_string()),
            related_id: None,
            created_at: Utc::now().into(),
        }
    }

    pub(crate) fn enrollment_service(db: MockDatabase) -> EnrollmentService {
        let db = Arc::new(db.into_connection());
        let credit = CreditService::new(db.clone(), CreditRepository::new(db.clone()), 0);
        EnrollmentService::new(
            db.clone(),
            CourseRepository::new(db.clone()),
            EnrollmentRepository::new(db.clone()),
            CheckInRepository::new(db.clone()),
            EvaluationRepository::new(db),
            credit,
        )
    }

    #[tokio::test]
    async fn test_enroll_closed_course() {
        let course = course::Model {
            enroll_status: EnrollStatus::Closed,
            ..test_course("c1")
        };
        let db = MockDatabase::new(DatabaseBackend::Postgres).append_query_results([[course]]);

        let result = enrollment_service(db).enroll("u1", "c1").await;

        assert!(matches!(result, Err(AppError::CourseClosed)));
    }

    #[tokio::test]
    async fn test_enroll_unpublished_course() {
        let course = course::Model {
            status: course::CourseStatus::Draft,
            ..test_course("c1")
        };
        let db = MockDatabase::new(DatabaseBackend::Postgres).append_query_results([[course]]);

        let result = enrollment_service(db).enroll("u1", "c1").await;

        assert!(matches!(result, Err(AppError::CourseNotAvailable(_))));
    }

    #[tokio::test]
    async fn test_enroll_twice() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[test_course("c1")]])
            .append_query_results([[test_enrollment("e1", "u1")]]);

        let result = enrollment_service(db).enroll("u1", "c1").await;

        assert!(matches!(result, Err(AppError::AlreadyEnrolled)));
    }

    #[tokio::test]
    async fn test_enroll_full_course() {
        let course = course::Model {
            capacity: 2,
            enrolled_count: 2,
            ..test_course("c1")
        };
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[course]])
            .append_query_results([Vec::<enrollment::Model>::new()]);

        let result = enrollment_service(db).enroll("u1", "c1").await;

        assert!(matches!(result, Err(AppError::CourseFull)));
    }

    #[tokio::test]
    async fn test_enroll_not_enough_credit() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[test_course("c1")]])
            .append_query_results([Vec::<enrollment::Model>::new()])
            .append_query_results([[test_account("u1", 5)]]);

        let result = enrollment_service(db).enroll("u1", "c1").await;

        assert!(matches!(
            result,
            Err(AppError::CreditNotEnough {
                available: 5,
                required: 10
            })
        ));
    }

    #[tokio::test]
    async fn test_enroll_success() {
        let after = credit::Model {
            balance: 10,
            used: 10,
            personal_balance: 10,
            ..test_account("u1", 20)
        };
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[test_course("c1")]])
            .append_query_results([Vec::<enrollment::Model>::new()])
            .append_query_results([[test_account("u1", 20)]])
            .append_query_results([[after]])
            .append_query_results([[test_record("u1", -10, 10)]])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .append_query_results([[test_enrollment("e1", "u1")]]);

        let enrollment = enrollment_service(db).enroll("u1", "c1").await.unwrap();

        assert_eq!(enrollment.status, EnrollmentStatus::Enrolled);
        assert_eq!(enrollment.credit_cost, 10);
    }

    fn exec(rows_affected: u64) -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected,
        }
    }

    #[tokio::test]
    async fn test_reenroll_after_refund_reuses_row() {
        let refunded = enrollment::Model {
            status: EnrollmentStatus::Refunded,
            checked_in: true,
            ..test_enrollment("e1", "u1")
        };
        let after = credit::Model {
            balance: 10,
            used: 10,
            personal_balance: 10,
            ..test_account("u1", 20)
        };
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[test_course("c1")]])
            .append_query_results([[refunded]])
            .append_exec_results([exec(1)])
            .append_query_results([[test_account("u1", 20)]])
            .append_query_results([[after]])
            .append_query_results([[test_record("u1", -10, 10)]])
            .append_exec_results([exec(1)]);

        let enrollment = enrollment_service(db).enroll("u1", "c1").await.unwrap();

        assert_eq!(enrollment.id, "e1");
        assert_eq!(enrollment.status, EnrollmentStatus::Enrolled);
        assert_eq!(enrollment.credit_cost, 10);
        assert!(enrollment.checked_in);
    }

    #[tokio::test]
    async fn test_reenroll_lost_race_charges_nothing() {
        let refunded = enrollment::Model {
            status: EnrollmentStatus::Refunded,
            ..test_enrollment("e1", "u1")
        };
        // No credit rows queued: a charge attempt would surface as a db error.
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[test_course("c1")]])
            .append_query_results([[refunded]])
            .append_exec_results([exec(0)]);

        let result = enrollment_service(db).enroll("u1", "c1").await;

        assert!(matches!(result, Err(AppError::AlreadyEnrolled)));
    }

    fn trial(id: &str, user_id: &str) -> enrollment::Model {
        enrollment::Model {
            credit_cost: 0,
            is_trial: true,
            trial_status: TrialStatus::Trial,
            ..test_enrollment(id, user_id)
        }
    }

    #[tokio::test]
    async fn test_convert_trial_charges_course_cost() {
        let after = credit::Model {
            balance: 10,
            used: 10,
            personal_balance: 10,
            ..test_account("u1", 20)
        };
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[trial("e1", "u1")]])
            .append_query_results([[test_course("c1")]])
            .append_exec_results([exec(1)])
            .append_query_results([[test_account("u1", 20)]])
            .append_query_results([[after]])
            .append_query_results([[test_record("u1", -10, 10)]]);

        let enrollment = enrollment_service(db).convert_trial("u1", "e1").await.unwrap();

        assert_eq!(enrollment.trial_status, TrialStatus::Converted);
        assert_eq!(enrollment.credit_cost, 10);
        assert!(enrollment.is_trial);
    }

    #[tokio::test]
    async fn test_convert_trial_lost_race_charges_nothing() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[trial("e1", "u1")]])
            .append_query_results([[test_course("c1")]])
            .append_exec_results([exec(0)]);

        let result = enrollment_service(db).convert_trial("u1", "e1").await;

        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_convert_someone_elses_trial() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[trial("e1", "u2")]]);

        let result = enrollment_service(db).convert_trial("u1", "e1").await;

        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_trial_not_allowed() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[test_course("c1")]]);

        let result = enrollment_service(db).enroll_trial("u1", "c1").await;

        assert!(matches!(result, Err(AppError::TrialNotAllowed)));
    }

    #[tokio::test]
    async fn test_check_in_twice() {
        let enrollment = enrollment::Model {
            checked_in: true,
            ..test_enrollment("e1", "u1")
        };
        let db = MockDatabase::new(DatabaseBackend::Postgres).append_query_results([[enrollment]]);
        let staff = test_user("staff1", Role::Staff);

        let result = enrollment_service(db).check_in(&staff, "e1").await;

        assert!(matches!(result, Err(AppError::AlreadyCheckedIn)));
    }

    #[tokio::test]
    async fn test_evaluate_rating_out_of_range() {
        let input = EvaluateInput {
            rating: 6,
            comment: None,
        };

        let result = enrollment_service(MockDatabase::new(DatabaseBackend::Postgres))
            .evaluate("u1", "e1", input)
            .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_evaluate_twice() {
        let enrollment = enrollment::Model {
            rated: true,
            ..test_enrollment("e1", "u1")
        };
        let db = MockDatabase::new(DatabaseBackend::Postgres).append_query_results([[enrollment]]);
        let input = EvaluateInput {
            rating: 4,
            comment: None,
        };

        let result = enrollment_service(db).evaluate("u1", "e1", input).await;

        assert!(matches!(result, Err(AppError::AlreadyRated)));
    }
}
