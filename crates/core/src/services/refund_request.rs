//! Refund request workflow: give back the credits paid for an enrollment.

use std::sync::Arc;

use crate::services::{
    credit::{CreditService, LedgerContext, LedgerOp},
    review::{self, ReviewDecision},
};
use coursehub_common::{AppError, AppResult, IdGenerator};
use coursehub_db::{
    entities::{ReviewStatus, enrollment::EnrollmentStatus, refund_request, user},
    repositories::{
        CourseRepository, EnrollmentRepository, RefundRequestRepository, ReviewFilter,
        ReviewUpdate,
    },
};
use sea_orm::{DatabaseConnection, Set, TransactionTrait};
use serde::Deserialize;
use tracing::info;
use validator::Validate;

/// Input for asking for a refund.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateRefundRequestInput {
    #[validate(length(min = 1))]
    pub enrollment_id: String,

    #[validate(length(max = 1000))]
    pub reason: Option<String>,
}

fn closed(request: refund_request::Model, update: &ReviewUpdate) -> refund_request::Model {
    refund_request::Model {
        status: update.status,
        reviewer_id: update.reviewer_id.clone(),
        review_note: update.note.clone(),
        reviewed_at: Some(update.closed_at),
        ..request
    }
}

/// Refund request service.
#[derive(Clone)]
pub struct RefundRequestService {
    db: Arc<DatabaseConnection>,
    request_repo: RefundRequestRepository,
    enrollment_repo: EnrollmentRepository,
    course_repo: CourseRepository,
    credit_service: CreditService,
    id_gen: IdGenerator,
}

impl RefundRequestService {
    /// Create a new refund request service.
    #[must_use]
    pub const fn new(
        db: Arc<DatabaseConnection>,
        request_repo: RefundRequestRepository,
        enrollment_repo: EnrollmentRepository,
        course_repo: CourseRepository,
        credit_service: CreditService,
    ) -> Self {
        Self {
            db,
            request_repo,
            enrollment_repo,
            course_repo,
            credit_service,
            id_gen: IdGenerator::new(),
        }
    }

    /// Ask for the credits of an own, active, paid enrollment.
    pub async fn create(
        &self,
        user_id: &str,
        input: CreateRefundRequestInput,
    ) -> AppResult<refund_request::Model> {
        input.validate()?;

        let enrollment = self.enrollment_repo.get_by_id(&input.enrollment_id).await?;
        if enrollment.user_id != user_id {
            return Err(AppError::Forbidden("Not your enrollment".to_string()));
        }
        if enrollment.status != EnrollmentStatus::Enrolled {
            return Err(AppError::BadRequest(
                "Only active enrollments can be refunded".to_string(),
            ));
        }
        if enrollment.credit_cost <= 0 {
            return Err(AppError::BadRequest("Nothing to refund".to_string()));
        }
        if self
            .request_repo
            .find_pending_by_enrollment(&enrollment.id)
            .await?
            .is_some()
        {
            return Err(AppError::DuplicatePendingRequest);
        }

        let model = refund_request::ActiveModel {
            id: Set(self.id_gen.generate()),
            user_id: Set(user_id.to_string()),
            enrollment_id: Set(enrollment.id),
            amount: Set(enrollment.credit_cost),
            reason: Set(input.reason),
            status: Set(ReviewStatus::Pending),
            reviewer_id: Set(None),
            review_note: Set(None),
            created_at: Set(chrono::Utc::now().into()),
            reviewed_at: Set(None),
        };

        self.request_repo.create(model).await
    }

    /// Approve (refund, release the seat) or reject a request.
    pub async fn review(
        &self,
        reviewer: &user::Model,
        id: &str,
        decision: ReviewDecision,
    ) -> AppResult<refund_request::Model> {
        let request = self.request_repo.get_by_id(id).await?;
        let update = review::decide(request.status, &reviewer.id, &decision)?;

        let txn = self.db.begin().await?;
        review::ensure_closed(self.request_repo.close(&txn, id, &update).await?)?;

        if update.status == ReviewStatus::Approved {
            let enrollment = self.enrollment_repo.get_by_id(&request.enrollment_id).await?;
            let refunded = self
                .enrollment_repo
                .transition(
                    &txn,
                    &enrollment.id,
                    EnrollmentStatus::Enrolled,
                    EnrollmentStatus::Refunded,
                )
                .await?;
            if !refunded {
                return Err(AppError::BadRequest(
                    "Enrollment is no longer active".to_string(),
                ));
            }
            self.course_repo
                .release_seat(&txn, &enrollment.course_id)
                .await?;

            let ctx = LedgerContext::new(&reviewer.id, Some("Refund approved".to_string()))
                .related_to(&enrollment.id);
            self.credit_service
                .apply_in(&txn, &request.user_id, LedgerOp::Refund, request.amount, ctx)
                .await?;
        }
        txn.commit().await?;

        info!(request_id = %id, status = update.status.as_str(), "Reviewed refund request");
        Ok(closed(request, &update))
    }

    /// Withdraw an own pending request.
    pub async fn cancel(&self, user_id: &str, id: &str) -> AppResult<refund_request::Model> {
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
    pub async fn get(&self, id: &str) -> AppResult<refund_request::Model> {
        self.request_repo.get_by_id(id).await
    }

    /// Requests matching `filter`, newest first.
    pub async fn list(
        &self,
        filter: &ReviewFilter,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<refund_request::Model>> {
        self.request_repo.list(filter, limit.min(100), offset).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::{
        course::tests::test_user,
        credit::tests::statements,
        enrollment::tests::{test_account, test_enrollment},
    };
    use chrono::Utc;
    use coursehub_db::{
        entities::{credit, credit_record, enrollment, user::Role},
        repositories::CreditRepository,
    };
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult, Value};

    fn service_over(db: &Arc<DatabaseConnection>) -> RefundRequestService {
        let credit = CreditService::new(db.clone(), CreditRepository::new(db.clone()), 0);
        RefundRequestService::new(
            db.clone(),
            RefundRequestRepository::new(db.clone()),
            EnrollmentRepository::new(db.clone()),
            CourseRepository::new(db.clone()),
            credit,
        )
    }

    fn service(db: MockDatabase) -> RefundRequestService {
        service_over(&Arc::new(db.into_connection()))
    }

    fn exec(rows_affected: u64) -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected,
        }
    }

    fn pending(id: &str) -> refund_request::Model {
        refund_request::Model {
            id: id.to_string(),
            user_id: "u1".to_string(),
            enrollment_id: "e1".to_string(),
            amount: 10,
            reason: None,
            status: ReviewStatus::Pending,
            reviewer_id: None,
            review_note: None,
            created_at: Utc::now().into(),
            reviewed_at: None,
        }
    }

    fn approve() -> ReviewDecision {
        ReviewDecision {
            approved: true,
            note: None,
        }
    }

    fn input() -> CreateRefundRequestInput {
        CreateRefundRequestInput {
            enrollment_id: "e1".to_string(),
            reason: None,
        }
    }

    #[tokio::test]
    async fn test_refund_foreign_enrollment() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[test_enrollment("e1", "someone-else")]]);

        let result = service(db).create("u1", input()).await;

        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_refund_trial_enrollment() {
        let trial = enrollment::Model {
            credit_cost: 0,
            is_trial: true,
            ..test_enrollment("e1", "u1")
        };
        let db = MockDatabase::new(DatabaseBackend::Postgres).append_query_results([[trial]]);

        let result = service(db).create("u1", input()).await;

        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_refund_completed_enrollment() {
        let done = enrollment::Model {
            status: EnrollmentStatus::Completed,
            ..test_enrollment("e1", "u1")
        };
        let db = MockDatabase::new(DatabaseBackend::Postgres).append_query_results([[done]]);

        let result = service(db).create("u1", input()).await;

        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_approve_refund_returns_credits_and_seat() {
        let spent = credit::Model {
            total: 20,
            used: 10,
            personal_balance: 0,
            ..test_account("u1", 10)
        };
        let refunded = credit::Model {
            balance: 20,
            used: 0,
            ..spent.clone()
        };
        let record = credit_record::Model {
            id: "rec1".to_string(),
            credit_id: spent.id.clone(),
            user_id: "u1".to_string(),
            record_type: LedgerOp::Refund.record_type(),
            amount: 10,
            balance_after: 20,
            remark: None,
            operator_id: Some("staff1".to_string()),
            related_id: Some("e1".to_string()),
            created_at: Utc::now().into(),
        };
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[pending("r1")]])
                .append_exec_results([exec(1)])
                .append_query_results([[test_enrollment("e1", "u1")]])
                .append_exec_results([exec(1), exec(1)])
                .append_query_results([[spent]])
                .append_query_results([[refunded]])
                .append_query_results([[record]])
                .into_connection(),
        );
        let staff = test_user("staff1", Role::Staff);

        let refunds = service_over(&db);
        let request = refunds.review(&staff, "r1", approve()).await.unwrap();
        drop(refunds);

        assert_eq!(request.status, ReviewStatus::Approved);
        assert_eq!(request.reviewer_id.as_deref(), Some("staff1"));

        let stmts = statements(db);
        let enrollment_update = stmts
            .iter()
            .find(|s| s.sql.starts_with(r#"UPDATE "enrollment""#))
            .unwrap();
        let values = &enrollment_update.values.as_ref().unwrap().0;
        assert_eq!(values[0], Value::from("REFUNDED"));
        assert!(values.contains(&Value::from("ENROLLED")));
        assert!(stmts.iter().any(|s| {
            s.sql.starts_with(r#"UPDATE "course" SET "enrolled_count""#) && s.sql.contains(" - ")
        }));
        let record_insert = stmts
            .iter()
            .find(|s| s.sql.starts_with(r#"INSERT INTO "credit_record""#))
            .unwrap();
        let values = &record_insert.values.as_ref().unwrap().0;
        assert_eq!(values[3], Value::from("REFUND"));
        assert_eq!(values[4], Value::from(10i64));
    }

    #[tokio::test]
    async fn test_second_reviewer_loses() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[pending("r1")]])
            .append_exec_results([exec(0)]);
        let staff = test_user("staff2", Role::Staff);

        let result = service(db).review(&staff, "r1", approve()).await;

        assert!(matches!(result, Err(AppError::RequestAlreadyProcessed(_))));
    }

    #[tokio::test]
    async fn test_review_closed_request() {
        let done = refund_request::Model {
            status: ReviewStatus::Rejected,
            ..pending("r1")
        };
        let db = MockDatabase::new(DatabaseBackend::Postgres).append_query_results([[done]]);
        let staff = test_user("staff1", Role::Staff);

        let result = service(db).review(&staff, "r1", approve()).await;

        assert!(matches!(result, Err(AppError::RequestAlreadyProcessed(_))));
    }
}
