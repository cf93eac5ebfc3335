//! Credit request workflow: a user asks for credits, a reviewer decides.

use std::sync::Arc;

use crate::services::{
    credit::{CreditService, LedgerContext, LedgerOp},
    review::{self, ReviewDecision},
};
use coursehub_common::{AppError, AppResult, IdGenerator};
use coursehub_db::{
    entities::{ReviewStatus, credit_request, user},
    repositories::{CreditRequestRepository, ReviewFilter, ReviewUpdate},
};
use sea_orm::{DatabaseConnection, Set, TransactionTrait};
use serde::Deserialize;
use tracing::info;
use validator::Validate;

/// Input for asking for credits.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCreditRequestInput {
    /// Non-positive amounts fail with `InvalidCreditAmount`.
    #[validate(range(max = 1_000_000_000))]
    pub amount: i64,

    #[validate(length(max = 1000))]
    pub reason: Option<String>,
}

fn closed(request: credit_request::Model, update: &ReviewUpdate) -> credit_request::Model {
    credit_request::Model {
        status: update.status,
        reviewer_id: update.reviewer_id.clone(),
        review_note: update.note.clone(),
        reviewed_at: Some(update.closed_at),
        ..request
    }
}

/// Credit request service.
#[derive(Clone)]
pub struct CreditRequestService {
    db: Arc<DatabaseConnection>,
    request_repo: CreditRequestRepository,
    credit_service: CreditService,
    id_gen: IdGenerator,
}

impl CreditRequestService {
    /// Create a new credit request service.
    #[must_use]
    pub const fn new(
        db: Arc<DatabaseConnection>,
        request_repo: CreditRequestRepository,
        credit_service: CreditService,
    ) -> Self {
        Self {
            db,
            request_repo,
            credit_service,
            id_gen: IdGenerator::new(),
        }
    }

    /// Open a request. A user can have one pending credit request at a time.
    pub async fn create(
        &self,
        user_id: &str,
        input: CreateCreditRequestInput,
    ) -> AppResult<credit_request::Model> {
        if input.amount <= 0 {
            return Err(AppError::InvalidCreditAmount(input.amount));
        }
        input.validate()?;

        if self.request_repo.has_pending(user_id).await? {
            return Err(AppError::DuplicatePendingRequest);
        }

        let model = credit_request::ActiveModel {
            id: Set(self.id_gen.generate()),
            user_id: Set(user_id.to_string()),
            amount: Set(input.amount),
            reason: Set(input.reason),
            status: Set(ReviewStatus::Pending),
            reviewer_id: Set(None),
            review_note: Set(None),
            created_at: Set(chrono::Utc::now().into()),
            reviewed_at: Set(None),
        };

        self.request_repo.create(model).await
    }

    /// Approve (allocating the amount) or reject a request.
    pub async fn review(
        &self,
        reviewer: &user::Model,
        id: &str,
        decision: ReviewDecision,
    ) -> AppResult<credit_request::Model> {
        let request = self.request_repo.get_by_id(id).await?;
        let update = review::decide(request.status, &reviewer.id, &decision)?;

        let txn = self.db.begin().await?;
        review::ensure_closed(self.request_repo.close(&txn, id, &update).await?)?;
        if update.status == ReviewStatus::Approved {
            let ctx = LedgerContext::new(&reviewer.id, Some("Credit request approved".to_string()))
                .related_to(id);
            self.credit_service
                .apply_in(&txn, &request.user_id, LedgerOp::Allocate, request.amount, ctx)
                .await?;
        }
        txn.commit().await?;

        info!(request_id = %id, status = update.status.as_str(), "Reviewed credit request");
        Ok(closed(request, &update))
    }

    /// Withdraw an own pending request.
    pub async fn cancel(&self, user_id: &str, id: &str) -> AppResult<credit_request::Model> {
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
    pub async fn get(&self, id: &str) -> AppResult<credit_request::Model> {
        self.request_repo.get_by_id(id).await
    }

    /// Requests matching `filter`, newest first.
    pub async fn list(
        &self,
        filter: &ReviewFilter,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<credit_request::Model>> {
        self.request_repo.list(filter, limit.min(100), offset).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::{
        course::tests::test_user,
        enrollment::tests::{test_account, test_record},
    };
    use coursehub_db::{
        entities::{credit, user::Role},
        repositories::CreditRepository,
    };
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn test_request(status: ReviewStatus) -> credit_request::Model {
        credit_request::Model {
            id: "r1".to_string(),
            user_id: "u1".to_string(),
            amount: 50,
            reason: None,
            status,
            reviewer_id: None,
            review_note: None,
            created_at: chrono::Utc::now().into(),
            reviewed_at: None,
        }
    }

    fn service(db: MockDatabase) -> CreditRequestService {
        let db = Arc::new(db.into_connection());
        let credit = CreditService::new(db.clone(), CreditRepository::new(db.clone()), 0);
        CreditRequestService::new(db.clone(), CreditRequestRepository::new(db), credit)
    }

    fn rows(n: u64) -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected: n,
        }
    }

    #[tokio::test]
    async fn test_create_non_positive_amount() {
        let input = CreateCreditRequestInput {
            amount: 0,
            reason: None,
        };

        let result = service(MockDatabase::new(DatabaseBackend::Postgres))
            .create("u1", input)
            .await;

        assert!(matches!(result, Err(AppError::InvalidCreditAmount(0))));
    }

    #[tokio::test]
    async fn test_create_huge_amount() {
        let input = CreateCreditRequestInput {
            amount: i64::MAX,
            reason: None,
        };

        let result = service(MockDatabase::new(DatabaseBackend::Postgres))
            .create("u1", input)
            .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_create_with_pending_request() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[test_request(ReviewStatus::Pending)]]);
        let input = CreateCreditRequestInput {
            amount: 20,
            reason: None,
        };

        let result = service(db).create("u1", input).await;

        assert!(matches!(result, Err(AppError::DuplicatePendingRequest)));
    }

    #[tokio::test]
    async fn test_review_processed_request() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[test_request(ReviewStatus::Rejected)]]);
        let admin = test_user("admin", Role::Admin);
        let decision = ReviewDecision {
            approved: true,
            note: None,
        };

        let result = service(db).review(&admin, "r1", decision).await;

        assert!(matches!(result, Err(AppError::RequestAlreadyProcessed(_))));
    }

    #[tokio::test]
    async fn test_approve_allocates_credit() {
        let after = credit::Model {
            balance: 50,
            total: 50,
            personal_balance: 50,
            ..test_account("u1", 0)
        };
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[test_request(ReviewStatus::Pending)]])
            .append_exec_results([rows(1)])
            .append_query_results([[test_account("u1", 0)]])
            .append_query_results([[after]])
            .append_query_results([[test_record("u1", 50, 50)]]);
        let admin = test_user("admin", Role::Admin);
        let decision = ReviewDecision {
            approved: true,
            note: Some("ok".to_string()),
        };

        let request = service(db).review(&admin, "r1", decision).await.unwrap();

        assert_eq!(request.status, ReviewStatus::Approved);
        assert_eq!(request.reviewer_id.as_deref(), Some("admin"));
    }

    #[tokio::test]
    async fn test_concurrent_review_loses() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[test_request(ReviewStatus::Pending)]])
            .append_exec_results([rows(0)]);
        let admin = test_user("admin", Role::Admin);
        let decision = ReviewDecision {
            approved: true,
            note: None,
        };

        let result = service(db).review(&admin, "r1", decision).await;

        assert!(matches!(result, Err(AppError::RequestAlreadyProcessed(_))));
    }

    #[tokio::test]
    async fn test_cancel_by_other_user() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[test_request(ReviewStatus::Pending)]]);

        let result = service(db).cancel("u2", "r1").await;

        assert!(matches!(result, Err(AppError::RequestNotOwned)));
    }
}
