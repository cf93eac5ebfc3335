//! Notification service.

use coursehub_common::{AppError, AppResult, IdGenerator};
use coursehub_db::{
    entities::{
        ReviewStatus,
        notification::{self, NotificationType},
    },
    repositories::NotificationRepository,
};
use sea_orm::Set;

/// Notification service for business logic.
#[derive(Clone)]
pub struct NotificationService {
    notification_repo: NotificationRepository,
    id_gen: IdGenerator,
}

impl NotificationService {
    /// Create a new notification service.
    #[must_use]
    pub const fn new(notification_repo: NotificationRepository) -> Self {
        Self {
            notification_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Create a notification for a user.
    pub async fn create(
        &self,
        user_id: &str,
        notification_type: NotificationType,
        title: &str,
        content: Option<String>,
        related_id: Option<&str>,
    ) -> AppResult<notification::Model> {
        let model = notification::ActiveModel {
            id: Set(self.id_gen.generate()),
            user_id: Set(user_id.to_string()),
            notification_type: Set(notification_type),
            title: Set(title.to_string()),
            content: Set(content),
            related_id: Set(related_id.map(String::from)),
            is_read: Set(false),
            created_at: Set(chrono::Utc::now().into()),
        };

        self.notification_repo.create(model).await
    }

    /// Tell a requester how their request was decided.
    pub async fn notify_review(
        &self,
        user_id: &str,
        kind: &str,
        status: ReviewStatus,
        note: Option<String>,
        request_id: &str,
    ) -> AppResult<notification::Model> {
        let verdict = match status {
            ReviewStatus::Approved => "approved",
            ReviewStatus::Rejected => "rejected",
            ReviewStatus::Cancelled => "cancelled",
            ReviewStatus::Pending => "pending",
        };
        let title = format!("Your {kind} was {verdict}");

        self.create(
            user_id,
            NotificationType::RequestReviewed,
            &title,
            note,
            Some(request_id),
        )
        .await
    }

    /// Tell a user their balance changed.
    pub async fn notify_credit_change(
        &self,
        user_id: &str,
        delta: i64,
        balance_after: i64,
        record_id: &str,
    ) -> AppResult<notification::Model> {
        let title = if delta >= 0 {
            format!("You received {delta} credits")
        } else {
            format!("{} credits were taken from your account", -delta)
        };

        self.create(
            user_id,
            NotificationType::CreditChanged,
            &title,
            Some(format!("Balance: {balance_after}")),
            Some(record_id),
        )
        .await
    }

    /// Get notifications for a user.
    pub async fn get_notifications(
        &self,
        user_id: &str,
        limit: u64,
        until_id: Option<&str>,
        unread_only: bool,
    ) -> AppResult<Vec<notification::Model>> {
        self.notification_repo
            .find_by_user(user_id, limit.min(100), until_id, unread_only)
            .await
    }

    /// Mark a notification as read.
    pub async fn mark_as_read(&self, user_id: &str, notification_id: &str) -> AppResult<()> {
        if self
            .notification_repo
            .mark_as_read(user_id, notification_id)
            .await?
        {
            Ok(())
        } else {
            Err(AppError::NotFound(format!(
                "Notification {notification_id}"
            )))
        }
    }

    /// Mark all notifications as read for a user.
    pub async fn mark_all_as_read(&self, user_id: &str) -> AppResult<u64> {
        self.notification_repo.mark_all_as_read(user_id).await
    }

    /// Count unread notifications for a user.
    pub async fn count_unread(&self, user_id: &str) -> AppResult<u64> {
        self.notification_repo.count_unread(user_id).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};
    use std::sync::Arc;

    fn stored(title: &str) -> notification::Model {
        notification::Model {
            id: "n1".to_string(),
            user_id: "u1".to_string(),
            notification_type: NotificationType::RequestReviewed,
            title: title.to_string(),
            content: None,
            related_id: Some("r1".to_string()),
            is_read: false,
            created_at: chrono::Utc::now().into(),
        }
    }

    #[tokio::test]
    async fn test_notify_review() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[stored("Your credit request was approved")]])
            .into_connection();

        let service = NotificationService::new(NotificationRepository::new(Arc::new(db)));
        let result = service
            .notify_review("u1", "credit request", ReviewStatus::Approved, None, "r1")
            .await
            .unwrap();

        assert_eq!(result.notification_type, NotificationType::RequestReviewed);
        assert_eq!(result.related_id.as_deref(), Some("r1"));
    }

    #[tokio::test]
    async fn test_mark_foreign_notification_read() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 0,
            }])
            .into_connection();

        let service = NotificationService::new(NotificationRepository::new(Arc::new(db)));
        let result = service.mark_as_read("u1", "someone-elses").await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}
