//! Review state machine shared by every request workflow.
//!
//! Credit, refund, enrollment and completion requests all move through the
//! same states. This module only decides whether a move is legal; the
//! per-request services apply the side effects.

use coursehub_common::{AppError, AppResult};
use coursehub_db::{entities::ReviewStatus, repositories::ReviewUpdate};
use serde::Deserialize;

/// What a reviewer or the requester wants to do with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewAction {
    Approve,
    Reject,
    Cancel,
}

/// Body of `POST /{kind}-requests/{id}/review`.
#[derive(Debug, Clone, Deserialize)]
pub struct ReviewDecision {
    pub approved: bool,
    pub note: Option<String>,
}

impl ReviewDecision {
    #[must_use]
    pub const fn action(&self) -> ReviewAction {
        if self.approved {
            ReviewAction::Approve
        } else {
            ReviewAction::Reject
        }
    }
}

/// Compute the status a request moves to.
///
/// `actor_is_owner` only matters for [`ReviewAction::Cancel`].
pub fn next_status(
    current: ReviewStatus,
    action: ReviewAction,
    actor_is_owner: bool,
) -> AppResult<ReviewStatus> {
    if action == ReviewAction::Cancel && !actor_is_owner {
        return Err(AppError::RequestNotOwned);
    }

    if current.is_terminal() {
        return Err(AppError::RequestAlreadyProcessed(
            current.as_str().to_string(),
        ));
    }

    Ok(match action {
        ReviewAction::Approve => ReviewStatus::Approved,
        ReviewAction::Reject => ReviewStatus::Rejected,
        ReviewAction::Cancel => ReviewStatus::Cancelled,
    })
}

/// Build the row update for a reviewer decision.
pub fn decide(
    current: ReviewStatus,
    reviewer_id: &str,
    decision: &ReviewDecision,
) -> AppResult<ReviewUpdate> {
    let status = next_status(current, decision.action(), false)?;
    Ok(ReviewUpdate {
        status,
        reviewer_id: Some(reviewer_id.to_string()),
        note: decision.note.clone(),
        closed_at: chrono::Utc::now().into(),
    })
}

/// Build the row update for a cancellation by the requester.
pub fn cancel(current: ReviewStatus, owner_id: &str, actor_id: &str) -> AppResult<ReviewUpdate> {
    let status = next_status(current, ReviewAction::Cancel, owner_id == actor_id)?;
    Ok(ReviewUpdate {
        status,
        reviewer_id: None,
        note: None,
        closed_at: chrono::Utc::now().into(),
    })
}

/// Fail if the conditional status write lost a race.
pub(crate) fn ensure_closed(closed: bool) -> AppResult<()> {
    if closed {
        Ok(())
    } else {
        Err(AppError::RequestAlreadyProcessed(
            "request was closed concurrently".to_string(),
        ))
    }
}
