//! Credit ledger endpoints.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use coursehub_common::AppResult;
use coursehub_core::{GiftResult, LedgerResult, services::permission as perm};
use coursehub_db::entities::{credit, credit_record};
use serde::Deserialize;
use validator::Validate;

use super::notify_credit_change;
use crate::{
    extractors::{AuthUser, Cursor},
    middleware::AppState,
    response::ApiResponse,
};

/// Operator adjustment of a user's balance.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AdjustRequest {
    #[validate(length(min = 1))]
    pub user_id: String,
    #[validate(range(max = 1_000_000_000))]
    pub amount: i64,
    #[validate(length(max = 500))]
    pub remark: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GiftRequest {
    #[validate(length(min = 1))]
    pub to_user_id: String,
    #[validate(range(max = 1_000_000_000))]
    pub amount: i64,
    #[validate(length(max = 500))]
    pub remark: Option<String>,
}

/// Balance of the caller. Opens the account on first access.
async fn me(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<credit::Model>> {
    let account = state.credit_service.open_account(&user.id).await?;
    Ok(ApiResponse::ok(account))
}

async fn records(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Query(cursor): Query<Cursor>,
) -> AppResult<ApiResponse<Vec<credit_record::Model>>> {
    let records = state
        .credit_service
        .list_records(&user.id, cursor.limit, cursor.until_id.as_deref())
        .await?;
    Ok(ApiResponse::ok(records))
}

async fn of_user(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<credit::Model>> {
    state
        .permission_service
        .require(perm::CREDIT_VIEW_ALL, user.role)
        .await?;

    let account = state.credit_service.get_balance(&id).await?;
    Ok(ApiResponse::ok(account))
}

async fn allocate(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<AdjustRequest>,
) -> AppResult<ApiResponse<LedgerResult>> {
    req.validate()?;
    state
        .permission_service
        .require(perm::CREDIT_ALLOCATE, user.role)
        .await?;

    let result = state
        .credit_service
        .allocate(&user.id, &req.user_id, req.amount, req.remark)
        .await?;
    announce(&state, &result).await;

    Ok(ApiResponse::ok(result))
}

async fn deduct(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<AdjustRequest>,
) -> AppResult<ApiResponse<LedgerResult>> {
    req.validate()?;
    state
        .permission_service
        .require(perm::CREDIT_DEDUCT, user.role)
        .await?;

    let result = state
        .credit_service
        .deduct(&user.id, &req.user_id, req.amount, req.remark)
        .await?;
    announce(&state, &result).await;

    Ok(ApiResponse::ok(result))
}

async fn corporate_add(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<AdjustRequest>,
) -> AppResult<ApiResponse<LedgerResult>> {
    req.validate()?;
    state
        .permission_service
        .require(perm::CREDIT_CORPORATE, user.role)
        .await?;

    let result = state
        .credit_service
        .corporate_add(&user.id, &req.user_id, req.amount, req.remark)
        .await?;
    announce(&state, &result).await;

    Ok(ApiResponse::ok(result))
}

async fn corporate_deduct(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<AdjustRequest>,
) -> AppResult<ApiResponse<LedgerResult>> {
    req.validate()?;
    state
        .permission_service
        .require(perm::CREDIT_CORPORATE, user.role)
        .await?;

    let result = state
        .credit_service
        .corporate_deduct(&user.id, &req.user_id, req.amount, req.remark)
        .await?;
    announce(&state, &result).await;

    Ok(ApiResponse::ok(result))
}

/// Give personal credits to another user.
async fn gift(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<GiftRequest>,
) -> AppResult<ApiResponse<GiftResult>> {
    req.validate()?;

    let result = state
        .credit_service
        .gift(&user.id, &req.to_user_id, req.amount, req.remark)
        .await?;
    announce(&state, &result.receiver).await;

    Ok(ApiResponse::ok(result))
}

async fn announce(state: &AppState, result: &LedgerResult) {
    notify_credit_change(
        state,
        &result.record.user_id,
        result.record.amount,
        result.record.balance_after,
        &result.record.id,
    )
    .await;
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/me", get(me))
        .route("/records", get(records))
        .route("/users/{id}", get(of_user))
        .route("/allocate", post(allocate))
        .route("/deduct", post(deduct))
        .route("/corporate/add", post(corporate_add))
        .route("/corporate/deduct", post(corporate_deduct))
        .route("/gift", post(gift))
}
