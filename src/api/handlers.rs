use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use uuid::Uuid;

use super::models::{
    principal_from_headers, ApiError, CompleteBody, RejectBody, SubmitWithdrawalBody,
};
use super::routes::AppState;
use crate::audit::AuditLogEntry;
use crate::workflow::models::{Page, WithdrawalFilter, WithdrawalRequest};
use crate::workflow::SubmitWithdrawal;

pub async fn handle_submit_withdrawal(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<SubmitWithdrawalBody>,
) -> Result<(StatusCode, Json<WithdrawalRequest>), ApiError> {
    let principal = principal_from_headers(&headers);
    let (user_id, username) = principal
        .as_ref()
        .map(|p| (p.id.clone(), p.username.clone()))
        .unwrap_or_default();

    let request = state
        .workflow
        .submit(
            principal.as_ref(),
            SubmitWithdrawal {
                user_id,
                username,
                wallet_address: payload.wallet_address,
                amount: payload.amount,
                chain: payload.chain,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(request)))
}

pub async fn handle_list_withdrawals(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(filter): Query<WithdrawalFilter>,
) -> Result<Json<Page<WithdrawalRequest>>, ApiError> {
    let principal = principal_from_headers(&headers);
    let page = state.workflow.list(principal.as_ref(), &filter).await?;
    Ok(Json(page))
}

pub async fn handle_get_withdrawal(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<WithdrawalRequest>, ApiError> {
    let principal = principal_from_headers(&headers);
    let request = state.workflow.get(principal.as_ref(), id).await?;
    Ok(Json(request))
}

pub async fn handle_get_audit_log(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<AuditLogEntry>>, ApiError> {
    let principal = principal_from_headers(&headers);
    let entries = state.workflow.audit_trail(principal.as_ref(), id).await?;
    Ok(Json(entries))
}

pub async fn handle_approve_withdrawal(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<WithdrawalRequest>, ApiError> {
    let principal = principal_from_headers(&headers);
    let request = state.workflow.approve(principal.as_ref(), id).await?;
    Ok(Json(request))
}

pub async fn handle_reject_withdrawal(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<RejectBody>,
) -> Result<Json<WithdrawalRequest>, ApiError> {
    let principal = principal_from_headers(&headers);
    let request = state
        .workflow
        .reject(principal.as_ref(), id, &payload.reason)
        .await?;
    Ok(Json(request))
}

pub async fn handle_complete_withdrawal(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<CompleteBody>,
) -> Result<Json<WithdrawalRequest>, ApiError> {
    let principal = principal_from_headers(&headers);
    let request = state
        .workflow
        .complete(principal.as_ref(), id, &payload.tx_hash)
        .await?;
    Ok(Json(request))
}
