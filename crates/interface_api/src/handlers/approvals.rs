//! Approval handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use uuid::Uuid;
use validator::Validate;

use core_kernel::{ApprovalRequestId, ClaimId, Money, Role, TenantContext};
use domain_claims::ApprovalDecision;

use crate::dto::{ApprovalResponse, DecisionRequest, OpenApprovalRequest};
use crate::error::ApiError;
use crate::AppState;

/// Opens an approval request on a claim
pub async fn open_approval(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Path(id): Path<Uuid>,
    Json(request): Json<OpenApprovalRequest>,
) -> Result<(StatusCode, Json<ApprovalResponse>), ApiError> {
    ctx.require_role(Role::Analyst)?;
    request.validate()?;

    let opened = state
        .engine
        .gate()
        .request(
            &ctx,
            ClaimId::from(id),
            request.action,
            Money::new(request.impact, request.currency),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(opened.into())))
}

/// Records a human decision on an approval request
pub async fn decide_approval(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Path(id): Path<Uuid>,
    Json(request): Json<DecisionRequest>,
) -> Result<Json<ApprovalResponse>, ApiError> {
    request.validate()?;
    let decision = match request.decision.as_str() {
        "approved" => ApprovalDecision::Approved,
        "rejected" => ApprovalDecision::Rejected,
        other => {
            return Err(ApiError::BadRequest(format!(
                "unknown decision `{other}`; expected `approved` or `rejected`"
            )));
        }
    };

    let decided = state
        .engine
        .gate()
        .decide(&ctx, ApprovalRequestId::from(id), decision, request.rationale)
        .await?;
    Ok(Json(decided.into()))
}

/// The pending approval queue for the caller's tenant scope
pub async fn list_pending(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
) -> Result<Json<Vec<ApprovalResponse>>, ApiError> {
    let pending = state.engine.pending_approvals(&ctx).await?;
    Ok(Json(pending.into_iter().map(Into::into).collect()))
}
