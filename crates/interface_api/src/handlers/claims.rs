//! Claim handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use uuid::Uuid;
use validator::Validate;

use core_kernel::{ClaimId, Money, Role, TenantContext};
use domain_workflow::Disposition;

use crate::dto::{
    AdvanceResponse, ClaimResponse, CorrectAmountsRequest, DispositionRequest,
    IntakeClaimRequest, OverrideStageRequest, RecordsResponse,
};
use crate::error::ApiError;
use crate::AppState;

/// Registers a new denied claim
pub async fn intake_claim(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Json(request): Json<IntakeClaimRequest>,
) -> Result<(StatusCode, Json<ClaimResponse>), ApiError> {
    ctx.require_role(Role::Analyst)?;
    request.validate()?;

    let claim = state.engine.intake(&ctx, request.into_new_claim()).await?;
    Ok((StatusCode::CREATED, Json(ClaimResponse::from_claim(claim))))
}

/// Lists claims in the caller's tenant scope
pub async fn list_claims(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
) -> Result<Json<Vec<ClaimResponse>>, ApiError> {
    let claims = state.engine.claims(&ctx).await?;
    Ok(Json(claims.into_iter().map(ClaimResponse::from_claim).collect()))
}

/// Gets a claim by ID
pub async fn get_claim(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<ClaimResponse>, ApiError> {
    let claim = state.engine.claim(&ctx, ClaimId::from(id)).await?;
    Ok(Json(ClaimResponse::from_claim(claim)))
}

/// Drives one stage transition
pub async fn advance_claim(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<AdvanceResponse>, ApiError> {
    ctx.require_role(Role::Analyst)?;
    let outcome = state.engine.advance(&ctx, ClaimId::from(id)).await?;
    Ok(Json(outcome.into()))
}

/// The claim's stage records, in sequence order
pub async fn get_records(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<RecordsResponse>, ApiError> {
    let records = state.engine.records(&ctx, ClaimId::from(id)).await?;
    Ok(Json(RecordsResponse { records }))
}

/// Records a terminal outcome for the claim
pub async fn record_disposition(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Path(id): Path<Uuid>,
    Json(request): Json<DispositionRequest>,
) -> Result<Json<ClaimResponse>, ApiError> {
    request.validate()?;
    let recovered = request.recovered_money()?;

    let claim = state
        .engine
        .record_disposition(
            &ctx,
            ClaimId::from(id),
            Disposition {
                stage: request.stage,
                reason: request.reason,
                recovered,
            },
        )
        .await?;
    Ok(Json(ClaimResponse::from_claim(claim)))
}

/// Audited correction of the denied/approved amounts
pub async fn correct_amounts(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Path(id): Path<Uuid>,
    Json(request): Json<CorrectAmountsRequest>,
) -> Result<Json<ClaimResponse>, ApiError> {
    request.validate()?;
    let claim = state
        .engine
        .correct_amounts(
            &ctx,
            ClaimId::from(id),
            Money::new(request.denied, request.currency),
            Money::new(request.approved, request.currency),
        )
        .await?;
    Ok(Json(ClaimResponse::from_claim(claim)))
}

/// Skips the claim to another non-terminal stage
pub async fn override_stage(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Path(id): Path<Uuid>,
    Json(request): Json<OverrideStageRequest>,
) -> Result<Json<ClaimResponse>, ApiError> {
    request.validate()?;
    let claim = state
        .engine
        .override_stage(&ctx, ClaimId::from(id), request.stage, request.reason)
        .await?;
    Ok(Json(ClaimResponse::from_claim(claim)))
}
