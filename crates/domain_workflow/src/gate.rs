//! Approval gate: pending human decisions over irreversible actions
//!
//! No transition with nonzero financial impact commits without a terminal
//! `Approved` decision. The gate owns opening requests, recording decisions,
//! and the expiry sweep; every one of those writes a stage record so the
//! audit trail shows who held the pen.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use core_kernel::{ApprovalRequestId, ClaimId, Money, Role, TenantContext};
use domain_claims::{
    ApprovalAction, ApprovalDecision, ApprovalRequest, Claim, Stage, StageOutcome, StageOutput,
    StageRecord,
};
use domain_claims::record::ActorRef;
use infra_store::RecoveryStore;

use crate::error::EngineError;

pub struct ApprovalGate {
    store: Arc<dyn RecoveryStore>,
    expiry: chrono::Duration,
}

impl ApprovalGate {
    pub fn new(store: Arc<dyn RecoveryStore>, expiry: chrono::Duration) -> Self {
        Self { store, expiry }
    }

    /// Opens an approval request for a gated action, or returns the one
    /// already open for the same (claim, action) pair
    pub async fn request(
        &self,
        ctx: &TenantContext,
        claim_id: ClaimId,
        action: ApprovalAction,
        impact: Money,
    ) -> Result<ApprovalRequest, EngineError> {
        let claim = self.store.get_claim(ctx, claim_id).await?;
        let request = ApprovalRequest::new(
            claim.tenant_id,
            claim.hospital_id,
            claim.id,
            action,
            impact,
            Utc::now() + self.expiry,
        );
        let request_id = request.id;
        let stored = self.store.open_approval(ctx, request).await?;
        if stored.id != request_id {
            // Idempotent re-request; the original record already exists
            return Ok(stored);
        }

        let record = self
            .gate_record(&claim, ActorRef::from(&ctx.actor), StageOutcome::Success)
            .with_output(StageOutput::ApprovalRequested {
                request_id: stored.id,
                action: action.name().to_string(),
                impact,
            });
        self.commit(ctx, &claim, record).await?;
        info!(claim = %claim.id, request = %stored.id, %action, "approval requested");
        Ok(stored)
    }

    /// Records a human decision on an open request
    ///
    /// A rejected `SubmitAppeal` closes the claim as `Failed`; an approved
    /// `WriteOff` closes it as `WrittenOff`. Other decisions leave the stage
    /// alone and the engine (or a gated operation) acts on them.
    pub async fn decide(
        &self,
        ctx: &TenantContext,
        request_id: ApprovalRequestId,
        decision: ApprovalDecision,
        rationale: Option<String>,
    ) -> Result<ApprovalRequest, EngineError> {
        ctx.require_role(Role::Approver)?;
        let mut request = self.store.get_approval(ctx, request_id).await?;
        let claim = self.store.get_claim(ctx, request.claim_id).await?;

        let now = Utc::now();
        request.decide(decision, ctx.actor.id, rationale.clone(), now)?;
        self.store.update_approval(ctx, request.clone()).await?;

        let mut record = self
            .gate_record(&claim, ActorRef::from(&ctx.actor), StageOutcome::Success)
            .with_output(StageOutput::ApprovalDecided {
                request_id: request.id,
                decision: format!("{decision:?}").to_lowercase(),
                decided_by: ctx.actor.id,
                rationale,
            });
        if let Some(target) = Self::stage_after_decision(&claim, &request) {
            record = record.with_resulting_stage(target);
        }
        self.commit(ctx, &claim, record).await?;
        info!(
            claim = %claim.id,
            request = %request.id,
            action = %request.action,
            ?decision,
            "approval decided"
        );
        Ok(request)
    }

    /// Expires every open request past its deadline; expiry is a rejection
    ///
    /// Runs with a per-tenant system context, so the isolation guard still
    /// applies to each write.
    pub async fn expire_sweep(&self, now: DateTime<Utc>) -> Result<Vec<ApprovalRequest>, EngineError> {
        let mut expired = Vec::new();
        for mut request in self.store.approvals_past_expiry(now).await? {
            let ctx = TenantContext::system(request.tenant_id, request.hospital_id);
            request.expire(now)?;
            self.store.update_approval(&ctx, request.clone()).await?;

            let claim = self.store.get_claim(&ctx, request.claim_id).await?;
            let actor = ActorRef::system();
            let mut record = self
                .gate_record(
                    &claim,
                    actor,
                    StageOutcome::failed_policy("approval request expired"),
                )
                .with_output(StageOutput::ApprovalDecided {
                    request_id: request.id,
                    decision: "expired".to_string(),
                    decided_by: actor.id,
                    rationale: None,
                });
            if let Some(target) = Self::stage_after_decision(&claim, &request) {
                record = record.with_resulting_stage(target);
            }
            self.commit(&ctx, &claim, record).await?;
            warn!(claim = %claim.id, request = %request.id, "approval request expired");
            expired.push(request);
        }
        Ok(expired)
    }

    /// The latest `Approved` request for a (claim, action) pair, required by
    /// gated operations before they execute
    pub async fn require_approved(
        &self,
        ctx: &TenantContext,
        claim_id: ClaimId,
        action: ApprovalAction,
    ) -> Result<ApprovalRequest, EngineError> {
        match self.store.latest_approval(ctx, claim_id, action).await? {
            Some(request) if request.decision == ApprovalDecision::Approved => Ok(request),
            _ => Err(EngineError::ApprovalRequired {
                claim: claim_id.to_string(),
                action: action.name().to_string(),
            }),
        }
    }

    fn stage_after_decision(claim: &Claim, request: &ApprovalRequest) -> Option<Stage> {
        if claim.stage != Stage::PendingApproval {
            return None;
        }
        match (request.action, request.decision) {
            (ApprovalAction::SubmitAppeal, ApprovalDecision::Rejected)
            | (ApprovalAction::SubmitAppeal, ApprovalDecision::Expired) => Some(Stage::Failed),
            (ApprovalAction::WriteOff, ApprovalDecision::Approved) => Some(Stage::WrittenOff),
            _ => None,
        }
    }

    fn gate_record(&self, claim: &Claim, actor: ActorRef, outcome: StageOutcome) -> StageRecord {
        let mut record = StageRecord::new(
            claim.tenant_id,
            claim.hospital_id,
            claim.id,
            claim.stage,
            claim.attempt + 1,
            actor,
            outcome,
            Utc::now(),
        );
        record.sequence = claim.last_sequence + 1;
        record
    }

    async fn commit(
        &self,
        ctx: &TenantContext,
        claim: &Claim,
        record: StageRecord,
    ) -> Result<Claim, EngineError> {
        let mut updated = claim.clone();
        updated.apply_record(&record)?;
        Ok(self
            .store
            .commit_stage(ctx, updated, record, claim.version)
            .await?)
    }
}
