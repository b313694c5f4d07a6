//! The workflow engine: one durable stage transition per call

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::{json, Value};
use tracing::{info, warn};

use core_kernel::{ApprovalRequestId, ClaimId, Money, Role, TenantContext};
use domain_claims::record::ActorRef;
use domain_claims::{
    ApprovalAction, ApprovalDecision, ApprovalRequest, Claim, ClaimDates, FinancialEffect, Stage,
    StageOutcome, StageOutput, StageRecord,
};
use domain_finance::{calculate, CalcInputs};
use infra_reasoning::{GatewayError, QualitativeOutput, ReasoningGateway, ReasoningService};
use infra_store::{EventPage, RecoveryStore};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::gate::ApprovalGate;
use crate::ports::{NotificationSink, SubmissionChannel, SubmissionError, SubmissionPackage};
use crate::retry::BackoffPolicy;
use crate::sla::Escalation;

/// Intake payload for registering a denied claim
#[derive(Debug, Clone)]
pub struct NewClaim {
    pub claim_number: String,
    pub payer: String,
    pub patient_ref: String,
    pub denial_reason_code: Option<String>,
    pub denial_reason_text: Option<String>,
    pub claimed: Money,
    pub denied: Money,
    pub approved: Money,
    pub dates: ClaimDates,
}

/// A human-recorded terminal outcome
#[derive(Debug, Clone)]
pub struct Disposition {
    pub stage: Stage,
    pub reason: String,
    /// Amount actually recovered; only meaningful with [`Stage::Recovered`]
    pub recovered: Option<Money>,
}

/// What one `advance` call did
#[derive(Debug)]
pub enum AdvanceOutcome {
    /// The claim moved to the next stage
    Advanced(Claim),
    /// A transient failure was recorded; retry after the given delay
    RetryScheduled { claim: Claim, retry_after: Duration },
    /// A policy failure (or exhausted retries) parked the claim for a human
    Escalated { claim: Claim, reason: String },
    /// The claim is waiting on an open approval request
    AwaitingApproval(ApprovalRequestId),
    /// The claim is parked and only a human action can move it
    AwaitingHuman,
    /// The appeal is filed; waiting on the payer's remittance
    AwaitingRemittance,
    /// The claim is already in a terminal stage
    Terminal(Stage),
}

pub struct WorkflowEngine {
    store: Arc<dyn RecoveryStore>,
    gateway: ReasoningGateway<Arc<dyn ReasoningService>>,
    submission: Arc<dyn SubmissionChannel>,
    notifications: Arc<dyn NotificationSink>,
    gate: ApprovalGate,
    backoff: BackoffPolicy,
    config: EngineConfig,
}

impl WorkflowEngine {
    pub fn new(
        store: Arc<dyn RecoveryStore>,
        reasoning: Arc<dyn ReasoningService>,
        gateway_config: infra_reasoning::GatewayConfig,
        submission: Arc<dyn SubmissionChannel>,
        notifications: Arc<dyn NotificationSink>,
        config: EngineConfig,
    ) -> Self {
        Self {
            gate: ApprovalGate::new(Arc::clone(&store), config.approval_expiry),
            gateway: ReasoningGateway::new(reasoning, gateway_config),
            backoff: BackoffPolicy::new(config.backoff_base, config.backoff_cap),
            store,
            submission,
            notifications,
            config,
        }
    }

    pub fn gate(&self) -> &ApprovalGate {
        &self.gate
    }

    /// Registers a denied claim; its intake state becomes the replay baseline
    pub async fn intake(&self, ctx: &TenantContext, new: NewClaim) -> Result<Claim, EngineError> {
        let mut claim = Claim::intake(
            ctx.tenant_id,
            ctx.hospital_id,
            new.claim_number,
            new.payer,
            new.patient_ref,
            new.claimed,
            new.denied,
            new.approved,
            new.dates,
        );
        claim.denial_reason_code = new.denial_reason_code;
        claim.denial_reason_text = new.denial_reason_text;
        self.store.insert_claim(ctx, claim.clone()).await?;
        info!(claim = %claim.id, tenant = %claim.tenant_id, "claim intake complete");
        Ok(claim)
    }

    /// Drives one stage transition
    ///
    /// Safe to call concurrently: the version check admits exactly one
    /// winner per transition, and losers retry on fresh state up to the
    /// configured bound.
    pub async fn advance(
        &self,
        ctx: &TenantContext,
        claim_id: ClaimId,
    ) -> Result<AdvanceOutcome, EngineError> {
        let mut conflicts = 0;
        loop {
            let claim = self.store.get_claim(ctx, claim_id).await?;
            match self.advance_once(ctx, &claim).await {
                Err(EngineError::Store(e)) if e.is_conflict() => {
                    if conflicts >= self.config.conflict_retries {
                        return Err(EngineError::Conflict(claim_id.to_string()));
                    }
                    conflicts += 1;
                    warn!(claim = %claim_id, conflicts, "stale commit, retrying on fresh state");
                }
                other => return other,
            }
        }
    }

    async fn advance_once(
        &self,
        ctx: &TenantContext,
        claim: &Claim,
    ) -> Result<AdvanceOutcome, EngineError> {
        if claim.is_terminal() {
            return Ok(AdvanceOutcome::Terminal(claim.stage));
        }
        match claim.stage {
            Stage::Intake => self.validate_denial(ctx, claim).await,
            Stage::Denied => self.classify(ctx, claim).await,
            Stage::Classified => self.extract(ctx, claim).await,
            Stage::Extracted => self.draft_appeal(ctx, claim).await,
            Stage::AppealDrafted => self.set_strategy(ctx, claim).await,
            Stage::StrategySet => self.open_submit_approval(ctx, claim).await,
            Stage::PendingApproval => self.resolve_pending(ctx, claim).await,
            Stage::Submitted => Ok(AdvanceOutcome::AwaitingRemittance),
            Stage::Recovered | Stage::Failed | Stage::WrittenOff => {
                Ok(AdvanceOutcome::Terminal(claim.stage))
            }
        }
    }

    // Intake -> Denied
    async fn validate_denial(
        &self,
        ctx: &TenantContext,
        claim: &Claim,
    ) -> Result<AdvanceOutcome, EngineError> {
        let started = Utc::now();
        if let Err(e) = claim.validate_denial_consistency() {
            return self
                .policy_failure(ctx, claim, ActorRef::system(), e.to_string(), started)
                .await;
        }

        let record = self
            .next_record(claim, claim.attempt + 1, ActorRef::system(), StageOutcome::Success, started)
            .with_output(StageOutput::DenialRecorded {
                reason_code: claim
                    .denial_reason_code
                    .clone()
                    .unwrap_or_else(|| "unspecified".to_string()),
                reason_text: claim.denial_reason_text.clone().unwrap_or_default(),
            })
            .with_resulting_stage(Stage::Denied);
        let claim = self.commit(ctx, claim, record).await?;
        Ok(AdvanceOutcome::Advanced(claim))
    }

    // Denied -> Classified
    async fn classify(
        &self,
        ctx: &TenantContext,
        claim: &Claim,
    ) -> Result<AdvanceOutcome, EngineError> {
        let started = Utc::now();
        let result = self.gateway.classify(reasoning_context(claim)).await;
        let parsed = result.and_then(|output| {
            let category = output.require_label()?.to_string();
            let confidence = output.require_confidence()?;
            let tier = output.require_tier()?;
            Ok((category, confidence, tier))
        });

        match parsed {
            Ok((category, confidence, tier)) => {
                if confidence < self.config.confidence_floor {
                    return self
                        .policy_failure(
                            ctx,
                            claim,
                            ActorRef::reasoning(),
                            format!(
                                "classification confidence {confidence} below floor {}",
                                self.config.confidence_floor
                            ),
                            started,
                        )
                        .await;
                }
                let record = self
                    .next_record(
                        claim,
                        claim.attempt + 1,
                        ActorRef::reasoning(),
                        StageOutcome::Success,
                        started,
                    )
                    .with_input(reasoning_context(claim))
                    .with_output(StageOutput::Classification {
                        category,
                        confidence,
                        tier: tier.name().to_string(),
                    })
                    .with_resulting_stage(Stage::Classified);
                let claim = self.commit(ctx, claim, record).await?;
                Ok(AdvanceOutcome::Advanced(claim))
            }
            Err(e) => self.gateway_failure(ctx, claim, e, started).await,
        }
    }

    // Classified -> Extracted
    async fn extract(
        &self,
        ctx: &TenantContext,
        claim: &Claim,
    ) -> Result<AdvanceOutcome, EngineError> {
        let started = Utc::now();
        match self.gateway.extract(reasoning_context(claim)).await {
            Ok(output) => {
                let record = self
                    .next_record(
                        claim,
                        claim.attempt + 1,
                        ActorRef::reasoning(),
                        StageOutcome::Success,
                        started,
                    )
                    .with_input(reasoning_context(claim))
                    .with_output(StageOutput::Extraction {
                        facts: qualitative_facts(&output),
                    })
                    .with_resulting_stage(Stage::Extracted);
                let claim = self.commit(ctx, claim, record).await?;
                Ok(AdvanceOutcome::Advanced(claim))
            }
            Err(e) => self.gateway_failure(ctx, claim, e, started).await,
        }
    }

    // Extracted -> AppealDrafted
    async fn draft_appeal(
        &self,
        ctx: &TenantContext,
        claim: &Claim,
    ) -> Result<AdvanceOutcome, EngineError> {
        let started = Utc::now();
        match self.gateway.generate(reasoning_context(claim)).await {
            Ok(output) => {
                let letter_text = match output.text.clone().filter(|t| !t.is_empty()) {
                    Some(text) => text,
                    None => {
                        return self
                            .policy_failure(
                                ctx,
                                claim,
                                ActorRef::reasoning(),
                                "draft response carried no letter text".to_string(),
                                started,
                            )
                            .await;
                    }
                };
                let record = self
                    .next_record(
                        claim,
                        claim.attempt + 1,
                        ActorRef::reasoning(),
                        StageOutcome::Success,
                        started,
                    )
                    .with_input(reasoning_context(claim))
                    .with_output(StageOutput::AppealDraft { letter_text })
                    .with_resulting_stage(Stage::AppealDrafted);
                let claim = self.commit(ctx, claim, record).await?;
                Ok(AdvanceOutcome::Advanced(claim))
            }
            Err(e) => self.gateway_failure(ctx, claim, e, started).await,
        }
    }

    // AppealDrafted -> StrategySet: strategize, then the calculator turns the
    // qualitative tier into an estimate. Two records: one per actor.
    async fn set_strategy(
        &self,
        ctx: &TenantContext,
        claim: &Claim,
    ) -> Result<AdvanceOutcome, EngineError> {
        let started = Utc::now();
        let parsed = self
            .gateway
            .strategize(reasoning_context(claim))
            .await
            .and_then(|output| {
                let approach = output.require_label()?.to_string();
                let tier = output.require_tier()?;
                Ok((approach, tier))
            });
        let (approach, tier) = match parsed {
            Ok(parsed) => parsed,
            Err(e) => return self.gateway_failure(ctx, claim, e, started).await,
        };

        let inputs = CalcInputs::RecoveryEstimate {
            denied: claim.amounts.denied,
            tier,
        };
        let outcome = match calculate(&inputs) {
            Ok(outcome) => outcome,
            Err(e) => {
                return self
                    .policy_failure(
                        ctx,
                        claim,
                        ActorRef::calculator(),
                        format!("calculator rejected inputs: {e}"),
                        started,
                    )
                    .await;
            }
        };

        let calc_record = self
            .next_record(
                claim,
                claim.attempt + 1,
                ActorRef::calculator(),
                StageOutcome::Success,
                started,
            )
            .with_input(json!({ "kind": outcome.kind.name(), "tier": tier.name() }))
            .with_output(StageOutput::Calculation {
                kind: outcome.kind.name().to_string(),
                input_hash: outcome.input_hash.clone(),
                primary: outcome.primary,
                secondary: outcome.secondary,
            })
            .with_financial_effect(FinancialEffect {
                estimated_recovery: Some(outcome.primary),
                ..Default::default()
            });
        let claim = self.commit(ctx, claim, calc_record).await?;

        let strategy_record = self
            .next_record(
                &claim,
                claim.attempt + 1,
                ActorRef::reasoning(),
                StageOutcome::Success,
                started,
            )
            .with_output(StageOutput::Strategy {
                approach,
                tier: tier.name().to_string(),
            })
            .with_resulting_stage(Stage::StrategySet);
        let claim = self.commit(ctx, &claim, strategy_record).await?;
        Ok(AdvanceOutcome::Advanced(claim))
    }

    // StrategySet -> PendingApproval: open the SubmitAppeal gate
    async fn open_submit_approval(
        &self,
        ctx: &TenantContext,
        claim: &Claim,
    ) -> Result<AdvanceOutcome, EngineError> {
        let started = Utc::now();
        let impact = claim
            .amounts
            .estimated_recovery
            .unwrap_or(claim.amounts.denied);
        let request = ApprovalRequest::new(
            claim.tenant_id,
            claim.hospital_id,
            claim.id,
            ApprovalAction::SubmitAppeal,
            impact,
            Utc::now() + self.config.approval_expiry,
        );
        let request = self.store.open_approval(ctx, request).await?;

        let record = self
            .next_record(claim, claim.attempt + 1, ActorRef::system(), StageOutcome::Success, started)
            .with_output(StageOutput::ApprovalRequested {
                request_id: request.id,
                action: ApprovalAction::SubmitAppeal.name().to_string(),
                impact,
            })
            .with_resulting_stage(Stage::PendingApproval);
        let claim = self.commit(ctx, claim, record).await?;
        info!(claim = %claim.id, request = %request.id, "submit approval opened");
        Ok(AdvanceOutcome::Advanced(claim))
    }

    // PendingApproval -> Submitted, once a human has approved
    async fn resolve_pending(
        &self,
        ctx: &TenantContext,
        claim: &Claim,
    ) -> Result<AdvanceOutcome, EngineError> {
        let latest = self
            .store
            .latest_approval(ctx, claim.id, ApprovalAction::SubmitAppeal)
            .await?;
        match latest {
            Some(request) if request.is_open() => Ok(AdvanceOutcome::AwaitingApproval(request.id)),
            Some(request) if request.decision == ApprovalDecision::Approved => {
                self.submit_appeal(ctx, claim).await
            }
            Some(_) => Ok(AdvanceOutcome::AwaitingHuman),
            None if claim.requires_human => Ok(AdvanceOutcome::AwaitingHuman),
            None => {
                let impact = claim
                    .amounts
                    .estimated_recovery
                    .unwrap_or(claim.amounts.denied);
                let request = self
                    .gate
                    .request(ctx, claim.id, ApprovalAction::SubmitAppeal, impact)
                    .await?;
                Ok(AdvanceOutcome::AwaitingApproval(request.id))
            }
        }
    }

    async fn submit_appeal(
        &self,
        ctx: &TenantContext,
        claim: &Claim,
    ) -> Result<AdvanceOutcome, EngineError> {
        let started = Utc::now();
        let letter_text = match self.latest_appeal_draft(ctx, claim.id).await? {
            Some(text) => text,
            None => {
                return self
                    .policy_failure(
                        ctx,
                        claim,
                        ActorRef::system(),
                        "no appeal draft on record".to_string(),
                        started,
                    )
                    .await;
            }
        };

        let attempt = claim.attempt + 1;
        let package = SubmissionPackage {
            tenant_id: claim.tenant_id,
            claim_id: claim.id,
            idempotency_key: format!("{}:{}:{}", claim.id, claim.stage, attempt),
            claim_number: claim.claim_number.clone(),
            payer: claim.payer.clone(),
            letter_text,
        };

        let submitted =
            tokio::time::timeout(self.config.submission_timeout, self.submission.submit(package))
                .await;
        match submitted {
            Ok(Ok(receipt)) => {
                let record = self
                    .next_record(claim, attempt, ActorRef::system(), StageOutcome::Success, started)
                    .with_output(StageOutput::Submission {
                        submission_id: receipt.submission_id,
                        external_ref: receipt.external_ref,
                    })
                    .with_resulting_stage(Stage::Submitted);
                let claim = self.commit(ctx, claim, record).await?;
                info!(claim = %claim.id, "appeal submitted");
                Ok(AdvanceOutcome::Advanced(claim))
            }
            Ok(Err(e)) if e.is_transient() => {
                self.transient_failure(
                    ctx,
                    claim,
                    ActorRef::system(),
                    StageOutcome::failed_transient(e.to_string()),
                    started,
                )
                .await
            }
            Ok(Err(SubmissionError::Rejected(reason))) => {
                self.policy_failure(ctx, claim, ActorRef::system(), reason, started)
                    .await
            }
            Ok(Err(e)) => {
                self.policy_failure(ctx, claim, ActorRef::system(), e.to_string(), started)
                    .await
            }
            Err(_) => {
                self.transient_failure(
                    ctx,
                    claim,
                    ActorRef::system(),
                    StageOutcome::Timeout,
                    started,
                )
                .await
            }
        }
    }

    /// Records a terminal outcome
    ///
    /// From `Submitted`, recording the remittance result needs no further
    /// approval; from anywhere else the disposition is forced and requires
    /// an approved `ForceDisposition` request.
    pub async fn record_disposition(
        &self,
        ctx: &TenantContext,
        claim_id: ClaimId,
        disposition: Disposition,
    ) -> Result<Claim, EngineError> {
        if !disposition.stage.is_terminal() {
            return Err(EngineError::InvalidDisposition(format!(
                "{} is not a terminal stage",
                disposition.stage
            )));
        }
        if disposition.recovered.is_some() && disposition.stage != Stage::Recovered {
            return Err(EngineError::InvalidDisposition(
                "recovered amount only applies to a recovered disposition".to_string(),
            ));
        }
        if ctx.actor.is_human() {
            ctx.require_role(Role::Approver)?;
        }

        let claim = self.store.get_claim(ctx, claim_id).await?;
        let remittance = claim.stage == Stage::Submitted
            && matches!(disposition.stage, Stage::Recovered | Stage::Failed);
        if !remittance {
            self.gate
                .require_approved(ctx, claim_id, ApprovalAction::ForceDisposition)
                .await?;
        }

        let started = Utc::now();
        let mut record = self
            .next_record(
                &claim,
                claim.attempt + 1,
                ActorRef::from(&ctx.actor),
                StageOutcome::Success,
                started,
            )
            .with_output(StageOutput::Disposition {
                stage: disposition.stage,
                reason: disposition.reason.clone(),
            })
            .with_resulting_stage(disposition.stage);
        if let Some(recovered) = disposition.recovered {
            record = record.with_financial_effect(FinancialEffect {
                recovered: Some(recovered),
                ..Default::default()
            });
        }
        let claim = self.commit(ctx, &claim, record).await?;
        info!(
            claim = %claim.id,
            stage = %claim.stage,
            reason = %disposition.reason,
            "disposition recorded"
        );
        Ok(claim)
    }

    /// Audited amount correction; requires an approved `CorrectAmounts`
    /// request and re-validates the denial consistency invariant
    pub async fn correct_amounts(
        &self,
        ctx: &TenantContext,
        claim_id: ClaimId,
        denied: Money,
        approved: Money,
    ) -> Result<Claim, EngineError> {
        ctx.require_role(Role::Approver)?;
        self.gate
            .require_approved(ctx, claim_id, ApprovalAction::CorrectAmounts)
            .await?;

        let claim = self.store.get_claim(ctx, claim_id).await?;
        let record = self
            .next_record(
                &claim,
                claim.attempt + 1,
                ActorRef::from(&ctx.actor),
                StageOutcome::Success,
                Utc::now(),
            )
            .with_financial_effect(FinancialEffect {
                denied: Some(denied),
                approved: Some(approved),
                ..Default::default()
            });
        let claim = self.commit(ctx, &claim, record).await?;
        info!(claim = %claim.id, "amounts corrected");
        Ok(claim)
    }

    /// Skips the claim to a given stage; requires an approved
    /// `StageOverride` request
    pub async fn override_stage(
        &self,
        ctx: &TenantContext,
        claim_id: ClaimId,
        target: Stage,
        reason: String,
    ) -> Result<Claim, EngineError> {
        ctx.require_role(Role::Approver)?;
        if target.is_terminal() {
            return Err(EngineError::InvalidDisposition(
                "terminal stages are reached through a disposition".to_string(),
            ));
        }
        self.gate
            .require_approved(ctx, claim_id, ApprovalAction::StageOverride)
            .await?;

        let claim = self.store.get_claim(ctx, claim_id).await?;
        let record = self
            .next_record(
                &claim,
                claim.attempt + 1,
                ActorRef::from(&ctx.actor),
                StageOutcome::Success,
                Utc::now(),
            )
            .with_output(StageOutput::Disposition {
                stage: target,
                reason,
            })
            .with_resulting_stage(target);
        let claim = self.commit(ctx, &claim, record).await?;
        warn!(claim = %claim.id, stage = %claim.stage, "stage override applied");
        Ok(claim)
    }

    /// Flags every non-terminal claim within the warning window of its
    /// appeal deadline, across tenants; advisory only, writes nothing
    pub async fn check_slas(&self, as_of: NaiveDate) -> Result<Vec<Escalation>, EngineError> {
        let mut escalations = Vec::new();
        for claim in self.store.open_claims().await? {
            if let Some(escalation) =
                Escalation::evaluate(&claim, as_of, self.config.sla_warning_days)
            {
                self.notifications.escalate(&escalation).await;
                escalations.push(escalation);
            }
        }
        Ok(escalations)
    }

    /// Expires open approval requests past their deadline
    pub async fn expire_approvals(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<ApprovalRequest>, EngineError> {
        self.gate.expire_sweep(now).await
    }

    /// Spawns the periodic background sweep: approval expiry, then SLA
    /// escalation, every `sweep_interval`. Returns the task handle so the
    /// host can abort it on shutdown.
    pub fn spawn_sweeper(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(engine.config.sweep_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let now = Utc::now();
                if let Err(e) = engine.expire_approvals(now).await {
                    warn!(error = %e, "approval expiry sweep failed");
                }
                if let Err(e) = engine.check_slas(now.date_naive()).await {
                    warn!(error = %e, "sla sweep failed");
                }
            }
        })
    }

    // Reads, delegated to the store under the caller's tenant scope

    pub async fn claim(&self, ctx: &TenantContext, claim_id: ClaimId) -> Result<Claim, EngineError> {
        Ok(self.store.get_claim(ctx, claim_id).await?)
    }

    pub async fn claims(&self, ctx: &TenantContext) -> Result<Vec<Claim>, EngineError> {
        Ok(self.store.list_claims(ctx).await?)
    }

    pub async fn records(
        &self,
        ctx: &TenantContext,
        claim_id: ClaimId,
    ) -> Result<Vec<StageRecord>, EngineError> {
        Ok(self.store.records_for(ctx, claim_id).await?)
    }

    pub async fn events(
        &self,
        ctx: &TenantContext,
        since: u64,
        limit: usize,
    ) -> Result<EventPage, EngineError> {
        Ok(self.store.stream_events(ctx, since, limit).await?)
    }

    pub async fn pending_approvals(
        &self,
        ctx: &TenantContext,
    ) -> Result<Vec<ApprovalRequest>, EngineError> {
        Ok(self.store.list_pending_approvals(ctx).await?)
    }

    // Failure plumbing

    async fn gateway_failure(
        &self,
        ctx: &TenantContext,
        claim: &Claim,
        error: GatewayError,
        started: DateTime<Utc>,
    ) -> Result<AdvanceOutcome, EngineError> {
        if error.is_transient() {
            let outcome = match error {
                GatewayError::Timeout { .. } => StageOutcome::Timeout,
                _ => StageOutcome::failed_transient(error.to_string()),
            };
            self.transient_failure(ctx, claim, ActorRef::reasoning(), outcome, started)
                .await
        } else {
            self.policy_failure(ctx, claim, ActorRef::reasoning(), error.to_string(), started)
                .await
        }
    }

    /// Policy failures are never retried; the claim parks for a human
    async fn policy_failure(
        &self,
        ctx: &TenantContext,
        claim: &Claim,
        actor: ActorRef,
        reason: String,
        started: DateTime<Utc>,
    ) -> Result<AdvanceOutcome, EngineError> {
        warn!(claim = %claim.id, stage = %claim.stage, %reason, "policy failure");
        let record = self
            .next_record(
                claim,
                claim.attempt + 1,
                actor,
                StageOutcome::failed_policy(reason.clone()),
                started,
            )
            .with_resulting_stage(Stage::PendingApproval);
        let claim = self.commit(ctx, claim, record).await?;
        Ok(AdvanceOutcome::Escalated { claim, reason })
    }

    /// Transient failures are recorded and retried with backoff until the
    /// attempt ceiling, then routed to a human
    async fn transient_failure(
        &self,
        ctx: &TenantContext,
        claim: &Claim,
        actor: ActorRef,
        outcome: StageOutcome,
        started: DateTime<Utc>,
    ) -> Result<AdvanceOutcome, EngineError> {
        let attempt = claim.attempt + 1;
        if attempt >= self.config.max_stage_attempts {
            warn!(claim = %claim.id, stage = %claim.stage, attempt, "retries exhausted");
            let record = self
                .next_record(claim, attempt, actor, outcome, started)
                .with_resulting_stage(Stage::PendingApproval);
            let claim = self.commit(ctx, claim, record).await?;
            return Ok(AdvanceOutcome::Escalated {
                claim,
                reason: "retry attempts exhausted".to_string(),
            });
        }

        let record = self.next_record(claim, attempt, actor, outcome, started);
        let claim = self.commit(ctx, claim, record).await?;
        let retry_after = self.backoff.delay(attempt);
        Ok(AdvanceOutcome::RetryScheduled { claim, retry_after })
    }

    async fn latest_appeal_draft(
        &self,
        ctx: &TenantContext,
        claim_id: ClaimId,
    ) -> Result<Option<String>, EngineError> {
        let records = self.store.records_for(ctx, claim_id).await?;
        Ok(records.iter().rev().find_map(|r| match &r.output {
            Some(StageOutput::AppealDraft { letter_text }) => Some(letter_text.clone()),
            _ => None,
        }))
    }

    fn next_record(
        &self,
        claim: &Claim,
        attempt: u32,
        actor: ActorRef,
        outcome: StageOutcome,
        started: DateTime<Utc>,
    ) -> StageRecord {
        let mut record = StageRecord::new(
            claim.tenant_id,
            claim.hospital_id,
            claim.id,
            claim.stage,
            attempt,
            actor,
            outcome,
            started,
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

/// Qualitative claim context for the reasoning service; never carries
/// monetary amounts
fn reasoning_context(claim: &Claim) -> Value {
    json!({
        "claim_number": claim.claim_number,
        "payer": claim.payer,
        "stage": claim.stage.name(),
        "denial_reason_code": claim.denial_reason_code,
        "denial_reason_text": claim.denial_reason_text,
    })
}

fn qualitative_facts(output: &QualitativeOutput) -> Value {
    json!({
        "labels": output.labels,
        "notes": output.text,
    })
}
