//! In-memory store
//!
//! The reference implementation of [`RecoveryStore`]: hash maps behind a
//! single `RwLock`. The lock is held only for the duration of a read or a
//! commit, never across network calls, so contention stays bounded under
//! concurrent load across many tenants.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use core_kernel::{ApprovalRequestId, ClaimId, TenantContext, TenantId};
use domain_claims::{ApprovalAction, ApprovalRequest, Claim, StageRecord};

use crate::error::StoreError;
use crate::store::{EventPage, RecoveryStore};

#[derive(Default)]
struct State {
    claims: HashMap<ClaimId, Claim>,
    /// Intake-time snapshots: the replay baseline per claim
    baselines: HashMap<ClaimId, Claim>,
    /// Per-claim append-only logs, strictly ordered by sequence
    logs: HashMap<ClaimId, Vec<StageRecord>>,
    /// Per-tenant feed in append order, for the event stream
    feeds: HashMap<TenantId, Vec<StageRecord>>,
    approvals: HashMap<ApprovalRequestId, ApprovalRequest>,
}

/// In-memory [`RecoveryStore`]
#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // Poisoning only happens if a panic escaped mid-operation; the maps are
    // still structurally valid, so reads and writes continue.
    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl RecoveryStore for InMemoryStore {
    async fn insert_claim(&self, ctx: &TenantContext, claim: Claim) -> Result<(), StoreError> {
        ctx.ensure_scoped(&claim)?;
        let mut state = self.write();
        if state.claims.contains_key(&claim.id) {
            return Err(StoreError::DuplicateClaim(claim.id.to_string()));
        }
        debug!(claim = %claim.id, tenant = %claim.tenant_id, "claim registered");
        state.baselines.insert(claim.id, claim.clone());
        state.logs.insert(claim.id, Vec::new());
        state.claims.insert(claim.id, claim);
        Ok(())
    }

    async fn get_claim(
        &self,
        ctx: &TenantContext,
        claim_id: ClaimId,
    ) -> Result<Claim, StoreError> {
        let state = self.read();
        let claim = state
            .claims
            .get(&claim_id)
            .ok_or_else(|| StoreError::ClaimNotFound(claim_id.to_string()))?;
        ctx.ensure_scoped(claim)?;
        Ok(claim.clone())
    }

    async fn get_claim_baseline(
        &self,
        ctx: &TenantContext,
        claim_id: ClaimId,
    ) -> Result<Claim, StoreError> {
        let state = self.read();
        let claim = state
            .baselines
            .get(&claim_id)
            .ok_or_else(|| StoreError::ClaimNotFound(claim_id.to_string()))?;
        ctx.ensure_scoped(claim)?;
        Ok(claim.clone())
    }

    async fn list_claims(&self, ctx: &TenantContext) -> Result<Vec<Claim>, StoreError> {
        let state = self.read();
        let mut claims: Vec<Claim> = state
            .claims
            .values()
            .filter(|c| ctx.ensure_scoped(*c).is_ok())
            .cloned()
            .collect();
        claims.sort_by_key(|c| c.id);
        Ok(claims)
    }

    async fn open_claims(&self) -> Result<Vec<Claim>, StoreError> {
        let state = self.read();
        let mut claims: Vec<Claim> = state
            .claims
            .values()
            .filter(|c| !c.is_terminal())
            .cloned()
            .collect();
        claims.sort_by_key(|c| c.id);
        Ok(claims)
    }

    async fn commit_stage(
        &self,
        ctx: &TenantContext,
        mut updated: Claim,
        record: StageRecord,
        expected_version: u64,
    ) -> Result<Claim, StoreError> {
        ctx.ensure_scoped(&updated)?;
        ctx.ensure_scoped(&record)?;
        let mut state = self.write();

        let stored = state
            .claims
            .get(&updated.id)
            .ok_or_else(|| StoreError::ClaimNotFound(updated.id.to_string()))?;
        ctx.ensure_scoped(stored)?;

        if stored.version != expected_version {
            return Err(StoreError::VersionConflict {
                claim: updated.id.to_string(),
                expected: expected_version,
                actual: stored.version,
            });
        }

        let log = state.logs.entry(updated.id).or_default();
        let tip = log.last().map(|r| r.sequence).unwrap_or(0);
        if record.sequence != tip + 1 {
            // A newer attempt already committed; this result is stale
            return Err(StoreError::SequenceConflict {
                expected: tip + 1,
                got: record.sequence,
            });
        }

        updated.version = expected_version + 1;
        log.push(record.clone());
        state
            .feeds
            .entry(record.tenant_id)
            .or_default()
            .push(record);
        state.claims.insert(updated.id, updated.clone());
        debug!(
            claim = %updated.id,
            stage = %updated.stage,
            version = updated.version,
            "stage committed"
        );
        Ok(updated)
    }

    async fn records_for(
        &self,
        ctx: &TenantContext,
        claim_id: ClaimId,
    ) -> Result<Vec<StageRecord>, StoreError> {
        // Scope check runs against the claim, so an empty log is
        // distinguishable from a foreign claim
        let state = self.read();
        let claim = state
            .claims
            .get(&claim_id)
            .ok_or_else(|| StoreError::ClaimNotFound(claim_id.to_string()))?;
        ctx.ensure_scoped(claim)?;
        Ok(state.logs.get(&claim_id).cloned().unwrap_or_default())
    }

    async fn stream_events(
        &self,
        ctx: &TenantContext,
        since: u64,
        limit: usize,
    ) -> Result<EventPage, StoreError> {
        let state = self.read();
        let feed = state.feeds.get(&ctx.tenant_id);
        let mut records = Vec::new();
        let mut cursor = since;

        if let Some(feed) = feed {
            for (offset, record) in feed.iter().enumerate().skip(since as usize) {
                cursor = offset as u64 + 1;
                if ctx.ensure_scoped(record).is_ok() {
                    records.push(record.clone());
                    if records.len() >= limit {
                        break;
                    }
                }
            }
        }

        Ok(EventPage {
            records,
            next_cursor: cursor,
        })
    }

    async fn open_approval(
        &self,
        ctx: &TenantContext,
        request: ApprovalRequest,
    ) -> Result<ApprovalRequest, StoreError> {
        ctx.ensure_scoped(&request)?;
        let mut state = self.write();

        // Idempotent per open (claim, action): a second request while one
        // is open returns the existing one
        if let Some(existing) = state
            .approvals
            .values()
            .find(|r| r.claim_id == request.claim_id && r.action == request.action && r.is_open())
        {
            return Ok(existing.clone());
        }

        state.approvals.insert(request.id, request.clone());
        Ok(request)
    }

    async fn get_approval(
        &self,
        ctx: &TenantContext,
        request_id: ApprovalRequestId,
    ) -> Result<ApprovalRequest, StoreError> {
        let state = self.read();
        let request = state
            .approvals
            .get(&request_id)
            .ok_or_else(|| StoreError::ApprovalNotFound(request_id.to_string()))?;
        ctx.ensure_scoped(request)?;
        Ok(request.clone())
    }

    async fn find_open_approval(
        &self,
        ctx: &TenantContext,
        claim_id: ClaimId,
        action: ApprovalAction,
    ) -> Result<Option<ApprovalRequest>, StoreError> {
        let state = self.read();
        let found = state
            .approvals
            .values()
            .find(|r| r.claim_id == claim_id && r.action == action && r.is_open());
        if let Some(request) = found {
            ctx.ensure_scoped(request)?;
            return Ok(Some(request.clone()));
        }
        Ok(None)
    }

    async fn latest_approval(
        &self,
        ctx: &TenantContext,
        claim_id: ClaimId,
        action: ApprovalAction,
    ) -> Result<Option<ApprovalRequest>, StoreError> {
        let state = self.read();
        let found = state
            .approvals
            .values()
            .filter(|r| r.claim_id == claim_id && r.action == action)
            .max_by_key(|r| r.requested_at);
        if let Some(request) = found {
            ctx.ensure_scoped(request)?;
            return Ok(Some(request.clone()));
        }
        Ok(None)
    }

    async fn update_approval(
        &self,
        ctx: &TenantContext,
        request: ApprovalRequest,
    ) -> Result<(), StoreError> {
        ctx.ensure_scoped(&request)?;
        let mut state = self.write();
        if !state.approvals.contains_key(&request.id) {
            return Err(StoreError::ApprovalNotFound(request.id.to_string()));
        }
        state.approvals.insert(request.id, request);
        Ok(())
    }

    async fn list_pending_approvals(
        &self,
        ctx: &TenantContext,
    ) -> Result<Vec<ApprovalRequest>, StoreError> {
        let state = self.read();
        let mut pending: Vec<ApprovalRequest> = state
            .approvals
            .values()
            .filter(|r| r.is_open() && ctx.ensure_scoped(*r).is_ok())
            .cloned()
            .collect();
        pending.sort_by_key(|r| r.requested_at);
        Ok(pending)
    }

    async fn approvals_past_expiry(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<ApprovalRequest>, StoreError> {
        let state = self.read();
        Ok(state
            .approvals
            .values()
            .filter(|r| r.is_past_expiry(now))
            .cloned()
            .collect())
    }
}
