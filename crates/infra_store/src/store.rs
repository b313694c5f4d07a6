//! The storage contract consumed by the workflow engine

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use core_kernel::{ApprovalRequestId, ClaimId, TenantContext};
use domain_claims::{ApprovalAction, ApprovalRequest, Claim, StageRecord};

use crate::error::StoreError;

/// One page of the tenant-scoped event feed
#[derive(Debug, Clone)]
pub struct EventPage {
    pub records: Vec<StageRecord>,
    /// Pass back as `since` to resume the feed
    pub next_cursor: u64,
}

/// The claim record store, event log, and approval store behind one
/// tenant-guarded contract
#[async_trait]
pub trait RecoveryStore: Send + Sync {
    /// Registers a new claim; its intake state is the replay baseline
    async fn insert_claim(&self, ctx: &TenantContext, claim: Claim) -> Result<(), StoreError>;

    /// Current projection of a claim
    async fn get_claim(&self, ctx: &TenantContext, claim_id: ClaimId)
        -> Result<Claim, StoreError>;

    /// The claim as it stood at intake, before any stage record
    async fn get_claim_baseline(
        &self,
        ctx: &TenantContext,
        claim_id: ClaimId,
    ) -> Result<Claim, StoreError>;

    /// All claims in the caller's tenant scope
    async fn list_claims(&self, ctx: &TenantContext) -> Result<Vec<Claim>, StoreError>;

    /// Every non-terminal claim, across tenants; used only by the engine's
    /// SLA sweep, which runs without a caller scope and writes nothing
    async fn open_claims(&self) -> Result<Vec<Claim>, StoreError>;

    /// Atomically appends a stage record and swaps in the updated claim
    ///
    /// `expected_version` is the version the caller loaded; a mismatch means
    /// a competing commit won and the caller must retry on fresh state. The
    /// record's sequence must extend the claim's log by exactly one, which is
    /// what discards late results from superseded attempts.
    async fn commit_stage(
        &self,
        ctx: &TenantContext,
        updated: Claim,
        record: StageRecord,
        expected_version: u64,
    ) -> Result<Claim, StoreError>;

    /// A claim's stage records in sequence order
    async fn records_for(
        &self,
        ctx: &TenantContext,
        claim_id: ClaimId,
    ) -> Result<Vec<StageRecord>, StoreError>;

    /// Restartable, tenant-filtered event feed; finite per call,
    /// unbounded across polls
    async fn stream_events(
        &self,
        ctx: &TenantContext,
        since: u64,
        limit: usize,
    ) -> Result<EventPage, StoreError>;

    /// Stores a new approval request, or returns the already-open request
    /// for the same (claim, action) pair
    async fn open_approval(
        &self,
        ctx: &TenantContext,
        request: ApprovalRequest,
    ) -> Result<ApprovalRequest, StoreError>;

    async fn get_approval(
        &self,
        ctx: &TenantContext,
        request_id: ApprovalRequestId,
    ) -> Result<ApprovalRequest, StoreError>;

    /// The open request for a (claim, action) pair, if any
    async fn find_open_approval(
        &self,
        ctx: &TenantContext,
        claim_id: ClaimId,
        action: ApprovalAction,
    ) -> Result<Option<ApprovalRequest>, StoreError>;

    /// The most recently requested approval for a (claim, action) pair,
    /// decided or not
    async fn latest_approval(
        &self,
        ctx: &TenantContext,
        claim_id: ClaimId,
        action: ApprovalAction,
    ) -> Result<Option<ApprovalRequest>, StoreError>;

    /// Persists a decided/expired request
    async fn update_approval(
        &self,
        ctx: &TenantContext,
        request: ApprovalRequest,
    ) -> Result<(), StoreError>;

    /// Pending requests in the caller's tenant scope
    async fn list_pending_approvals(
        &self,
        ctx: &TenantContext,
    ) -> Result<Vec<ApprovalRequest>, StoreError>;

    /// All open requests past expiry, across tenants; used only by the
    /// engine's expiry sweep, which re-enters per tenant with a system
    /// context
    async fn approvals_past_expiry(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<ApprovalRequest>, StoreError>;
}
