//! Tenant context and the isolation guard
//!
//! Every read or write of claim state carries a [`TenantContext`]. The guard
//! check on that context is the single point where cross-tenant access is
//! rejected, independent of whatever storage engine backs the stores.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::identifiers::{ActorId, HospitalId, TenantId};

/// Errors raised by the tenant isolation guard
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TenantError {
    #[error("Access denied: resource belongs to a different tenant")]
    AccessDenied,

    #[error("Access denied: resource belongs to a different hospital")]
    HospitalMismatch,

    #[error("Actor lacks required role: {0}")]
    MissingRole(String),
}

/// The kind of actor performing an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorKind {
    /// The workflow engine itself
    System,
    /// The external reasoning service (via the gateway)
    Reasoning,
    /// The deterministic financial calculator
    Calculator,
    /// A human user
    Human,
}

/// Roles a human actor may hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// May view claims and records
    Viewer,
    /// May work claims (advance, request approvals)
    Analyst,
    /// May decide approval requests
    Approver,
    /// Full administrative access
    Admin,
}

/// The actor attached to an operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: ActorId,
    pub kind: ActorKind,
    pub roles: Vec<Role>,
}

impl Actor {
    /// Creates the system actor (no human roles)
    pub fn system() -> Self {
        Self {
            id: ActorId::new_v7(),
            kind: ActorKind::System,
            roles: Vec::new(),
        }
    }

    /// Creates a human actor with the given roles
    pub fn human(id: ActorId, roles: Vec<Role>) -> Self {
        Self {
            id,
            kind: ActorKind::Human,
            roles,
        }
    }

    /// Returns true if this actor is a human
    pub fn is_human(&self) -> bool {
        self.kind == ActorKind::Human
    }

    /// Returns true if this actor holds the given role (admins hold all)
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role) || self.roles.contains(&Role::Admin)
    }
}

/// The tenant scope threaded through every operation
///
/// A value, never a stored entity. Constructed only from validated
/// authentication claims (or by the engine itself for system work).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantContext {
    pub tenant_id: TenantId,
    pub hospital_id: HospitalId,
    pub actor: Actor,
}

impl TenantContext {
    pub fn new(tenant_id: TenantId, hospital_id: HospitalId, actor: Actor) -> Self {
        Self {
            tenant_id,
            hospital_id,
            actor,
        }
    }

    /// A system-actor context for engine-internal work within a tenant
    pub fn system(tenant_id: TenantId, hospital_id: HospitalId) -> Self {
        Self::new(tenant_id, hospital_id, Actor::system())
    }

    /// Checks that this context may touch a resource owned by the given
    /// tenant and hospital. Mismatches are security-relevant and logged.
    pub fn ensure_access(
        &self,
        tenant_id: TenantId,
        hospital_id: HospitalId,
    ) -> Result<(), TenantError> {
        if self.tenant_id != tenant_id {
            warn!(
                target: "security",
                caller_tenant = %self.tenant_id,
                resource_tenant = %tenant_id,
                actor = %self.actor.id,
                "cross-tenant access rejected"
            );
            return Err(TenantError::AccessDenied);
        }
        if self.hospital_id != hospital_id {
            warn!(
                target: "security",
                tenant = %self.tenant_id,
                caller_hospital = %self.hospital_id,
                resource_hospital = %hospital_id,
                actor = %self.actor.id,
                "cross-hospital access rejected"
            );
            return Err(TenantError::HospitalMismatch);
        }
        Ok(())
    }

    /// Checks access against any tenant-scoped resource
    pub fn ensure_scoped<T: TenantScoped>(&self, resource: &T) -> Result<(), TenantError> {
        self.ensure_access(resource.tenant_id(), resource.hospital_id())
    }

    /// Requires a human actor holding the given role
    pub fn require_role(&self, role: Role) -> Result<(), TenantError> {
        if self.actor.is_human() && self.actor.has_role(role) {
            Ok(())
        } else {
            Err(TenantError::MissingRole(format!("{role:?}")))
        }
    }
}

/// Implemented by every entity owned by a tenant
pub trait TenantScoped {
    fn tenant_id(&self) -> TenantId;
    fn hospital_id(&self) -> HospitalId;
}
