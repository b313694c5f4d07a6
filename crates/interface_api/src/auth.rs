//! Authentication and tenant-scope extraction
//!
//! JWT claims carry the caller's tenant id, hospital id, and roles; the
//! [`TenantContext`] handlers run under is built only from a validated token.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use core_kernel::{Actor, ActorId, HospitalId, Role, TenantContext, TenantId};

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Tenant the caller belongs to
    pub tenant_id: Uuid,
    /// Hospital within the tenant
    pub hospital_id: Uuid,
    /// Caller's roles
    pub roles: Vec<String>,
    /// Expiration timestamp
    pub exp: i64,
    /// Issued at timestamp
    pub iat: i64,
}

/// Auth errors
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token expired")]
    TokenExpired,
    #[error("Malformed identity claim: {0}")]
    MalformedClaim(String),
}

/// Creates a new JWT token
pub fn create_token(
    user_id: &str,
    tenant_id: Uuid,
    hospital_id: Uuid,
    roles: Vec<String>,
    secret: &str,
    expiration_secs: u64,
) -> Result<String, AuthError> {
    let now = Utc::now();
    let exp = now + Duration::seconds(expiration_secs as i64);

    let claims = Claims {
        sub: user_id.to_string(),
        tenant_id,
        hospital_id,
        roles,
        exp: exp.timestamp(),
        iat: now.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|_| AuthError::InvalidToken)
}

/// Validates a JWT token
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, AuthError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| {
        if e.to_string().contains("ExpiredSignature") {
            AuthError::TokenExpired
        } else {
            AuthError::InvalidToken
        }
    })?;

    Ok(token_data.claims)
}

/// Builds the tenant scope for a validated token
pub fn tenant_context(claims: &Claims) -> Result<TenantContext, AuthError> {
    let actor_id: ActorId = claims
        .sub
        .parse()
        .map_err(|_| AuthError::MalformedClaim(format!("subject `{}`", claims.sub)))?;

    let mut roles = Vec::with_capacity(claims.roles.len());
    for role in &claims.roles {
        roles.push(parse_role(role)?);
    }

    Ok(TenantContext::new(
        TenantId::from(claims.tenant_id),
        HospitalId::from(claims.hospital_id),
        Actor::human(actor_id, roles),
    ))
}

fn parse_role(role: &str) -> Result<Role, AuthError> {
    match role {
        "viewer" => Ok(Role::Viewer),
        "analyst" => Ok(Role::Analyst),
        "approver" => Ok(Role::Approver),
        "admin" => Ok(Role::Admin),
        other => Err(AuthError::MalformedClaim(format!("role `{other}`"))),
    }
}
