use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use armory_core::BaseId;

use crate::{Credential, PrincipalId, Role};

/// Bearer token claims model (transport-agnostic).
///
/// This is the minimal set of claims the ledger expects once a token has been
/// decoded/verified by whatever transport/security layer is in use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialClaims {
    /// Subject / principal identifier.
    pub sub: PrincipalId,

    /// Role granted to the subject.
    pub role: Role,

    /// Base the role is scoped to (base commanders).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_id: Option<BaseId>,

    /// Issued-at timestamp.
    pub issued_at: DateTime<Utc>,

    /// Expiration timestamp.
    pub expires_at: DateTime<Utc>,
}

impl CredentialClaims {
    pub fn into_credential(self) -> Credential {
        Credential::new(self.sub, self.role, self.base_id)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token is malformed or its signature is invalid: {0}")]
    Malformed(String),

    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (issued_at is in the future)")]
    NotYetValid,

    #[error("invalid token time window (expires_at <= issued_at)")]
    InvalidTimeWindow,
}

/// Deterministically validate credential claims.
///
/// Note: this validates the *claims* only. Signature verification / decoding
/// lives in [`crate::verifier`].
pub fn validate_claims(claims: &CredentialClaims, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    if claims.expires_at <= claims.issued_at {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    if now < claims.issued_at {
        return Err(TokenValidationError::NotYetValid);
    }
    if now >= claims.expires_at {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}
