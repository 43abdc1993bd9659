use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use armory_core::BaseId;

use crate::Role;

/// Identity of an authenticated principal (human user, service account, etc).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(Uuid);

impl PrincipalId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for PrincipalId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl From<Uuid> for PrincipalId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl From<PrincipalId> for Uuid {
    fn from(value: PrincipalId) -> Self {
        value.0
    }
}

impl FromStr for PrincipalId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::from_str(s)?))
    }
}

/// A verified caller: who they are, which role they hold, and which base (if
/// any) their role is scoped to.
///
/// This is the only input the access gate trusts. It must come out of a
/// [`crate::CredentialVerifier`] (or an equivalent trusted source), never from
/// raw request metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub principal_id: PrincipalId,
    pub role: Role,
    pub base_scope: Option<BaseId>,
}

impl Credential {
    pub fn new(principal_id: PrincipalId, role: Role, base_scope: Option<BaseId>) -> Self {
        Self {
            principal_id,
            role,
            base_scope,
        }
    }
}
