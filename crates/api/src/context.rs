use armory_auth::{Credential, PrincipalId, Role};
use armory_core::BaseId;

/// Verified credential for a request.
///
/// Inserted by the auth middleware; handlers never build one from raw
/// request metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialContext {
    credential: Credential,
}

impl CredentialContext {
    pub fn new(credential: Credential) -> Self {
        Self { credential }
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    pub fn principal_id(&self) -> PrincipalId {
        self.credential.principal_id
    }

    pub fn role(&self) -> Role {
        self.credential.role
    }

    pub fn base_scope(&self) -> Option<BaseId> {
        self.credential.base_scope
    }
}
