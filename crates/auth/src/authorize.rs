use std::sync::Arc;

use thiserror::Error;

use armory_core::BaseId;

use crate::{Credential, OperationKind, Role};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: role {role} may not perform '{operation}'")]
    Forbidden { role: Role, operation: OperationKind },

    #[error("forbidden: role {role} has no base scope")]
    MissingBaseScope { role: Role },

    #[error("forbidden: you can only operate on your assigned base (scope {scope}, target {target})")]
    BaseScopeMismatch { scope: BaseId, target: BaseId },

    #[error("forbidden: '{0}' requires a target base")]
    MissingTarget(OperationKind),
}

/// Ordered guard consulted before any ledger mutation or privileged read.
///
/// Implementations must be pure: no IO, no panics, no business logic.
pub trait AccessGate: Send + Sync {
    /// The role half of [`AccessGate::authorize`]: may this role perform
    /// `operation` at all, whatever the target.
    fn authorize_role(&self, credential: &Credential, operation: OperationKind) -> Result<(), AuthzError>;

    fn authorize(
        &self,
        credential: &Credential,
        operation: OperationKind,
        target_base: Option<BaseId>,
    ) -> Result<(), AuthzError>;
}

impl<G> AccessGate for Arc<G>
where
    G: AccessGate + ?Sized,
{
    fn authorize_role(&self, credential: &Credential, operation: OperationKind) -> Result<(), AuthzError> {
        (**self).authorize_role(credential, operation)
    }

    fn authorize(
        &self,
        credential: &Credential,
        operation: OperationKind,
        target_base: Option<BaseId>,
    ) -> Result<(), AuthzError> {
        (**self).authorize(credential, operation, target_base)
    }
}

/// Static role → operation matrix.
///
/// | Operation                | Roles                       |
/// |--------------------------|-----------------------------|
/// | dashboard / audit reads  | Admin                       |
/// | purchase, transfer       | Admin, Logistics            |
/// | assignment, expenditure  | Admin, BaseCommander (own base only) |
#[derive(Debug, Default, Clone, Copy)]
pub struct RoleMatrixGate;

impl RoleMatrixGate {
    pub fn new() -> Self {
        Self
    }

    pub fn allowed_roles(operation: OperationKind) -> &'static [Role] {
        match operation {
            OperationKind::DashboardRead | OperationKind::AuditRead => &[Role::Admin],
            OperationKind::Purchase | OperationKind::Transfer => &[Role::Admin, Role::Logistics],
            OperationKind::Assignment | OperationKind::Expenditure => {
                &[Role::Admin, Role::BaseCommander]
            }
        }
    }
}

impl AccessGate for RoleMatrixGate {
    fn authorize_role(&self, credential: &Credential, operation: OperationKind) -> Result<(), AuthzError> {
        let role = credential.role;
        if !Self::allowed_roles(operation).contains(&role) {
            return Err(AuthzError::Forbidden { role, operation });
        }
        Ok(())
    }

    fn authorize(
        &self,
        credential: &Credential,
        operation: OperationKind,
        target_base: Option<BaseId>,
    ) -> Result<(), AuthzError> {
        self.authorize_role(credential, operation)?;

        let role = credential.role;

        if role.is_base_scoped() && operation.is_base_restricted() {
            let scope = credential
                .base_scope
                .ok_or(AuthzError::MissingBaseScope { role })?;
            let target = target_base.ok_or(AuthzError::MissingTarget(operation))?;
            if scope != target {
                return Err(AuthzError::BaseScopeMismatch { scope, target });
            }
        }

        Ok(())
    }
}
