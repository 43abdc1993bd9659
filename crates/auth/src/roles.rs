use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// Role identifier used for RBAC.
///
/// The role set is closed: the access matrix in [`crate::RoleMatrixGate`] is
/// written against exactly these three.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Logistics,
    BaseCommander,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Logistics => "LOGISTICS",
            Role::BaseCommander => "BASE_COMMANDER",
        }
    }

    /// Whether this role only acts within its own base scope.
    pub fn is_base_scoped(&self) -> bool {
        matches!(self, Role::BaseCommander)
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role '{0}'")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "ADMIN" => Ok(Role::Admin),
            "LOGISTICS" => Ok(Role::Logistics),
            "BASE_COMMANDER" => Ok(Role::BaseCommander),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}
