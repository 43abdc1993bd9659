//! Movement records: the append-only audit trail of stock changes.

use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use armory_auth::{Credential, PrincipalId, Role};
use armory_core::{BaseId, DomainError, EquipmentId, MovementId};

use crate::BalanceKey;

/// Kind of stock-affecting operation.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MovementKind {
    Purchase,
    Transfer,
    Assignment,
    Expenditure,
}

impl MovementKind {
    pub const ALL: [MovementKind; 4] = [
        MovementKind::Purchase,
        MovementKind::Transfer,
        MovementKind::Assignment,
        MovementKind::Expenditure,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MovementKind::Purchase => "Purchase",
            MovementKind::Transfer => "Transfer",
            MovementKind::Assignment => "Assignment",
            MovementKind::Expenditure => "Expenditure",
        }
    }
}

impl core::fmt::Display for MovementKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MovementKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MovementKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s.trim())
            .ok_or_else(|| DomainError::validation(format!("unknown movement kind '{s}'")))
    }
}

/// Who performed a movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub principal_id: PrincipalId,
    pub role: Role,
}

impl From<&Credential> for Actor {
    fn from(credential: &Credential) -> Self {
        Self {
            principal_id: credential.principal_id,
            role: credential.role,
        }
    }
}

/// A movement that has been planned but not yet written to the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovementDraft {
    pub kind: MovementKind,
    pub equipment_id: EquipmentId,
    pub from_base_id: Option<BaseId>,
    pub to_base_id: Option<BaseId>,
    pub quantity: i64,
    pub personnel_name: Option<String>,
    pub actor: Actor,
}

impl MovementDraft {
    /// Stamp the draft with its identity; only the log calls this.
    pub fn into_record(self, id: MovementId, recorded_at: DateTime<Utc>) -> MovementRecord {
        MovementRecord {
            id,
            kind: self.kind,
            equipment_id: self.equipment_id,
            from_base_id: self.from_base_id,
            to_base_id: self.to_base_id,
            quantity: self.quantity,
            personnel_name: self.personnel_name,
            actor: self.actor,
            recorded_at,
        }
    }
}

/// Immutable entry in the movement log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementRecord {
    pub id: MovementId,
    pub kind: MovementKind,
    pub equipment_id: EquipmentId,
    pub from_base_id: Option<BaseId>,
    pub to_base_id: Option<BaseId>,
    pub quantity: i64,
    pub personnel_name: Option<String>,
    pub actor: Actor,
    pub recorded_at: DateTime<Utc>,
}

impl MovementRecord {
    /// Signed effect of this movement on one balance row (zero if unrelated).
    pub fn delta_for(&self, key: BalanceKey) -> i64 {
        if self.equipment_id != key.equipment_id {
            return 0;
        }
        let mut delta = 0;
        if self.to_base_id == Some(key.base_id) {
            delta += self.quantity;
        }
        if self.from_base_id == Some(key.base_id) {
            delta -= self.quantity;
        }
        delta
    }

    /// Balance rows this movement touches.
    pub fn keys(&self) -> impl Iterator<Item = BalanceKey> + '_ {
        self.from_base_id
            .into_iter()
            .chain(self.to_base_id)
            .map(|base_id| BalanceKey::new(self.equipment_id, base_id))
    }

    pub fn touches_base(&self, base_id: BaseId) -> bool {
        self.from_base_id == Some(base_id) || self.to_base_id == Some(base_id)
    }

    /// Log order: insertion time, ties broken by identifier.
    pub fn log_order(&self) -> (DateTime<Utc>, MovementId) {
        (self.recorded_at, self.id)
    }
}

/// Conjunctive filter over the movement log. Empty matches everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementFilter {
    pub kind: Option<MovementKind>,
    pub equipment_id: Option<EquipmentId>,
    /// Matches either endpoint of a movement.
    pub base_id: Option<BaseId>,
}

impl MovementFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn of_kind(kind: MovementKind) -> Self {
        Self {
            kind: Some(kind),
            ..Self::default()
        }
    }

    pub fn for_key(key: BalanceKey) -> Self {
        Self {
            equipment_id: Some(key.equipment_id),
            base_id: Some(key.base_id),
            ..Self::default()
        }
    }

    pub fn matches(&self, record: &MovementRecord) -> bool {
        self.kind.is_none_or(|k| record.kind == k)
            && self.equipment_id.is_none_or(|e| record.equipment_id == e)
            && self.base_id.is_none_or(|b| record.touches_base(b))
    }
}
