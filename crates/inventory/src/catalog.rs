//! Immutable catalog entries and the provisioning seed.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use armory_core::{BaseId, DomainError, DomainResult, Entity, EquipmentId};

use crate::BalanceKey;

/// Equipment catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Equipment {
    pub id: EquipmentId,
    pub name: String,
}

impl Entity for Equipment {
    type Id = EquipmentId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Base catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Base {
    pub id: BaseId,
    pub name: String,
}

impl Entity for Base {
    type Id = BaseId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Pre-ledger stock for one pair, recorded as its opening baseline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpeningBalance {
    pub equipment_id: EquipmentId,
    pub base_id: BaseId,
    pub quantity: i64,
}

impl OpeningBalance {
    pub fn key(&self) -> BalanceKey {
        BalanceKey::new(self.equipment_id, self.base_id)
    }
}

/// Provisioning input: catalog entries plus opening baselines.
///
/// Provisioning happens outside the ledger; the seed is how a deployment
/// (or a test) hands the store its starting world.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogSeed {
    #[serde(default)]
    pub equipment: Vec<Equipment>,
    #[serde(default)]
    pub bases: Vec<Base>,
    #[serde(default)]
    pub opening_balances: Vec<OpeningBalance>,
}

impl CatalogSeed {
    /// Check the seed is self-consistent before it is provisioned.
    pub fn validate(&self) -> DomainResult<()> {
        let equipment: HashSet<EquipmentId> = self.equipment.iter().map(|e| e.id).collect();
        let bases: HashSet<BaseId> = self.bases.iter().map(|b| b.id).collect();

        if let Some(e) = self.equipment.iter().find(|e| e.name.trim().is_empty()) {
            return Err(DomainError::validation(format!("equipment {} has an empty name", e.id)));
        }
        if let Some(b) = self.bases.iter().find(|b| b.name.trim().is_empty()) {
            return Err(DomainError::validation(format!("base {} has an empty name", b.id)));
        }

        let mut seen = HashSet::new();
        for ob in &self.opening_balances {
            if !equipment.contains(&ob.equipment_id) {
                return Err(DomainError::validation(format!(
                    "opening balance references unknown equipment {}",
                    ob.equipment_id
                )));
            }
            if !bases.contains(&ob.base_id) {
                return Err(DomainError::validation(format!(
                    "opening balance references unknown base {}",
                    ob.base_id
                )));
            }
            if ob.quantity < 0 {
                return Err(DomainError::validation(format!(
                    "opening balance for {} cannot be negative",
                    ob.key()
                )));
            }
            if !seen.insert(ob.key()) {
                return Err(DomainError::validation(format!(
                    "duplicate opening balance for {}",
                    ob.key()
                )));
            }
        }

        Ok(())
    }
}
