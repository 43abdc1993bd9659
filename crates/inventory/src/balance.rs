use serde::{Deserialize, Serialize};

use armory_core::{BaseId, EquipmentId};

/// Key of one balance row: an equipment item at a base.
///
/// Ordering is `(equipment_id, base_id)`; multi-row units lock in this order.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BalanceKey {
    pub equipment_id: EquipmentId,
    pub base_id: BaseId,
}

impl BalanceKey {
    pub fn new(equipment_id: EquipmentId, base_id: BaseId) -> Self {
        Self {
            equipment_id,
            base_id,
        }
    }
}

impl core::fmt::Display for BalanceKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "equipment {} @ base {}", self.equipment_id, self.base_id)
    }
}

/// Current stock of one equipment item at one base.
///
/// `opening_balance` is the pre-ledger baseline (set at provisioning, zero for
/// rows first created by a movement); `closing_balance` is the live figure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryBalance {
    pub equipment_id: EquipmentId,
    pub base_id: BaseId,
    pub opening_balance: i64,
    pub closing_balance: i64,
}

impl InventoryBalance {
    /// A row that has never been touched by provisioning or a movement.
    pub fn untouched(key: BalanceKey) -> Self {
        Self::with_baseline(key, 0)
    }

    pub fn with_baseline(key: BalanceKey, quantity: i64) -> Self {
        Self {
            equipment_id: key.equipment_id,
            base_id: key.base_id,
            opening_balance: quantity,
            closing_balance: quantity,
        }
    }

    pub fn key(&self) -> BalanceKey {
        BalanceKey::new(self.equipment_id, self.base_id)
    }
}

/// One signed change to one balance row.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BalanceDelta {
    pub key: BalanceKey,
    pub delta: i64,
}
