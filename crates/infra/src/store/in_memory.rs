use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{OwnedRwLockWriteGuard, RwLock};

use armory_core::{BaseId, EquipmentId, MovementId, index_by_id};
use armory_inventory::{
    Base, BalanceKey, CatalogSeed, Equipment, InventoryBalance, MovementDraft, MovementFilter,
    MovementRecord,
};

use super::r#trait::{LedgerStore, LedgerTotals, StoreError, UnitOfWork};

#[derive(Debug, Default)]
struct LedgerState {
    equipment: HashMap<EquipmentId, Equipment>,
    bases: HashMap<BaseId, Base>,
    balances: BTreeMap<BalanceKey, InventoryBalance>,
    movements: Vec<MovementRecord>,
}

/// In-memory ledger store.
///
/// Intended for tests/dev. A unit of work holds the store's write lock for
/// its whole lifetime, so units are fully serialized; readers see only
/// committed state.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedgerStore {
    state: Arc<RwLock<LedgerState>>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store already provisioned with `seed`.
    pub fn from_seed(seed: &CatalogSeed) -> Result<Self, StoreError> {
        seed.validate()
            .map_err(|e| StoreError::InvalidSeed(e.to_string()))?;

        let mut state = LedgerState {
            equipment: index_by_id(seed.equipment.iter().cloned()),
            bases: index_by_id(seed.bases.iter().cloned()),
            ..LedgerState::default()
        };
        for ob in &seed.opening_balances {
            state
                .balances
                .insert(ob.key(), InventoryBalance::with_baseline(ob.key(), ob.quantity));
        }

        Ok(Self {
            state: Arc::new(RwLock::new(state)),
        })
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
        let guard = self.state.clone().write_owned().await;
        Ok(Box::new(InMemoryUnit {
            guard,
            staged_balances: BTreeMap::new(),
            staged_movements: Vec::new(),
            committed: false,
        }))
    }

    async fn balance(&self, key: BalanceKey) -> Result<i64, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .balances
            .get(&key)
            .map(|b| b.closing_balance)
            .unwrap_or(0))
    }

    async fn balances(&self) -> Result<Vec<InventoryBalance>, StoreError> {
        let state = self.state.read().await;
        Ok(state.balances.values().cloned().collect())
    }

    async fn movements(&self, filter: MovementFilter) -> Result<Vec<MovementRecord>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .movements
            .iter()
            .filter(|m| filter.matches(m))
            .cloned()
            .collect())
    }

    async fn totals(&self) -> Result<LedgerTotals, StoreError> {
        let state = self.state.read().await;
        LedgerTotals::from_snapshot(state.balances.values(), state.movements.iter())
    }

    async fn provision(&self, seed: &CatalogSeed) -> Result<(), StoreError> {
        seed.validate()
            .map_err(|e| StoreError::InvalidSeed(e.to_string()))?;

        let mut state = self.state.write().await;
        for e in &seed.equipment {
            state.equipment.entry(e.id).or_insert_with(|| e.clone());
        }
        for b in &seed.bases {
            state.bases.entry(b.id).or_insert_with(|| b.clone());
        }
        for ob in &seed.opening_balances {
            state
                .balances
                .entry(ob.key())
                .or_insert_with(|| InventoryBalance::with_baseline(ob.key(), ob.quantity));
        }
        Ok(())
    }
}

/// Unit of work over [`InMemoryLedgerStore`].
///
/// Changes are staged privately and published into the shared state only on
/// commit; dropping the unit discards them.
struct InMemoryUnit {
    guard: OwnedRwLockWriteGuard<LedgerState>,
    staged_balances: BTreeMap<BalanceKey, InventoryBalance>,
    staged_movements: Vec<MovementRecord>,
    committed: bool,
}

impl InMemoryUnit {
    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.committed {
            return Err(StoreError::AlreadyCommitted);
        }
        Ok(())
    }

    fn current(&self, key: BalanceKey) -> InventoryBalance {
        self.staged_balances
            .get(&key)
            .or_else(|| self.guard.balances.get(&key))
            .cloned()
            .unwrap_or_else(|| InventoryBalance::untouched(key))
    }
}

#[async_trait]
impl UnitOfWork for InMemoryUnit {
    async fn equipment_exists(&mut self, id: EquipmentId) -> Result<bool, StoreError> {
        Ok(self.guard.equipment.contains_key(&id))
    }

    async fn base_exists(&mut self, id: BaseId) -> Result<bool, StoreError> {
        Ok(self.guard.bases.contains_key(&id))
    }

    async fn lock_balance(&mut self, key: BalanceKey) -> Result<i64, StoreError> {
        // The unit already holds the store-wide write lock.
        self.ensure_open()?;
        Ok(self.current(key).closing_balance)
    }

    async fn apply_delta(&mut self, key: BalanceKey, delta: i64) -> Result<InventoryBalance, StoreError> {
        self.ensure_open()?;
        let mut row = self.current(key);
        row.closing_balance = row
            .closing_balance
            .checked_add(delta)
            .ok_or_else(|| StoreError::Overflow(format!("balance of {key}")))?;
        self.staged_balances.insert(key, row.clone());
        Ok(row)
    }

    async fn append_movement(&mut self, draft: MovementDraft) -> Result<MovementRecord, StoreError> {
        self.ensure_open()?;
        let record = draft.into_record(MovementId::new(), Utc::now());
        self.staged_movements.push(record.clone());
        Ok(record)
    }

    async fn commit(&mut self) -> Result<(), StoreError> {
        self.ensure_open()?;
        let balances = std::mem::take(&mut self.staged_balances);
        let movements = std::mem::take(&mut self.staged_movements);

        self.guard.balances.extend(balances);
        self.guard.movements.extend(movements);
        self.committed = true;
        Ok(())
    }
}

impl Drop for InMemoryUnit {
    fn drop(&mut self) {
        if !self.committed && !(self.staged_balances.is_empty() && self.staged_movements.is_empty()) {
            tracing::debug!(
                staged_balances = self.staged_balances.len(),
                staged_movements = self.staged_movements.len(),
                "in-memory unit dropped without commit; rolled back"
            );
        }
    }
}
