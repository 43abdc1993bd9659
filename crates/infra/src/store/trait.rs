use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use armory_core::{BaseId, EquipmentId};
use armory_inventory::{
    BalanceKey, CatalogSeed, InventoryBalance, MovementDraft, MovementFilter, MovementKind,
    MovementRecord,
};

/// Store operation error.
///
/// These are **infrastructure errors** as opposed to domain errors
/// (validation, stock). Any of them aborts the current unit of work.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store backend error in {operation}: {message}")]
    Backend {
        operation: &'static str,
        message: String,
    },

    /// The backend aborted the unit to preserve isolation (serialization
    /// failure, deadlock). Nothing was committed.
    #[error("transaction aborted by the backend in {operation}: {message}")]
    Aborted {
        operation: &'static str,
        message: String,
    },

    #[error("stored data is corrupt: {0}")]
    Corrupt(String),

    #[error("unit of work already committed")]
    AlreadyCommitted,

    #[error("invalid catalog seed: {0}")]
    InvalidSeed(String),

    /// A balance or aggregate left the `i64` range.
    #[error("arithmetic overflow in {0}")]
    Overflow(String),
}

impl StoreError {
    pub fn backend(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Backend {
            operation,
            message: message.into(),
        }
    }
}

/// Consistent aggregate read over the balance table and the movement log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LedgerTotals {
    /// Sum of every balance row's pre-ledger baseline.
    pub opening_total: i64,
    pub purchase_total: i64,
    pub transfer_total: i64,
    pub assignment_total: i64,
    pub expended_total: i64,
}

impl LedgerTotals {
    /// Compute totals from a snapshot of rows and records.
    pub fn from_snapshot<'a>(
        balances: impl IntoIterator<Item = &'a InventoryBalance>,
        movements: impl IntoIterator<Item = &'a MovementRecord>,
    ) -> Result<Self, StoreError> {
        let opening_total = balances
            .into_iter()
            .try_fold(0i64, |acc, b| acc.checked_add(b.opening_balance))
            .ok_or_else(|| StoreError::Overflow("opening_total".to_string()))?;

        let mut totals = Self {
            opening_total,
            ..Self::default()
        };
        for m in movements {
            totals.add(m.kind, m.quantity)?;
        }
        Ok(totals)
    }

    pub fn add(&mut self, kind: MovementKind, quantity: i64) -> Result<(), StoreError> {
        let (name, total) = match kind {
            MovementKind::Purchase => ("purchase_total", &mut self.purchase_total),
            MovementKind::Transfer => ("transfer_total", &mut self.transfer_total),
            MovementKind::Assignment => ("assignment_total", &mut self.assignment_total),
            MovementKind::Expenditure => ("expended_total", &mut self.expended_total),
        };
        *total = total
            .checked_add(quantity)
            .ok_or_else(|| StoreError::Overflow(name.to_string()))?;
        Ok(())
    }
}

/// One atomic unit against the balance table and the movement log.
///
/// Nothing done through a unit is visible to other readers until
/// [`UnitOfWork::commit`] succeeds. Dropping a unit without committing rolls
/// it back, on every exit path.
#[async_trait]
pub trait UnitOfWork: Send {
    async fn equipment_exists(&mut self, id: EquipmentId) -> Result<bool, StoreError>;

    async fn base_exists(&mut self, id: BaseId) -> Result<bool, StoreError>;

    /// Lock one balance row for the rest of the unit and return its current
    /// closing balance (0 for a row never touched).
    ///
    /// Callers locking several rows must do so in ascending key order.
    async fn lock_balance(&mut self, key: BalanceKey) -> Result<i64, StoreError>;

    /// Add `delta` to a row's closing balance, creating the row on first touch.
    async fn apply_delta(&mut self, key: BalanceKey, delta: i64) -> Result<InventoryBalance, StoreError>;

    /// Append one record to the movement log (assigns id and timestamp).
    async fn append_movement(&mut self, draft: MovementDraft) -> Result<MovementRecord, StoreError>;

    async fn commit(&mut self) -> Result<(), StoreError>;
}

/// Ledger persistence: balance table + append-only movement log.
///
/// There is deliberately no way to update or delete a movement record.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Open a unit of work. Mutations only ever happen through a unit.
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError>;

    /// Committed closing balance of one row (0 if absent).
    async fn balance(&self, key: BalanceKey) -> Result<i64, StoreError>;

    /// All balance rows, ordered by key.
    async fn balances(&self) -> Result<Vec<InventoryBalance>, StoreError>;

    /// Movement records matching `filter`, in log order.
    async fn movements(&self, filter: MovementFilter) -> Result<Vec<MovementRecord>, StoreError>;

    /// Consistent totals for the dashboard.
    async fn totals(&self) -> Result<LedgerTotals, StoreError>;

    /// Provision catalog entries and opening baselines.
    ///
    /// Existing catalog entries and balance rows are left untouched.
    async fn provision(&self, seed: &CatalogSeed) -> Result<(), StoreError>;
}

#[async_trait]
impl<S> LedgerStore for Arc<S>
where
    S: LedgerStore + ?Sized,
{
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
        (**self).begin().await
    }

    async fn balance(&self, key: BalanceKey) -> Result<i64, StoreError> {
        (**self).balance(key).await
    }

    async fn balances(&self) -> Result<Vec<InventoryBalance>, StoreError> {
        (**self).balances().await
    }

    async fn movements(&self, filter: MovementFilter) -> Result<Vec<MovementRecord>, StoreError> {
        (**self).movements(filter).await
    }

    async fn totals(&self) -> Result<LedgerTotals, StoreError> {
        (**self).totals().await
    }

    async fn provision(&self, seed: &CatalogSeed) -> Result<(), StoreError> {
        (**self).provision(seed).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use armory_auth::{PrincipalId, Role};
    use armory_core::MovementId;
    use armory_inventory::Actor;
    use chrono::Utc;

    fn purchase(base_id: BaseId, quantity: i64) -> MovementRecord {
        MovementDraft {
            kind: MovementKind::Purchase,
            equipment_id: EquipmentId::new(1),
            from_base_id: None,
            to_base_id: Some(base_id),
            quantity,
            personnel_name: None,
            actor: Actor {
                principal_id: PrincipalId::new(),
                role: Role::Logistics,
            },
        }
        .into_record(MovementId::new(), Utc::now())
    }

    #[test]
    fn totals_sum_baselines_and_per_kind_quantities() {
        let key = BalanceKey::new(EquipmentId::new(1), BaseId::new(1));
        let balances = [InventoryBalance::with_baseline(key, 7)];
        let movements = [purchase(BaseId::new(1), 3), purchase(BaseId::new(2), 4)];

        let totals = LedgerTotals::from_snapshot(&balances, &movements).unwrap();
        assert_eq!(totals.opening_total, 7);
        assert_eq!(totals.purchase_total, 7);
        assert_eq!(totals.expended_total, 0);
    }

    #[test]
    fn overflowing_totals_are_errors() {
        let balances = [
            InventoryBalance::with_baseline(BalanceKey::new(EquipmentId::new(1), BaseId::new(1)), i64::MAX),
            InventoryBalance::with_baseline(BalanceKey::new(EquipmentId::new(1), BaseId::new(2)), 1),
        ];
        assert!(matches!(
            LedgerTotals::from_snapshot(&balances, std::iter::empty::<&MovementRecord>()),
            Err(StoreError::Overflow(field)) if field == "opening_total"
        ));

        let movements = [purchase(BaseId::new(1), i64::MAX), purchase(BaseId::new(2), 1)];
        assert!(matches!(
            LedgerTotals::from_snapshot(std::iter::empty::<&InventoryBalance>(), &movements),
            Err(StoreError::Overflow(field)) if field == "purchase_total"
        ));
    }
}
