//! Audit reads over the ledger: movement history, balance rows, and
//! reconciliation of stored balances against the movement log.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use armory_auth::{AccessGate, Credential, OperationKind};
use armory_inventory::{BalanceKey, InventoryBalance, MovementFilter, MovementRecord};

use crate::LedgerError;
use crate::store::{LedgerStore, StoreError};

/// A balance row whose stored figure disagrees with its movement history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Discrepancy {
    pub key: BalanceKey,
    pub opening_balance: i64,
    /// `opening_balance` plus the signed sum of every movement touching the row.
    pub expected: i64,
    pub stored: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconciliationReport {
    pub checked: usize,
    pub discrepancies: Vec<Discrepancy>,
}

impl ReconciliationReport {
    pub fn is_consistent(&self) -> bool {
        self.discrepancies.is_empty()
    }

    /// Replay the log over the baselines and compare with the stored rows.
    ///
    /// A row referenced by the log but missing from `balances` is reported
    /// with `stored = 0`.
    pub fn compute(balances: &[InventoryBalance], movements: &[MovementRecord]) -> Result<Self, StoreError> {
        let mut rows: BTreeMap<BalanceKey, (i64, i64, i64)> = balances
            .iter()
            .map(|b| (b.key(), (b.opening_balance, b.opening_balance, b.closing_balance)))
            .collect();

        for movement in movements {
            for key in movement.keys() {
                let row = rows.entry(key).or_insert((0, 0, 0));
                row.1 = row
                    .1
                    .checked_add(movement.delta_for(key))
                    .ok_or_else(|| StoreError::Overflow(format!("expected balance of {key}")))?;
            }
        }

        let discrepancies = rows
            .iter()
            .filter(|(_, (_, expected, stored))| expected != stored)
            .map(|(key, (opening, expected, stored))| Discrepancy {
                key: *key,
                opening_balance: *opening,
                expected: *expected,
                stored: *stored,
            })
            .collect();

        Ok(Self {
            checked: rows.len(),
            discrepancies,
        })
    }
}

/// Admin-only reads over the ledger.
#[derive(Clone)]
pub struct AuditReader {
    store: Arc<dyn LedgerStore>,
    gate: Arc<dyn AccessGate>,
}

impl AuditReader {
    pub fn new(store: Arc<dyn LedgerStore>, gate: Arc<dyn AccessGate>) -> Self {
        Self { store, gate }
    }

    /// Admin-only gate shared by every read here; callers may run it ahead
    /// of parsing their filters.
    pub fn authorize(&self, credential: &Credential) -> Result<(), LedgerError> {
        self.gate
            .authorize(credential, OperationKind::AuditRead, None)?;
        Ok(())
    }

    pub async fn movements(
        &self,
        credential: &Credential,
        filter: MovementFilter,
    ) -> Result<Vec<MovementRecord>, LedgerError> {
        self.authorize(credential)?;
        Ok(self.store.movements(filter).await?)
    }

    pub async fn balances(&self, credential: &Credential) -> Result<Vec<InventoryBalance>, LedgerError> {
        self.authorize(credential)?;
        Ok(self.store.balances().await?)
    }

    #[tracing::instrument(skip(self, credential), err)]
    pub async fn reconcile(&self, credential: &Credential) -> Result<ReconciliationReport, LedgerError> {
        self.authorize(credential)?;

        // Two reads, not one snapshot: a movement committed in between shows
        // up as a transient discrepancy.
        let balances = self.store.balances().await?;
        let movements = self.store.movements(MovementFilter::all()).await?;
        let report = ReconciliationReport::compute(&balances, &movements)?;

        if !report.is_consistent() {
            tracing::warn!(
                discrepancies = report.discrepancies.len(),
                checked = report.checked,
                "ledger reconciliation found discrepancies"
            );
        }
        Ok(report)
    }
}
