//! Dashboard aggregation.
//!
//! A derived, recomputable view over the balance baseline and the movement
//! log. It holds no state of its own.

use std::sync::Arc;

use serde::Serialize;

use armory_auth::{AccessGate, Credential, OperationKind};

use crate::LedgerError;
use crate::store::{LedgerStore, LedgerTotals, StoreError};

/// Fleet-wide headline figures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    /// Sum of every balance row's pre-ledger baseline.
    pub opening_balance: i64,
    pub purchase_total: i64,
    /// Expenditures only; assignments stay in custody and are not counted.
    pub expended_total: i64,
    /// Purchases only. Transfers move stock between bases and net to zero.
    pub net_movement: i64,
    pub closing_balance: i64,
}

impl DashboardStats {
    pub fn from_totals(totals: &LedgerTotals) -> Result<Self, StoreError> {
        let net_movement = totals.purchase_total;
        let closing_balance = totals
            .opening_total
            .checked_add(net_movement)
            .and_then(|v| v.checked_sub(totals.expended_total))
            .ok_or_else(|| StoreError::Overflow("closing_balance".to_string()))?;

        Ok(Self {
            opening_balance: totals.opening_total,
            purchase_total: totals.purchase_total,
            expended_total: totals.expended_total,
            net_movement,
            closing_balance,
        })
    }
}

#[derive(Clone)]
pub struct DashboardAggregator {
    store: Arc<dyn LedgerStore>,
    gate: Arc<dyn AccessGate>,
}

impl DashboardAggregator {
    pub fn new(store: Arc<dyn LedgerStore>, gate: Arc<dyn AccessGate>) -> Self {
        Self { store, gate }
    }

    /// Compute the dashboard from one consistent snapshot.
    #[tracing::instrument(skip(self, credential), fields(role = %credential.role), err)]
    pub async fn stats(&self, credential: &Credential) -> Result<DashboardStats, LedgerError> {
        self.gate
            .authorize(credential, OperationKind::DashboardRead, None)?;

        let totals = self.store.totals().await?;
        Ok(DashboardStats::from_totals(&totals)?)
    }
}
