//! Transaction coordinator: the only write path into the ledger.
//!
//! ```text
//! Command
//!   ↓
//! 1. AccessGate (credential, operation, target base)
//!   ↓
//! 2. Plan (pure validation → balance deltas + movement draft)
//!   ↓
//! 3. Open unit of work
//!   ↓
//! 4. Catalog checks (equipment, every referenced base)
//!   ↓
//! 5. Lock affected rows in ascending key order
//!   ↓
//! 6. Stock policy, balance overflow
//!   ↓
//! 7. Apply deltas, append the movement record
//!   ↓
//! 8. Commit
//! ```
//!
//! Steps 1 and 2 touch no storage. Any failure from step 3 on drops the unit,
//! which rolls back every effect of the call.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{Instrument, info_span};

use armory_auth::{AccessGate, AuthzError, Credential, OperationKind};
use armory_core::{BaseId, DomainError, EquipmentId};
use armory_inventory::{
    Actor, InventoryBalance, LedgerCommand, MovementPlan, MovementRecord, RecordAssignment,
    RecordPurchase, RecordTransfer,
};

use crate::store::{LedgerStore, StoreError, UnitOfWork};

/// What to do when a withdrawal exceeds the stock on hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StockPolicy {
    /// Fail with [`LedgerError::InsufficientStock`] before any mutation.
    #[default]
    RejectInsufficient,
    /// Let balances go negative.
    AllowNegative,
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Authorization(#[from] AuthzError),

    #[error(
        "insufficient stock of equipment {equipment_id} at base {base_id}: available {available}, requested {requested}"
    )]
    InsufficientStock {
        equipment_id: EquipmentId,
        base_id: BaseId,
        available: i64,
        requested: i64,
    },

    /// The atomic write could not complete; nothing was committed.
    #[error("persistence failure: {0}")]
    Persistence(#[from] StoreError),
}

impl LedgerError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

impl From<DomainError> for LedgerError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => LedgerError::Validation(msg),
            DomainError::InsufficientStock {
                equipment_id,
                base_id,
                available,
                requested,
            } => LedgerError::InsufficientStock {
                equipment_id,
                base_id,
                available,
                requested,
            },
        }
    }
}

/// Outcome of one committed ledger operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MovementReceipt {
    pub movement: MovementRecord,
    /// Post-commit balances of every touched row, in lock order.
    pub balances: Vec<InventoryBalance>,
}

/// Applies ledger commands atomically against a [`LedgerStore`].
#[derive(Clone)]
pub struct TransactionCoordinator {
    store: Arc<dyn LedgerStore>,
    gate: Arc<dyn AccessGate>,
    policy: StockPolicy,
}

impl TransactionCoordinator {
    pub fn new(store: Arc<dyn LedgerStore>, gate: Arc<dyn AccessGate>) -> Self {
        Self {
            store,
            gate,
            policy: StockPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: StockPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Role-only check for `operation`, ahead of any input parsing.
    ///
    /// The base-scope half of the gate still runs inside [`Self::execute`].
    pub fn authorize_role(&self, credential: &Credential, operation: OperationKind) -> Result<(), LedgerError> {
        self.gate.authorize_role(credential, operation)?;
        Ok(())
    }

    pub async fn record_purchase(
        &self,
        credential: &Credential,
        cmd: RecordPurchase,
    ) -> Result<MovementReceipt, LedgerError> {
        self.execute(credential, LedgerCommand::Purchase(cmd)).await
    }

    pub async fn record_transfer(
        &self,
        credential: &Credential,
        cmd: RecordTransfer,
    ) -> Result<MovementReceipt, LedgerError> {
        self.execute(credential, LedgerCommand::Transfer(cmd)).await
    }

    pub async fn record_assignment(
        &self,
        credential: &Credential,
        cmd: RecordAssignment,
    ) -> Result<MovementReceipt, LedgerError> {
        self.execute(credential, LedgerCommand::Assignment(cmd)).await
    }

    /// Authorize, validate and atomically apply one command.
    pub async fn execute(
        &self,
        credential: &Credential,
        command: LedgerCommand,
    ) -> Result<MovementReceipt, LedgerError> {
        let operation = command.operation();
        let span = info_span!(
            "ledger.execute",
            operation = %operation,
            equipment_id = %command.equipment_id(),
            bases = ?command.bases(),
            principal_id = %credential.principal_id,
            role = %credential.role,
        );

        async move {
            let result = self.authorize_and_apply(credential, &command).await;
            match &result {
                Ok(receipt) => tracing::info!(
                    movement_id = %receipt.movement.id,
                    kind = %receipt.movement.kind,
                    quantity = receipt.movement.quantity,
                    "movement committed"
                ),
                Err(LedgerError::Persistence(err)) => {
                    tracing::error!(error = %err, "movement rolled back")
                }
                Err(err) => tracing::warn!(error = %err, "movement rejected"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn authorize_and_apply(
        &self,
        credential: &Credential,
        command: &LedgerCommand,
    ) -> Result<MovementReceipt, LedgerError> {
        self.gate
            .authorize(credential, command.operation(), Some(command.target_base()))?;

        let plan = command.plan(Actor::from(credential))?;

        let mut unit = self.store.begin().await?;
        ensure_catalog(unit.as_mut(), command).await?;
        let receipt = self.apply(unit.as_mut(), plan).await?;
        unit.commit().await?;

        Ok(receipt)
    }

    async fn apply(
        &self,
        unit: &mut dyn UnitOfWork,
        plan: MovementPlan,
    ) -> Result<MovementReceipt, LedgerError> {
        let lock_order = plan.lock_order();

        let mut on_hand = Vec::with_capacity(lock_order.len());
        for key in &lock_order {
            on_hand.push((*key, unit.lock_balance(*key).await?));
        }

        if self.policy == StockPolicy::RejectInsufficient {
            for withdrawal in plan.withdrawals() {
                let available = on_hand
                    .iter()
                    .find(|(key, _)| *key == withdrawal.key)
                    .map(|(_, qty)| *qty)
                    .unwrap_or(0);
                let requested = -withdrawal.delta;
                if available < requested {
                    return Err(DomainError::InsufficientStock {
                        equipment_id: withdrawal.key.equipment_id,
                        base_id: withdrawal.key.base_id,
                        available,
                        requested,
                    }
                    .into());
                }
            }
        }

        let mut deltas = Vec::with_capacity(lock_order.len());
        for (key, current) in &on_hand {
            let Some(delta) = plan
                .deltas
                .iter()
                .filter(|d| d.key == *key)
                .try_fold(0i64, |acc, d| acc.checked_add(d.delta))
                .filter(|delta| current.checked_add(*delta).is_some())
            else {
                return Err(LedgerError::validation(format!(
                    "quantity would overflow the balance of {key}"
                )));
            };
            deltas.push((*key, delta));
        }

        let mut balances = Vec::with_capacity(deltas.len());
        for (key, delta) in deltas {
            balances.push(unit.apply_delta(key, delta).await?);
        }

        let movement = unit.append_movement(plan.draft).await?;
        Ok(MovementReceipt { movement, balances })
    }
}

async fn ensure_catalog(unit: &mut dyn UnitOfWork, command: &LedgerCommand) -> Result<(), LedgerError> {
    let equipment_id = command.equipment_id();
    if !unit.equipment_exists(equipment_id).await? {
        return Err(LedgerError::validation(format!("unknown equipment_id {equipment_id}")));
    }
    for base_id in command.bases() {
        if !unit.base_exists(base_id).await? {
            return Err(LedgerError::validation(format!("unknown base_id {base_id}")));
        }
    }
    Ok(())
}
