//! Ledger commands and their planning into balance deltas.
//!
//! Planning is pure: it validates the command and describes *what* must
//! change. Applying the plan atomically belongs to the coordinator.

use serde::{Deserialize, Serialize};

use armory_auth::OperationKind;
use armory_core::{BaseId, DomainError, DomainResult, EquipmentId};

use crate::{Actor, BalanceDelta, BalanceKey, MovementDraft, MovementKind};

/// Command: RecordPurchase (procurement into one base).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordPurchase {
    pub equipment_id: EquipmentId,
    pub base_id: BaseId,
    pub quantity: i64,
}

/// Command: RecordTransfer (move stock between two bases).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordTransfer {
    pub equipment_id: EquipmentId,
    pub from_base_id: BaseId,
    pub to_base_id: BaseId,
    pub quantity: i64,
}

/// How stock leaves a base when issued to personnel.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IssueKind {
    /// Issued to personnel, still in military custody.
    Assignment,
    /// Consumed / unrecoverable.
    Expenditure,
}

impl From<IssueKind> for MovementKind {
    fn from(value: IssueKind) -> Self {
        match value {
            IssueKind::Assignment => MovementKind::Assignment,
            IssueKind::Expenditure => MovementKind::Expenditure,
        }
    }
}

/// Command: RecordAssignment (assignment or expenditure at one base).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordAssignment {
    pub equipment_id: EquipmentId,
    pub base_id: BaseId,
    pub quantity: i64,
    pub kind: IssueKind,
    pub personnel_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerCommand {
    Purchase(RecordPurchase),
    Transfer(RecordTransfer),
    Assignment(RecordAssignment),
}

/// Validated description of one atomic ledger change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovementPlan {
    pub deltas: Vec<BalanceDelta>,
    pub draft: MovementDraft,
}

impl MovementPlan {
    /// Affected rows in the order they must be locked.
    pub fn lock_order(&self) -> Vec<BalanceKey> {
        let mut keys: Vec<BalanceKey> = self.deltas.iter().map(|d| d.key).collect();
        keys.sort();
        keys.dedup();
        keys
    }

    /// Rows whose balance decreases, with the amount taken out.
    pub fn withdrawals(&self) -> impl Iterator<Item = BalanceDelta> + '_ {
        self.deltas.iter().copied().filter(|d| d.delta < 0)
    }
}

impl LedgerCommand {
    pub fn movement_kind(&self) -> MovementKind {
        match self {
            LedgerCommand::Purchase(_) => MovementKind::Purchase,
            LedgerCommand::Transfer(_) => MovementKind::Transfer,
            LedgerCommand::Assignment(cmd) => cmd.kind.into(),
        }
    }

    /// The access-gate operation guarding this command.
    pub fn operation(&self) -> OperationKind {
        match self.movement_kind() {
            MovementKind::Purchase => OperationKind::Purchase,
            MovementKind::Transfer => OperationKind::Transfer,
            MovementKind::Assignment => OperationKind::Assignment,
            MovementKind::Expenditure => OperationKind::Expenditure,
        }
    }

    /// Base the access gate scopes the command to.
    pub fn target_base(&self) -> BaseId {
        match self {
            LedgerCommand::Purchase(cmd) => cmd.base_id,
            LedgerCommand::Transfer(cmd) => cmd.from_base_id,
            LedgerCommand::Assignment(cmd) => cmd.base_id,
        }
    }

    pub fn equipment_id(&self) -> EquipmentId {
        match self {
            LedgerCommand::Purchase(cmd) => cmd.equipment_id,
            LedgerCommand::Transfer(cmd) => cmd.equipment_id,
            LedgerCommand::Assignment(cmd) => cmd.equipment_id,
        }
    }

    /// Every base the command references (for catalog checks).
    pub fn bases(&self) -> Vec<BaseId> {
        match self {
            LedgerCommand::Purchase(cmd) => vec![cmd.base_id],
            LedgerCommand::Transfer(cmd) => vec![cmd.from_base_id, cmd.to_base_id],
            LedgerCommand::Assignment(cmd) => vec![cmd.base_id],
        }
    }

    /// Validate the command and plan its balance deltas.
    pub fn plan(&self, actor: Actor) -> DomainResult<MovementPlan> {
        match self {
            LedgerCommand::Purchase(cmd) => plan_purchase(cmd, actor),
            LedgerCommand::Transfer(cmd) => plan_transfer(cmd, actor),
            LedgerCommand::Assignment(cmd) => plan_assignment(cmd, actor),
        }
    }
}

/// Largest quantity a single movement may carry.
///
/// Keeps balances and fleet-wide totals far from `i64` overflow.
pub const MAX_QUANTITY: i64 = 1_000_000_000;

fn ensure_positive(quantity: i64) -> DomainResult<()> {
    if quantity <= 0 {
        return Err(DomainError::validation("quantity must be greater than zero"));
    }
    if quantity > MAX_QUANTITY {
        return Err(DomainError::validation(format!(
            "quantity must not exceed {MAX_QUANTITY}"
        )));
    }
    Ok(())
}

fn plan_purchase(cmd: &RecordPurchase, actor: Actor) -> DomainResult<MovementPlan> {
    ensure_positive(cmd.quantity)?;

    Ok(MovementPlan {
        deltas: vec![BalanceDelta {
            key: BalanceKey::new(cmd.equipment_id, cmd.base_id),
            delta: cmd.quantity,
        }],
        draft: MovementDraft {
            kind: MovementKind::Purchase,
            equipment_id: cmd.equipment_id,
            from_base_id: None,
            to_base_id: Some(cmd.base_id),
            quantity: cmd.quantity,
            personnel_name: None,
            actor,
        },
    })
}

fn plan_transfer(cmd: &RecordTransfer, actor: Actor) -> DomainResult<MovementPlan> {
    if cmd.from_base_id == cmd.to_base_id {
        return Err(DomainError::validation(
            "source and destination bases must be different",
        ));
    }
    ensure_positive(cmd.quantity)?;

    Ok(MovementPlan {
        deltas: vec![
            BalanceDelta {
                key: BalanceKey::new(cmd.equipment_id, cmd.from_base_id),
                delta: -cmd.quantity,
            },
            BalanceDelta {
                key: BalanceKey::new(cmd.equipment_id, cmd.to_base_id),
                delta: cmd.quantity,
            },
        ],
        draft: MovementDraft {
            kind: MovementKind::Transfer,
            equipment_id: cmd.equipment_id,
            from_base_id: Some(cmd.from_base_id),
            to_base_id: Some(cmd.to_base_id),
            quantity: cmd.quantity,
            personnel_name: None,
            actor,
        },
    })
}

fn plan_assignment(cmd: &RecordAssignment, actor: Actor) -> DomainResult<MovementPlan> {
    let personnel_name = cmd.personnel_name.trim();
    if personnel_name.is_empty() {
        return Err(DomainError::validation("personnel_name cannot be empty"));
    }
    ensure_positive(cmd.quantity)?;

    Ok(MovementPlan {
        deltas: vec![BalanceDelta {
            key: BalanceKey::new(cmd.equipment_id, cmd.base_id),
            delta: -cmd.quantity,
        }],
        draft: MovementDraft {
            kind: cmd.kind.into(),
            equipment_id: cmd.equipment_id,
            from_base_id: Some(cmd.base_id),
            to_base_id: None,
            quantity: cmd.quantity,
            personnel_name: Some(personnel_name.to_string()),
            actor,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use armory_auth::{PrincipalId, Role};
    use proptest::prelude::*;

    const E1: EquipmentId = EquipmentId::new(1);
    const B1: BaseId = BaseId::new(1);
    const B2: BaseId = BaseId::new(2);

    fn actor() -> Actor {
        Actor {
            principal_id: PrincipalId::new(),
            role: Role::Admin,
        }
    }

    fn net(plan: &MovementPlan) -> i64 {
        plan.deltas.iter().map(|d| d.delta).sum()
    }

    #[test]
    fn purchase_plans_one_increment_and_a_purchase_record() {
        let cmd = LedgerCommand::Purchase(RecordPurchase {
            equipment_id: E1,
            base_id: B1,
            quantity: 10,
        });

        let plan = cmd.plan(actor()).unwrap();
        assert_eq!(
            plan.deltas,
            vec![BalanceDelta {
                key: BalanceKey::new(E1, B1),
                delta: 10
            }]
        );
        assert_eq!(plan.draft.kind, MovementKind::Purchase);
        assert_eq!(plan.draft.to_base_id, Some(B1));
        assert_eq!(plan.draft.from_base_id, None);
    }

    #[test]
    fn transfer_between_same_base_is_rejected() {
        let cmd = LedgerCommand::Transfer(RecordTransfer {
            equipment_id: E1,
            from_base_id: B1,
            to_base_id: B1,
            quantity: 5,
        });

        match cmd.plan(actor()) {
            Err(DomainError::Validation(msg)) if msg.contains("must be different") => {}
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn non_positive_quantities_are_rejected() {
        for quantity in [0, -3] {
            let cmd = LedgerCommand::Purchase(RecordPurchase {
                equipment_id: E1,
                base_id: B1,
                quantity,
            });
            assert!(matches!(cmd.plan(actor()), Err(DomainError::Validation(_))));
        }
    }

    #[test]
    fn oversized_quantities_are_rejected() {
        for quantity in [MAX_QUANTITY + 1, i64::MAX] {
            let cmd = LedgerCommand::Transfer(RecordTransfer {
                equipment_id: E1,
                from_base_id: B1,
                to_base_id: B2,
                quantity,
            });
            assert!(matches!(cmd.plan(actor()), Err(DomainError::Validation(msg)) if msg.contains("exceed")));
        }

        let cmd = LedgerCommand::Purchase(RecordPurchase {
            equipment_id: E1,
            base_id: B1,
            quantity: MAX_QUANTITY,
        });
        assert!(cmd.plan(actor()).is_ok());
    }

    #[test]
    fn assignment_requires_personnel_name() {
        let cmd = LedgerCommand::Assignment(RecordAssignment {
            equipment_id: E1,
            base_id: B1,
            quantity: 1,
            kind: IssueKind::Assignment,
            personnel_name: "   ".to_string(),
        });
        assert!(matches!(cmd.plan(actor()), Err(DomainError::Validation(_))));
    }

    #[test]
    fn assignment_and_expenditure_differ_only_in_kind() {
        let make = |kind| {
            LedgerCommand::Assignment(RecordAssignment {
                equipment_id: E1,
                base_id: B2,
                quantity: 3,
                kind,
                personnel_name: " Sgt. Rivera ".to_string(),
            })
        };
        let actor = actor();

        let assigned = make(IssueKind::Assignment).plan(actor).unwrap();
        let expended = make(IssueKind::Expenditure).plan(actor).unwrap();

        assert_eq!(assigned.deltas, expended.deltas);
        assert_eq!(assigned.draft.kind, MovementKind::Assignment);
        assert_eq!(expended.draft.kind, MovementKind::Expenditure);
        assert_eq!(assigned.draft.personnel_name.as_deref(), Some("Sgt. Rivera"));
        assert_eq!(make(IssueKind::Expenditure).operation(), OperationKind::Expenditure);
    }

    #[test]
    fn transfer_lock_order_is_sorted() {
        let cmd = LedgerCommand::Transfer(RecordTransfer {
            equipment_id: E1,
            from_base_id: B2,
            to_base_id: B1,
            quantity: 1,
        });
        let plan = cmd.plan(actor()).unwrap();
        assert_eq!(
            plan.lock_order(),
            vec![BalanceKey::new(E1, B1), BalanceKey::new(E1, B2)]
        );
        assert_eq!(plan.withdrawals().count(), 1);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: a transfer plan conserves fleet-wide quantity and moves
        /// exactly `q` out of the source and into the destination.
        #[test]
        fn transfer_plans_conserve_quantity(
            from in 1i64..50,
            to in 1i64..50,
            quantity in 1i64..1_000_000,
        ) {
            prop_assume!(from != to);
            let cmd = LedgerCommand::Transfer(RecordTransfer {
                equipment_id: E1,
                from_base_id: BaseId::new(from),
                to_base_id: BaseId::new(to),
                quantity,
            });

            let plan = cmd.plan(actor()).unwrap();
            prop_assert_eq!(net(&plan), 0);
            prop_assert_eq!(plan.draft.quantity, quantity);
            prop_assert!(plan.deltas.iter().all(|d| d.delta.abs() == quantity));
        }

        /// Property: every successful plan records a positive quantity whose
        /// net effect matches its kind.
        #[test]
        fn planned_quantity_is_positive_and_net_matches_kind(
            quantity in -100i64..100,
            expend in any::<bool>(),
        ) {
            let issue = LedgerCommand::Assignment(RecordAssignment {
                equipment_id: E1,
                base_id: B1,
                quantity,
                kind: if expend { IssueKind::Expenditure } else { IssueKind::Assignment },
                personnel_name: "Cpl. Hale".to_string(),
            });
            let purchase = LedgerCommand::Purchase(RecordPurchase {
                equipment_id: E1,
                base_id: B1,
                quantity,
            });

            match (issue.plan(actor()), purchase.plan(actor())) {
                (Ok(i), Ok(p)) => {
                    prop_assert!(quantity > 0);
                    prop_assert_eq!(net(&i), -quantity);
                    prop_assert_eq!(net(&p), quantity);
                }
                (Err(_), Err(_)) => prop_assert!(quantity <= 0),
                _ => prop_assert!(false, "purchase and issue disagree on quantity validity"),
            }
        }
    }
}
