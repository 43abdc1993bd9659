//! Integration tests for the full ledger pipeline.
//!
//! Tests: Credential → AccessGate → Coordinator → LedgerStore → Dashboard
//!
//! Verifies:
//! - Each operation changes balances and appends exactly one record
//! - Failures inside a unit of work leave no trace
//! - Concurrent operations on the same rows do not lose updates

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;

    use armory_auth::{AuthzError, Credential, PrincipalId, Role, RoleMatrixGate};
    use armory_core::{BaseId, EquipmentId};
    use armory_inventory::{
        Base, BalanceKey, CatalogSeed, Equipment, InventoryBalance, IssueKind, MovementDraft,
        MovementFilter, MovementKind, MovementRecord, OpeningBalance, RecordAssignment,
        RecordPurchase, RecordTransfer,
    };

    use crate::store::{InMemoryLedgerStore, LedgerStore, LedgerTotals, StoreError, UnitOfWork};
    use crate::{AuditReader, DashboardAggregator, LedgerError, StockPolicy, TransactionCoordinator};

    const E1: EquipmentId = EquipmentId::new(1);
    const B1: BaseId = BaseId::new(1);
    const B2: BaseId = BaseId::new(2);

    fn seed() -> CatalogSeed {
        CatalogSeed {
            equipment: vec![Equipment {
                id: E1,
                name: "M4 Carbine".to_string(),
            }],
            bases: vec![
                Base {
                    id: B1,
                    name: "Fort Alpha".to_string(),
                },
                Base {
                    id: B2,
                    name: "Camp Bravo".to_string(),
                },
            ],
            opening_balances: vec![
                OpeningBalance {
                    equipment_id: E1,
                    base_id: B1,
                    quantity: 20,
                },
                OpeningBalance {
                    equipment_id: E1,
                    base_id: B2,
                    quantity: 10,
                },
            ],
        }
    }

    fn admin() -> Credential {
        Credential::new(PrincipalId::new(), Role::Admin, None)
    }

    fn logistics() -> Credential {
        Credential::new(PrincipalId::new(), Role::Logistics, None)
    }

    fn commander_of(base: BaseId) -> Credential {
        Credential::new(PrincipalId::new(), Role::BaseCommander, Some(base))
    }

    fn setup_with(store: Arc<dyn LedgerStore>) -> (TransactionCoordinator, DashboardAggregator, AuditReader) {
        let gate = Arc::new(RoleMatrixGate::new());
        (
            TransactionCoordinator::new(store.clone(), gate.clone()),
            DashboardAggregator::new(store.clone(), gate.clone()),
            AuditReader::new(store, gate),
        )
    }

    fn setup() -> (TransactionCoordinator, DashboardAggregator, AuditReader, Arc<InMemoryLedgerStore>) {
        let store = Arc::new(InMemoryLedgerStore::from_seed(&seed()).unwrap());
        let (coordinator, dashboard, audit) = setup_with(store.clone());
        (coordinator, dashboard, audit, store)
    }

    async fn balance_of(store: &InMemoryLedgerStore, base: BaseId) -> i64 {
        store.balance(BalanceKey::new(E1, base)).await.unwrap()
    }

    #[tokio::test]
    async fn purchase_increments_balance_and_logs_one_record() {
        let (coordinator, _, _, store) = setup();

        let receipt = coordinator
            .record_purchase(
                &logistics(),
                RecordPurchase {
                    equipment_id: E1,
                    base_id: B1,
                    quantity: 10,
                },
            )
            .await
            .unwrap();

        assert_eq!(balance_of(&store, B1).await, 30);
        assert_eq!(receipt.balances.len(), 1);
        assert_eq!(receipt.balances[0].closing_balance, 30);

        let log = store
            .movements(MovementFilter::of_kind(MovementKind::Purchase))
            .await
            .unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].id, receipt.movement.id);
        assert_eq!(log[0].to_base_id, Some(B1));
        assert_eq!(log[0].quantity, 10);
    }

    #[tokio::test]
    async fn transfer_moves_stock_and_conserves_fleet_total() {
        let (coordinator, _, _, store) = setup();
        let fleet_before = balance_of(&store, B1).await + balance_of(&store, B2).await;

        coordinator
            .record_transfer(
                &admin(),
                RecordTransfer {
                    equipment_id: E1,
                    from_base_id: B1,
                    to_base_id: B2,
                    quantity: 5,
                },
            )
            .await
            .unwrap();

        assert_eq!(balance_of(&store, B1).await, 15);
        assert_eq!(balance_of(&store, B2).await, 15);
        assert_eq!(balance_of(&store, B1).await + balance_of(&store, B2).await, fleet_before);

        let log = store.movements(MovementFilter::all()).await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].kind, MovementKind::Transfer);
        assert_eq!((log[0].from_base_id, log[0].to_base_id), (Some(B1), Some(B2)));
    }

    #[tokio::test]
    async fn commander_cannot_issue_from_another_base() {
        let (coordinator, _, _, store) = setup();

        let err = coordinator
            .record_assignment(
                &commander_of(B1),
                RecordAssignment {
                    equipment_id: E1,
                    base_id: B2,
                    quantity: 3,
                    kind: IssueKind::Expenditure,
                    personnel_name: "Pvt. Doyle".to_string(),
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            LedgerError::Authorization(AuthzError::BaseScopeMismatch { .. })
        ));
        assert_eq!(balance_of(&store, B2).await, 10);
        assert!(store.movements(MovementFilter::all()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn commander_can_issue_from_own_base() {
        let (coordinator, _, _, store) = setup();

        let receipt = coordinator
            .record_assignment(
                &commander_of(B2),
                RecordAssignment {
                    equipment_id: E1,
                    base_id: B2,
                    quantity: 3,
                    kind: IssueKind::Assignment,
                    personnel_name: "Pvt. Doyle".to_string(),
                },
            )
            .await
            .unwrap();

        assert_eq!(balance_of(&store, B2).await, 7);
        assert_eq!(receipt.movement.personnel_name.as_deref(), Some("Pvt. Doyle"));
        assert_eq!(receipt.movement.from_base_id, Some(B2));
    }

    #[tokio::test]
    async fn transfer_to_same_base_is_rejected_without_change() {
        let (coordinator, _, _, store) = setup();

        let err = coordinator
            .record_transfer(
                &logistics(),
                RecordTransfer {
                    equipment_id: E1,
                    from_base_id: B1,
                    to_base_id: B1,
                    quantity: 5,
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, LedgerError::Validation(_)));
        assert_eq!(balance_of(&store, B1).await, 20);
        assert!(store.movements(MovementFilter::all()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn dashboard_counts_purchases_and_expenditures_only() {
        let (coordinator, dashboard, _, _store) = setup();
        let admin = admin();

        coordinator
            .record_purchase(
                &admin,
                RecordPurchase {
                    equipment_id: E1,
                    base_id: B1,
                    quantity: 10,
                },
            )
            .await
            .unwrap();
        coordinator
            .record_transfer(
                &admin,
                RecordTransfer {
                    equipment_id: E1,
                    from_base_id: B1,
                    to_base_id: B2,
                    quantity: 7,
                },
            )
            .await
            .unwrap();
        for kind in [IssueKind::Assignment, IssueKind::Expenditure] {
            coordinator
                .record_assignment(
                    &admin,
                    RecordAssignment {
                        equipment_id: E1,
                        base_id: B2,
                        quantity: 2,
                        kind,
                        personnel_name: "Sgt. Park".to_string(),
                    },
                )
                .await
                .unwrap();
        }

        let stats = dashboard.stats(&admin).await.unwrap();
        assert_eq!(stats.opening_balance, 30);
        assert_eq!(stats.purchase_total, 10);
        assert_eq!(stats.net_movement, 10);
        assert_eq!(stats.expended_total, 2);
        assert_eq!(stats.closing_balance, 38);

        let err = dashboard.stats(&logistics()).await.unwrap_err();
        assert!(matches!(err, LedgerError::Authorization(_)));
    }

    #[tokio::test]
    async fn audit_reads_filter_and_reconcile() {
        let (coordinator, _, audit, _store) = setup();
        let admin = admin();

        coordinator
            .record_transfer(
                &admin,
                RecordTransfer {
                    equipment_id: E1,
                    from_base_id: B2,
                    to_base_id: B1,
                    quantity: 4,
                },
            )
            .await
            .unwrap();
        coordinator
            .record_purchase(
                &admin,
                RecordPurchase {
                    equipment_id: E1,
                    base_id: B1,
                    quantity: 1,
                },
            )
            .await
            .unwrap();

        let at_b2 = audit
            .movements(
                &admin,
                MovementFilter {
                    base_id: Some(B2),
                    ..MovementFilter::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(at_b2.len(), 1);
        assert_eq!(at_b2[0].kind, MovementKind::Transfer);

        let all = audit.movements(&admin, MovementFilter::all()).await.unwrap();
        assert_eq!(all.len(), 2);
        assert!(all[0].log_order() <= all[1].log_order());

        let report = audit.reconcile(&admin).await.unwrap();
        assert_eq!(report.checked, 2);
        assert!(report.is_consistent());

        assert!(matches!(
            audit.balances(&commander_of(B1)).await,
            Err(LedgerError::Authorization(_))
        ));
    }

    /// Store wrapper whose units fail on `append_movement` while armed.
    struct FaultyStore {
        inner: InMemoryLedgerStore,
        fail_append: Arc<AtomicBool>,
    }

    struct FaultyUnit {
        inner: Box<dyn UnitOfWork>,
        fail_append: Arc<AtomicBool>,
    }

    #[async_trait]
    impl UnitOfWork for FaultyUnit {
        async fn equipment_exists(&mut self, id: EquipmentId) -> Result<bool, StoreError> {
            self.inner.equipment_exists(id).await
        }

        async fn base_exists(&mut self, id: BaseId) -> Result<bool, StoreError> {
            self.inner.base_exists(id).await
        }

        async fn lock_balance(&mut self, key: BalanceKey) -> Result<i64, StoreError> {
            self.inner.lock_balance(key).await
        }

        async fn apply_delta(&mut self, key: BalanceKey, delta: i64) -> Result<InventoryBalance, StoreError> {
            self.inner.apply_delta(key, delta).await
        }

        async fn append_movement(&mut self, draft: MovementDraft) -> Result<MovementRecord, StoreError> {
            if self.fail_append.load(Ordering::SeqCst) {
                return Err(StoreError::backend("append_movement", "injected fault"));
            }
            self.inner.append_movement(draft).await
        }

        async fn commit(&mut self) -> Result<(), StoreError> {
            self.inner.commit().await
        }
    }

    #[async_trait]
    impl LedgerStore for FaultyStore {
        async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
            Ok(Box::new(FaultyUnit {
                inner: self.inner.begin().await?,
                fail_append: self.fail_append.clone(),
            }))
        }

        async fn balance(&self, key: BalanceKey) -> Result<i64, StoreError> {
            self.inner.balance(key).await
        }

        async fn balances(&self) -> Result<Vec<InventoryBalance>, StoreError> {
            self.inner.balances().await
        }

        async fn movements(&self, filter: MovementFilter) -> Result<Vec<MovementRecord>, StoreError> {
            self.inner.movements(filter).await
        }

        async fn totals(&self) -> Result<LedgerTotals, StoreError> {
            self.inner.totals().await
        }

        async fn provision(&self, seed: &CatalogSeed) -> Result<(), StoreError> {
            self.inner.provision(seed).await
        }
    }

    #[tokio::test]
    async fn failure_after_balance_change_rolls_everything_back() {
        let fail_append = Arc::new(AtomicBool::new(true));
        let store = Arc::new(FaultyStore {
            inner: InMemoryLedgerStore::from_seed(&seed()).unwrap(),
            fail_append: fail_append.clone(),
        });
        let (coordinator, _, _) = setup_with(store.clone());

        let transfer = RecordTransfer {
            equipment_id: E1,
            from_base_id: B1,
            to_base_id: B2,
            quantity: 5,
        };

        let err = coordinator
            .record_transfer(&admin(), transfer.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Persistence(StoreError::Backend { .. })));

        assert_eq!(store.balance(BalanceKey::new(E1, B1)).await.unwrap(), 20);
        assert_eq!(store.balance(BalanceKey::new(E1, B2)).await.unwrap(), 10);
        assert!(store.movements(MovementFilter::all()).await.unwrap().is_empty());

        // The store is usable again once the fault clears.
        fail_append.store(false, Ordering::SeqCst);
        coordinator.record_transfer(&admin(), transfer).await.unwrap();
        assert_eq!(store.balance(BalanceKey::new(E1, B1)).await.unwrap(), 15);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_operations_do_not_lose_updates() {
        let store = Arc::new(InMemoryLedgerStore::from_seed(&seed()).unwrap());
        let (coordinator, _, _) = setup_with(store.clone());
        let coordinator = coordinator.with_policy(StockPolicy::AllowNegative);

        let mut handles = Vec::new();
        for i in 0..40 {
            let coordinator = coordinator.clone();
            handles.push(tokio::spawn(async move {
                let admin = admin();
                // Opposing transfers plus purchases on both rows.
                let (from, to) = if i % 2 == 0 { (B1, B2) } else { (B2, B1) };
                coordinator
                    .record_transfer(
                        &admin,
                        RecordTransfer {
                            equipment_id: E1,
                            from_base_id: from,
                            to_base_id: to,
                            quantity: 3,
                        },
                    )
                    .await?;
                coordinator
                    .record_purchase(
                        &admin,
                        RecordPurchase {
                            equipment_id: E1,
                            base_id: to,
                            quantity: 1,
                        },
                    )
                    .await?;
                Ok::<_, LedgerError>(())
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        // 20 transfers each way cancel out; 20 purchases land on each base.
        assert_eq!(store.balance(BalanceKey::new(E1, B1)).await.unwrap(), 40);
        assert_eq!(store.balance(BalanceKey::new(E1, B2)).await.unwrap(), 30);
        assert_eq!(store.movements(MovementFilter::all()).await.unwrap().len(), 80);

        let report = crate::ReconciliationReport::compute(
            &store.balances().await.unwrap(),
            &store.movements(MovementFilter::all()).await.unwrap(),
        )
        .unwrap();
        assert!(report.is_consistent());
    }
}
