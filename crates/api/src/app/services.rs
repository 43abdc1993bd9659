//! Infrastructure wiring: ledger store, access gate, coordinator, readers.

use std::sync::Arc;

use armory_auth::{AccessGate, RoleMatrixGate};
use armory_infra::{
    AuditReader, DashboardAggregator, InMemoryLedgerStore, LedgerStore, PostgresLedgerStore,
    StockPolicy, StoreError, TransactionCoordinator,
};
use armory_inventory::CatalogSeed;

use crate::config::StoreBackend;

/// Everything the handlers need, shared behind one `Arc`.
#[derive(Clone)]
pub struct AppServices {
    pub coordinator: TransactionCoordinator,
    pub dashboard: DashboardAggregator,
    pub audit: AuditReader,
}

impl AppServices {
    pub fn new(store: Arc<dyn LedgerStore>, gate: Arc<dyn AccessGate>, policy: StockPolicy) -> Self {
        Self {
            coordinator: TransactionCoordinator::new(store.clone(), gate.clone()).with_policy(policy),
            dashboard: DashboardAggregator::new(store.clone(), gate.clone()),
            audit: AuditReader::new(store, gate),
        }
    }

    /// In-memory services over `seed` (dev/test).
    pub fn in_memory(seed: &CatalogSeed, policy: StockPolicy) -> Result<Self, StoreError> {
        let store = Arc::new(InMemoryLedgerStore::from_seed(seed)?);
        Ok(Self::new(store, Arc::new(RoleMatrixGate::new()), policy))
    }
}

/// Connect the configured backend and provision `seed` into it.
pub async fn build_services(
    backend: &StoreBackend,
    seed: Option<&CatalogSeed>,
    policy: StockPolicy,
) -> Result<AppServices, StoreError> {
    let store: Arc<dyn LedgerStore> = match backend {
        StoreBackend::InMemory => {
            tracing::info!("using in-memory ledger store");
            Arc::new(InMemoryLedgerStore::new())
        }
        StoreBackend::Postgres {
            database_url,
            max_connections,
        } => {
            tracing::info!(max_connections, "using postgres ledger store");
            Arc::new(PostgresLedgerStore::connect(database_url, *max_connections).await?)
        }
    };

    if let Some(seed) = seed {
        store.provision(seed).await?;
        tracing::info!(
            equipment = seed.equipment.len(),
            bases = seed.bases.len(),
            opening_balances = seed.opening_balances.len(),
            "catalog provisioned"
        );
    }

    Ok(AppServices::new(store, Arc::new(RoleMatrixGate::new()), policy))
}
