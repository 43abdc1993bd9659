//! Infrastructure layer: persistence, the transaction coordinator, and the
//! read-only aggregations over the ledger.

pub mod coordinator;
pub mod dashboard;
pub mod reconcile;
pub mod store;

mod integration_tests;

pub use coordinator::{LedgerError, MovementReceipt, StockPolicy, TransactionCoordinator};
pub use dashboard::{DashboardAggregator, DashboardStats};
pub use reconcile::{AuditReader, Discrepancy, ReconciliationReport};
pub use store::{InMemoryLedgerStore, LedgerStore, LedgerTotals, PostgresLedgerStore, StoreError, UnitOfWork};
