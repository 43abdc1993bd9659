//! Ledger persistence boundary.
//!
//! The balance table and the movement log live behind one store so that a
//! single unit of work can mutate both atomically.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryLedgerStore;
pub use postgres::PostgresLedgerStore;
pub use r#trait::{LedgerStore, LedgerTotals, StoreError, UnitOfWork};
