//! Inventory ledger domain module.
//!
//! This crate contains business rules for equipment stock, implemented purely
//! as deterministic domain logic (no IO, no HTTP, no storage). Commands are
//! validated and planned into balance deltas plus a movement draft; applying
//! the plan atomically is the infrastructure layer's job.

pub mod balance;
pub mod catalog;
pub mod command;
pub mod movement;

pub use balance::{BalanceDelta, BalanceKey, InventoryBalance};
pub use catalog::{Base, CatalogSeed, Equipment, OpeningBalance};
pub use command::{IssueKind, LedgerCommand, MAX_QUANTITY, MovementPlan, RecordAssignment, RecordPurchase, RecordTransfer};
pub use movement::{Actor, MovementDraft, MovementFilter, MovementKind, MovementRecord};
