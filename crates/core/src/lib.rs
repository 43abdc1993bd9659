//! `armory-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod entity;
pub mod error;
pub mod id;

pub use entity::{index_by_id, Entity};
pub use error::{DomainError, DomainResult};
pub use id::{BaseId, EquipmentId, MovementId};
