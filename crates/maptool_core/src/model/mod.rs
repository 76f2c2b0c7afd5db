//! Editable map entities.
//!
//! # Responsibility
//! - Define the base entity contract and the Group/Node composition.
//! - Provide the spawn-actor kind built on that composition.
//!
//! # Invariants
//! - Every entity owns a table record and a (possibly shared) overlay.
//! - Groups own their nodes; nodes refer back by `group_id` only.

pub mod entity;
pub mod group;
pub mod node;
pub mod spawn_actor;
