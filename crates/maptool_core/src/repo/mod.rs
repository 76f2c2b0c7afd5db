//! Persistence of business records.
//!
//! # Responsibility
//! - Define the record store contract the entity core depends on.
//! - Map each entity kind's table record onto its SQLite table.
//!
//! # Invariants
//! - Record stores only accept connections at the latest schema version.
//! - Writes are insert-or-replace keyed by `id`.

pub mod record_store;
pub mod spawn_actor_repo;
