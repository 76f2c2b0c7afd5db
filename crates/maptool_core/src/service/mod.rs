//! Collection managers driving the entity core.
//!
//! # Responsibility
//! - Own the groups of one kind on one map and run their save/load passes.
//! - Keep kind-specific persistence hooks out of the generic manager.

pub mod spawn_actor_manager;
pub mod tool_manager;
