//! Collision-free id allocation.
//!
//! # Responsibility
//! - Find the smallest free id at or above a seed across in-memory and
//!   persisted id sets.
//! - Derive seeds for group and node ids.
//!
//! # Invariants
//! - Allocation never fails: the probe walks upward without a bound.
//! - The result is never a member of either id set.

use crate::model::entity::{EntityId, GroupType};
use std::collections::HashSet;

/// Group ids of one map start at `map_id * GROUP_ID_MAP_STRIDE + 1`.
pub const GROUP_ID_MAP_STRIDE: EntityId = 1000;

/// Largest map id whose group and node seeds stay inside `EntityId`.
pub const MAX_MAP_ID: EntityId = 1_000_000_000;

const PATH_NODE_STRIDE: EntityId = 1000;
const DEFAULT_NODE_STRIDE: EntityId = 100;

/// Returns the smallest id `>= seed` absent from both sets.
pub fn find_unique_id(
    seed: EntityId,
    in_memory: &HashSet<EntityId>,
    persisted: Option<&HashSet<EntityId>>,
) -> EntityId {
    let mut candidate = seed;
    while in_memory.contains(&candidate)
        || persisted.is_some_and(|ids| ids.contains(&candidate))
    {
        candidate += 1;
    }
    candidate
}

/// Whether `map_id` is in `0..=MAX_MAP_ID`.
pub fn is_valid_map_id(map_id: EntityId) -> bool {
    (0..=MAX_MAP_ID).contains(&map_id)
}

/// Seed for a new group id on `map_id`; `None` when the seed overflows.
pub fn group_id_seed(map_id: EntityId) -> Option<EntityId> {
    map_id.checked_mul(GROUP_ID_MAP_STRIDE)?.checked_add(1)
}

/// Seed for a node id; the formula depends on the owning group's kind.
pub fn node_id_seed(group_type: GroupType, group_id: EntityId, order_id: i32) -> EntityId {
    let order = EntityId::from(order_id);
    match group_type {
        GroupType::Actor => order + 1,
        GroupType::Path => group_id * PATH_NODE_STRIDE + order + 1,
        _ => group_id * DEFAULT_NODE_STRIDE + order + 1,
    }
}
