//! Child entity owned by a group.
//!
//! # Responsibility
//! - Carry the back-reference to the owning group and the order within it.
//! - Duplicate a node with freshly allocated identity (same or other group).
//!
//! # Invariants
//! - `group_id` is a relational lookup, never an ownership pointer.
//! - Branch version is stamped from the owning group at save time.

use super::entity::{
    BranchVersion, Entity, EntityId, EntityParts, GroupType, OverlayRecord, TableRecord, ToolData,
};

/// Node-only editing state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeParts {
    pub(crate) group_type: GroupType,
    pub(crate) group_id: EntityId,
    pub(crate) order_id: i32,
}

impl EntityParts for NodeParts {
    fn clone_parts(&self) -> Self {
        *self
    }
}

/// Node entity with table record `R` sharing overlay type `J` with its group.
pub type Node<R, J> = Entity<R, J, NodeParts>;

/// Node capabilities on top of the base entity contract.
pub trait ToolDataNode: ToolData {
    fn group_type(&self) -> GroupType;
    fn order_id(&self) -> i32;
    fn set_order_id(&mut self, order_id: i32);
    fn group_id(&self) -> EntityId;
    fn set_group_id(&mut self, group_id: EntityId);
}

/// Allocation scope for node ids.
///
/// Implemented by whoever knows the sibling set of a group: the group itself
/// or a manager holding every group of one kind. Returns `None` when the scope
/// does not know the siblings of `group_id`.
pub trait NodeIdScope {
    fn unique_node_id(
        &self,
        group_type: GroupType,
        group_id: EntityId,
        order_id: i32,
    ) -> Option<EntityId>;
}

impl<R, J> ToolDataNode for Node<R, J>
where
    R: TableRecord,
    J: OverlayRecord,
{
    fn group_type(&self) -> GroupType {
        self.parts().group_type
    }

    fn order_id(&self) -> i32 {
        self.parts().order_id
    }

    fn set_order_id(&mut self, order_id: i32) {
        self.parts_mut().order_id = order_id;
        self.notify();
    }

    fn group_id(&self) -> EntityId {
        self.parts().group_id
    }

    fn set_group_id(&mut self, group_id: EntityId) {
        self.parts_mut().group_id = group_id;
        self.notify();
    }
}

impl<R, J> Node<R, J>
where
    R: TableRecord,
    J: OverlayRecord,
{
    /// Creates an empty node of the given group kind.
    pub fn with_group_type(group_type: GroupType) -> Self {
        let mut node = Self::new();
        node.parts_mut().group_type = group_type;
        node
    }

    /// Duplicates this node inside its current group.
    ///
    /// `None` when `scope` does not cover the node's group.
    pub fn clone_node(&self, scope: &impl NodeIdScope) -> Option<Self> {
        self.clone_into_group(self.group_id(), scope)
    }

    /// Duplicates this node into `group_id`, allocating its id in that scope.
    ///
    /// `None` when `scope` does not cover `group_id`.
    pub fn clone_into_group(
        &self,
        group_id: EntityId,
        scope: &impl NodeIdScope,
    ) -> Option<Self> {
        let id = scope.unique_node_id(self.group_type(), group_id, self.order_id())?;
        let mut copy = self.clone_data();
        copy.parts_mut().group_id = group_id;
        copy.table_mut().set_id(id);
        Some(copy)
    }

    /// Copies the owning group's identity and branch onto this node.
    ///
    /// Notifies once when either value changed.
    pub fn stamp_from_group(&mut self, group_id: EntityId, branch: BranchVersion) {
        let changed = self.parts().group_id != group_id || self.branch_version() != branch;
        self.parts_mut().group_id = group_id;
        self.table_mut().set_branch_version(branch);
        if changed {
            self.notify();
        }
    }
}
