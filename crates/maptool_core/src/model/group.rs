//! Top-level entity owning an ordered list of nodes.
//!
//! # Responsibility
//! - Own the node list: add, create, remove, clear and refresh.
//! - Scope node id allocation to the group's own children.
//! - Duplicate itself together with every node.
//!
//! # Invariants
//! - A group exclusively owns its nodes; dropping it drops them.
//! - After `refresh`, `order_id` equals the node's index in the list.
//! - Node ids are unique among siblings only.

use super::entity::{
    Entity, EntityId, EntityParts, GroupType, OverlayRecord, SharedOverlay, TableRecord, ToolData,
};
use super::node::{Node, NodeIdScope, ToolDataNode};
use crate::ids::{find_unique_id, node_id_seed};
use glam::Vec3;
use std::collections::HashSet;

/// Group-only editing state: the child nodes plus kind extras `K`.
#[derive(Debug)]
pub struct GroupParts<N, K> {
    group_type: GroupType,
    nodes: Vec<N>,
    extra: K,
}

impl<N, K: Default> Default for GroupParts<N, K> {
    fn default() -> Self {
        Self {
            group_type: GroupType::None,
            nodes: Vec::new(),
            extra: K::default(),
        }
    }
}

impl<N, K: Clone + Default> EntityParts for GroupParts<N, K> {
    /// Nodes are not part of the copy; they are cloned one by one into the
    /// new group so each gets an id in the new scope.
    fn clone_parts(&self) -> Self {
        Self {
            group_type: self.group_type,
            nodes: Vec::new(),
            extra: self.extra.clone(),
        }
    }
}

/// Group entity with table `R`, overlay `J`, nodes `N` and kind extras `K`.
pub type Group<R, J, N, K> = Entity<R, J, GroupParts<N, K>>;

/// Group capabilities used by managers regardless of the concrete kind.
pub trait ToolDataGroup: ToolData {
    fn group_type(&self) -> GroupType;
    fn node_count(&self) -> usize;
    fn node_ids(&self) -> Vec<EntityId>;
    /// Removes every node with `id`; returns how many were removed.
    fn remove_node(&mut self, id: EntityId) -> usize;
    fn clear_nodes(&mut self);
    /// Renumbers `order_id` and re-links every node to this group.
    fn refresh(&mut self);
    /// Node ids whose `group_id` does not point at this group.
    fn dangling_nodes(&self) -> Vec<EntityId>;
    /// Duplicates the group under `new_id`, cloning every node into it.
    fn clone_group(&self, new_id: EntityId) -> Self
    where
        Self: Sized;
    /// Teardown: releases observers of the group and its nodes.
    fn release(&mut self);
}

impl<R, J, NR, K> Group<R, J, Node<NR, J>, K>
where
    R: TableRecord,
    J: OverlayRecord,
    NR: TableRecord,
    K: Clone + Default,
{
    /// Creates an empty group of the given kind.
    pub fn new_group(group_type: GroupType) -> Self {
        Self::load_group(group_type, None, None)
    }

    /// Creates a group from persisted data (see `Entity::load`).
    pub fn load_group(
        group_type: GroupType,
        overlay: Option<SharedOverlay<J>>,
        table: Option<R>,
    ) -> Self {
        let mut group = Self::load(overlay, table);
        group.parts_mut().group_type = group_type;
        group
    }

    pub fn nodes(&self) -> &[Node<NR, J>] {
        &self.parts().nodes
    }

    pub fn node(&self, id: EntityId) -> Option<&Node<NR, J>> {
        self.parts().nodes.iter().find(|node| node.id() == id)
    }

    pub fn node_mut(&mut self, id: EntityId) -> Option<&mut Node<NR, J>> {
        self.parts_mut().nodes.iter_mut().find(|node| node.id() == id)
    }

    pub fn extra(&self) -> &K {
        &self.parts().extra
    }

    /// Edits the kind extras and notifies once.
    pub fn update_extra(&mut self, edit: impl FnOnce(&mut K)) {
        edit(&mut self.parts_mut().extra);
        self.notify();
    }

    pub(crate) fn extra_mut(&mut self) -> &mut K {
        &mut self.parts_mut().extra
    }

    /// Appends `node`, linking it to this group with the next `order_id`.
    pub fn add_node(&mut self, mut node: Node<NR, J>) -> EntityId {
        let group_id = self.id();
        let group_type = self.parts().group_type;
        let order_id = self.parts().nodes.len() as i32;
        {
            let parts = node.parts_mut();
            parts.group_id = group_id;
            parts.group_type = group_type;
            parts.order_id = order_id;
        }
        let node_id = node.id();
        self.parts_mut().nodes.push(node);
        self.notify();
        node_id
    }

    /// Creates a node at `position` sharing this group's overlay.
    pub fn create_node(&mut self, position: Vec3) -> EntityId {
        let order_id = self.parts().nodes.len() as i32;
        let mut node = Node::<NR, J>::with_group_type(self.parts().group_type);
        node.set_shared_overlay(self.shared_overlay());
        node.table_mut().set_id(self.next_node_id(order_id));
        node.set_position_silent(position);
        self.add_node(node)
    }

    /// Smallest free id for a node at `order_id` among this group's nodes.
    pub fn next_node_id(&self, order_id: i32) -> EntityId {
        let siblings: HashSet<EntityId> = self.node_ids().into_iter().collect();
        find_unique_id(
            node_id_seed(self.parts().group_type, self.id(), order_id),
            &siblings,
            None,
        )
    }

    /// Replaces the node list from an external authoritative order.
    pub fn refresh_from(&mut self, nodes: impl IntoIterator<Item = Node<NR, J>>) {
        for node in &mut self.parts_mut().nodes {
            node.release_observers();
        }
        self.parts_mut().nodes = nodes.into_iter().collect();
        self.refresh();
    }

    /// Stamps every node with this group's id and branch version.
    pub fn sync_nodes(&mut self) {
        let group_id = self.id();
        let branch = self.branch_version();
        for node in &mut self.parts_mut().nodes {
            node.stamp_from_group(group_id, branch);
        }
    }
}

impl<R, J, NR, K> NodeIdScope for Group<R, J, Node<NR, J>, K>
where
    R: TableRecord,
    J: OverlayRecord,
    NR: TableRecord,
    K: Clone + Default,
{
    /// Only answers for this group's own id.
    fn unique_node_id(
        &self,
        group_type: GroupType,
        group_id: EntityId,
        order_id: i32,
    ) -> Option<EntityId> {
        if group_id != self.id() {
            return None;
        }
        let siblings: HashSet<EntityId> = self.node_ids().into_iter().collect();
        Some(find_unique_id(
            node_id_seed(group_type, group_id, order_id),
            &siblings,
            None,
        ))
    }
}

impl<R, J, NR, K> ToolDataGroup for Group<R, J, Node<NR, J>, K>
where
    R: TableRecord,
    J: OverlayRecord,
    NR: TableRecord,
    K: Clone + Default,
{
    fn group_type(&self) -> GroupType {
        self.parts().group_type
    }

    fn node_count(&self) -> usize {
        self.parts().nodes.len()
    }

    fn node_ids(&self) -> Vec<EntityId> {
        self.parts().nodes.iter().map(|node| node.id()).collect()
    }

    fn remove_node(&mut self, id: EntityId) -> usize {
        let nodes = std::mem::take(&mut self.parts_mut().nodes);
        let (mut removed, kept): (Vec<_>, Vec<_>) =
            nodes.into_iter().partition(|node| node.id() == id);
        self.parts_mut().nodes = kept;
        for node in &mut removed {
            node.release_observers();
        }
        if !removed.is_empty() {
            self.notify();
        }
        removed.len()
    }

    fn clear_nodes(&mut self) {
        let mut nodes = std::mem::take(&mut self.parts_mut().nodes);
        for node in &mut nodes {
            node.release_observers();
        }
        if !nodes.is_empty() {
            self.notify();
        }
    }

    fn refresh(&mut self) {
        let group_id = self.id();
        let group_type = self.parts().group_type;
        let mut changed = false;
        for (index, node) in self.parts_mut().nodes.iter_mut().enumerate() {
            let parts = node.parts_mut();
            let order_id = index as i32;
            if parts.order_id != order_id || parts.group_id != group_id {
                changed = true;
            }
            parts.order_id = order_id;
            parts.group_id = group_id;
            parts.group_type = group_type;
        }
        if changed {
            self.notify();
        }
    }

    fn dangling_nodes(&self) -> Vec<EntityId> {
        let group_id = self.id();
        self.parts()
            .nodes
            .iter()
            .filter(|node| node.group_id() != group_id)
            .map(|node| node.id())
            .collect()
    }

    fn clone_group(&self, new_id: EntityId) -> Self {
        let mut copy = self.clone_data();
        copy.table_mut().set_id(new_id);
        for node in self.nodes() {
            let mut cloned = node.clone_data();
            cloned.parts_mut().group_id = new_id;
            let order_id = copy.parts().nodes.len() as i32;
            cloned.table_mut().set_id(copy.next_node_id(order_id));
            cloned.set_shared_overlay(copy.shared_overlay());
            copy.parts_mut().nodes.push(cloned);
        }
        copy.refresh();
        copy
    }

    fn release(&mut self) {
        for node in &mut self.parts_mut().nodes {
            node.release_observers();
        }
        self.parts_mut().nodes.clear();
        self.release_observers();
    }
}
