//! Collection manager for the groups of one entity kind on one map.
//!
//! # Responsibility
//! - Own the loaded groups and route structural edits through the id
//!   allocator and the clone engine.
//! - Drive batched save and load passes against the record store and the
//!   map's overlay document.
//!
//! # Invariants
//! - New and cloned groups get ids unused both in memory and in the store.
//! - Saving replaces every persisted row of the map (delete-then-insert).
//! - A completed load leaves no node whose `group_id` misses its group.

use crate::audit::{audit_duplicate_ids, DuplicateReport};
use crate::batch::{BatchError, BatchHandler, BatchProgress, BatchReport, BatchRunner, SliceBudget};
use crate::ids::{find_unique_id, group_id_seed, node_id_seed};
use crate::model::entity::{EntityId, GroupType, ToolData};
use crate::model::group::ToolDataGroup;
use crate::model::node::{NodeIdScope, ToolDataNode};
use crate::overlay::{MapOverlayDocument, OverlayError};
use crate::repo::record_store::{RecordQuery, RecordStore, RepoError, StoredRecord, ID_COLUMN};
use glam::Vec3;
use log::{debug, error, info};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

pub type ManagerResult<T> = Result<T, ManagerError>;

/// Manager error for collection, save and load operations.
#[derive(Debug)]
pub enum ManagerError {
    Repo(RepoError),
    Overlay(OverlayError),
    GroupNotFound(EntityId),
    /// Group ids for this map would not fit in `EntityId`.
    MapIdOutOfRange(EntityId),
    /// Nodes of `group_id` point at another group.
    DanglingGroupReference {
        group_id: EntityId,
        node_ids: Vec<EntityId>,
    },
    /// A batch pass stopped on a handler failure.
    Batch(Box<BatchError<ManagerError>>),
}

impl Display for ManagerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Repo(err) => write!(f, "{err}"),
            Self::Overlay(err) => write!(f, "{err}"),
            Self::GroupNotFound(id) => write!(f, "group not found: {id}"),
            Self::MapIdOutOfRange(id) => write!(f, "map id out of range: {id}"),
            Self::DanglingGroupReference { group_id, node_ids } => write!(
                f,
                "nodes {node_ids:?} of group {group_id} reference a different group"
            ),
            Self::Batch(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ManagerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            Self::Overlay(err) => Some(err),
            Self::Batch(err) => Some(&**err),
            Self::GroupNotFound(_)
            | Self::MapIdOutOfRange(_)
            | Self::DanglingGroupReference { .. } => None,
        }
    }
}

impl From<RepoError> for ManagerError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<OverlayError> for ManagerError {
    fn from(value: OverlayError) -> Self {
        Self::Overlay(value)
    }
}

impl From<BatchError<ManagerError>> for ManagerError {
    fn from(value: BatchError<ManagerError>) -> Self {
        Self::Batch(Box::new(value))
    }
}

/// Kind-specific hooks a manager needs to persist one entity kind.
pub trait GroupKind {
    type Group: ToolDataGroup;
    type Row: StoredRecord;

    const SAVE_LABEL: &'static str;
    const LOAD_LABEL: &'static str;

    /// Empty group for `map_id`; the manager assigns its id.
    fn new_group(map_id: EntityId) -> Self::Group;

    /// Rows of `map_id` in load order.
    fn load_query(map_id: EntityId) -> RecordQuery;

    /// Clears persisted rows and overlays of `map_id` before a save.
    fn on_save_begin<S: RecordStore>(
        store: &S,
        overlays: &mut MapOverlayDocument,
        map_id: EntityId,
    ) -> ManagerResult<()>;

    /// Writes one refreshed group and appends its overlay.
    fn save_group<S: RecordStore>(
        group: &mut Self::Group,
        store: &S,
        overlays: &mut MapOverlayDocument,
        map_id: EntityId,
    ) -> ManagerResult<()>;

    fn on_save_end<S: RecordStore>(
        _store: &S,
        _overlays: &mut MapOverlayDocument,
        _map_id: EntityId,
    ) -> ManagerResult<()> {
        Ok(())
    }

    /// Builds an in-memory group from a row and the map's overlays.
    fn load_group(row: Self::Row, overlays: &MapOverlayDocument) -> Self::Group;

    fn on_load_end(_groups: &mut [Self::Group]) -> ManagerResult<()> {
        Ok(())
    }
}

/// Groups of kind `K` on one map, backed by record store `S`.
pub struct ToolManager<K: GroupKind, S: RecordStore> {
    store: S,
    map_id: EntityId,
    groups: Vec<K::Group>,
    overlays: MapOverlayDocument,
    overlay_path: Option<PathBuf>,
}

impl<K: GroupKind, S: RecordStore> ToolManager<K, S> {
    /// Manager with an in-memory overlay document.
    pub fn new(store: S, map_id: EntityId) -> Self {
        Self {
            store,
            map_id,
            groups: Vec::new(),
            overlays: MapOverlayDocument::new(map_id),
            overlay_path: None,
        }
    }

    /// Manager whose overlay document is read from and written to `path`.
    pub fn with_overlay_file(store: S, map_id: EntityId, path: &Path) -> ManagerResult<Self> {
        let mut manager = Self::new(store, map_id);
        manager.overlays = MapOverlayDocument::load_or_new(path, map_id)?;
        manager.overlay_path = Some(path.to_path_buf());
        Ok(manager)
    }

    pub fn map_id(&self) -> EntityId {
        self.map_id
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn overlays(&self) -> &MapOverlayDocument {
        &self.overlays
    }

    pub fn count(&self) -> usize {
        self.groups.len()
    }

    pub fn groups(&self) -> &[K::Group] {
        &self.groups
    }

    pub fn groups_mut(&mut self) -> &mut [K::Group] {
        &mut self.groups
    }

    /// First group with `id`.
    pub fn find_group(&self, id: EntityId) -> Option<&K::Group> {
        self.groups.iter().find(|group| group.id() == id)
    }

    pub fn find_group_mut(&mut self, id: EntityId) -> Option<&mut K::Group> {
        self.groups.iter_mut().find(|group| group.id() == id)
    }

    /// Smallest free group id for this map, in memory and in the store.
    pub fn unique_group_id(&self) -> ManagerResult<EntityId> {
        let in_memory: HashSet<EntityId> = self.groups.iter().map(|group| group.id()).collect();
        let seed =
            group_id_seed(self.map_id).ok_or(ManagerError::MapIdOutOfRange(self.map_id))?;
        let persisted = self.store.used_ids::<K::Row>()?;
        Ok(find_unique_id(
            seed,
            &in_memory,
            Some(&persisted),
        ))
    }

    /// Free id for `node` among the nodes of its group.
    pub fn unique_id_for_node(&self, node: &impl ToolDataNode) -> EntityId {
        self.node_id_in_group(node.group_type(), node.group_id(), node.order_id())
    }

    /// Free node id within every group carrying `group_id`. A group id no
    /// group uses has no siblings yet.
    fn node_id_in_group(
        &self,
        group_type: GroupType,
        group_id: EntityId,
        order_id: i32,
    ) -> EntityId {
        let siblings: HashSet<EntityId> = self
            .groups
            .iter()
            .filter(|group| group.id() == group_id)
            .flat_map(|group| group.node_ids())
            .collect();
        find_unique_id(node_id_seed(group_type, group_id, order_id), &siblings, None)
    }

    /// Creates an empty group at `position` and returns its id.
    pub fn create_group(&mut self, position: Vec3) -> ManagerResult<EntityId> {
        let id = self.unique_group_id()?;
        let mut group = K::new_group(self.map_id);
        group.set_id(id);
        group.set_position(position);
        self.groups.push(group);
        debug!(
            "event=group_create module=manager status=ok map_id={} id={id}",
            self.map_id
        );
        Ok(id)
    }

    /// Appends an existing group unchanged.
    pub fn add_group(&mut self, group: K::Group) {
        self.groups.push(group);
    }

    /// Duplicates group `id` and all of its nodes under a new group id.
    pub fn clone_group(&mut self, id: EntityId) -> ManagerResult<EntityId> {
        let new_id = self.unique_group_id()?;
        let source = self.find_group(id).ok_or(ManagerError::GroupNotFound(id))?;
        let copy = source.clone_group(new_id);
        self.groups.push(copy);
        debug!(
            "event=group_clone module=manager status=ok map_id={} source_id={id} id={new_id}",
            self.map_id
        );
        Ok(new_id)
    }

    /// Removes every group with `id`; returns how many were removed.
    pub fn remove_group(&mut self, id: EntityId) -> usize {
        let groups = std::mem::take(&mut self.groups);
        let (mut removed, kept): (Vec<_>, Vec<_>) =
            groups.into_iter().partition(|group| group.id() == id);
        self.groups = kept;
        for group in &mut removed {
            group.release();
        }
        removed.len()
    }

    /// Tears down every group.
    pub fn clear(&mut self) {
        for group in &mut self.groups {
            group.release();
        }
        self.groups.clear();
    }

    /// Replaces the collection from an external authoritative list.
    pub fn refresh_from(&mut self, groups: Vec<K::Group>) {
        self.clear();
        self.groups = groups;
        for group in &mut self.groups {
            group.refresh();
        }
    }

    /// Reports every group id used more than once.
    pub fn check_all_duplicate_ids(&self) -> DuplicateReport {
        let report = audit_duplicate_ids(self.groups.iter().map(|group| group.id()));
        if report.has_duplicates() {
            error!(
                "event=id_audit module=manager status=duplicate map_id={} duplicates={}",
                self.map_id, report
            );
        }
        report
    }

    /// Save pass over every group; the caller pumps the returned runner.
    pub fn save_batch(&mut self) -> BatchRunner<SaveHandler<'_, K, S>> {
        let indices = (0..self.groups.len()).collect();
        let handler = SaveHandler {
            groups: &mut self.groups,
            store: &self.store,
            overlays: &mut self.overlays,
            overlay_path: self.overlay_path.as_deref(),
            map_id: self.map_id,
        };
        BatchRunner::new(K::SAVE_LABEL, handler, indices)
    }

    /// Runs a save pass, asking `host` after each slice whether to go on.
    pub fn save(
        &mut self,
        budget: SliceBudget,
        host: impl FnMut(&BatchProgress) -> ControlFlow<()>,
    ) -> ManagerResult<BatchReport> {
        let report = self.save_batch().run(budget, host)?;
        Ok(report)
    }

    /// Load pass over the map's persisted rows, replacing the collection.
    pub fn load_batch(&mut self) -> ManagerResult<BatchRunner<LoadHandler<'_, K>>> {
        if let Some(path) = &self.overlay_path {
            self.overlays = MapOverlayDocument::load_or_new(path, self.map_id)?;
        }
        let rows = self.store.get_where::<K::Row>(&K::load_query(self.map_id))?;
        info!(
            "event=group_load module=manager status=start map_id={} rows={}",
            self.map_id,
            rows.len()
        );
        let handler = LoadHandler {
            groups: &mut self.groups,
            overlays: &self.overlays,
        };
        Ok(BatchRunner::new(K::LOAD_LABEL, handler, rows))
    }

    pub fn load(
        &mut self,
        budget: SliceBudget,
        host: impl FnMut(&BatchProgress) -> ControlFlow<()>,
    ) -> ManagerResult<BatchReport> {
        let report = self.load_batch()?.run(budget, host)?;
        Ok(report)
    }

    /// Reloads group `id` from the store, replacing every in-memory copy.
    pub fn load_group(&mut self, id: EntityId) -> ManagerResult<&K::Group> {
        let query = RecordQuery::all().where_eq(ID_COLUMN, id);
        let row = self
            .store
            .get_where::<K::Row>(&query)?
            .into_iter()
            .next()
            .ok_or(ManagerError::GroupNotFound(id))?;
        if let Some(path) = &self.overlay_path {
            self.overlays = MapOverlayDocument::load_or_new(path, self.map_id)?;
        }

        let group = K::load_group(row, &self.overlays);
        check_links(&group)?;
        self.remove_group(id);
        self.groups.push(group);
        self.groups
            .last()
            .ok_or(ManagerError::GroupNotFound(id))
    }
}

impl<K: GroupKind, S: RecordStore> NodeIdScope for ToolManager<K, S> {
    fn unique_node_id(
        &self,
        group_type: GroupType,
        group_id: EntityId,
        order_id: i32,
    ) -> Option<EntityId> {
        Some(self.node_id_in_group(group_type, group_id, order_id))
    }
}

/// Batch handler writing groups by index.
pub struct SaveHandler<'m, K: GroupKind, S: RecordStore> {
    groups: &'m mut [K::Group],
    store: &'m S,
    overlays: &'m mut MapOverlayDocument,
    overlay_path: Option<&'m Path>,
    map_id: EntityId,
}

impl<K: GroupKind, S: RecordStore> BatchHandler for SaveHandler<'_, K, S> {
    type Item = usize;
    type Error = ManagerError;

    fn begin(&mut self) -> ManagerResult<()> {
        self.overlays.map_id = self.map_id;
        K::on_save_begin(self.store, self.overlays, self.map_id)
    }

    fn process(&mut self, _index: usize, item: usize) -> ManagerResult<()> {
        let group = &mut self.groups[item];
        group.refresh();
        K::save_group(group, self.store, self.overlays, self.map_id)
    }

    fn end(&mut self) -> ManagerResult<()> {
        K::on_save_end(self.store, self.overlays, self.map_id)?;
        if let Some(path) = self.overlay_path {
            self.overlays.save(path)?;
        }
        Ok(())
    }
}

/// Batch handler building groups from persisted rows.
pub struct LoadHandler<'m, K: GroupKind> {
    groups: &'m mut Vec<K::Group>,
    overlays: &'m MapOverlayDocument,
}

impl<K: GroupKind> BatchHandler for LoadHandler<'_, K> {
    type Item = K::Row;
    type Error = ManagerError;

    fn begin(&mut self) -> ManagerResult<()> {
        for group in self.groups.iter_mut() {
            group.release();
        }
        self.groups.clear();
        Ok(())
    }

    fn process(&mut self, index: usize, item: K::Row) -> ManagerResult<()> {
        debug!(
            "event=group_load module=manager status=ok index={index} id={}",
            item.record_id()
        );
        self.groups.push(K::load_group(item, self.overlays));
        Ok(())
    }

    fn end(&mut self) -> ManagerResult<()> {
        for group in self.groups.iter() {
            check_links(group)?;
        }
        K::on_load_end(self.groups.as_mut_slice())
    }
}

fn check_links<G: ToolDataGroup>(group: &G) -> ManagerResult<()> {
    let node_ids = group.dangling_nodes();
    if node_ids.is_empty() {
        return Ok(());
    }
    error!(
        "event=node_link_check module=manager status=dangling group_id={} nodes={:?}",
        group.id(),
        node_ids
    );
    Err(ManagerError::DanglingGroupReference {
        group_id: group.id(),
        node_ids,
    })
}
