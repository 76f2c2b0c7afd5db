//! Base editable entity shared by groups and nodes.
//!
//! # Responsibility
//! - Hold the three cooperating parts of an entity: the persisted table
//!   record, the editor overlay record and the in-memory editing state.
//! - Deliver synchronous change notifications to registered observers.
//!
//! # Invariants
//! - After construction an entity always owns a table record and an overlay
//!   (either loaded or freshly created), never neither.
//! - Every public setter fires exactly one notification per call.
//! - `update_transform` notifies only when the incoming position differs.

use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::cell::{Ref, RefCell};
use std::fmt::{Debug, Formatter};
use std::rc::Rc;

/// Numeric identifier shared by groups, nodes and their persisted rows.
pub type EntityId = i64;

/// Overlay record shared by reference between a group, its nodes and clones.
pub type SharedOverlay<J> = Rc<RefCell<J>>;

/// Group kind used to select the node id seeding formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupType {
    #[default]
    None,
    Actor,
    Path,
    Zone,
    QuestZone,
    FootSoundZone,
}

/// Content branch tag carried by every persisted row.
///
/// Nodes never author their own value: it is copied from the owning group
/// when the group is saved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchVersion {
    #[default]
    Main,
    Dev,
    Qa,
    Live,
}

impl BranchVersion {
    /// Stable integer stored in record tables.
    pub fn as_i64(self) -> i64 {
        match self {
            Self::Main => 0,
            Self::Dev => 1,
            Self::Qa => 2,
            Self::Live => 3,
        }
    }

    pub fn from_i64(value: i64) -> Option<Self> {
        match value {
            0 => Some(Self::Main),
            1 => Some(Self::Dev),
            2 => Some(Self::Qa),
            3 => Some(Self::Live),
            _ => None,
        }
    }
}

/// RGBA color used by editor overlays. Channels are kept in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EditorColor {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl EditorColor {
    pub const WHITE: Self = Self {
        r: 1.0,
        g: 1.0,
        b: 1.0,
        a: 1.0,
    };

    /// Creates a color, clamping every channel into the unit range.
    pub fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self {
            r: r.clamp(0.0, 1.0),
            g: g.clamp(0.0, 1.0),
            b: b.clamp(0.0, 1.0),
            a: a.clamp(0.0, 1.0),
        }
    }
}

impl Default for EditorColor {
    fn default() -> Self {
        Self::WHITE
    }
}

/// Persisted business record of one entity kind.
pub trait TableRecord: Clone + Default + 'static {
    fn id(&self) -> EntityId;
    fn set_id(&mut self, id: EntityId);
    fn branch_version(&self) -> BranchVersion;
    fn set_branch_version(&mut self, version: BranchVersion);

    /// Runs once when no persisted record exists and an empty one is created.
    fn init_empty(&mut self) {}
}

/// Editor-only overlay record of one entity kind.
pub trait OverlayRecord: Clone + Default + 'static {
    fn id(&self) -> EntityId;
    fn set_id(&mut self, id: EntityId);
    fn area_color(&self) -> EditorColor;
    fn set_area_color(&mut self, color: EditorColor);
    fn is_area_show(&self) -> bool;
    fn set_area_show(&mut self, show: bool);
}

/// Kind-specific editing state that lives outside the table record.
pub trait EntityParts: Default {
    /// Copies the state a duplicated entity must carry over.
    fn clone_parts(&self) -> Self;
}

impl EntityParts for () {
    fn clone_parts(&self) -> Self {}
}

/// Handle returned by `subscribe`, used to unregister an observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Observer callback; receives the entity that changed.
pub type Observer = Box<dyn Fn(&dyn ToolData)>;

/// Synchronous observer registry owned by one entity.
#[derive(Default)]
pub struct ChangeNotifier {
    next_id: u64,
    observers: Vec<(SubscriptionId, Observer)>,
}

impl ChangeNotifier {
    pub fn subscribe(&mut self, observer: Observer) -> SubscriptionId {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.observers.push((id, observer));
        id
    }

    /// Returns `false` when the id was not registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(current, _)| *current != id);
        self.observers.len() != before
    }

    pub fn notify(&self, source: &dyn ToolData) {
        for (_, observer) in &self.observers {
            observer(source);
        }
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    /// Drops every observer. Called on entity teardown.
    pub fn release(&mut self) {
        self.observers.clear();
    }
}

impl Debug for ChangeNotifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeNotifier")
            .field("observers", &self.observers.len())
            .finish()
    }
}

/// Scene collaborator that snaps a horizontal coordinate onto the terrain.
pub trait TerrainProbe {
    fn ground(&self, x: f32, z: f32) -> Vec3;
}

/// Capability set every editable entity exposes.
pub trait ToolData {
    fn id(&self) -> EntityId;
    fn set_id(&mut self, id: EntityId);
    fn branch_version(&self) -> BranchVersion;
    fn set_branch_version(&mut self, version: BranchVersion);
    fn position(&self) -> Vec3;
    fn set_position(&mut self, position: Vec3);
    fn editor_color(&self) -> EditorColor;
    fn set_editor_color(&mut self, color: EditorColor);
    fn editor_is_show(&self) -> bool;
    fn set_editor_is_show(&mut self, show: bool);
    fn subscribe(&mut self, observer: Observer) -> SubscriptionId;
    fn unsubscribe(&mut self, id: SubscriptionId) -> bool;

    /// Applies an externally driven position.
    ///
    /// Returns `true` and notifies once when the position changed; a repeated
    /// call with the same position is a no-op.
    fn update_transform(&mut self, position: Vec3) -> bool;

    /// Snaps the current position onto the terrain surface.
    fn dock(&mut self, terrain: &dyn TerrainProbe) {
        let current = self.position();
        self.set_position(terrain.ground(current.x, current.z));
    }
}

/// Composition of table record `R`, overlay `J` and kind parts `X`.
#[derive(Debug)]
pub struct Entity<R, J, X> {
    table: R,
    overlay: SharedOverlay<J>,
    position: Vec3,
    parts: X,
    notifier: ChangeNotifier,
}

impl<R, J, X> Entity<R, J, X>
where
    R: TableRecord,
    J: OverlayRecord,
    X: EntityParts,
{
    /// Creates an entity with an empty table record and an empty overlay.
    pub fn new() -> Self {
        Self::load(None, None)
    }

    /// Creates an entity from persisted data.
    ///
    /// A missing table record is replaced by an empty one (running
    /// `TableRecord::init_empty`); a missing overlay is created empty.
    pub fn load(overlay: Option<SharedOverlay<J>>, table: Option<R>) -> Self {
        let table = table.unwrap_or_else(|| {
            let mut record = R::default();
            record.init_empty();
            record
        });
        Self {
            table,
            overlay: overlay.unwrap_or_default(),
            position: Vec3::ZERO,
            parts: X::default(),
            notifier: ChangeNotifier::default(),
        }
    }

    pub fn table(&self) -> &R {
        &self.table
    }

    /// Edits the table record and notifies once.
    pub fn update_table(&mut self, edit: impl FnOnce(&mut R)) {
        edit(&mut self.table);
        self.notify();
    }

    pub fn overlay(&self) -> Ref<'_, J> {
        self.overlay.borrow()
    }

    /// Edits the shared overlay and notifies once.
    pub fn update_overlay(&mut self, edit: impl FnOnce(&mut J)) {
        edit(&mut self.overlay.borrow_mut());
        self.notify();
    }

    pub fn shared_overlay(&self) -> SharedOverlay<J> {
        Rc::clone(&self.overlay)
    }

    pub fn set_shared_overlay(&mut self, overlay: SharedOverlay<J>) {
        self.overlay = overlay;
    }

    /// Returns whether both entities point at the same overlay record.
    pub fn shares_overlay_with<R2, X2>(&self, other: &Entity<R2, J, X2>) -> bool {
        Rc::ptr_eq(&self.overlay, &other.overlay)
    }

    pub fn parts(&self) -> &X {
        &self.parts
    }

    pub fn observer_count(&self) -> usize {
        self.notifier.len()
    }

    /// Releases every observer; the entity stays usable.
    pub fn release_observers(&mut self) {
        self.notifier.release();
    }

    pub fn notify(&self) {
        self.notifier.notify(self);
    }

    /// Produces an independent copy for duplication.
    ///
    /// The table record and kind parts are value-copied, position is copied
    /// verbatim and the overlay reference is shared with `self`. Observers are
    /// not carried over. Identity is left untouched: callers re-allocate it.
    pub fn clone_data(&self) -> Self {
        Self {
            table: self.table.clone(),
            overlay: Rc::clone(&self.overlay),
            position: self.position,
            parts: self.parts.clone_parts(),
            notifier: ChangeNotifier::default(),
        }
    }

    pub(crate) fn table_mut(&mut self) -> &mut R {
        &mut self.table
    }

    pub(crate) fn parts_mut(&mut self) -> &mut X {
        &mut self.parts
    }

    pub(crate) fn set_position_silent(&mut self, position: Vec3) {
        self.position = position;
    }
}

impl<R, J, X> Default for Entity<R, J, X>
where
    R: TableRecord,
    J: OverlayRecord,
    X: EntityParts,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<R, J, X> ToolData for Entity<R, J, X>
where
    R: TableRecord,
    J: OverlayRecord,
    X: EntityParts,
{
    fn id(&self) -> EntityId {
        self.table.id()
    }

    fn set_id(&mut self, id: EntityId) {
        self.table.set_id(id);
        self.notify();
    }

    fn branch_version(&self) -> BranchVersion {
        self.table.branch_version()
    }

    fn set_branch_version(&mut self, version: BranchVersion) {
        self.table.set_branch_version(version);
        self.notify();
    }

    fn position(&self) -> Vec3 {
        self.position
    }

    fn set_position(&mut self, position: Vec3) {
        self.position = position;
        self.notify();
    }

    fn editor_color(&self) -> EditorColor {
        self.overlay.borrow().area_color()
    }

    fn set_editor_color(&mut self, color: EditorColor) {
        self.overlay
            .borrow_mut()
            .set_area_color(EditorColor::new(color.r, color.g, color.b, color.a));
        self.notify();
    }

    fn editor_is_show(&self) -> bool {
        self.overlay.borrow().is_area_show()
    }

    fn set_editor_is_show(&mut self, show: bool) {
        self.overlay.borrow_mut().set_area_show(show);
        self.notify();
    }

    fn subscribe(&mut self, observer: Observer) -> SubscriptionId {
        self.notifier.subscribe(observer)
    }

    fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.notifier.unsubscribe(id)
    }

    fn update_transform(&mut self, position: Vec3) -> bool {
        if self.position == position {
            return false;
        }
        self.position = position;
        self.notify();
        true
    }
}
