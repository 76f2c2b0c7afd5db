//! Spawn-actor groups and their spawn points.
//!
//! # Responsibility
//! - Define the `spawn_actor` table record, its editor overlay and the
//!   derived editing state kept outside the table (rate lists, area sizes).
//! - Map between the editing state and the flattened table columns on save
//!   and load.
//!
//! # Invariants
//! - A group's first persisted position is the group itself; every further
//!   position is one spawn point node.
//! - Actor and event rate lists are never empty while editing.
//! - Spawn points share the overlay of their group.

use super::entity::{
    BranchVersion, EditorColor, EntityId, GroupType, OverlayRecord, SharedOverlay, TableRecord,
    ToolData,
};
use super::group::{Group, ToolDataGroup};
use super::node::Node;
use glam::{Vec2, Vec3};
use log::warn;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::Rc;

static NUMBER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[-+]?(?:\d+\.?\d*|\.\d+)(?:[eE][-+]?\d+)?").expect("valid number regex")
});

const POSITION_SEPARATOR: &str = "|";
const DEFAULT_AREA_SIZE: f32 = 1.0;

/// Kind of actor a spawn group produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActorType {
    #[default]
    None,
    Monster,
    Npc,
    NpcAction,
    Gimmick,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RespawnType {
    #[default]
    None,
    /// Respawn after `respawn_time` seconds.
    Time,
    /// Respawn up to `respawn_count` times.
    Count,
}

/// Shape of the spawn area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AreaType {
    #[default]
    None,
    Sphere,
    Cube,
}

/// Row of the `spawn_actor` table.
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnActorRow {
    pub id: EntityId,
    pub branch_version: BranchVersion,
    pub map_id: EntityId,
    pub zone_id: i32,
    pub actor_type: ActorType,
    pub actor_count: i32,
    pub actor_rotation: f32,
    /// Comma separated actor ids.
    pub actor_id: String,
    /// Comma separated spawn rates, parallel to `actor_id`.
    pub actor_rate: String,
    pub is_obstacle: bool,
    pub hit_collider_radius: f32,
    pub event_spawn_use: bool,
    pub event_count: i32,
    pub event_actor_rotation: f32,
    pub event_actor_id: String,
    pub event_actor_rate: String,
    pub actor_initial_spawn: bool,
    pub respawn_type: RespawnType,
    pub respawn_count: i32,
    pub respawn_time: i32,
    pub area_type: AreaType,
    pub area_rotation: f32,
    /// Sphere radius, `w,h` for cubes, `0` otherwise.
    pub size: String,
    /// `x,y,z` positions separated by `|`; the first one is the group.
    pub position: String,
    pub is_random: bool,
}

impl Default for SpawnActorRow {
    fn default() -> Self {
        Self {
            id: 0,
            branch_version: BranchVersion::default(),
            map_id: 0,
            zone_id: 0,
            actor_type: ActorType::default(),
            actor_count: 0,
            actor_rotation: 0.0,
            actor_id: String::new(),
            actor_rate: String::new(),
            is_obstacle: false,
            hit_collider_radius: 0.0,
            event_spawn_use: false,
            event_count: 0,
            event_actor_rotation: 0.0,
            event_actor_id: String::new(),
            event_actor_rate: String::new(),
            actor_initial_spawn: false,
            respawn_type: RespawnType::default(),
            respawn_count: 0,
            respawn_time: 0,
            area_type: AreaType::default(),
            area_rotation: 0.0,
            size: String::new(),
            position: String::new(),
            is_random: false,
        }
    }
}

impl TableRecord for SpawnActorRow {
    fn id(&self) -> EntityId {
        self.id
    }

    fn set_id(&mut self, id: EntityId) {
        self.id = id;
    }

    fn branch_version(&self) -> BranchVersion {
        self.branch_version
    }

    fn set_branch_version(&mut self, version: BranchVersion) {
        self.branch_version = version;
    }

    fn init_empty(&mut self) {
        self.actor_initial_spawn = true;
    }
}

/// Record of a spawn point. Spawn points have no table of their own: their
/// positions are flattened into the group row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpawnPointRecord {
    pub id: EntityId,
    pub branch_version: BranchVersion,
}

impl TableRecord for SpawnPointRecord {
    fn id(&self) -> EntityId {
        self.id
    }

    fn set_id(&mut self, id: EntityId) {
        self.id = id;
    }

    fn branch_version(&self) -> BranchVersion {
        self.branch_version
    }

    fn set_branch_version(&mut self, version: BranchVersion) {
        self.branch_version = version;
    }
}

/// Editor-only overlay for one spawn group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpawnActorOverlay {
    pub id: EntityId,
    pub area_color: EditorColor,
    pub is_area_show: bool,
    pub memo: String,
    pub is_area_radius_show: bool,
}

impl Default for SpawnActorOverlay {
    fn default() -> Self {
        Self {
            id: 0,
            area_color: EditorColor::WHITE,
            is_area_show: true,
            memo: String::new(),
            is_area_radius_show: false,
        }
    }
}

impl OverlayRecord for SpawnActorOverlay {
    fn id(&self) -> EntityId {
        self.id
    }

    fn set_id(&mut self, id: EntityId) {
        self.id = id;
    }

    fn area_color(&self) -> EditorColor {
        self.area_color
    }

    fn set_area_color(&mut self, color: EditorColor) {
        self.area_color = color;
    }

    fn is_area_show(&self) -> bool {
        self.is_area_show
    }

    fn set_area_show(&mut self, show: bool) {
        self.is_area_show = show;
    }
}

/// One actor candidate with its spawn rate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActorRate {
    pub actor_id: i32,
    pub actor_rate: i32,
}

impl ActorRate {
    pub fn new(actor_id: i32, actor_rate: i32) -> Self {
        Self {
            actor_id,
            actor_rate,
        }
    }
}

/// Editing state derived from the row and flattened back on save.
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnActorExtras {
    actor_rates: Vec<ActorRate>,
    event_rates: Vec<ActorRate>,
    area_size_sphere: f32,
    area_size_cube: Vec2,
}

impl Default for SpawnActorExtras {
    fn default() -> Self {
        Self {
            actor_rates: vec![ActorRate::default()],
            event_rates: vec![ActorRate::default()],
            area_size_sphere: DEFAULT_AREA_SIZE,
            area_size_cube: Vec2::splat(DEFAULT_AREA_SIZE),
        }
    }
}

pub type SpawnPoint = Node<SpawnPointRecord, SpawnActorOverlay>;
pub type SpawnActorGroup = Group<SpawnActorRow, SpawnActorOverlay, SpawnPoint, SpawnActorExtras>;

/// Zone lookup supplied by the scene.
pub trait ZoneLocator {
    fn zone_id(&self, position: Vec3) -> i32;
}

impl SpawnActorGroup {
    /// Creates a new, unsaved spawn group on `map_id`.
    pub fn create(map_id: EntityId) -> Self {
        let mut group = Self::new_group(GroupType::Actor);
        group.table_mut().map_id = map_id;
        group
    }

    /// Builds a group and its spawn points from a persisted row.
    ///
    /// A missing overlay is created empty and keyed to the row id.
    pub fn from_persisted(overlay: Option<&SpawnActorOverlay>, row: SpawnActorRow) -> Self {
        let row_id = row.id;
        let overlay: SharedOverlay<SpawnActorOverlay> = Rc::new(RefCell::new(
            overlay.cloned().unwrap_or_else(|| SpawnActorOverlay {
                id: row_id,
                ..SpawnActorOverlay::default()
            }),
        ));
        let mut group = Self::load_group(GroupType::Actor, Some(overlay), Some(row));

        let mut positions = parse_positions(&group.table().position).into_iter();
        if let Some(main) = positions.next() {
            group.set_position_silent(main);
        }
        for position in positions {
            group.create_node(position);
        }

        let (width, height) = parse_size(&group.table().size);
        let actor_rates = zip_rates(&group.table().actor_id, &group.table().actor_rate);
        let event_rates = zip_rates(
            &group.table().event_actor_id,
            &group.table().event_actor_rate,
        );
        let extras = group.extra_mut();
        extras.area_size_sphere = width;
        extras.area_size_cube = Vec2::new(width, height);
        extras.actor_rates = non_empty(actor_rates);
        extras.event_rates = non_empty(event_rates);
        group
    }

    pub fn map_id(&self) -> EntityId {
        self.table().map_id
    }

    pub fn set_map_id(&mut self, map_id: EntityId) {
        self.update_table(|row| row.map_id = map_id);
    }

    pub fn zone_id(&self) -> i32 {
        self.table().zone_id
    }

    pub fn set_zone_id(&mut self, zone_id: i32) {
        self.update_table(|row| row.zone_id = zone_id);
    }

    pub fn actor_type(&self) -> ActorType {
        self.table().actor_type
    }

    pub fn set_actor_type(&mut self, actor_type: ActorType) {
        self.update_table(|row| row.actor_type = actor_type);
    }

    pub fn actor_count(&self) -> i32 {
        self.table().actor_count
    }

    pub fn set_actor_count(&mut self, count: i32) {
        self.update_table(|row| row.actor_count = count);
    }

    pub fn is_obstacle(&self) -> bool {
        self.table().is_obstacle
    }

    pub fn set_obstacle(&mut self, is_obstacle: bool) {
        self.update_table(|row| row.is_obstacle = is_obstacle);
    }

    pub fn hit_collider_radius(&self) -> f32 {
        self.table().hit_collider_radius
    }

    pub fn set_hit_collider_radius(&mut self, radius: f32) {
        self.update_table(|row| row.hit_collider_radius = radius);
    }

    pub fn event_spawn_use(&self) -> bool {
        self.table().event_spawn_use
    }

    pub fn set_event_spawn_use(&mut self, enabled: bool) {
        self.update_table(|row| row.event_spawn_use = enabled);
    }

    pub fn actor_initial_spawn(&self) -> bool {
        self.table().actor_initial_spawn
    }

    pub fn set_actor_initial_spawn(&mut self, enabled: bool) {
        self.update_table(|row| row.actor_initial_spawn = enabled);
    }

    pub fn respawn_type(&self) -> RespawnType {
        self.table().respawn_type
    }

    pub fn set_respawn_type(&mut self, respawn_type: RespawnType) {
        self.update_table(|row| row.respawn_type = respawn_type);
    }

    pub fn set_respawn_count(&mut self, count: i32) {
        self.update_table(|row| row.respawn_count = count);
    }

    pub fn set_respawn_time(&mut self, seconds: i32) {
        self.update_table(|row| row.respawn_time = seconds);
    }

    pub fn set_random(&mut self, is_random: bool) {
        self.update_table(|row| row.is_random = is_random);
    }

    pub fn area_type(&self) -> AreaType {
        self.table().area_type
    }

    pub fn set_area_type(&mut self, area_type: AreaType) {
        self.update_table(|row| row.area_type = area_type);
    }

    pub fn area_rotation(&self) -> f32 {
        self.table().area_rotation
    }

    pub fn set_area_rotation(&mut self, rotation: f32) {
        self.update_table(|row| row.area_rotation = rotation);
    }

    pub fn memo(&self) -> String {
        self.overlay().memo.clone()
    }

    pub fn set_memo(&mut self, memo: impl Into<String>) {
        let memo = memo.into();
        self.update_overlay(|overlay| overlay.memo = memo);
    }

    pub fn is_area_radius_show(&self) -> bool {
        self.overlay().is_area_radius_show
    }

    pub fn set_area_radius_show(&mut self, show: bool) {
        self.update_overlay(|overlay| overlay.is_area_radius_show = show);
    }

    pub fn area_size_sphere(&self) -> f32 {
        self.extra().area_size_sphere
    }

    pub fn set_area_size_sphere(&mut self, radius: f32) {
        self.update_extra(|extras| extras.area_size_sphere = radius);
    }

    pub fn area_size_cube(&self) -> Vec2 {
        self.extra().area_size_cube
    }

    pub fn set_area_size_cube(&mut self, size: Vec2) {
        self.update_extra(|extras| extras.area_size_cube = size);
    }

    pub fn actor_rates(&self) -> &[ActorRate] {
        &self.extra().actor_rates
    }

    /// Replaces the actor list; an empty list reads back as one `(0, 0)`.
    pub fn set_actor_rates(&mut self, rates: Vec<ActorRate>) {
        self.update_extra(|extras| extras.actor_rates = non_empty(rates));
    }

    pub fn event_rates(&self) -> &[ActorRate] {
        &self.extra().event_rates
    }

    pub fn set_event_rates(&mut self, rates: Vec<ActorRate>) {
        self.update_extra(|extras| extras.event_rates = non_empty(rates));
    }

    /// Actor lists are only persisted in full for monsters.
    pub fn is_save_actor_list(&self) -> bool {
        self.actor_type() == ActorType::Monster
    }

    pub fn is_save_event_data(&self) -> bool {
        matches!(self.actor_type(), ActorType::Monster | ActorType::NpcAction)
    }

    /// Assigns the zone the group currently stands in.
    pub fn find_zone_id(&mut self, locator: &dyn ZoneLocator) {
        let zone_id = locator.zone_id(self.position());
        self.set_zone_id(zone_id);
    }

    /// Flattens the editing state into the row for `map_id`.
    ///
    /// Nodes are stamped with this group's id and branch. Returns the overlay
    /// entry to append to the map document. Notifies once.
    pub fn prepare_save(&mut self, map_id: EntityId) -> SpawnActorOverlay {
        self.sync_nodes();

        let mut positions = vec![format_position(self.position())];
        positions.extend(self.nodes().iter().map(|node| format_position(node.position())));

        let extras = self.extra().clone();
        let save_actor_list = self.is_save_actor_list();
        let save_event_data = self.is_save_event_data();

        let row = self.table_mut();
        row.map_id = map_id;
        row.position = positions.join(POSITION_SEPARATOR);
        row.size = match row.area_type {
            AreaType::Sphere => {
                row.area_rotation = 0.0;
                extras.area_size_sphere.to_string()
            }
            AreaType::Cube => format!("{},{}", extras.area_size_cube.x, extras.area_size_cube.y),
            AreaType::None => {
                row.area_rotation = 0.0;
                "0".to_string()
            }
        };

        if save_actor_list {
            row.actor_id = join_ids(extras.actor_rates.iter().map(|rate| rate.actor_id));
            row.actor_rate = join_ids(extras.actor_rates.iter().map(|rate| rate.actor_rate));
        } else {
            row.actor_id = extras
                .actor_rates
                .first()
                .map(|rate| rate.actor_id)
                .unwrap_or_default()
                .to_string();
            row.actor_rate = String::new();
        }

        if save_event_data && row.event_spawn_use {
            row.event_actor_id = join_ids(extras.event_rates.iter().map(|rate| rate.actor_id));
            row.event_actor_rate = join_ids(extras.event_rates.iter().map(|rate| rate.actor_rate));
        } else {
            row.event_spawn_use = false;
            row.event_count = 0;
            row.event_actor_rotation = 0.0;
            row.event_actor_id = String::new();
            row.event_actor_rate = String::new();
        }

        if !row.is_obstacle {
            row.hit_collider_radius = 0.0;
        }

        self.notify();

        let mut overlay = self.overlay().clone();
        overlay.id = self.id();
        overlay
    }

    /// Spawn point count without the group's own position.
    pub fn spawn_point_count(&self) -> usize {
        self.node_count()
    }
}

/// Formats a position as `x,y,z`.
pub fn format_position(position: Vec3) -> String {
    format!("{},{},{}", position.x, position.y, position.z)
}

/// Parses `|` separated positions. Segments without three numbers are skipped.
///
/// Tolerates parentheses and spaces, e.g. `(1.0, 2.0, 3.0)|4,5,6`.
pub fn parse_positions(value: &str) -> Vec<Vec3> {
    value
        .split(POSITION_SEPARATOR)
        .filter(|segment| !segment.trim().is_empty())
        .filter_map(|segment| {
            let numbers = parse_numbers(segment);
            if numbers.len() < 3 {
                warn!(
                    "event=position_parse module=spawn_actor status=skipped segment_len={}",
                    segment.len()
                );
                return None;
            }
            Some(Vec3::new(numbers[0], numbers[1], numbers[2]))
        })
        .collect()
}

/// Parses the `size` column into `(width, height)`.
///
/// One value means a sphere radius (height mirrors it); empty falls back to
/// the default area size.
pub fn parse_size(value: &str) -> (f32, f32) {
    let numbers = parse_numbers(value);
    match numbers.as_slice() {
        [] => (DEFAULT_AREA_SIZE, DEFAULT_AREA_SIZE),
        [radius] => (*radius, *radius),
        [width, height, ..] => (*width, *height),
    }
}

fn parse_numbers(value: &str) -> Vec<f32> {
    NUMBER_RE
        .find_iter(value)
        .filter_map(|found| found.as_str().parse().ok())
        .collect()
}

fn join_ids(values: impl Iterator<Item = i32>) -> String {
    values
        .map(|value| value.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Pairs ids and rates by their position in the raw lists.
///
/// An unparseable id drops its whole pair; a missing or malformed rate reads 0.
fn zip_rates(ids: &str, rates: &str) -> Vec<ActorRate> {
    let rates: Vec<&str> = rates.split(',').map(str::trim).collect();
    ids.split(',')
        .map(str::trim)
        .enumerate()
        .filter_map(|(index, item)| {
            let actor_id = match item.parse() {
                Ok(actor_id) => actor_id,
                Err(_) => {
                    if !item.is_empty() {
                        warn!(
                            "event=rate_parse module=spawn_actor status=skipped position={index}"
                        );
                    }
                    return None;
                }
            };
            let rate = rates
                .get(index)
                .and_then(|rate| rate.parse().ok())
                .unwrap_or(0);
            Some(ActorRate::new(actor_id, rate))
        })
        .collect()
}

fn non_empty(mut rates: Vec<ActorRate>) -> Vec<ActorRate> {
    if rates.is_empty() {
        rates.push(ActorRate::default());
    }
    rates
}
