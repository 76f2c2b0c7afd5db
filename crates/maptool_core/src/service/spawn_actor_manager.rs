//! Spawn-actor persistence hooks and manager helpers.

use crate::model::entity::EntityId;
use crate::model::spawn_actor::{SpawnActorGroup, SpawnActorRow, ZoneLocator};
use crate::overlay::MapOverlayDocument;
use crate::repo::record_store::{RecordQuery, RecordStore, SortOrder, StoredRecord};
use crate::service::tool_manager::{GroupKind, ManagerResult, ToolManager};
use log::info;

const MAP_ID_COLUMN: &str = "map_id";

/// Marker selecting the spawn-actor kind for `ToolManager`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpawnActorKind;

pub type SpawnActorManager<S> = ToolManager<SpawnActorKind, S>;

impl GroupKind for SpawnActorKind {
    type Group = SpawnActorGroup;
    type Row = SpawnActorRow;

    const SAVE_LABEL: &'static str = "spawn_actor_save";
    const LOAD_LABEL: &'static str = "spawn_actor_load";

    fn new_group(map_id: EntityId) -> SpawnActorGroup {
        SpawnActorGroup::create(map_id)
    }

    fn load_query(map_id: EntityId) -> RecordQuery {
        RecordQuery::all()
            .where_eq(MAP_ID_COLUMN, map_id)
            .order_by("actor_type", SortOrder::Asc)
            .order_by("zone_id", SortOrder::Asc)
            .order_by("id", SortOrder::Asc)
    }

    fn on_save_begin<S: RecordStore>(
        store: &S,
        overlays: &mut MapOverlayDocument,
        map_id: EntityId,
    ) -> ManagerResult<()> {
        let deleted = store
            .delete_where::<SpawnActorRow>(&RecordQuery::all().where_eq(MAP_ID_COLUMN, map_id))?;
        overlays.spawn_actors.clear();
        info!(
            "event=group_save module=spawn_actor status=start table={} map_id={map_id} deleted_rows={deleted}",
            SpawnActorRow::TABLE
        );
        Ok(())
    }

    fn save_group<S: RecordStore>(
        group: &mut SpawnActorGroup,
        store: &S,
        overlays: &mut MapOverlayDocument,
        map_id: EntityId,
    ) -> ManagerResult<()> {
        let overlay = group.prepare_save(map_id);
        store.insert_or_replace(group.table())?;
        overlays.spawn_actors.push(overlay);
        Ok(())
    }

    fn load_group(row: SpawnActorRow, overlays: &MapOverlayDocument) -> SpawnActorGroup {
        let overlay = overlays.find_spawn_actor(row.id);
        SpawnActorGroup::from_persisted(overlay, row)
    }
}

impl<S: RecordStore> ToolManager<SpawnActorKind, S> {
    /// Assigns every group the zone it currently stands in.
    pub fn assign_zones(&mut self, locator: &dyn ZoneLocator) {
        for group in self.groups_mut() {
            group.find_zone_id(locator);
        }
    }
}
