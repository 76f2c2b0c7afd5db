use glam::{Vec2, Vec3};
use maptool_core::db::{open_db, open_db_in_memory};
use maptool_core::model::spawn_actor::ZoneLocator;
use maptool_core::repo::record_store::ID_COLUMN;
use maptool_core::service::tool_manager::LoadHandler;
use maptool_core::{
    ActorRate, ActorType, AreaType, BatchRunner, BranchVersion, GroupKind, ManagerError,
    MapOverlayDocument, RecordQuery, RecordStore, SliceBudget, SpawnActorGroup, SpawnActorKind,
    SpawnActorManager, SpawnActorRow, SqliteRecordStore, StepOutcome, ToolData, ToolDataGroup,
    ToolDataNode, ToolManager,
};
use std::ops::ControlFlow;

const MAP_ID: i64 = 7;

fn continue_always(_: &maptool_core::BatchProgress) -> ControlFlow<()> {
    ControlFlow::Continue(())
}

fn populate(manager: &mut SpawnActorManager<SqliteRecordStore<'_>>, groups: usize) -> Vec<i64> {
    let mut ids = Vec::new();
    for index in 0..groups {
        let id = manager
            .create_group(Vec3::new(index as f32, 0.5, -(index as f32)))
            .unwrap();
        let group = manager.find_group_mut(id).unwrap();
        group.set_actor_type(ActorType::Monster);
        group.set_actor_count(index as i32 + 1);
        group.set_actor_rates(vec![ActorRate::new(100 + index as i32, 60), ActorRate::new(200, 40)]);
        group.set_area_type(AreaType::Sphere);
        group.set_area_size_sphere(2.5);
        group.create_node(Vec3::new(index as f32, 0.0, 1.0));
        ids.push(id);
    }
    ids
}

fn persisted_rows(store: &SqliteRecordStore<'_>) -> Vec<SpawnActorRow> {
    store
        .get_where(&RecordQuery::all().where_eq("map_id", MAP_ID))
        .unwrap()
}

#[test]
fn save_then_load_restores_groups_and_nodes() {
    let conn = open_db_in_memory().unwrap();
    let mut manager = SpawnActorManager::new(SqliteRecordStore::try_new(&conn).unwrap(), MAP_ID);
    let ids = populate(&mut manager, 5);
    manager.find_group_mut(ids[0]).unwrap().set_branch_version(BranchVersion::Dev);

    let report = manager.save(SliceBudget::Items(2), continue_always).unwrap();
    assert!(report.is_complete());
    assert_eq!(report.total, 5);

    let mut reloaded = SpawnActorManager::new(SqliteRecordStore::try_new(&conn).unwrap(), MAP_ID);
    let report = reloaded.load(SliceBudget::Items(2), continue_always).unwrap();
    assert!(report.is_complete());
    assert_eq!(reloaded.count(), 5);

    for id in ids {
        let before = manager.find_group(id).unwrap();
        let after = reloaded.find_group(id).unwrap();
        assert_eq!(after.table(), before.table());
        assert_eq!(after.position(), before.position());
        assert_eq!(after.actor_rates(), before.actor_rates());
        assert_eq!(after.area_size_sphere(), 2.5);
        assert_eq!(after.node_count(), 1);
        assert_eq!(after.nodes()[0].position(), before.nodes()[0].position());
        assert_eq!(after.nodes()[0].group_id(), id);
    }
    assert!(!reloaded.check_all_duplicate_ids().has_duplicates());
}

#[test]
fn second_smaller_save_leaves_no_orphans() {
    let conn = open_db_in_memory().unwrap();
    let mut manager = SpawnActorManager::new(SqliteRecordStore::try_new(&conn).unwrap(), MAP_ID);
    let ids = populate(&mut manager, 4);
    manager.save(SliceBudget::Items(1), continue_always).unwrap();

    let other_map = SpawnActorRow {
        id: 99_001,
        map_id: 99,
        ..SpawnActorRow::default()
    };
    manager.store().insert_or_replace(&other_map).unwrap();

    manager.remove_group(ids[1]);
    manager.remove_group(ids[3]);
    manager.save(SliceBudget::Items(1), continue_always).unwrap();

    let mut saved: Vec<i64> = persisted_rows(manager.store())
        .into_iter()
        .map(|row| row.id)
        .collect();
    saved.sort_unstable();
    assert_eq!(saved, vec![ids[0], ids[2]]);
    assert_eq!(manager.overlays().spawn_actors.len(), 2);
    assert!(manager
        .store()
        .used_ids::<SpawnActorRow>()
        .unwrap()
        .contains(&99_001));
}

#[test]
fn cancelled_save_commits_only_processed_groups() {
    let conn = open_db_in_memory().unwrap();
    let mut manager = SpawnActorManager::new(SqliteRecordStore::try_new(&conn).unwrap(), MAP_ID);
    populate(&mut manager, 6);

    let report = manager
        .save(SliceBudget::Items(2), |_| ControlFlow::Break(()))
        .unwrap();
    assert!(report.is_cancelled());
    assert_eq!(report.processed, 2);
    assert_eq!(persisted_rows(manager.store()).len(), 2);
}

#[test]
fn save_mapping_flattens_derived_fields() {
    let conn = open_db_in_memory().unwrap();
    let mut manager = SpawnActorManager::new(SqliteRecordStore::try_new(&conn).unwrap(), MAP_ID);

    let npc = manager.create_group(Vec3::new(1.0, 2.0, 3.0)).unwrap();
    {
        let group = manager.find_group_mut(npc).unwrap();
        group.set_actor_type(ActorType::Npc);
        group.set_actor_rates(vec![ActorRate::new(300, 10), ActorRate::new(301, 90)]);
        group.set_event_spawn_use(true);
        group.set_event_rates(vec![ActorRate::new(400, 100)]);
        group.set_hit_collider_radius(3.0);
        group.set_area_type(AreaType::Cube);
        group.set_area_rotation(45.0);
        group.set_area_size_cube(Vec2::new(4.0, 5.0));
        group.create_node(Vec3::new(4.0, 5.0, 6.0));
    }
    let monster = manager.create_group(Vec3::ZERO).unwrap();
    {
        let group = manager.find_group_mut(monster).unwrap();
        group.set_actor_type(ActorType::Monster);
        group.set_actor_rates(vec![ActorRate::new(10, 1), ActorRate::new(11, 2)]);
        group.set_event_spawn_use(true);
        group.set_event_rates(vec![ActorRate::new(20, 5)]);
        group.set_obstacle(true);
        group.set_hit_collider_radius(1.25);
        group.set_area_type(AreaType::Sphere);
        group.set_area_rotation(30.0);
        group.set_area_size_sphere(6.0);
    }
    manager.save(SliceBudget::Items(8), continue_always).unwrap();

    let rows = persisted_rows(manager.store());
    let npc_row = rows.iter().find(|row| row.id == npc).unwrap();
    assert_eq!(npc_row.position, "1,2,3|4,5,6");
    assert_eq!(npc_row.actor_id, "300");
    assert_eq!(npc_row.actor_rate, "");
    assert!(!npc_row.event_spawn_use);
    assert_eq!(npc_row.event_actor_id, "");
    assert_eq!(npc_row.hit_collider_radius, 0.0);
    assert_eq!(npc_row.size, "4,5");
    assert_eq!(npc_row.area_rotation, 45.0);

    let monster_row = rows.iter().find(|row| row.id == monster).unwrap();
    assert_eq!(monster_row.position, "0,0,0");
    assert_eq!(monster_row.actor_id, "10,11");
    assert_eq!(monster_row.actor_rate, "1,2");
    assert!(monster_row.event_spawn_use);
    assert_eq!(monster_row.event_actor_id, "20");
    assert_eq!(monster_row.event_actor_rate, "5");
    assert_eq!(monster_row.hit_collider_radius, 1.25);
    assert_eq!(monster_row.size, "6");
    assert_eq!(monster_row.area_rotation, 0.0);
}

#[test]
fn load_defaults_missing_overlay_and_rates() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteRecordStore::try_new(&conn).unwrap();
    store
        .insert_or_replace(&SpawnActorRow {
            id: 7001,
            map_id: MAP_ID,
            actor_type: ActorType::Monster,
            actor_id: "5,6,7".to_string(),
            actor_rate: "50".to_string(),
            position: "(1, 1, 1)|2,2,2|3,3,3".to_string(),
            size: "2,3".to_string(),
            area_type: AreaType::Cube,
            ..SpawnActorRow::default()
        })
        .unwrap();

    let mut manager = SpawnActorManager::new(store, MAP_ID);
    manager.load(SliceBudget::Items(1), continue_always).unwrap();

    let group = manager.find_group(7001).unwrap();
    assert_eq!(group.position(), Vec3::ONE);
    assert_eq!(group.node_count(), 2);
    assert_eq!(group.nodes()[1].position(), Vec3::splat(3.0));
    assert_eq!(
        group.actor_rates(),
        &[ActorRate::new(5, 50), ActorRate::new(6, 0), ActorRate::new(7, 0)]
    );
    assert_eq!(group.event_rates(), &[ActorRate::default()]);
    assert_eq!(group.area_size_cube(), Vec2::new(2.0, 3.0));
    assert_eq!(group.overlay().id, 7001);
    assert!(group.editor_is_show());
}

#[test]
fn malformed_actor_id_keeps_later_rates_aligned() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteRecordStore::try_new(&conn).unwrap();
    store
        .insert_or_replace(&SpawnActorRow {
            id: 7002,
            map_id: MAP_ID,
            actor_type: ActorType::Monster,
            actor_id: "10,x,30".to_string(),
            actor_rate: "1,2,3".to_string(),
            ..SpawnActorRow::default()
        })
        .unwrap();

    let mut manager = SpawnActorManager::new(store, MAP_ID);
    manager.load(SliceBudget::Items(4), continue_always).unwrap();
    assert_eq!(
        manager.find_group(7002).unwrap().actor_rates(),
        &[ActorRate::new(10, 1), ActorRate::new(30, 3)]
    );

    manager.save(SliceBudget::Items(4), continue_always).unwrap();
    let rows = persisted_rows(manager.store());
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].actor_id, "10,30");
    assert_eq!(rows[0].actor_rate, "1,3");
}

#[test]
fn overlay_document_persists_next_to_database() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("maptool.db");
    let overlay_path = dir.path().join("overlays").join("map_7.json");
    let conn = open_db(&db_path).unwrap();

    let id = {
        let store = SqliteRecordStore::try_new(&conn).unwrap();
        let mut manager = SpawnActorManager::with_overlay_file(store, MAP_ID, &overlay_path).unwrap();
        let id = manager.create_group(Vec3::ZERO).unwrap();
        let group = manager.find_group_mut(id).unwrap();
        group.set_memo("ambush");
        group.set_area_radius_show(true);
        manager.save(SliceBudget::Items(4), continue_always).unwrap();
        id
    };

    let document = MapOverlayDocument::load(&overlay_path).unwrap();
    assert_eq!(document.map_id, MAP_ID);
    assert_eq!(document.find_spawn_actor(id).unwrap().memo, "ambush");

    let store = SqliteRecordStore::try_new(&conn).unwrap();
    let mut manager = SpawnActorManager::with_overlay_file(store, MAP_ID, &overlay_path).unwrap();
    manager.load(SliceBudget::Items(4), continue_always).unwrap();
    let group = manager.find_group(id).unwrap();
    assert_eq!(group.memo(), "ambush");
    assert!(group.is_area_radius_show());
}

#[test]
fn load_group_replaces_in_memory_copies() {
    let conn = open_db_in_memory().unwrap();
    let mut manager = SpawnActorManager::new(SqliteRecordStore::try_new(&conn).unwrap(), MAP_ID);
    let ids = populate(&mut manager, 2);
    manager.save(SliceBudget::Items(4), continue_always).unwrap();

    manager.find_group_mut(ids[0]).unwrap().set_actor_count(55);
    let stale = manager.find_group(ids[0]).unwrap().clone_group(ids[0]);
    manager.add_group(stale);

    let reloaded = manager.load_group(ids[0]).unwrap();
    assert_eq!(reloaded.actor_count(), 1);
    assert_eq!(manager.count(), 2);
    assert!(!manager.check_all_duplicate_ids().has_duplicates());

    assert!(matches!(
        manager.load_group(123_456),
        Err(ManagerError::GroupNotFound(123_456))
    ));
}

#[test]
fn zone_lookup_assigns_zone_ids() {
    struct BandLocator;

    impl ZoneLocator for BandLocator {
        fn zone_id(&self, position: Vec3) -> i32 {
            position.x as i32 / 10
        }
    }

    let conn = open_db_in_memory().unwrap();
    let mut manager = SpawnActorManager::new(SqliteRecordStore::try_new(&conn).unwrap(), MAP_ID);
    let near = manager.create_group(Vec3::new(5.0, 0.0, 0.0)).unwrap();
    let far = manager.create_group(Vec3::new(35.0, 0.0, 0.0)).unwrap();

    manager.assign_zones(&BandLocator);
    assert_eq!(manager.find_group(near).unwrap().zone_id(), 0);
    assert_eq!(manager.find_group(far).unwrap().zone_id(), 3);
}

/// Spawn-actor kind whose loader corrupts node links.
struct CorruptingKind;

impl GroupKind for CorruptingKind {
    type Group = SpawnActorGroup;
    type Row = SpawnActorRow;

    const SAVE_LABEL: &'static str = "corrupt_save";
    const LOAD_LABEL: &'static str = "corrupt_load";

    fn new_group(map_id: i64) -> SpawnActorGroup {
        SpawnActorKind::new_group(map_id)
    }

    fn load_query(map_id: i64) -> RecordQuery {
        SpawnActorKind::load_query(map_id)
    }

    fn on_save_begin<S: RecordStore>(
        store: &S,
        overlays: &mut MapOverlayDocument,
        map_id: i64,
    ) -> maptool_core::ManagerResult<()> {
        SpawnActorKind::on_save_begin(store, overlays, map_id)
    }

    fn save_group<S: RecordStore>(
        group: &mut SpawnActorGroup,
        store: &S,
        overlays: &mut MapOverlayDocument,
        map_id: i64,
    ) -> maptool_core::ManagerResult<()> {
        SpawnActorKind::save_group(group, store, overlays, map_id)
    }

    fn load_group(row: SpawnActorRow, overlays: &MapOverlayDocument) -> SpawnActorGroup {
        let mut group = SpawnActorKind::load_group(row, overlays);
        if let Some(node) = group.node_mut(1) {
            node.set_group_id(-1);
        }
        group
    }
}

#[test]
fn load_rejects_dangling_node_links() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteRecordStore::try_new(&conn).unwrap();
    store
        .insert_or_replace(&SpawnActorRow {
            id: 7001,
            map_id: MAP_ID,
            position: "0,0,0|1,1,1".to_string(),
            ..SpawnActorRow::default()
        })
        .unwrap();

    let mut manager: ToolManager<CorruptingKind, _> = ToolManager::new(store, MAP_ID);
    let mut runner: BatchRunner<LoadHandler<'_, CorruptingKind>> = manager.load_batch().unwrap();
    let err = loop {
        match runner.step(SliceBudget::Items(1)) {
            Ok(StepOutcome::Yielded(_)) => continue,
            Ok(StepOutcome::Finished(report)) => panic!("load should fail: {report:?}"),
            Err(err) => break err,
        }
    };
    match err.source {
        ManagerError::DanglingGroupReference { group_id, node_ids } => {
            assert_eq!(group_id, 7001);
            assert_eq!(node_ids, vec![1]);
        }
        other => panic!("unexpected error: {other}"),
    }
    drop(runner);

    let rows = manager
        .store()
        .get_where::<SpawnActorRow>(&RecordQuery::all().where_eq(ID_COLUMN, 7001))
        .unwrap();
    assert_eq!(rows.len(), 1);
}
