use maptool_core::db::open_db_in_memory;
use maptool_core::repo::record_store::{SortOrder, StoredRecord};
use maptool_core::{
    ActorType, BranchVersion, RecordQuery, RecordStore, RepoError, SpawnActorRow,
    SqliteRecordStore,
};
use std::collections::HashSet;

fn row(id: i64, map_id: i64, actor_type: ActorType, zone_id: i32) -> SpawnActorRow {
    SpawnActorRow {
        id,
        map_id,
        actor_type,
        zone_id,
        actor_id: "100".to_string(),
        position: "1,2,3".to_string(),
        ..SpawnActorRow::default()
    }
}

#[test]
fn insert_or_replace_overwrites_by_id() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteRecordStore::try_new(&conn).unwrap();

    let mut first = row(1001, 1, ActorType::Monster, 2);
    store.insert_or_replace(&first).unwrap();
    first.actor_count = 7;
    first.branch_version = BranchVersion::Qa;
    first.hit_collider_radius = 1.5;
    store.insert_or_replace(&first).unwrap();

    let loaded: Vec<SpawnActorRow> = store.get_where(&RecordQuery::all()).unwrap();
    assert_eq!(loaded[0].record_id(), 1001);
    assert_eq!(loaded, vec![first]);
}

#[test]
fn get_where_filters_and_orders() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteRecordStore::try_new(&conn).unwrap();
    for record in [
        row(1003, 1, ActorType::Npc, 1),
        row(1001, 1, ActorType::Monster, 5),
        row(1002, 1, ActorType::Monster, 2),
        row(2001, 2, ActorType::None, 0),
    ] {
        store.insert_or_replace(&record).unwrap();
    }

    let query = RecordQuery::all()
        .where_eq("map_id", 1)
        .order_by("actor_type", SortOrder::Asc)
        .order_by("zone_id", SortOrder::Asc)
        .order_by("id", SortOrder::Asc);
    let ids: Vec<i64> = store
        .get_where::<SpawnActorRow>(&query)
        .unwrap()
        .into_iter()
        .map(|record| record.id)
        .collect();
    assert_eq!(ids, vec![1002, 1001, 1003]);

    let in_query = RecordQuery::all().where_in("id", [1001, 2001]);
    assert_eq!(store.get_where::<SpawnActorRow>(&in_query).unwrap().len(), 2);
}

#[test]
fn delete_where_only_touches_matching_map() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteRecordStore::try_new(&conn).unwrap();
    store.insert_or_replace(&row(1001, 1, ActorType::Monster, 0)).unwrap();
    store.insert_or_replace(&row(1002, 1, ActorType::Monster, 0)).unwrap();
    store.insert_or_replace(&row(2001, 2, ActorType::Monster, 0)).unwrap();

    let deleted = store
        .delete_where::<SpawnActorRow>(&RecordQuery::all().where_eq("map_id", 1))
        .unwrap();
    assert_eq!(deleted, 2);
    assert_eq!(
        store.used_ids::<SpawnActorRow>().unwrap(),
        HashSet::from([2001])
    );
}

#[test]
fn unknown_query_column_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteRecordStore::try_new(&conn).unwrap();

    let err = store
        .get_where::<SpawnActorRow>(&RecordQuery::all().where_eq("name; DROP TABLE x", 1))
        .unwrap_err();
    assert!(matches!(err, RepoError::UnknownColumn { .. }));
}

#[test]
fn invalid_enum_value_fails_decoding() {
    let conn = open_db_in_memory().unwrap();
    conn.execute(
        "INSERT INTO spawn_actor (id, map_id, actor_type) VALUES (5, 1, 42);",
        [],
    )
    .unwrap();
    let store = SqliteRecordStore::try_new(&conn).unwrap();

    let err = store
        .get_where::<SpawnActorRow>(&RecordQuery::all())
        .unwrap_err();
    match err {
        RepoError::InvalidData(message) => assert!(message.contains("actor_type")),
        other => panic!("unexpected error: {other}"),
    }
}
