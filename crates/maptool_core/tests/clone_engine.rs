use glam::{Vec2, Vec3};
use maptool_core::db::open_db_in_memory;
use maptool_core::{
    ActorRate, ActorType, AreaType, BranchVersion, NodeIdScope, SpawnActorGroup,
    SpawnActorManager, SqliteRecordStore, ToolData, ToolDataGroup, ToolDataNode,
};
use std::collections::HashSet;

fn configured_group() -> SpawnActorGroup {
    let mut group = SpawnActorGroup::create(3);
    group.set_id(3001);
    group.set_branch_version(BranchVersion::Qa);
    group.set_position(Vec3::new(10.0, 1.0, -4.0));
    group.set_actor_type(ActorType::Monster);
    group.set_actor_count(4);
    group.set_area_type(AreaType::Cube);
    group.set_area_size_cube(Vec2::new(6.0, 2.0));
    group.set_actor_rates(vec![ActorRate::new(500, 70), ActorRate::new(501, 30)]);
    group.set_memo("north camp");
    group.create_node(Vec3::new(11.0, 1.0, -4.0));
    group.create_node(Vec3::new(12.0, 1.0, -4.0));
    group
}

#[test]
fn group_clone_copies_every_field_except_identity() {
    let source = configured_group();
    let copy = source.clone_group(3002);

    assert_eq!(copy.id(), 3002);
    assert_eq!(copy.branch_version(), BranchVersion::Qa);
    assert_eq!(copy.position(), source.position());
    assert_eq!(copy.actor_type(), ActorType::Monster);
    assert_eq!(copy.actor_count(), 4);
    assert_eq!(copy.area_size_cube(), Vec2::new(6.0, 2.0));
    assert_eq!(copy.actor_rates(), source.actor_rates());
    assert_eq!(copy.memo(), "north camp");
    assert!(copy.shares_overlay_with(&source));
    assert_eq!(copy.observer_count(), 0);
}

#[test]
fn cloned_nodes_are_rescoped_into_new_group() {
    let source = configured_group();
    let copy = source.clone_group(3002);

    assert_eq!(copy.node_count(), 2);
    let ids: HashSet<i64> = copy.node_ids().into_iter().collect();
    assert_eq!(ids.len(), 2);
    for (index, node) in copy.nodes().iter().enumerate() {
        assert_eq!(node.group_id(), 3002);
        assert_eq!(node.order_id(), index as i32);
        assert_eq!(node.position(), source.nodes()[index].position());
        assert!(node.shares_overlay_with(&copy));
    }
    assert!(source.nodes().iter().all(|node| node.group_id() == 3001));
}

#[test]
fn clone_edits_do_not_leak_into_source() {
    let source = configured_group();
    let mut copy = source.clone_group(3002);

    copy.set_actor_count(9);
    copy.set_actor_rates(vec![ActorRate::new(1, 1)]);
    copy.node_mut(1).unwrap().set_position(Vec3::ZERO);

    assert_eq!(source.actor_count(), 4);
    assert_eq!(source.actor_rates().len(), 2);
    assert_eq!(source.nodes()[0].position(), Vec3::new(11.0, 1.0, -4.0));
}

#[test]
fn clone_node_within_group_gets_fresh_sibling_id() {
    let mut group = configured_group();
    let copy = group.nodes()[0].clone_node(&group).unwrap();

    assert!(!group.node_ids().contains(&copy.id()));
    assert_eq!(copy.group_id(), 3001);
    group.add_node(copy);
    let ids: HashSet<i64> = group.node_ids().into_iter().collect();
    assert_eq!(ids.len(), 3);
}

#[test]
fn manager_clones_many_times_without_collisions() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteRecordStore::try_new(&conn).unwrap();
    let mut manager = SpawnActorManager::new(store, 3);

    let first = manager.create_group(Vec3::ZERO).unwrap();
    manager
        .find_group_mut(first)
        .unwrap()
        .create_node(Vec3::new(1.0, 0.0, 0.0));

    let mut clones = Vec::new();
    for _ in 0..25 {
        clones.push(manager.clone_group(first).unwrap());
    }

    assert_eq!(manager.count(), 26);
    assert!(!manager.check_all_duplicate_ids().has_duplicates());
    let unique: HashSet<i64> = clones.iter().copied().collect();
    assert_eq!(unique.len(), 25);
    assert!(!unique.contains(&first));
    for id in clones {
        let group = manager.find_group(id).unwrap();
        assert_eq!(group.node_count(), 1);
        assert!(group.dangling_nodes().is_empty());
    }
}

#[test]
fn manager_node_scope_only_considers_target_group() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteRecordStore::try_new(&conn).unwrap();
    let mut manager = SpawnActorManager::new(store, 3);

    let a = manager.create_group(Vec3::ZERO).unwrap();
    let b = manager.create_group(Vec3::ZERO).unwrap();
    manager.find_group_mut(a).unwrap().create_node(Vec3::ZERO);

    let group_a = manager.find_group(a).unwrap();
    assert_eq!(manager.unique_id_for_node(&group_a.nodes()[0]), 2);
    assert_eq!(
        manager.unique_node_id(maptool_core::GroupType::Actor, b, 0),
        Some(1)
    );
}

fn group_with_points(id: i64, points: usize) -> SpawnActorGroup {
    let mut group = SpawnActorGroup::create(1);
    group.set_id(id);
    for index in 0..points {
        group.create_node(Vec3::new(index as f32, 0.0, 0.0));
    }
    group
}

#[test]
fn clone_into_populated_group_uses_target_siblings() {
    let a = group_with_points(1001, 1);
    let mut b = group_with_points(1002, 2);
    assert_eq!(b.node_ids(), vec![1, 2]);

    let copy = a.nodes()[0].clone_into_group(1002, &b).unwrap();
    assert_eq!(copy.group_id(), 1002);
    assert!(!b.node_ids().contains(&copy.id()));
    assert_eq!(copy.position(), a.nodes()[0].position());

    b.add_node(copy);
    let ids: HashSet<i64> = b.node_ids().into_iter().collect();
    assert_eq!(ids.len(), 3);
}

#[test]
fn group_scope_refuses_other_group_ids() {
    let a = group_with_points(1001, 1);
    assert!(a.nodes()[0].clone_into_group(1002, &a).is_none());
    assert_eq!(a.unique_node_id(maptool_core::GroupType::Actor, 1002, 0), None);
    assert_eq!(a.node_count(), 1);
}

#[test]
fn clone_into_populated_group_through_manager_scope() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteRecordStore::try_new(&conn).unwrap();
    let mut manager = SpawnActorManager::new(store, 1);
    manager.add_group(group_with_points(1001, 1));
    manager.add_group(group_with_points(1002, 2));

    let source = manager.find_group(1001).unwrap();
    let copy = source.nodes()[0].clone_into_group(1002, &manager).unwrap();
    assert_eq!(copy.group_id(), 1002);
    let target = manager.find_group(1002).unwrap();
    assert!(!target.node_ids().contains(&copy.id()));

    manager.find_group_mut(1002).unwrap().add_node(copy);
    let ids: HashSet<i64> = manager
        .find_group(1002)
        .unwrap()
        .node_ids()
        .into_iter()
        .collect();
    assert_eq!(ids.len(), 3);
    assert!(manager.find_group(1002).unwrap().dangling_nodes().is_empty());
}
