//! `spawn_actor` table mapping.
//!
//! # Invariants
//! - Enum columns are stored as stable integers; unknown values fail decoding
//!   with `RepoError::InvalidData` instead of falling back silently.
//! - Boolean columns only hold `0` or `1`.

use crate::model::entity::BranchVersion;
use crate::model::spawn_actor::{ActorType, AreaType, RespawnType, SpawnActorRow};
use crate::repo::record_store::{RepoError, RepoResult, StoredRecord};
use rusqlite::types::Value;
use rusqlite::Row;

const TABLE: &str = "spawn_actor";

impl StoredRecord for SpawnActorRow {
    const TABLE: &'static str = TABLE;
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "branch_version",
        "map_id",
        "zone_id",
        "actor_type",
        "actor_count",
        "actor_rotation",
        "actor_id",
        "actor_rate",
        "is_obstacle",
        "hit_collider_radius",
        "event_spawn_use",
        "event_count",
        "event_actor_rotation",
        "event_actor_id",
        "event_actor_rate",
        "actor_initial_spawn",
        "respawn_type",
        "respawn_count",
        "respawn_time",
        "area_type",
        "area_rotation",
        "size",
        "position",
        "is_random",
    ];

    fn record_id(&self) -> i64 {
        self.id
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            Value::Integer(self.id),
            Value::Integer(self.branch_version.as_i64()),
            Value::Integer(self.map_id),
            Value::Integer(self.zone_id.into()),
            Value::Integer(actor_type_to_db(self.actor_type)),
            Value::Integer(self.actor_count.into()),
            Value::Real(self.actor_rotation.into()),
            Value::Text(self.actor_id.clone()),
            Value::Text(self.actor_rate.clone()),
            Value::Integer(bool_to_int(self.is_obstacle)),
            Value::Real(self.hit_collider_radius.into()),
            Value::Integer(bool_to_int(self.event_spawn_use)),
            Value::Integer(self.event_count.into()),
            Value::Real(self.event_actor_rotation.into()),
            Value::Text(self.event_actor_id.clone()),
            Value::Text(self.event_actor_rate.clone()),
            Value::Integer(bool_to_int(self.actor_initial_spawn)),
            Value::Integer(respawn_type_to_db(self.respawn_type)),
            Value::Integer(self.respawn_count.into()),
            Value::Integer(self.respawn_time.into()),
            Value::Integer(area_type_to_db(self.area_type)),
            Value::Real(self.area_rotation.into()),
            Value::Text(self.size.clone()),
            Value::Text(self.position.clone()),
            Value::Integer(bool_to_int(self.is_random)),
        ]
    }

    fn from_row(row: &Row<'_>) -> RepoResult<Self> {
        let branch_value: i64 = row.get("branch_version")?;
        let branch_version = BranchVersion::from_i64(branch_value).ok_or_else(|| {
            invalid_value("branch_version", branch_value)
        })?;

        let actor_type_value: i64 = row.get("actor_type")?;
        let actor_type = parse_actor_type(actor_type_value)
            .ok_or_else(|| invalid_value("actor_type", actor_type_value))?;

        let respawn_value: i64 = row.get("respawn_type")?;
        let respawn_type = parse_respawn_type(respawn_value)
            .ok_or_else(|| invalid_value("respawn_type", respawn_value))?;

        let area_value: i64 = row.get("area_type")?;
        let area_type =
            parse_area_type(area_value).ok_or_else(|| invalid_value("area_type", area_value))?;

        Ok(Self {
            id: row.get("id")?,
            branch_version,
            map_id: row.get("map_id")?,
            zone_id: row.get("zone_id")?,
            actor_type,
            actor_count: row.get("actor_count")?,
            actor_rotation: get_f32(row, "actor_rotation")?,
            actor_id: row.get("actor_id")?,
            actor_rate: row.get("actor_rate")?,
            is_obstacle: get_bool(row, "is_obstacle")?,
            hit_collider_radius: get_f32(row, "hit_collider_radius")?,
            event_spawn_use: get_bool(row, "event_spawn_use")?,
            event_count: row.get("event_count")?,
            event_actor_rotation: get_f32(row, "event_actor_rotation")?,
            event_actor_id: row.get("event_actor_id")?,
            event_actor_rate: row.get("event_actor_rate")?,
            actor_initial_spawn: get_bool(row, "actor_initial_spawn")?,
            respawn_type,
            respawn_count: row.get("respawn_count")?,
            respawn_time: row.get("respawn_time")?,
            area_type,
            area_rotation: get_f32(row, "area_rotation")?,
            size: row.get("size")?,
            position: row.get("position")?,
            is_random: get_bool(row, "is_random")?,
        })
    }
}

fn invalid_value(column: &str, value: i64) -> RepoError {
    RepoError::InvalidData(format!("invalid value `{value}` in {TABLE}.{column}"))
}

fn get_bool(row: &Row<'_>, column: &str) -> RepoResult<bool> {
    match row.get::<_, i64>(column)? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(invalid_value(column, other)),
    }
}

fn get_f32(row: &Row<'_>, column: &str) -> RepoResult<f32> {
    Ok(row.get::<_, f64>(column)? as f32)
}

fn actor_type_to_db(value: ActorType) -> i64 {
    match value {
        ActorType::None => 0,
        ActorType::Monster => 1,
        ActorType::Npc => 2,
        ActorType::NpcAction => 3,
        ActorType::Gimmick => 4,
    }
}

fn parse_actor_type(value: i64) -> Option<ActorType> {
    match value {
        0 => Some(ActorType::None),
        1 => Some(ActorType::Monster),
        2 => Some(ActorType::Npc),
        3 => Some(ActorType::NpcAction),
        4 => Some(ActorType::Gimmick),
        _ => None,
    }
}

fn respawn_type_to_db(value: RespawnType) -> i64 {
    match value {
        RespawnType::None => 0,
        RespawnType::Time => 1,
        RespawnType::Count => 2,
    }
}

fn parse_respawn_type(value: i64) -> Option<RespawnType> {
    match value {
        0 => Some(RespawnType::None),
        1 => Some(RespawnType::Time),
        2 => Some(RespawnType::Count),
        _ => None,
    }
}

fn area_type_to_db(value: AreaType) -> i64 {
    match value {
        AreaType::None => 0,
        AreaType::Sphere => 1,
        AreaType::Cube => 2,
    }
}

fn parse_area_type(value: i64) -> Option<AreaType> {
    match value {
        0 => Some(AreaType::None),
        1 => Some(AreaType::Sphere),
        2 => Some(AreaType::Cube),
        _ => None,
    }
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}
