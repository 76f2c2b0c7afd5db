//! CLI smoke driver.
//!
//! # Responsibility
//! - Load one map's spawn actors end to end from a config file.
//! - Print group counts and the duplicate id audit.

use maptool_core::ids::{is_valid_map_id, MAX_MAP_ID};
use maptool_core::{
    init_logging, open_db, BatchProgress, SpawnActorManager, SqliteRecordStore, ToolConfig,
    ToolDataGroup,
};
use std::ops::ControlFlow;
use std::path::Path;
use std::process::ExitCode;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    let (config_path, map_id) = match args.as_slice() {
        [_, config, map] => match map.parse::<i64>() {
            Ok(map_id) if is_valid_map_id(map_id) => (config.clone(), map_id),
            Ok(map_id) => {
                eprintln!("map_id must be in 0..={MAX_MAP_ID}, got {map_id}");
                return ExitCode::from(2);
            }
            Err(_) => {
                eprintln!("map_id must be an integer, got `{map}`");
                return ExitCode::from(2);
            }
        },
        _ => {
            eprintln!("usage: maptool_cli <config.json> <map_id>");
            return ExitCode::from(2);
        }
    };

    match run(Path::new(&config_path), map_id) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("event=cli_run module=cli status=error error={err}");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(config_path: &Path, map_id: i64) -> Result<(), Box<dyn std::error::Error>> {
    let config = ToolConfig::load(config_path)?;
    if let Some(log_dir) = &config.log_dir {
        init_logging(&config.log_level, log_dir)?;
    }

    let conn = open_db(&config.database_path)?;
    let store = SqliteRecordStore::try_new(&conn)?;
    let mut manager =
        SpawnActorManager::with_overlay_file(store, map_id, &config.overlay_path(map_id))?;

    let report = manager.load(config.slice_budget(), |progress: &BatchProgress| {
        log::debug!(
            "event=cli_progress module=cli status=ok processed={} total={}",
            progress.processed,
            progress.total
        );
        ControlFlow::Continue(())
    })?;

    let spawn_points: usize = manager.groups().iter().map(|group| group.node_count()).sum();
    println!("maptool_core version={}", maptool_core::core_version());
    println!(
        "map={map_id} groups={} spawn_points={spawn_points} processed={}/{}",
        manager.count(),
        report.processed,
        report.total
    );

    let audit = manager.check_all_duplicate_ids();
    if audit.has_duplicates() {
        println!("duplicate ids: {audit}");
    } else {
        println!("duplicate ids: none");
    }
    Ok(())
}
