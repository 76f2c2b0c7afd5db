//! Core entity data layer for the map design tool.
//! Owns entity composition, id allocation, cloning and batched persistence.

pub mod audit;
pub mod batch;
pub mod config;
pub mod db;
pub mod ids;
pub mod logging;
pub mod model;
pub mod overlay;
pub mod repo;
pub mod service;

pub use audit::{audit_duplicate_ids, DuplicateId, DuplicateReport};
pub use batch::{
    BatchError, BatchHandler, BatchPhase, BatchProgress, BatchReport, BatchRunner, SliceBudget,
    StepOutcome,
};
pub use config::{BatchConfig, ConfigError, ToolConfig};
pub use db::{open_db, open_db_in_memory, DbError};
pub use ids::find_unique_id;
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::entity::{BranchVersion, EditorColor, EntityId, GroupType, ToolData};
pub use model::group::ToolDataGroup;
pub use model::node::{NodeIdScope, ToolDataNode};
pub use model::spawn_actor::{
    ActorRate, ActorType, AreaType, RespawnType, SpawnActorGroup, SpawnActorOverlay,
    SpawnActorRow, SpawnPoint,
};
pub use overlay::{MapOverlayDocument, OverlayError};
pub use repo::record_store::{RecordQuery, RecordStore, RepoError, RepoResult, SqliteRecordStore};
pub use service::spawn_actor_manager::{SpawnActorKind, SpawnActorManager};
pub use service::tool_manager::{GroupKind, ManagerError, ManagerResult, ToolManager};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
