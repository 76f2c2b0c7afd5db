//! Per-map overlay document store.
//!
//! # Responsibility
//! - Read and write the JSON document holding every editor overlay of one map.
//! - Look overlays up by entity id.
//!
//! # Invariants
//! - A missing document file reads as an empty document.
//! - Lookup returns the first entry with a matching id.
//! - Overlays never take part in id allocation.

use crate::model::entity::{EntityId, OverlayRecord};
use crate::model::spawn_actor::SpawnActorOverlay;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;

pub type OverlayResult<T> = Result<T, OverlayError>;

#[derive(Debug)]
pub enum OverlayError {
    Io(std::io::Error),
    Json(serde_json::Error),
}

impl Display for OverlayError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "overlay document io error: {err}"),
            Self::Json(err) => write!(f, "overlay document is not valid json: {err}"),
        }
    }
}

impl Error for OverlayError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Json(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for OverlayError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for OverlayError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

/// Editor overlays of one map, one list per entity kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapOverlayDocument {
    pub map_id: EntityId,
    pub spawn_actors: Vec<SpawnActorOverlay>,
}

impl MapOverlayDocument {
    pub fn new(map_id: EntityId) -> Self {
        Self {
            map_id,
            spawn_actors: Vec::new(),
        }
    }

    /// Reads the document at `path`.
    pub fn load(path: &Path) -> OverlayResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let document: Self = serde_json::from_str(&text)?;
        info!(
            "event=overlay_read module=overlay status=ok map_id={} spawn_actors={}",
            document.map_id,
            document.spawn_actors.len()
        );
        Ok(document)
    }

    /// Reads the document at `path`, or starts an empty one for `map_id`.
    pub fn load_or_new(path: &Path, map_id: EntityId) -> OverlayResult<Self> {
        if !path.exists() {
            info!(
                "event=overlay_read module=overlay status=missing map_id={map_id}"
            );
            return Ok(Self::new(map_id));
        }
        Self::load(path)
    }

    /// Writes the document as pretty JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> OverlayResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        info!(
            "event=overlay_write module=overlay status=ok map_id={} spawn_actors={}",
            self.map_id,
            self.spawn_actors.len()
        );
        Ok(())
    }

    pub fn find_spawn_actor(&self, id: EntityId) -> Option<&SpawnActorOverlay> {
        find_overlay(&self.spawn_actors, id)
    }
}

/// First overlay with `id`; further matches are logged and ignored.
pub fn find_overlay<J: OverlayRecord>(overlays: &[J], id: EntityId) -> Option<&J> {
    let mut matches = overlays.iter().filter(|overlay| overlay.id() == id);
    let first = matches.next()?;
    let extra = matches.count();
    if extra > 0 {
        warn!(
            "event=overlay_lookup module=overlay status=duplicate id={id} extra_matches={extra}"
        );
    }
    Some(first)
}
