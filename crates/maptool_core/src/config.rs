//! Tool configuration file.
//!
//! # Invariants
//! - `ToolConfig::load` only returns validated configurations.
//! - Overlay documents live at `<overlay_dir>/map_<id>.json`.

use crate::batch::SliceBudget;
use crate::logging::{default_log_level, LogLevel};
use crate::model::entity::EntityId;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_STEP_BUDGET_MS: u64 = 16;

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Json(serde_json::Error),
    InvalidValue {
        field: &'static str,
        message: String,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "cannot read config: {err}"),
            Self::Json(err) => write!(f, "config is not valid json: {err}"),
            Self::InvalidValue { field, message } => {
                write!(f, "invalid config value `{field}`: {message}")
            }
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Json(err) => Some(err),
            Self::InvalidValue { .. } => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

/// Time slicing of save/load passes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub step_budget_ms: u64,
    /// When set, slices are counted in items instead of time.
    pub max_items_per_step: Option<usize>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            step_budget_ms: DEFAULT_STEP_BUDGET_MS,
            max_items_per_step: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolConfig {
    pub database_path: PathBuf,
    pub overlay_dir: PathBuf,
    #[serde(default = "default_level_string")]
    pub log_level: String,
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
    #[serde(default)]
    pub batch: BatchConfig,
}

fn default_level_string() -> String {
    default_log_level().to_string()
}

impl ToolConfig {
    /// Reads and validates a JSON config file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.database_path.as_os_str().is_empty() {
            return Err(invalid("database_path", "path cannot be empty"));
        }
        if self.overlay_dir.as_os_str().is_empty() {
            return Err(invalid("overlay_dir", "path cannot be empty"));
        }
        if let Err(err) = self.log_level.parse::<LogLevel>() {
            return Err(invalid("log_level", &err.to_string()));
        }
        match self.batch.max_items_per_step {
            Some(0) => Err(invalid("batch.max_items_per_step", "must be at least 1")),
            Some(_) => Ok(()),
            None if self.batch.step_budget_ms == 0 => Err(invalid(
                "batch.step_budget_ms",
                "must be positive unless max_items_per_step is set",
            )),
            None => Ok(()),
        }
    }

    pub fn overlay_path(&self, map_id: EntityId) -> PathBuf {
        self.overlay_dir.join(format!("map_{map_id}.json"))
    }

    pub fn slice_budget(&self) -> SliceBudget {
        match self.batch.max_items_per_step {
            Some(items) => SliceBudget::Items(items),
            None => SliceBudget::Time(Duration::from_millis(self.batch.step_budget_ms)),
        }
    }
}

fn invalid(field: &'static str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field,
        message: message.to_string(),
    }
}
