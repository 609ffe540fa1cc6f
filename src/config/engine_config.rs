//! Engine Configuration - classification, store and pipeline settings as
//! TOML values.
//!
//! Every section implements `Default` with the values in [`super::defaults`].
//! Flow sections only carry overrides; anything left unset falls back to the
//! flow's own built-in tuning.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::defaults;
use crate::flow::FlowTuning;
use crate::types::ProcedureType;

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration of a classifier deployment.
///
/// Load with `EngineConfig::load()` which searches:
/// 1. `$UEFLOW_CONFIG` env var
/// 2. `./ueflow.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub engine: EngineSection,

    /// Per-flow tuning overrides
    #[serde(default)]
    pub flows: FlowsConfig,

    #[serde(default)]
    pub store: StoreConfig,

    /// Worker pool and reaper settings
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

impl EngineConfig {
    /// Load configuration using the standard search order:
    /// 1. `$UEFLOW_CONFIG` environment variable
    /// 2. `./ueflow.toml` in the current working directory
    /// 3. Built-in defaults
    pub fn load() -> Self {
        // 1. Check env var
        if let Ok(path) = std::env::var(defaults::CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded engine config from UEFLOW_CONFIG");
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from UEFLOW_CONFIG, falling back");
                    }
                }
            } else {
                warn!(path = %path, "UEFLOW_CONFIG points to non-existent file, falling back");
            }
        }

        // 2. Check ./ueflow.toml
        let local = PathBuf::from(defaults::CONFIG_FILE_NAME);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded engine config from ./ueflow.toml");
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./ueflow.toml, using defaults");
                }
            }
        }

        // 3. Defaults
        info!("No ueflow.toml found, using built-in defaults");
        Self::default()
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::parse(&contents, path)
    }

    /// Parse a TOML document that did not come from a file.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Self::parse(contents, Path::new("<inline>"))
    }

    fn parse(contents: &str, origin: &Path) -> Result<Self, ConfigError> {
        // Two-pass: unknown keys are warnings only
        for w in super::validation::validate_unknown_keys(contents) {
            warn!(field = %w.field, "{}", w);
        }

        let config: Self =
            toml::from_str(contents).map_err(|e| ConfigError::Parse(origin.to_path_buf(), e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Reject impossible values; log suspicious ones.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let (errors, warnings) = super::validation::validate_ranges(self);
        for w in &warnings {
            warn!(field = %w.field, "{}", w);
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(errors))
        }
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config I/O error ({}): {1}", .0.display())]
    Io(PathBuf, #[source] std::io::Error),

    #[error("config parse error ({}): {1}", .0.display())]
    Parse(PathBuf, #[source] toml::de::Error),

    #[error("config serialization error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("config validation failed: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

// ============================================================================
// Engine Section
// ============================================================================

/// Source of "now" for scoring and closure decisions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClockMode {
    /// The message's own timestamp; replays behave like live capture.
    #[default]
    Message,
    /// The system clock at classification time.
    Wall,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSection {
    #[serde(default)]
    pub clock: ClockMode,
}

// ============================================================================
// Flow Overrides
// ============================================================================

/// Optional overrides of one flow's built-in tuning.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merge_threshold: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_idle_ms: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_grace_ms: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub require_strong_success: Option<bool>,
}

impl FlowOverrides {
    pub fn resolve(&self, base: FlowTuning) -> FlowTuning {
        FlowTuning {
            merge_threshold: self.merge_threshold.unwrap_or(base.merge_threshold),
            max_idle_ms: self.max_idle_ms.unwrap_or(base.max_idle_ms),
            end_grace_ms: self.end_grace_ms.unwrap_or(base.end_grace_ms),
            require_strong_success: self
                .require_strong_success
                .unwrap_or(base.require_strong_success),
        }
    }
}

/// `[flows.<name>]` tables, one per typed flow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowsConfig {
    #[serde(default)]
    pub initial_access: FlowOverrides,
    #[serde(default)]
    pub xn_handover: FlowOverrides,
    #[serde(default)]
    pub n2_handover: FlowOverrides,
    #[serde(default)]
    pub rrc_reestablishment: FlowOverrides,
    #[serde(default)]
    pub rrc_state_transfer: FlowOverrides,
    #[serde(default)]
    pub cu_internal_handover: FlowOverrides,
}

impl FlowsConfig {
    /// Config table name of each typed flow.
    pub const SECTIONS: [(&'static str, ProcedureType); 6] = [
        ("initial_access", ProcedureType::InitialAccess),
        ("xn_handover", ProcedureType::XnHandover),
        ("n2_handover", ProcedureType::N2Handover),
        ("rrc_reestablishment", ProcedureType::RrcReestablishment),
        ("rrc_state_transfer", ProcedureType::RrcStateTransfer),
        ("cu_internal_handover", ProcedureType::CuInternalHandover),
    ];

    /// Overrides for a procedure type; the catch-all has none.
    pub const fn for_type(&self, procedure_type: ProcedureType) -> Option<&FlowOverrides> {
        match procedure_type {
            ProcedureType::InitialAccess => Some(&self.initial_access),
            ProcedureType::XnHandover => Some(&self.xn_handover),
            ProcedureType::N2Handover => Some(&self.n2_handover),
            ProcedureType::RrcReestablishment => Some(&self.rrc_reestablishment),
            ProcedureType::RrcStateTransfer => Some(&self.rrc_state_transfer),
            ProcedureType::CuInternalHandover => Some(&self.cu_internal_handover),
            ProcedureType::Unknown => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &FlowOverrides)> + '_ {
        Self::SECTIONS
            .into_iter()
            .filter_map(move |(name, ty)| self.for_type(ty).map(|o| (name, o)))
    }
}

// ============================================================================
// Store
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Sled,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveBackend {
    Memory,
    /// Line-delimited JSON journal at `archive_path`.
    #[default]
    Jsonl,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    /// sled database directory (sled backend only)
    #[serde(default = "default_store_path")]
    pub path: PathBuf,

    #[serde(default)]
    pub archive: ArchiveBackend,

    #[serde(default = "default_archive_path")]
    pub archive_path: PathBuf,

    /// Idle expiry applied by the reaper (ms)
    #[serde(default = "default_active_ttl_ms")]
    pub active_ttl_ms: i64,
}

fn default_store_path() -> PathBuf {
    PathBuf::from(defaults::STORE_PATH)
}
fn default_archive_path() -> PathBuf {
    PathBuf::from(defaults::ARCHIVE_PATH)
}
const fn default_active_ttl_ms() -> i64 {
    defaults::ACTIVE_TTL_MS
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            path: default_store_path(),
            archive: ArchiveBackend::default(),
            archive_path: default_archive_path(),
            active_ttl_ms: default_active_ttl_ms(),
        }
    }
}

// ============================================================================
// Pipeline
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Per-worker queue depth
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    #[serde(default = "default_reaper_interval_secs")]
    pub reaper_interval_secs: u64,
}

const fn default_workers() -> usize {
    defaults::WORKERS
}
const fn default_queue_capacity() -> usize {
    defaults::QUEUE_CAPACITY
}
const fn default_reaper_interval_secs() -> u64 {
    defaults::REAPER_INTERVAL_SECS
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
            reaper_interval_secs: default_reaper_interval_secs(),
        }
    }
}
