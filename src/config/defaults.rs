//! System-wide default constants.
//!
//! Every value here is also the serde default of the matching config key,
//! so an empty `ueflow.toml` behaves exactly like no file at all.

// ============================================================================
// Flows
// ============================================================================

/// Idle gap after which a candidate's recency turns into a penalty (ms).
pub const MAX_IDLE_MS: i64 = 60_000;

/// Grace window after the first end message before closing with an
/// incomplete mask (ms).
pub const END_GRACE_MS: i64 = 30_000;

pub const IA_MERGE_THRESHOLD: i32 = 35;
pub const XHO_MERGE_THRESHOLD: i32 = 35;
pub const N2H_MERGE_THRESHOLD: i32 = 35;
pub const RRE_MERGE_THRESHOLD: i32 = 20;
pub const RST_MERGE_THRESHOLD: i32 = 25;
pub const GCI_MERGE_THRESHOLD: i32 = 20;

// ============================================================================
// Store
// ============================================================================

/// Idle time after which the reaper expires an active procedure (ms).
pub const ACTIVE_TTL_MS: i64 = 3_600_000;

pub const STORE_PATH: &str = "./data/procedures.db";

pub const ARCHIVE_PATH: &str = "./data/procedure_history.jsonl";

// ============================================================================
// Pipeline
// ============================================================================

pub const WORKERS: usize = 4;

/// Per-worker queue depth (messages).
pub const QUEUE_CAPACITY: usize = 1024;

pub const REAPER_INTERVAL_SECS: u64 = 30;

/// Messages between progress log lines in the processing loop.
pub const PROGRESS_LOG_EVERY: u64 = 10_000;

// ============================================================================
// Config discovery
// ============================================================================

pub const CONFIG_ENV_VAR: &str = "UEFLOW_CONFIG";

pub const CONFIG_FILE_NAME: &str = "ueflow.toml";
