//! Engine Configuration Module
//!
//! Operator-tunable classification thresholds, store and pipeline settings
//! loaded from TOML.
//!
//! ## Loading Order
//!
//! 1. `UEFLOW_CONFIG` environment variable (path to TOML file)
//! 2. `ueflow.toml` in the current working directory
//! 3. Built-in defaults (see [`defaults`])
//!
//! ## Usage
//!
//! ```ignore
//! let config = EngineConfig::load();
//! let engine = ClassificationEngine::from_config(&config, store);
//! ```

mod engine_config;
pub mod defaults;
pub mod validation;

pub use engine_config::*;
