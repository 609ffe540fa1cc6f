//! ueflow: signaling procedure classification
//!
//! Attributes every UE-bound signaling message (RRC, NGAP, XnAP, F1AP, NAS,
//! SBI) to exactly one procedure instance and tracks each procedure from
//! creation to closure under lossy, out-of-order capture.
//!
//! ## Architecture
//!
//! - **Flows**: one handler per procedure type (phase table, key bits,
//!   scoring weights, creation gate), ordered in a [`FlowRegistry`]
//! - **Engine**: [`ClassificationEngine`] dispatches each message to a
//!   flow, merges or creates, and closes via a single [`CloseDecider`]
//! - **Storage**: [`ProcedureStore`] backends (memory, sled) with an
//!   archive sink for closed procedures
//! - **Pipeline**: UE-partitioned worker pool, processing loop and reaper

pub mod background;
pub mod config;
pub mod engine;
pub mod flow;
pub mod pipeline;
pub mod storage;
pub mod telemetry;
pub mod types;

// Re-export configuration
pub use config::EngineConfig;

// Re-export commonly used types
pub use types::{
    CloseReason, Direction, MatchResult, MatchStatus, MessageCategory, Procedure, ProcedureType,
    SignalingMessage,
};

pub use engine::{ClassificationEngine, ClassifyError};
pub use flow::{CloseDecider, FlowHandler, FlowRegistry};
pub use storage::{ProcedureStore, StoreError};
