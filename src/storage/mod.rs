//! Procedure Storage
//!
//! Active procedures live in a [`ProcedureStore`], indexed by UE; closed
//! procedures are handed to an [`ArchiveSink`]. Backends:
//! - `InMemoryProcedureStore`: `RwLock`-guarded maps, not durable
//! - `SledProcedureStore`: sled trees, survives restarts
//!
//! The engine serialises work per UE, so backends only need to be
//! internally consistent, not transactional across calls.

pub mod archive;
mod ids;
pub mod memory;
pub mod sled_store;

pub use archive::{ArchiveSink, JsonlArchive, MemoryArchive};
pub use ids::new_procedure_id;
pub use memory::InMemoryProcedureStore;
pub use sled_store::SledProcedureStore;

use std::sync::Arc;

use tracing::info;

use crate::config::{ArchiveBackend, StoreBackend, StoreConfig};
use crate::types::{CloseReason, Procedure, ProcedureType, ProcedureUpdate};

/// Keyed storage for active procedures plus the archival hand-off.
///
/// Implementations must be thread-safe (Send + Sync) for shared access
/// across worker tasks.
pub trait ProcedureStore: Send + Sync {
    /// Allocate an id and persist a fresh procedure for `ue_id`.
    fn create(
        &self,
        ue_id: &str,
        procedure_type: ProcedureType,
        first_msg_type: &str,
        now_ms: i64,
    ) -> Result<Procedure, StoreError>;

    /// Active procedures of one UE, in no particular order.
    fn list_active(&self, ue_id: &str) -> Result<Vec<Procedure>, StoreError>;

    /// Merge `update` into an active procedure (see [`Procedure::apply`]).
    fn update(
        &self,
        ue_id: &str,
        procedure_id: &str,
        update: &ProcedureUpdate,
    ) -> Result<(), StoreError>;

    /// Seal the procedure, hand it to the archive, then drop it from the
    /// active set. Returns the archived record.
    fn archive_and_remove(
        &self,
        ue_id: &str,
        procedure_id: &str,
        reason: CloseReason,
        end_time_ms: i64,
    ) -> Result<Procedure, StoreError>;

    /// UEs that currently own at least one active procedure.
    fn active_ue_ids(&self) -> Result<Vec<String>, StoreError>;

    /// Backend name for logging
    fn backend_name(&self) -> &'static str;
}

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store backend error: {0}")]
    Backend(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("procedure {procedure_id} not active for UE {ue_id}")]
    NotFound { ue_id: String, procedure_id: String },
    #[error("archive error: {0}")]
    Archive(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn not_found(ue_id: &str, procedure_id: &str) -> Self {
        Self::NotFound {
            ue_id: ue_id.to_string(),
            procedure_id: procedure_id.to_string(),
        }
    }
}

impl From<sled::Error> for StoreError {
    fn from(err: sled::Error) -> Self {
        Self::Backend(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        Self::Archive(err.to_string())
    }
}

/// Archive sink selected by `[store] archive`.
pub fn open_archive(config: &StoreConfig) -> Result<Arc<dyn ArchiveSink>, StoreError> {
    Ok(match config.archive {
        ArchiveBackend::Memory => Arc::new(MemoryArchive::new()),
        ArchiveBackend::Jsonl => Arc::new(JsonlArchive::open(&config.archive_path)?),
    })
}

/// Store selected by `[store] backend`, archiving into the configured sink.
pub fn open_store(config: &StoreConfig) -> Result<Arc<dyn ProcedureStore>, StoreError> {
    let archive = open_archive(config)?;
    let store: Arc<dyn ProcedureStore> = match config.backend {
        StoreBackend::Memory => Arc::new(InMemoryProcedureStore::new(archive)),
        StoreBackend::Sled => Arc::new(SledProcedureStore::open(&config.path, archive)?),
    };
    info!(
        backend = store.backend_name(),
        archive = ?config.archive,
        "Procedure store opened"
    );
    Ok(store)
}
