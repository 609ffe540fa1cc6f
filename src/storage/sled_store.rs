//! Durable procedure store on sled.
//!
//! Trees:
//! - `procedures`: procedure id → JSON `Procedure`
//! - `ue_index`: `ue \0 id` → empty (prefix scan lists a UE's set)
//! - `seq`: `ue \0 type` → u64 big-endian sequence counter
//!
//! UE ids must not contain NUL bytes; the engine rejects them before any
//! store call.

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use super::{new_procedure_id, ArchiveSink, ProcedureStore, StoreError};
use crate::types::{CloseReason, Procedure, ProcedureType, ProcedureUpdate};

const SEP: u8 = 0;

fn index_key(ue_id: &str, suffix: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(ue_id.len() + 1 + suffix.len());
    key.extend_from_slice(ue_id.as_bytes());
    key.push(SEP);
    key.extend_from_slice(suffix.as_bytes());
    key
}

fn ue_prefix(ue_id: &str) -> Vec<u8> {
    index_key(ue_id, "")
}

fn decode_u64(bytes: &[u8]) -> Option<u64> {
    <[u8; 8]>::try_from(bytes).ok().map(u64::from_be_bytes)
}

#[derive(Clone)]
pub struct SledProcedureStore {
    db: sled::Db,
    procedures: sled::Tree,
    ue_index: sled::Tree,
    seq: sled::Tree,
    archive: Arc<dyn ArchiveSink>,
}

impl SledProcedureStore {
    /// Open or create the store at `path`.
    pub fn open<P: AsRef<Path>>(path: P, archive: Arc<dyn ArchiveSink>) -> Result<Self, StoreError> {
        let db = sled::open(path.as_ref())?;
        let store = Self {
            procedures: db.open_tree("procedures")?,
            ue_index: db.open_tree("ue_index")?,
            seq: db.open_tree("seq")?,
            db,
            archive,
        };
        info!(
            path = %path.as_ref().display(),
            active = store.procedures.len(),
            "Sled procedure store opened"
        );
        Ok(store)
    }

    pub fn active_count(&self) -> usize {
        self.procedures.len()
    }

    /// Flush pending writes to disk
    pub fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }

    fn next_seq(&self, ue_id: &str, procedure_type: ProcedureType) -> Result<u64, StoreError> {
        let key = index_key(ue_id, procedure_type.code());
        let value = self.seq.update_and_fetch(key, |old| {
            let next = old.and_then(decode_u64).unwrap_or(0) + 1;
            Some(next.to_be_bytes().to_vec())
        })?;
        value
            .as_deref()
            .and_then(decode_u64)
            .ok_or_else(|| StoreError::Backend("sequence counter missing after update".to_string()))
    }

    fn load(&self, ue_id: &str, procedure_id: &str) -> Result<Procedure, StoreError> {
        let bytes = self
            .procedures
            .get(procedure_id.as_bytes())?
            .ok_or_else(|| StoreError::not_found(ue_id, procedure_id))?;
        let p: Procedure = serde_json::from_slice(&bytes)?;
        if p.ue_id == ue_id {
            Ok(p)
        } else {
            Err(StoreError::not_found(ue_id, procedure_id))
        }
    }

    fn save(&self, p: &Procedure) -> Result<(), StoreError> {
        self.procedures
            .insert(p.procedure_id.as_bytes(), serde_json::to_vec(p)?)?;
        Ok(())
    }
}

impl ProcedureStore for SledProcedureStore {
    fn create(
        &self,
        ue_id: &str,
        procedure_type: ProcedureType,
        first_msg_type: &str,
        now_ms: i64,
    ) -> Result<Procedure, StoreError> {
        let seq = self.next_seq(ue_id, procedure_type)?;
        let id = new_procedure_id(ue_id, procedure_type, seq);
        let procedure = Procedure::new(id.clone(), ue_id, procedure_type, first_msg_type, now_ms);
        self.save(&procedure)?;
        self.ue_index.insert(index_key(ue_id, &id), Vec::<u8>::new())?;
        Ok(procedure)
    }

    fn list_active(&self, ue_id: &str) -> Result<Vec<Procedure>, StoreError> {
        let prefix = ue_prefix(ue_id);
        let mut out = Vec::new();
        for item in self.ue_index.scan_prefix(&prefix) {
            let (key, _) = item?;
            let id = String::from_utf8_lossy(&key[prefix.len()..]).into_owned();
            // Index entries can outlive their record if a removal was interrupted.
            if let Some(bytes) = self.procedures.get(id.as_bytes())? {
                out.push(serde_json::from_slice(&bytes)?);
            }
        }
        Ok(out)
    }

    fn update(
        &self,
        ue_id: &str,
        procedure_id: &str,
        update: &ProcedureUpdate,
    ) -> Result<(), StoreError> {
        let mut p = self.load(ue_id, procedure_id)?;
        p.apply(update);
        self.save(&p)
    }

    fn archive_and_remove(
        &self,
        ue_id: &str,
        procedure_id: &str,
        reason: CloseReason,
        end_time_ms: i64,
    ) -> Result<Procedure, StoreError> {
        let mut record = self.load(ue_id, procedure_id)?;
        record.close(reason, end_time_ms);
        self.archive.append(&record)?;
        self.procedures.remove(procedure_id.as_bytes())?;
        self.ue_index.remove(index_key(ue_id, procedure_id))?;
        Ok(record)
    }

    fn active_ue_ids(&self) -> Result<Vec<String>, StoreError> {
        let mut ues: Vec<String> = Vec::new();
        for item in self.ue_index.iter() {
            let (key, _) = item?;
            let end = key.iter().position(|b| *b == SEP).unwrap_or(key.len());
            let ue = String::from_utf8_lossy(&key[..end]);
            // Keys are sorted, so one UE's entries are contiguous.
            if ues.last().map(String::as_str) != Some(ue.as_ref()) {
                ues.push(ue.into_owned());
            }
        }
        Ok(ues)
    }

    fn backend_name(&self) -> &'static str {
        "Sled"
    }
}
