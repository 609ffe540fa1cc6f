//! In-memory procedure store for tests and single-process deployments.
//!
//! Thread-safe via `RwLock`. Not durable: active procedures are lost on
//! restart (archived ones survive if the sink is durable).

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock};

use super::{new_procedure_id, ArchiveSink, ProcedureStore, StoreError};
use crate::types::{CloseReason, Procedure, ProcedureType, ProcedureUpdate};

#[derive(Default)]
struct ActiveSet {
    procedures: HashMap<String, Procedure>,
    by_ue: HashMap<String, BTreeSet<String>>,
    sequences: HashMap<(String, ProcedureType), u64>,
}

pub struct InMemoryProcedureStore {
    state: RwLock<ActiveSet>,
    archive: Arc<dyn ArchiveSink>,
}

impl InMemoryProcedureStore {
    pub fn new(archive: Arc<dyn ArchiveSink>) -> Self {
        Self {
            state: RwLock::new(ActiveSet::default()),
            archive,
        }
    }

    /// Number of active procedures across all UEs.
    pub fn active_count(&self) -> usize {
        self.state.read().map(|s| s.procedures.len()).unwrap_or(0)
    }
}

impl ProcedureStore for InMemoryProcedureStore {
    fn create(
        &self,
        ue_id: &str,
        procedure_type: ProcedureType,
        first_msg_type: &str,
        now_ms: i64,
    ) -> Result<Procedure, StoreError> {
        let mut state = self
            .state
            .write()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let seq = state
            .sequences
            .entry((ue_id.to_string(), procedure_type))
            .or_insert(0);
        *seq += 1;
        let id = new_procedure_id(ue_id, procedure_type, *seq);

        let procedure = Procedure::new(id.clone(), ue_id, procedure_type, first_msg_type, now_ms);
        state.procedures.insert(id.clone(), procedure.clone());
        state.by_ue.entry(ue_id.to_string()).or_default().insert(id);
        Ok(procedure)
    }

    fn list_active(&self, ue_id: &str) -> Result<Vec<Procedure>, StoreError> {
        let state = self
            .state
            .read()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        Ok(state
            .by_ue
            .get(ue_id)
            .into_iter()
            .flatten()
            .filter_map(|id| state.procedures.get(id).cloned())
            .collect())
    }

    fn update(
        &self,
        ue_id: &str,
        procedure_id: &str,
        update: &ProcedureUpdate,
    ) -> Result<(), StoreError> {
        let mut state = self
            .state
            .write()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        match state.procedures.get_mut(procedure_id) {
            Some(p) if p.ue_id == ue_id => {
                p.apply(update);
                Ok(())
            }
            _ => Err(StoreError::not_found(ue_id, procedure_id)),
        }
    }

    fn archive_and_remove(
        &self,
        ue_id: &str,
        procedure_id: &str,
        reason: CloseReason,
        end_time_ms: i64,
    ) -> Result<Procedure, StoreError> {
        let mut state = self
            .state
            .write()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let mut record = match state.procedures.get(procedure_id) {
            Some(p) if p.ue_id == ue_id => p.clone(),
            _ => return Err(StoreError::not_found(ue_id, procedure_id)),
        };
        record.close(reason, end_time_ms);

        // Archive first: a failed append leaves the procedure active.
        self.archive.append(&record)?;

        state.procedures.remove(procedure_id);
        if let Some(ids) = state.by_ue.get_mut(ue_id) {
            ids.remove(procedure_id);
            if ids.is_empty() {
                state.by_ue.remove(ue_id);
            }
        }
        Ok(record)
    }

    fn active_ue_ids(&self) -> Result<Vec<String>, StoreError> {
        let state = self
            .state
            .read()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let mut ues: Vec<String> = state.by_ue.keys().cloned().collect();
        ues.sort();
        Ok(ues)
    }

    fn backend_name(&self) -> &'static str {
        "InMemory"
    }
}
