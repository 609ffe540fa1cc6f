//! Classification engine: attributes every message to exactly one procedure.
//!
//! Dispatch order per message:
//! 1. The first flow (registry priority) whose trigger fires claims it; it
//!    merges into its best candidate at or above its threshold, or creates
//!    a procedure if its creation gate allows. A claimed-but-declined
//!    message skips the remaining flows.
//! 2. No active procedures: open an `UNK` procedure.
//! 3. Otherwise score every active procedure; merge into the best positive
//!    one, or open an `UNK` procedure.
//!
//! All work for one UE must be serialised by the caller (see
//! `pipeline::ClassifierPool`); the engine itself holds no per-UE locks.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::{ClockMode, EngineConfig};
use crate::config::defaults::ACTIVE_TTL_MS;
use crate::flow::{
    score_untyped, Candidate, CloseDecider, FlowHandler, FlowRegistry, StoreCommand, Transition,
};
use crate::storage::{ProcedureStore, StoreError};
use crate::types::{CloseReason, MatchResult, Procedure, ProcedureType, Score, SignalingMessage};

#[derive(Debug, thiserror::Error)]
pub enum ClassifyError {
    #[error("message has no UE id")]
    MissingUeId,
    #[error("message has no message type")]
    MissingMsgType,
    /// Store keys use NUL as the UE/id separator.
    #[error("UE id contains a NUL byte")]
    InvalidUeId,
    #[error("classification task failed: {0}")]
    Task(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Current wall-clock time in epoch milliseconds.
pub fn wall_clock_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

pub struct ClassificationEngine {
    registry: FlowRegistry,
    decider: CloseDecider,
    store: Arc<dyn ProcedureStore>,
    clock: ClockMode,
    active_ttl_ms: i64,
    /// Highest "now" seen so far; drives sweeps in message-clock mode.
    watermark_ms: AtomicI64,
}

impl ClassificationEngine {
    pub fn new(registry: FlowRegistry, store: Arc<dyn ProcedureStore>) -> Self {
        let decider = registry.close_decider();
        Self {
            registry,
            decider,
            store,
            clock: ClockMode::default(),
            active_ttl_ms: ACTIVE_TTL_MS,
            watermark_ms: AtomicI64::new(0),
        }
    }

    pub fn from_config(config: &EngineConfig, store: Arc<dyn ProcedureStore>) -> Self {
        Self::new(FlowRegistry::from_config(&config.flows), store)
            .with_clock(config.engine.clock)
            .with_active_ttl_ms(config.store.active_ttl_ms)
    }

    #[must_use]
    pub const fn with_clock(mut self, clock: ClockMode) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub const fn with_active_ttl_ms(mut self, ttl_ms: i64) -> Self {
        self.active_ttl_ms = ttl_ms;
        self
    }

    pub const fn registry(&self) -> &FlowRegistry {
        &self.registry
    }

    pub fn store(&self) -> &Arc<dyn ProcedureStore> {
        &self.store
    }

    pub const fn clock(&self) -> ClockMode {
        self.clock
    }

    pub fn watermark_ms(&self) -> i64 {
        self.watermark_ms.load(Ordering::Relaxed)
    }

    /// "Now" for `msg` under the configured clock. A message without a
    /// usable timestamp falls back to the wall clock.
    pub fn now_for(&self, msg: &SignalingMessage) -> i64 {
        match self.clock {
            ClockMode::Message if msg.timestamp > 0 => msg.timestamp,
            _ => wall_clock_ms(),
        }
    }

    /// "Now" for sweeps: the watermark in message-clock mode (once any
    /// message was seen), the wall clock otherwise.
    pub fn sweep_now_ms(&self) -> i64 {
        match (self.clock, self.watermark_ms()) {
            (ClockMode::Message, w) if w > 0 => w,
            _ => wall_clock_ms(),
        }
    }

    // ========================================================================
    // Classification
    // ========================================================================

    /// Classify with the configured clock. Never fails; errors come back as
    /// `MatchStatus::Error`.
    pub fn classify(&self, msg: &SignalingMessage) -> MatchResult {
        self.classify_at(msg, self.now_for(msg))
    }

    pub fn classify_at(&self, msg: &SignalingMessage, now_ms: i64) -> MatchResult {
        match self.try_classify_at(msg, now_ms) {
            Ok(result) => result,
            Err(e) => {
                warn!(ue_id = %msg.ue_id, msg_type = %msg.msg_type, error = %e, "Classification failed");
                MatchResult::error(e.to_string())
            }
        }
    }

    pub fn try_classify(&self, msg: &SignalingMessage) -> Result<MatchResult, ClassifyError> {
        self.try_classify_at(msg, self.now_for(msg))
    }

    pub fn try_classify_at(
        &self,
        msg: &SignalingMessage,
        now_ms: i64,
    ) -> Result<MatchResult, ClassifyError> {
        if msg.ue_id.trim().is_empty() {
            return Err(ClassifyError::MissingUeId);
        }
        if msg.ue_id.contains('\0') {
            return Err(ClassifyError::InvalidUeId);
        }
        if msg.msg_type.trim().is_empty() {
            return Err(ClassifyError::MissingMsgType);
        }
        self.watermark_ms.fetch_max(now_ms, Ordering::Relaxed);

        let mut active = self.store.list_active(&msg.ue_id)?;
        // Deterministic tie-break: earliest activation, then id.
        active.sort_by(|a, b| {
            (a.activate_time_ms, &a.procedure_id).cmp(&(b.activate_time_ms, &b.procedure_id))
        });

        if let Some(handler) = self.registry.first_trigger(msg) {
            let best = handler.choose_best(&active, msg, now_ms);
            if let Some(c) = best.as_ref() {
                debug!(
                    ue_id = %msg.ue_id,
                    msg_type = %msg.msg_type,
                    flow = %handler.procedure_type(),
                    procedure_id = %c.procedure.procedure_id,
                    score = c.score.value,
                    threshold = handler.merge_threshold(),
                    "Best typed candidate"
                );
                if c.score.value >= handler.merge_threshold() {
                    let t = handler.apply_update(c, msg, now_ms, &self.decider);
                    return self.commit_existing(&t);
                }
            }
            if handler.should_create(best.as_ref(), msg) {
                return self.create_typed(handler, msg, now_ms);
            }
            debug!(
                ue_id = %msg.ue_id,
                msg_type = %msg.msg_type,
                flow = %handler.procedure_type(),
                "Trigger claimed message but declined to create"
            );
        }

        if active.is_empty() {
            return self.create_unknown(msg, now_ms);
        }

        match self.best_any(&active, msg, now_ms) {
            Some((p, score, typed)) if score.value > 0 => {
                debug!(
                    ue_id = %msg.ue_id,
                    msg_type = %msg.msg_type,
                    procedure_id = %p.procedure_id,
                    score = score.value,
                    "Fallback match"
                );
                let t = match typed {
                    Some((handler, candidate)) => {
                        handler.apply_update(&candidate, msg, now_ms, &self.decider)
                    }
                    None => Transition::cursor_only(
                        p,
                        &msg.msg_type,
                        (score.phase_index, score.order_index),
                        now_ms,
                    ),
                };
                self.commit_existing(&t)
            }
            _ => self.create_unknown(msg, now_ms),
        }
    }

    /// Type-agnostic best match over every active procedure. Each candidate
    /// is scored by its own flow; untyped ones get the flat catch-all score.
    fn best_any<'a>(
        &'a self,
        active: &'a [Procedure],
        msg: &SignalingMessage,
        now_ms: i64,
    ) -> Option<(&'a Procedure, Score, Option<(&'a dyn FlowHandler, Candidate)>)> {
        let mut best: Option<(&Procedure, Score, Option<(&dyn FlowHandler, Candidate)>)> = None;
        for p in active {
            let (score, typed) = match self.registry.handler_for(p.procedure_type) {
                Some(h) => {
                    let c = h.evaluate(p, msg, now_ms);
                    (c.score, Some((h, c)))
                }
                None => (score_untyped(p, now_ms), None),
            };
            if best.as_ref().map_or(true, |(_, s, _)| score.value > s.value) {
                best = Some((p, score, typed));
            }
        }
        best
    }

    fn create_typed(
        &self,
        handler: &dyn FlowHandler,
        msg: &SignalingMessage,
        now_ms: i64,
    ) -> Result<MatchResult, ClassifyError> {
        let created = self
            .store
            .create(&msg.ue_id, handler.procedure_type(), &msg.msg_type, now_ms)?;
        info!(
            ue_id = %msg.ue_id,
            procedure_id = %created.procedure_id,
            procedure_type = %created.procedure_type,
            msg_type = %msg.msg_type,
            "Procedure created"
        );
        let t = handler.seed(&created, msg, now_ms, &self.decider);
        self.execute(&t.commands)?;
        let mut result = MatchResult::matched_new(created.procedure_id, created.procedure_type);
        result.closed = t.closed;
        Ok(result)
    }

    fn create_unknown(
        &self,
        msg: &SignalingMessage,
        now_ms: i64,
    ) -> Result<MatchResult, ClassifyError> {
        let created = self
            .store
            .create(&msg.ue_id, ProcedureType::Unknown, &msg.msg_type, now_ms)?;
        info!(
            ue_id = %msg.ue_id,
            procedure_id = %created.procedure_id,
            msg_type = %msg.msg_type,
            "Unclassified message, catch-all procedure created"
        );
        Ok(MatchResult::matched_new(created.procedure_id, ProcedureType::Unknown))
    }

    fn commit_existing(&self, t: &Transition) -> Result<MatchResult, ClassifyError> {
        self.execute(&t.commands)?;
        Ok(MatchResult::matched_existing(
            t.next.procedure_id.clone(),
            t.next.procedure_type,
            t.closed,
        ))
    }

    fn execute(&self, commands: &[StoreCommand]) -> Result<(), StoreError> {
        for cmd in commands {
            match cmd {
                StoreCommand::Update {
                    ue_id,
                    procedure_id,
                    update,
                } => self.store.update(ue_id, procedure_id, update)?,
                StoreCommand::ArchiveAndRemove {
                    ue_id,
                    procedure_id,
                    reason,
                    end_time_ms,
                } => {
                    let record =
                        self.store
                            .archive_and_remove(ue_id, procedure_id, *reason, *end_time_ms)?;
                    info!(
                        ue_id = %ue_id,
                        procedure_id = %procedure_id,
                        procedure_type = %record.procedure_type,
                        procedure_name = record.procedure_type.display_name(),
                        reason = %reason,
                        key_mask = record.key_mask,
                        messages = record.message_count,
                        "Procedure closed"
                    );
                }
            }
        }
        Ok(())
    }

    // ========================================================================
    // Sweeps
    // ========================================================================

    /// Close whatever is due for one UE at `now_ms`: procedures whose close
    /// verdict is ready (end-grace timeout included) and procedures idle
    /// beyond the active TTL. Returns the archived records.
    pub fn sweep_ue(&self, ue_id: &str, now_ms: i64) -> Result<Vec<Procedure>, ClassifyError> {
        let mut closed = Vec::new();
        for p in self.store.list_active(ue_id)? {
            let reason = self.decider.decide(&p, now_ms).or_else(|| {
                (self.active_ttl_ms > 0 && p.idle_ms(now_ms) > self.active_ttl_ms)
                    .then_some(CloseReason::Expired)
            });
            if let Some(reason) = reason {
                let t = Transition::close(&p, reason, now_ms);
                self.execute(&t.commands)?;
                closed.push(t.next);
            }
        }
        Ok(closed)
    }
}

impl std::fmt::Debug for ClassificationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassificationEngine")
            .field("registry", &self.registry)
            .field("store", &self.store.backend_name())
            .field("clock", &self.clock)
            .field("active_ttl_ms", &self.active_ttl_ms)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{InMemoryProcedureStore, MemoryArchive};
    use crate::types::MatchStatus;

    fn engine() -> (ClassificationEngine, Arc<MemoryArchive>) {
        let archive = Arc::new(MemoryArchive::new());
        let store = Arc::new(InMemoryProcedureStore::new(archive.clone()));
        (ClassificationEngine::new(FlowRegistry::default(), store), archive)
    }

    fn msg(t: &str, ts: i64) -> SignalingMessage {
        SignalingMessage::new("U1", t, ts)
    }

    #[test]
    fn test_missing_fields_are_errors_without_mutation() {
        let (e, _) = engine();
        let r = e.classify(&SignalingMessage::new("", "RRCSetupComplete", 1));
        assert_eq!(r.status, MatchStatus::Error);
        let r = e.classify(&SignalingMessage::new("U1", "  ", 1));
        assert_eq!(r.status, MatchStatus::Error);
        assert!(e.store().active_ue_ids().unwrap().is_empty());
    }

    #[test]
    fn test_pending_start_alone_goes_to_catch_all() {
        let (e, _) = engine();
        let r = e.classify_at(&msg("RRCSetupRequest", 1), 1);
        assert_eq!(r.procedure_type, Some(ProcedureType::Unknown));
        assert!(r.new_procedure);
    }

    #[test]
    fn test_catch_all_absorbs_followups() {
        let (e, _) = engine();
        let first = e.classify_at(&msg("PAGING", 1_000), 1_000);
        let second = e.classify_at(&msg("PAGING", 1_500), 1_500);
        assert_eq!(second.procedure_id, first.procedure_id);
        assert!(!second.new_procedure);
        let p = &e.store().list_active("U1").unwrap()[0];
        assert_eq!(p.message_count, 2);
        assert_eq!(p.key_mask, 0);
    }

    #[test]
    fn test_ineligible_typed_candidate_falls_to_new_catch_all() {
        let (e, _) = engine();
        let ia = e.classify_at(&msg("RRCSetupComplete", 0), 0);
        let r = e.classify_at(&msg("PAGING", 10), 10);
        assert_ne!(r.procedure_id, ia.procedure_id);
        assert_eq!(r.procedure_type, Some(ProcedureType::Unknown));
    }

    #[test]
    fn test_watermark_tracks_max() {
        let (e, _) = engine();
        e.classify_at(&msg("PAGING", 5_000), 5_000);
        e.classify_at(&msg("PAGING", 3_000), 3_000);
        assert_eq!(e.watermark_ms(), 5_000);
        assert_eq!(e.sweep_now_ms(), 5_000);
    }

    #[test]
    fn test_message_clock_falls_back_to_wall_time() {
        let (e, _) = engine();
        assert_eq!(e.clock(), ClockMode::Message);
        let before = wall_clock_ms();
        let r = e.classify(&msg("PAGING", 0));
        let after = wall_clock_ms();
        assert!(r.is_matched());

        let p = &e.store().list_active("U1").unwrap()[0];
        assert!((before..=after).contains(&p.last_update_time_ms));
        assert!((before..=after).contains(&e.watermark_ms()));

        // A positive timestamp is used as-is.
        let (e, _) = engine();
        e.classify(&msg("PAGING", 7_000));
        assert_eq!(e.store().list_active("U1").unwrap()[0].activate_time_ms, 7_000);
        assert_eq!(e.watermark_ms(), 7_000);
    }

    #[test]
    fn test_wall_clock_ignores_message_timestamp() {
        let (e, _) = engine();
        let e = e.with_clock(ClockMode::Wall);
        let before = wall_clock_ms();
        e.classify(&msg("PAGING", 7_000));
        let after = wall_clock_ms();

        let p = &e.store().list_active("U1").unwrap()[0];
        assert!((before..=after).contains(&p.activate_time_ms));
        assert!(e.sweep_now_ms() >= after);
    }

    #[test]
    fn test_nul_in_ue_id_is_rejected() {
        let (e, _) = engine();
        let m = SignalingMessage::new("A\0B", "PAGING", 1);
        assert!(matches!(e.try_classify_at(&m, 1), Err(ClassifyError::InvalidUeId)));
        assert_eq!(e.classify_at(&m, 1).status, MatchStatus::Error);
        assert!(e.store().active_ue_ids().unwrap().is_empty());
    }

    #[test]
    fn test_sweep_expires_idle_catch_all() {
        let (e, archive) = engine();
        let e = e.with_active_ttl_ms(10_000);
        e.classify_at(&msg("PAGING", 0), 0);
        assert!(e.sweep_ue("U1", 5_000).unwrap().is_empty());
        let closed = e.sweep_ue("U1", 20_000).unwrap();
        assert_eq!(closed.len(), 1);
        assert_eq!(closed[0].close_reason, Some(CloseReason::Expired));
        assert_eq!(archive.len(), 1);
    }
}
