//! FlowHandler trait: uniform contract over the per-type state machines.
//!
//! A handler composes a [`PhaseModel`], a [`KeyBitRegistry`] and a
//! [`ScoringProfile`]. Most behaviour lives in default methods; the concrete
//! flows only supply tables and override the few decisions that differ.

use super::close::{CloseDecider, ClosePolicy};
use super::key_bits::KeyBitRegistry;
use super::phases::{matches_any, PhaseModel, StartType};
use super::scoring::{score_candidate, Affinity, ScoringContext, ScoringProfile};
use super::transition::{Evidence, Transition};
use crate::types::{PhaseLocation, Procedure, ProcedureType, Score, SignalingMessage};

/// Operator-tunable knobs of one flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowTuning {
    pub merge_threshold: i32,
    pub max_idle_ms: i64,
    pub end_grace_ms: i64,
    /// Close on success only once the strong mask is complete.
    pub require_strong_success: bool,
}

impl FlowTuning {
    pub const fn with_threshold(merge_threshold: i32) -> Self {
        Self {
            merge_threshold,
            max_idle_ms: crate::config::defaults::MAX_IDLE_MS,
            end_grace_ms: crate::config::defaults::END_GRACE_MS,
            require_strong_success: false,
        }
    }
}

/// A message resolved against one candidate's current key mask.
///
/// Computed once per (candidate, message) and reused by scoring and update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub location: Option<PhaseLocation>,
    pub key_bit: u32,
    pub is_end: bool,
}

/// A scored candidate.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub procedure: Procedure,
    pub score: Score,
    pub resolution: Resolution,
}

pub trait FlowHandler: Send + Sync {
    fn procedure_type(&self) -> ProcedureType;

    fn phase_model(&self) -> &PhaseModel;

    fn key_bits(&self) -> &KeyBitRegistry;

    /// Flow-terminal messages, normalized. May overlap the phase model.
    fn end_messages(&self) -> &[&'static str];

    fn tuning(&self) -> &FlowTuning;

    fn check_start_type(&self, msg: &SignalingMessage) -> StartType;

    fn scoring_profile(&self) -> ScoringProfile {
        ScoringProfile::BASELINE
    }

    fn affinity(&self) -> &[Affinity] {
        &[]
    }

    /// Payload-completeness gate for phase-start messages.
    fn has_valid_payload_for_phase_start(&self, _msg: &SignalingMessage, _phase_index: i32) -> bool {
        true
    }

    fn is_end_message(&self, msg_type: &str) -> bool {
        matches_any(self.end_messages(), msg_type)
    }

    fn merge_threshold(&self) -> i32 {
        self.tuning().merge_threshold
    }

    /// Map the message to its location and key bit given the candidate's
    /// current mask. Literal lookup unless a flow has recurring messages.
    fn resolve(&self, msg_type: &str, _key_mask: u32) -> Resolution {
        Resolution {
            location: self.phase_model().locate(msg_type),
            key_bit: self.key_bits().bit_for_msg_type(msg_type),
            is_end: self.is_end_message(msg_type),
        }
    }

    fn is_trigger(&self, msg: &SignalingMessage) -> bool {
        if self.is_end_message(&msg.msg_type) {
            return true;
        }
        if let Some(loc) = self.phase_model().locate(&msg.msg_type) {
            if loc.is_phase_start {
                // A failed payload gate also vetoes the key-bit path.
                return self.has_valid_payload_for_phase_start(msg, loc.phase_index);
            }
        }
        self.key_bits().is_key(&msg.msg_type)
    }

    /// Resolve and score one candidate of this flow's type.
    fn evaluate(&self, candidate: &Procedure, msg: &SignalingMessage, now_ms: i64) -> Candidate {
        let resolution = self.resolve(&msg.msg_type, candidate.key_mask);
        let ctx = ScoringContext {
            profile: self.scoring_profile(),
            affinity: self.affinity(),
            max_idle_ms: self.tuning().max_idle_ms,
        };
        let score = score_candidate(
            &ctx,
            candidate,
            msg,
            resolution.location.as_ref(),
            resolution.is_end,
            now_ms,
        );
        Candidate {
            procedure: candidate.clone(),
            score,
            resolution,
        }
    }

    /// Highest-scoring active procedure of this type.
    ///
    /// `active` must already be in tie-break order; only a strictly greater
    /// score displaces the incumbent.
    fn choose_best(&self, active: &[Procedure], msg: &SignalingMessage, now_ms: i64) -> Option<Candidate> {
        let mut best: Option<Candidate> = None;
        for p in active.iter().filter(|p| p.procedure_type == self.procedure_type()) {
            let c = self.evaluate(p, msg, now_ms);
            if best.as_ref().map_or(true, |b| c.score.value > b.score.value) {
                best = Some(c);
            }
        }
        best
    }

    /// Creation gate, consulted when no candidate reached the threshold.
    fn should_create(&self, _best: Option<&Candidate>, msg: &SignalingMessage) -> bool {
        self.check_start_type(msg) == StartType::ConfirmedStart
    }

    /// Fold the message into the candidate and decide closure.
    fn apply_update(
        &self,
        candidate: &Candidate,
        msg: &SignalingMessage,
        now_ms: i64,
        decider: &CloseDecider,
    ) -> Transition {
        let evidence = Evidence {
            msg_type: &msg.msg_type,
            key_bit: candidate.resolution.key_bit,
            is_end: candidate.resolution.is_end,
            target: (candidate.score.phase_index, candidate.score.order_index),
            at_ms: now_ms,
        };
        Transition::update(&candidate.procedure, &evidence, decider)
    }

    /// Fold the creating message into a procedure the store just made.
    fn seed(
        &self,
        created: &Procedure,
        msg: &SignalingMessage,
        now_ms: i64,
        decider: &CloseDecider,
    ) -> Transition {
        let c = self.evaluate(created, msg, now_ms);
        let evidence = Evidence {
            msg_type: &msg.msg_type,
            key_bit: c.resolution.key_bit,
            is_end: c.resolution.is_end,
            target: (c.score.phase_index, c.score.order_index),
            at_ms: now_ms,
        };
        Transition::seed(created, &evidence, decider)
    }

    fn close_policy(&self) -> ClosePolicy {
        let bits = self.key_bits();
        let tuning = self.tuning();
        ClosePolicy {
            required_success: if tuning.require_strong_success {
                bits.required_strong
            } else {
                bits.required_success
            },
            failure_any: bits.failure_any,
            end_grace_ms: tuning.end_grace_ms,
        }
    }
}
