//! Candidate scoring: how well an incoming message fits an active procedure.
//!
//! Pure functions over an immutable snapshot; safe to evaluate candidates
//! concurrently. Context-sensitive key resolution happens before scoring
//! (see `FlowHandler::resolve`) and the resolved location is passed in.

use crate::types::{PhaseLocation, Procedure, Score, SignalingMessage};

/// Base score of a message that belongs to the candidate's type.
pub const BASE_IN_MODEL: i32 = 30;
/// Score of an end message the phase model does not place.
pub const PINNED_END: i32 = 30;
pub const KEY_BONUS: i32 = 20;
pub const END_BONUS: i32 = 20;
/// Flat score of a catch-all candidate before recency.
pub const UNKNOWN_BASE: i32 = 5;

/// Phase-transition weights; handovers use the strict profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoringProfile {
    pub phase_start_bonus: i32,
    /// First phase of a not-yet-started candidate, anchor / non-anchor.
    pub first_anchor_bonus: i32,
    pub first_step_bonus: i32,
    pub same_phase_forward: i32,
    pub same_phase_backward: i32,
    pub next_phase_bonus: i32,
    pub skip_ahead_bonus: i32,
    pub regression_step: i32,
    pub regression_cap: i32,
}

impl ScoringProfile {
    pub const BASELINE: Self = Self {
        phase_start_bonus: 5,
        first_anchor_bonus: 20,
        first_step_bonus: 5,
        same_phase_forward: 15,
        same_phase_backward: 5,
        next_phase_bonus: 20,
        skip_ahead_bonus: 10,
        regression_step: 5,
        regression_cap: 3,
    };

    pub const STRICT: Self = Self {
        phase_start_bonus: 8,
        next_phase_bonus: 25,
        skip_ahead_bonus: 8,
        regression_step: 15,
        regression_cap: 2,
        ..Self::BASELINE
    };

    /// Adjustment for moving from the candidate's cursor to `loc`.
    pub fn phase_delta_adjustment(&self, candidate: &Procedure, loc: &PhaseLocation) -> i32 {
        if !candidate.is_started() {
            return if loc.is_phase_start {
                self.first_anchor_bonus
            } else {
                self.first_step_bonus
            };
        }
        let delta = loc.phase_index - candidate.last_phase_index;
        match delta {
            0 if loc.order_index >= candidate.last_order_index => self.same_phase_forward,
            0 => self.same_phase_backward,
            1 => self.next_phase_bonus,
            d if d > 1 => self.skip_ahead_bonus,
            d => -self.regression_step * (-d).min(self.regression_cap),
        }
    }
}

/// Transport a flow expects: bonus when both interface and layer match.
#[derive(Debug, Clone, Copy)]
pub struct Affinity {
    pub iface: &'static str,
    pub layer: &'static str,
    pub bonus: i32,
}

impl Affinity {
    pub const fn new(iface: &'static str, layer: &'static str, bonus: i32) -> Self {
        Self {
            iface,
            layer,
            bonus,
        }
    }
}

pub fn affinity_bonus(table: &[Affinity], msg: &SignalingMessage) -> i32 {
    table
        .iter()
        .filter(|a| msg.is_on(a.iface, a.layer))
        .map(|a| a.bonus)
        .sum()
}

/// Recency relative to the candidate's last update.
///
/// `max_idle_ms <= 0` disables the idle penalty.
pub const fn recency_adjustment(diff_ms: i64, max_idle_ms: i64) -> i32 {
    let mut adj = if diff_ms <= 1_000 {
        10
    } else if diff_ms <= 10_000 {
        5
    } else if diff_ms <= 60_000 {
        1
    } else {
        0
    };
    if max_idle_ms > 0 && diff_ms > max_idle_ms {
        adj -= 20;
    }
    adj
}

/// Inputs that depend on the candidate's flow type.
#[derive(Debug, Clone, Copy)]
pub struct ScoringContext<'a> {
    pub profile: ScoringProfile,
    pub affinity: &'a [Affinity],
    pub max_idle_ms: i64,
}

/// Score `msg` against `candidate`.
///
/// `location` is the already-resolved position of the message and
/// `is_end` the flow's end-message verdict for it.
pub fn score_candidate(
    ctx: &ScoringContext<'_>,
    candidate: &Procedure,
    msg: &SignalingMessage,
    location: Option<&PhaseLocation>,
    is_end: bool,
    now_ms: i64,
) -> Score {
    let (mut value, phase_index, order_index) = match location {
        Some(loc) => {
            let mut v = BASE_IN_MODEL;
            if loc.is_key_message {
                v += KEY_BONUS;
            }
            if loc.is_phase_start {
                v += ctx.profile.phase_start_bonus;
            }
            v += ctx.profile.phase_delta_adjustment(candidate, loc);
            if is_end {
                v += END_BONUS;
            }
            (v, loc.phase_index, loc.order_index)
        }
        None if is_end => (
            PINNED_END,
            candidate.last_phase_index,
            candidate.last_order_index,
        ),
        None => {
            return Score::new(
                Score::INELIGIBLE,
                candidate.last_phase_index,
                candidate.last_order_index,
            )
        }
    };

    let diff = (now_ms - candidate.last_update_time_ms).abs();
    value += recency_adjustment(diff, ctx.max_idle_ms);
    value += affinity_bonus(ctx.affinity, msg);

    Score::new(value, phase_index, order_index)
}

/// Score of a candidate whose type has no registered flow.
pub fn score_untyped(candidate: &Procedure, now_ms: i64) -> Score {
    let diff = (now_ms - candidate.last_update_time_ms).abs();
    Score::new(
        UNKNOWN_BASE + recency_adjustment(diff, 0),
        candidate.last_phase_index,
        candidate.last_order_index,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ProcedureType;

    const CTX: ScoringContext<'static> = ScoringContext {
        profile: ScoringProfile::BASELINE,
        affinity: &[Affinity::new("Uu", "RRC", 5), Affinity::new("N2", "NGAP", 3)],
        max_idle_ms: 60_000,
    };

    fn candidate(phase: i32, order: i32, last_update: i64) -> Procedure {
        let mut p = Procedure::new("p", "U1", ProcedureType::InitialAccess, "X", 0);
        p.last_phase_index = phase;
        p.last_order_index = order;
        p.last_update_time_ms = last_update;
        p
    }

    fn loc(phase: i32, order: i32, start: bool, key: bool) -> PhaseLocation {
        PhaseLocation {
            phase_index: phase,
            order_index: order,
            is_phase_start: start,
            is_key_message: key,
        }
    }

    #[test]
    fn test_next_phase_anchor_baseline() {
        let p = candidate(0, 0, 1_000);
        let m = SignalingMessage::new("U1", "X", 1_500);
        // 30 + 20 key + 5 start + 20 next + 10 recency
        let s = score_candidate(&CTX, &p, &m, Some(&loc(1, 0, true, true)), false, 1_500);
        assert_eq!(s, Score::new(85, 1, 0));
    }

    #[test]
    fn test_regression_penalties() {
        let p = candidate(4, 0, 0);
        let l = loc(0, 0, false, false);
        assert_eq!(ScoringProfile::BASELINE.phase_delta_adjustment(&p, &l), -15);
        assert_eq!(ScoringProfile::STRICT.phase_delta_adjustment(&p, &l), -30);
        let l1 = loc(3, 0, false, false);
        assert_eq!(ScoringProfile::BASELINE.phase_delta_adjustment(&p, &l1), -5);
        assert_eq!(ScoringProfile::STRICT.phase_delta_adjustment(&p, &l1), -15);
    }

    #[test]
    fn test_same_phase_and_skip() {
        let p = candidate(2, 1, 0);
        let b = ScoringProfile::BASELINE;
        assert_eq!(b.phase_delta_adjustment(&p, &loc(2, 1, false, false)), 15);
        assert_eq!(b.phase_delta_adjustment(&p, &loc(2, 0, false, false)), 5);
        assert_eq!(b.phase_delta_adjustment(&p, &loc(5, 0, false, false)), 10);
        assert_eq!(ScoringProfile::STRICT.phase_delta_adjustment(&p, &loc(5, 0, false, false)), 8);
    }

    #[test]
    fn test_not_started_candidate() {
        let p = candidate(-1, -1, 0);
        let b = ScoringProfile::BASELINE;
        assert_eq!(b.phase_delta_adjustment(&p, &loc(3, 0, true, true)), 20);
        assert_eq!(b.phase_delta_adjustment(&p, &loc(3, 1, false, false)), 5);
    }

    #[test]
    fn test_unplaced_end_message_pinned() {
        let p = candidate(3, 2, 0);
        let m = SignalingMessage::new("U1", "END", 20_000).on("N2", "NGAP");
        let s = score_candidate(&CTX, &p, &m, None, true, 20_000);
        // 30 pinned + 1 recency + 3 affinity
        assert_eq!(s, Score::new(34, 3, 2));
    }

    #[test]
    fn test_unknown_message_is_ineligible() {
        let p = candidate(3, 2, 0);
        let m = SignalingMessage::new("U1", "PAGING", 0).on("Uu", "RRC");
        let s = score_candidate(&CTX, &p, &m, None, false, 0);
        assert_eq!(s.value, Score::INELIGIBLE);
    }

    #[test]
    fn test_recency_and_idle_penalty() {
        assert_eq!(recency_adjustment(0, 60_000), 10);
        assert_eq!(recency_adjustment(10_000, 60_000), 5);
        assert_eq!(recency_adjustment(60_000, 60_000), 1);
        assert_eq!(recency_adjustment(60_001, 60_000), -20);
        assert_eq!(recency_adjustment(90_000, 0), 0);
    }

    #[test]
    fn test_untyped_score() {
        let p = candidate(-1, -1, 0);
        assert_eq!(score_untyped(&p, 500).value, 15);
        assert_eq!(score_untyped(&p, 120_000).value, 5);
    }
}
