//! Closure policy: one table keyed by procedure type.

use std::collections::HashMap;

use crate::types::{CloseReason, Procedure, ProcedureType};

/// Per-type closure rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClosePolicy {
    pub required_success: u32,
    pub failure_any: u32,
    /// Close an end-seen procedure after this long even if the mask is
    /// incomplete. Non-positive disables the fallback.
    pub end_grace_ms: i64,
}

impl ClosePolicy {
    /// Failure first, then success, then the end-grace timeout.
    pub fn evaluate(&self, p: &Procedure, now_ms: i64) -> Option<CloseReason> {
        if p.key_mask & self.failure_any != 0 {
            return Some(CloseReason::Failure);
        }
        if !p.end_seen {
            return None;
        }
        if p.key_mask & self.required_success == self.required_success {
            return Some(CloseReason::Success);
        }
        match p.end_seen_at_ms {
            Some(at) if self.end_grace_ms > 0 && now_ms - at > self.end_grace_ms => {
                Some(CloseReason::EndTimeout)
            }
            _ => None,
        }
    }
}

/// Closure verdicts for every registered procedure type.
///
/// Types without a policy (the catch-all) never close here; only the
/// reaper's idle expiry removes them.
#[derive(Debug, Clone, Default)]
pub struct CloseDecider {
    policies: HashMap<ProcedureType, ClosePolicy>,
}

impl CloseDecider {
    #[must_use]
    pub fn with_policy(mut self, procedure_type: ProcedureType, policy: ClosePolicy) -> Self {
        self.policies.insert(procedure_type, policy);
        self
    }

    pub fn policy(&self, procedure_type: ProcedureType) -> Option<&ClosePolicy> {
        self.policies.get(&procedure_type)
    }

    pub fn decide(&self, p: &Procedure, now_ms: i64) -> Option<CloseReason> {
        self.policies.get(&p.procedure_type)?.evaluate(p, now_ms)
    }
}
