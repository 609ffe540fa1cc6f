//! Pure state transitions: snapshot in, next snapshot plus store commands out.
//!
//! The engine executes the returned commands in order; nothing in here
//! touches the store.

use super::close::CloseDecider;
use crate::types::{advance_cursor, CloseReason, Procedure, ProcedureUpdate};

/// Mutation the engine must apply to the procedure store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCommand {
    Update {
        ue_id: String,
        procedure_id: String,
        update: ProcedureUpdate,
    },
    ArchiveAndRemove {
        ue_id: String,
        procedure_id: String,
        reason: CloseReason,
        end_time_ms: i64,
    },
}

/// What one message contributes to one procedure.
#[derive(Debug, Clone, Copy)]
pub struct Evidence<'a> {
    pub msg_type: &'a str,
    /// Already context-resolved; 0 when the message is not key evidence.
    pub key_bit: u32,
    pub is_end: bool,
    /// (phase, order) the score placed the message at.
    pub target: (i32, i32),
    pub at_ms: i64,
}

/// Fold `evidence` into a copy of `snapshot`.
pub fn apply_evidence(snapshot: &Procedure, evidence: &Evidence<'_>) -> Procedure {
    let mut next = snapshot.clone();
    if evidence.is_end {
        next.end_seen = true;
        if next.end_seen_at_ms.is_none() {
            next.end_seen_at_ms = Some(evidence.at_ms);
        }
    }
    next.key_mask |= evidence.key_bit;
    let (phase, order) = advance_cursor(
        (next.last_phase_index, next.last_order_index),
        evidence.target,
    );
    next.last_phase_index = phase;
    next.last_order_index = order;
    next.last_message_type = evidence.msg_type.to_string();
    next.last_update_time_ms = evidence.at_ms;
    next.message_count += 1;
    next
}

/// Result of a transition.
#[derive(Debug, Clone)]
pub struct Transition {
    pub next: Procedure,
    pub commands: Vec<StoreCommand>,
    pub closed: Option<CloseReason>,
}

impl Transition {
    /// Typed update: evidence, persist, then a close verdict at `at_ms`.
    pub fn update(snapshot: &Procedure, evidence: &Evidence<'_>, decider: &CloseDecider) -> Self {
        let mut next = apply_evidence(snapshot, evidence);
        let mut commands = vec![StoreCommand::Update {
            ue_id: next.ue_id.clone(),
            procedure_id: next.procedure_id.clone(),
            update: ProcedureUpdate::from_snapshot(&next, evidence.msg_type, evidence.at_ms),
        }];
        let closed = decider.decide(&next, evidence.at_ms);
        if let Some(reason) = closed {
            commands.push(archive_command(&next, reason, evidence.at_ms));
            next.close(reason, evidence.at_ms);
        }
        Self {
            next,
            commands,
            closed,
        }
    }

    /// First evidence of a freshly created procedure. The creating message
    /// is already counted by the store.
    pub fn seed(created: &Procedure, evidence: &Evidence<'_>, decider: &CloseDecider) -> Self {
        let mut t = Self::update(created, evidence, decider);
        t.next.message_count = created.message_count;
        for cmd in &mut t.commands {
            if let StoreCommand::Update { update, .. } = cmd {
                update.message_count = created.message_count;
            }
        }
        t
    }

    /// Generic update for procedures without a typed flow: cursor and
    /// bookkeeping only, no key bits, no end marking, no close check.
    pub fn cursor_only(snapshot: &Procedure, msg_type: &str, target: (i32, i32), at_ms: i64) -> Self {
        let evidence = Evidence {
            msg_type,
            key_bit: 0,
            is_end: false,
            target,
            at_ms,
        };
        let next = apply_evidence(snapshot, &evidence);
        let commands = vec![StoreCommand::Update {
            ue_id: next.ue_id.clone(),
            procedure_id: next.procedure_id.clone(),
            update: ProcedureUpdate::from_snapshot(&next, msg_type, at_ms),
        }];
        Self {
            next,
            commands,
            closed: None,
        }
    }

    /// Close without new evidence (sweeps).
    pub fn close(snapshot: &Procedure, reason: CloseReason, at_ms: i64) -> Self {
        let mut next = snapshot.clone();
        let commands = vec![archive_command(&next, reason, at_ms)];
        next.close(reason, at_ms);
        Self {
            next,
            commands,
            closed: Some(reason),
        }
    }
}

fn archive_command(p: &Procedure, reason: CloseReason, at_ms: i64) -> StoreCommand {
    StoreCommand::ArchiveAndRemove {
        ue_id: p.ue_id.clone(),
        procedure_id: p.procedure_id.clone(),
        reason,
        end_time_ms: at_ms,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::close::ClosePolicy;
    use crate::types::ProcedureType;

    fn snapshot() -> Procedure {
        Procedure::new("p1", "U1", ProcedureType::InitialAccess, "A", 0)
    }

    fn evidence(bit: u32, end: bool, target: (i32, i32), at: i64) -> Evidence<'static> {
        Evidence {
            msg_type: "M",
            key_bit: bit,
            is_end: end,
            target,
            at_ms: at,
        }
    }

    fn decider() -> CloseDecider {
        CloseDecider::default().with_policy(
            ProcedureType::InitialAccess,
            ClosePolicy {
                required_success: 0b11,
                failure_any: 0b100,
                end_grace_ms: 30_000,
            },
        )
    }

    #[test]
    fn test_end_marked_once() {
        let first = apply_evidence(&snapshot(), &evidence(0, true, (-1, -1), 1_000));
        let second = apply_evidence(&first, &evidence(0, true, (-1, -1), 5_000));
        assert!(second.end_seen);
        assert_eq!(second.end_seen_at_ms, Some(1_000));
    }

    #[test]
    fn test_update_without_close() {
        let t = Transition::update(&snapshot(), &evidence(0b01, false, (1, 0), 10), &decider());
        assert!(t.closed.is_none());
        assert_eq!(t.commands.len(), 1);
        assert_eq!(t.next.key_mask, 0b01);
        assert_eq!(t.next.last_phase_index, 1);
        assert_eq!(t.next.message_count, 2);
    }

    #[test]
    fn test_update_that_closes_emits_archive() {
        let mut p = snapshot();
        p.key_mask = 0b01;
        let t = Transition::update(&p, &evidence(0b10, true, (2, 0), 50), &decider());
        assert_eq!(t.closed, Some(CloseReason::Success));
        assert!(matches!(
            t.commands.last(),
            Some(StoreCommand::ArchiveAndRemove {
                reason: CloseReason::Success,
                end_time_ms: 50,
                ..
            })
        ));
        assert_eq!(t.next.end_time_ms, Some(50));
    }

    #[test]
    fn test_seed_does_not_recount_first_message() {
        let t = Transition::seed(&snapshot(), &evidence(0b01, false, (0, 0), 0), &decider());
        assert_eq!(t.next.message_count, 1);
        assert_eq!(t.next.key_mask, 0b01);
        assert!(matches!(
            &t.commands[0],
            StoreCommand::Update { update, .. } if update.message_count == 1
        ));
    }

    #[test]
    fn test_cursor_only_keeps_mask_and_end() {
        let t = Transition::cursor_only(&snapshot(), "END", (3, 1), 10);
        assert_eq!(t.next.key_mask, 0);
        assert!(!t.next.end_seen);
        assert_eq!((t.next.last_phase_index, t.next.last_order_index), (3, 1));
    }
}
