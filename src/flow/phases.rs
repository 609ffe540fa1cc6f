//! Phase models: the ordered message sequence of each procedure type.
//!
//! Tables store message types in normalized form (see [`normalize_msg_type`]);
//! every lookup normalizes its input first, so `HandoverCommand`,
//! `handover  command` and `HANDOVER COMMAND` never diverge.

use std::borrow::Cow;

use crate::types::PhaseLocation;

/// How strongly a message anchors a new instance of a flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StartType {
    NotStart,
    /// Weak anchor: may or may not open this flow.
    PendingStart,
    /// Unambiguous anchor: justifies creating a new instance.
    ConfirmedStart,
}

/// Canonical form of a message type: trimmed, single-spaced, ASCII upper-case.
///
/// Borrows when the input is already canonical.
pub fn normalize_msg_type(raw: &str) -> Cow<'_, str> {
    if is_normalized(raw) {
        Cow::Borrowed(raw)
    } else {
        Cow::Owned(
            raw.split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
                .to_ascii_uppercase(),
        )
    }
}

fn is_normalized(s: &str) -> bool {
    let mut prev_space = true;
    for c in s.chars() {
        if c.is_whitespace() {
            if c != ' ' || prev_space {
                return false;
            }
            prev_space = true;
        } else {
            if c.is_ascii_lowercase() {
                return false;
            }
            prev_space = false;
        }
    }
    s.is_empty() || !prev_space
}

/// Membership test of a message type against a table of normalized names.
pub fn matches_any(table: &[&str], msg_type: &str) -> bool {
    let key = normalize_msg_type(msg_type);
    table.iter().any(|t| *t == key.as_ref())
}

/// Start classification from a flow's anchor tables.
pub fn classify_start(msg_type: &str, confirmed: &[&str], pending: &[&str]) -> StartType {
    if matches_any(confirmed, msg_type) {
        StartType::ConfirmedStart
    } else if matches_any(pending, msg_type) {
        StartType::PendingStart
    } else {
        StartType::NotStart
    }
}

/// One message type inside a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseEntry {
    pub msg_type: &'static str,
    pub order: i32,
    pub phase_start: bool,
    pub key: bool,
}

impl PhaseEntry {
    pub const fn new(msg_type: &'static str, order: i32, phase_start: bool, key: bool) -> Self {
        Self {
            msg_type,
            order,
            phase_start,
            key,
        }
    }

    /// Phase-start anchor that is also a key message.
    pub const fn anchor(msg_type: &'static str, order: i32) -> Self {
        Self::new(msg_type, order, true, true)
    }

    /// Supporting message: neither anchor nor key.
    pub const fn step(msg_type: &'static str, order: i32) -> Self {
        Self::new(msg_type, order, false, false)
    }
}

/// One phase: a named group of message types.
#[derive(Debug, Clone, Copy)]
pub struct PhaseDef {
    pub name: &'static str,
    pub entries: &'static [PhaseEntry],
}

/// Ordered phase list of a procedure type.
#[derive(Debug, Clone, Copy)]
pub struct PhaseModel {
    phases: &'static [PhaseDef],
}

impl PhaseModel {
    pub const fn new(phases: &'static [PhaseDef]) -> Self {
        Self { phases }
    }

    pub const fn phases(&self) -> &'static [PhaseDef] {
        self.phases
    }

    pub const fn phase_count(&self) -> usize {
        self.phases.len()
    }

    /// First position of `msg_type` in the model, scanning phases in order.
    pub fn locate(&self, msg_type: &str) -> Option<PhaseLocation> {
        let key = normalize_msg_type(msg_type);
        self.phases.iter().enumerate().find_map(|(idx, phase)| {
            phase
                .entries
                .iter()
                .find(|e| e.msg_type == key.as_ref())
                .map(|e| PhaseLocation {
                    phase_index: i32::try_from(idx).unwrap_or(i32::MAX),
                    order_index: e.order,
                    is_phase_start: e.phase_start,
                    is_key_message: e.key,
                })
        })
    }

    /// Location of a specific entry, for context-resolved recurrences.
    pub fn entry_at(&self, phase_index: usize, msg_type: &str) -> Option<PhaseLocation> {
        let key = normalize_msg_type(msg_type);
        let phase = self.phases.get(phase_index)?;
        phase
            .entries
            .iter()
            .find(|e| e.msg_type == key.as_ref())
            .map(|e| PhaseLocation {
                phase_index: i32::try_from(phase_index).unwrap_or(i32::MAX),
                order_index: e.order,
                is_phase_start: e.phase_start,
                is_key_message: e.key,
            })
    }

    pub fn contains(&self, msg_type: &str) -> bool {
        self.locate(msg_type).is_some()
    }

    /// All message types appearing in the model.
    pub fn msg_types(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.phases
            .iter()
            .flat_map(|p| p.entries.iter().map(|e| e.msg_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODEL: PhaseModel = PhaseModel::new(&[
        PhaseDef {
            name: "open",
            entries: &[PhaseEntry::anchor("A REQUEST", 0), PhaseEntry::step("A ACK", 1)],
        },
        PhaseDef {
            name: "run",
            entries: &[PhaseEntry::anchor("B", 0), PhaseEntry::step("A ACK", 1)],
        },
    ]);

    #[test]
    fn test_normalize() {
        assert_eq!(normalize_msg_type("  Initial   UE\tMessage "), "INITIAL UE MESSAGE");
        assert!(matches!(normalize_msg_type("RRCSETUP"), Cow::Borrowed(_)));
        assert!(matches!(normalize_msg_type("RRC  SETUP"), Cow::Owned(_)));
        assert_eq!(normalize_msg_type(""), "");
        assert_eq!(normalize_msg_type("   "), "");
    }

    #[test]
    fn test_locate_normalizes_and_takes_first_phase() {
        assert_eq!(MODEL.phase_count(), 2);
        let loc = MODEL.locate("a ack").unwrap();
        assert_eq!((loc.phase_index, loc.order_index), (0, 1));
        assert!(!loc.is_phase_start);

        let loc = MODEL.locate("b").unwrap();
        assert_eq!(loc.phase_index, 1);
        assert!(loc.is_phase_start && loc.is_key_message);

        assert!(MODEL.locate("C").is_none());
    }

    #[test]
    fn test_entry_at_specific_phase() {
        let loc = MODEL.entry_at(1, "A ACK").unwrap();
        assert_eq!(loc.phase_index, 1);
        assert!(MODEL.entry_at(5, "A ACK").is_none());
    }

    #[test]
    fn test_classify_start() {
        assert_eq!(classify_start("b", &["B"], &["A REQUEST"]), StartType::ConfirmedStart);
        assert_eq!(classify_start("A REQUEST", &["B"], &["A REQUEST"]), StartType::PendingStart);
        assert_eq!(classify_start("A ACK", &["B"], &["A REQUEST"]), StartType::NotStart);
    }

    #[test]
    fn test_matches_any() {
        assert!(matches_any(&["HANDOVER NOTIFY"], "Handover  Notify"));
        assert!(!matches_any(&["HANDOVER NOTIFY"], "HANDOVER"));
    }
}
